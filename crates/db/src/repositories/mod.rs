use async_trait::async_trait;
use thiserror::Error;

use signoff_core::approvals::StatusQuery;
use signoff_core::domain::approval::{ApprovalStatus, DataApproval, DataApprovalKey};
use signoff_core::domain::period::Period;
use signoff_core::errors::ApplicationError;

pub mod approval;
pub mod approval_status;
pub mod category;
pub mod data_element;
pub mod event;
pub mod file_resource;
pub mod org_unit;
pub mod period;
pub mod setting;
pub mod user;
pub mod workflow;

pub use approval::SqlDataApprovalStore;
pub use approval_status::{assemble_cell_signal_query, SqlCellSignalSource};
pub use category::SqlCategoryRepository;
pub use data_element::SqlDataElementRepository;
pub use event::SqlEventRepository;
pub use file_resource::SqlFileResourceRepository;
pub use org_unit::SqlOrganisationUnitRepository;
pub use period::SqlPeriodRepository;
pub use setting::{SqlSystemSettings, ACCEPTANCE_REQUIRED_FOR_APPROVAL};
pub use user::SqlUserRepository;
pub use workflow::SqlWorkflowRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    Application(#[from] ApplicationError),
}

impl From<RepositoryError> for ApplicationError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Application(inner) => inner,
            other => ApplicationError::Persistence(other.to_string()),
        }
    }
}

pub(crate) fn decode_error(error: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::Decode(error.to_string())
}

/// Filter for [`DataApprovalStore::get_data_approvals`]. Every collection
/// must be non-empty for any approval to match.
#[derive(Clone, Debug, Default)]
pub struct DataApprovalSelection {
    pub level_ids: Vec<i64>,
    pub workflow_ids: Vec<i64>,
    pub periods: Vec<Period>,
    pub org_unit_ids: Vec<i64>,
    pub attribute_option_combo_ids: Vec<i64>,
}

impl DataApprovalSelection {
    pub fn is_empty(&self) -> bool {
        self.level_ids.is_empty()
            || self.workflow_ids.is_empty()
            || self.periods.is_empty()
            || self.org_unit_ids.is_empty()
            || self.attribute_option_combo_ids.is_empty()
    }
}

#[async_trait]
pub trait DataApprovalStore: Send + Sync {
    /// Stores a new approval and returns it with its id. A second approval
    /// with the same key is rejected by the database.
    async fn add_data_approval(
        &self,
        approval: &DataApproval,
    ) -> Result<DataApproval, RepositoryError>;

    async fn update_data_approval(&self, approval: &DataApproval) -> Result<(), RepositoryError>;

    async fn delete_data_approval(&self, approval: &DataApproval) -> Result<(), RepositoryError>;

    async fn delete_data_approvals_for_org_unit(
        &self,
        org_unit_id: i64,
    ) -> Result<u64, RepositoryError>;

    async fn get_data_approval(
        &self,
        key: &DataApprovalKey,
    ) -> Result<Option<DataApproval>, RepositoryError>;

    async fn get_data_approvals(
        &self,
        selection: &DataApprovalSelection,
    ) -> Result<Vec<DataApproval>, RepositoryError>;

    async fn data_approval_exists(&self, key: &DataApprovalKey) -> Result<bool, RepositoryError>;

    async fn get_data_approval_statuses(
        &self,
        query: StatusQuery<'_>,
    ) -> Result<Vec<ApprovalStatus>, RepositoryError>;
}

pub mod approvals;
pub mod audit;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;

pub use approvals::{
    ApprovalExistenceCache, ApprovalStatusResolver, CellSignalRequest, CellSignalSource,
    CellSignals, CurrentUserProvider, PeriodLookup, StaticUserProvider, StatusQuery,
    SystemSettings,
};
pub use audit::{AuditSink, AuditType, DataValueAudit, InMemoryAuditSink, TracingAuditSink};
pub use domain::approval::{
    ApprovalLevel, ApprovalState, ApprovalStatus, DataApproval, DataApprovalKey, Workflow,
};
pub use domain::period::{Period, PeriodType};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use events::{DataValueChanges, EventDataValueError, EventDataValueService};

use std::sync::Arc;

use clap::Args;
use serde::Serialize;
use uuid::Uuid;

use signoff_core::approvals::{ApprovalExistenceCache, StaticUserProvider, StatusQuery};
use signoff_core::config::AppConfig;
use signoff_core::domain::approval::ApprovalStatus;
use signoff_core::domain::category::CategoryOptionCombo;
use signoff_core::domain::period::Period;
use signoff_core::{ApplicationError, DomainError};
use signoff_db::repositories::{
    DataApprovalStore, RepositoryError, SqlCategoryRepository, SqlDataApprovalStore,
    SqlOrganisationUnitRepository, SqlSystemSettings, SqlUserRepository, SqlWorkflowRepository,
};
use signoff_db::{connect_with_config, DbPool};

use crate::commands::{load_config, runtime, CommandResult};

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[arg(long, help = "Workflow uid")]
    pub workflow: String,
    #[arg(long, help = "ISO period, e.g. 202403 or 2024Q1")]
    pub period: String,
    #[arg(long = "org-unit", help = "Org unit uid; repeat for several. Omit for every org unit")]
    pub org_units: Vec<String>,
    #[arg(long, help = "Hierarchy level of the requested org units")]
    pub level: Option<u32>,
    #[arg(long = "attribute-combo", help = "Attribute category combo uid")]
    pub attribute_combo: Option<String>,
    #[arg(long = "option-combo", help = "Attribute option combo uid; repeat for several")]
    pub option_combos: Vec<String>,
    #[arg(long, default_value = "admin", help = "Username the statuses are resolved for")]
    pub user: String,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    workflow: String,
    period: String,
    user: String,
    statuses: Vec<ApprovalStatus>,
}

pub fn run(args: StatusArgs) -> CommandResult {
    let config = match load_config("status") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let runtime = match runtime("status") {
        Ok(runtime) => runtime,
        Err(result) => return result,
    };

    let correlation_id = Uuid::new_v4().to_string();
    let result = runtime.block_on(async {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(RepositoryError::from)?;
        let report = resolve_statuses(&pool, &config, &args).await;
        pool.close().await;
        report
    });

    match result {
        Ok(report) => match serde_json::to_string_pretty(&report) {
            Ok(output) => CommandResult { exit_code: 0, output },
            Err(error) => CommandResult::failure("status", "serialization", error.to_string(), 9),
        },
        Err(error) => {
            tracing::warn!(
                event_name = "cli.status.failed",
                correlation_id = %correlation_id,
                error = %error,
                "approval status command failed"
            );
            CommandResult::from_interface("status", &error.into_interface(correlation_id))
        }
    }
}

async fn resolve_statuses(
    pool: &DbPool,
    config: &AppConfig,
    args: &StatusArgs,
) -> Result<StatusReport, ApplicationError> {
    let period = Period::from_iso(&args.period).map_err(DomainError::from)?;

    let workflow = SqlWorkflowRepository::new(pool.clone())
        .workflow_by_uid(&args.workflow)
        .await?
        .ok_or_else(|| ApplicationError::not_found("workflow", args.workflow.clone()))?;

    let user = SqlUserRepository::new(pool.clone())
        .user_by_username(&args.user)
        .await?
        .ok_or_else(|| ApplicationError::not_found("user", args.user.clone()))?;

    let org_units = SqlOrganisationUnitRepository::new(pool.clone())
        .org_units_by_uids(&args.org_units)
        .await?;
    if let Some(missing) =
        args.org_units.iter().find(|uid| !org_units.iter().any(|unit| &unit.uid == *uid))
    {
        return Err(ApplicationError::not_found("organisation unit", missing.clone()));
    }

    let categories = SqlCategoryRepository::new(pool.clone());
    let attribute_combo = match &args.attribute_combo {
        Some(uid) => Some(
            categories
                .category_combo_by_uid(uid)
                .await?
                .ok_or_else(|| ApplicationError::not_found("category combo", uid.clone()))?,
        ),
        None => None,
    };

    let mut option_combos: Vec<CategoryOptionCombo> = Vec::with_capacity(args.option_combos.len());
    for uid in &args.option_combos {
        option_combos.push(
            categories
                .option_combo_by_uid(uid)
                .await?
                .ok_or_else(|| ApplicationError::not_found("category option combo", uid.clone()))?,
        );
    }

    let org_unit_level = args
        .level
        .or_else(|| org_units.first().map(|unit| unit.hierarchy_level))
        .unwrap_or_default();

    let username = user.username.clone();
    let store = SqlDataApprovalStore::new(
        pool.clone(),
        ApprovalExistenceCache::from_config(&config.approval),
        SqlSystemSettings::new(pool.clone(), config.approval.acceptance_required_for_approval),
        Arc::new(StaticUserProvider::new(user)),
    );

    let statuses = store
        .get_data_approval_statuses(StatusQuery {
            workflow: &workflow,
            period: &period,
            org_units: (!org_units.is_empty()).then_some(org_units.as_slice()),
            org_unit_level,
            attribute_combo: attribute_combo.as_ref(),
            attribute_option_combos: (!option_combos.is_empty())
                .then_some(option_combos.as_slice()),
        })
        .await?;

    Ok(StatusReport { workflow: workflow.uid, period: period.iso_date(), user: username, statuses })
}

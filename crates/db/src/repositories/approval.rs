use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use tracing::debug;

use signoff_core::approvals::{
    ApprovalExistenceCache, ApprovalStatusResolver, CurrentUserProvider, PeriodLookup,
    StatusQuery,
};
use signoff_core::domain::approval::{ApprovalStatus, DataApproval, DataApprovalKey};
use signoff_core::errors::ApplicationError;

use super::period::row_to_period;
use super::{
    decode_error, DataApprovalSelection, DataApprovalStore, RepositoryError, SqlCellSignalSource,
    SqlPeriodRepository, SqlSystemSettings,
};
use crate::query::{apply_bindings, NamedBindings};
use crate::DbPool;

const APPROVAL_COLUMNS: &str = "da.dataapprovalid, da.dataapprovallevelid, da.workflowid, \
     da.organisationunitid, da.attributeoptioncomboid, da.accepted, da.created, da.creator, \
     p.periodid, pt.name AS periodtype, p.startdate, p.enddate";

const APPROVAL_FROM: &str = "FROM dataapproval da \
     JOIN period p ON p.periodid = da.periodid \
     JOIN periodtype pt ON pt.periodtypeid = p.periodtypeid";

type SqlStatusResolver =
    ApprovalStatusResolver<SqlCellSignalSource, SqlPeriodRepository, SqlSystemSettings>;

/// Data approvals in SQLite, with a cached existence check and status resolution.
pub struct SqlDataApprovalStore {
    pool: DbPool,
    cache: ApprovalExistenceCache,
    resolver: SqlStatusResolver,
    users: Arc<dyn CurrentUserProvider>,
}

impl SqlDataApprovalStore {
    pub fn new(
        pool: DbPool,
        cache: ApprovalExistenceCache,
        settings: SqlSystemSettings,
        users: Arc<dyn CurrentUserProvider>,
    ) -> Self {
        let resolver = ApprovalStatusResolver::new(
            SqlCellSignalSource::new(pool.clone()),
            SqlPeriodRepository::new(pool.clone()),
            settings,
        );
        Self { pool, cache, resolver, users }
    }

    pub fn cache(&self) -> &ApprovalExistenceCache {
        &self.cache
    }

    fn periods(&self) -> &SqlPeriodRepository {
        self.resolver.periods()
    }

    async fn stored_period_id(&self, approval: &DataApproval) -> Result<i64, RepositoryError> {
        let period = self.periods().reload_period(&approval.period).await?;
        period.id.ok_or_else(|| {
            RepositoryError::Decode(format!("period {} has no id", period.iso_date()))
        })
    }

    async fn period_id_for_key(&self, key: &DataApprovalKey) -> Result<Option<i64>, RepositoryError> {
        Ok(self.periods().find_period(&key.period()).await?.and_then(|period| period.id))
    }
}

#[async_trait]
impl DataApprovalStore for SqlDataApprovalStore {
    async fn add_data_approval(
        &self,
        approval: &DataApproval,
    ) -> Result<DataApproval, RepositoryError> {
        self.cache.invalidate_all();
        let period_id = self.stored_period_id(approval).await?;

        let result = sqlx::query(
            "INSERT INTO dataapproval (dataapprovallevelid, workflowid, periodid,
                                       organisationunitid, attributeoptioncomboid,
                                       accepted, created, creator)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(approval.level_id)
        .bind(approval.workflow_id)
        .bind(period_id)
        .bind(approval.org_unit_id)
        .bind(approval.attribute_option_combo_id)
        .bind(approval.accepted)
        .bind(approval.created.to_rfc3339())
        .bind(&approval.creator)
        .execute(&self.pool)
        .await?;
        self.cache.invalidate_all();

        debug!(
            event_name = "approval.record.added",
            level_id = approval.level_id,
            workflow_id = approval.workflow_id,
            period = %approval.period.iso_date(),
            org_unit_id = approval.org_unit_id,
            attribute_option_combo_id = approval.attribute_option_combo_id,
            "data approval added"
        );

        let mut stored = approval.clone();
        stored.id = Some(result.last_insert_rowid());
        stored.period = stored.period.with_id(period_id);
        Ok(stored)
    }

    async fn update_data_approval(&self, approval: &DataApproval) -> Result<(), RepositoryError> {
        self.cache.invalidate_all();
        let period_id = self.stored_period_id(approval).await?;

        let result = sqlx::query(
            "UPDATE dataapproval SET accepted = ?6, created = ?7, creator = ?8
             WHERE dataapprovallevelid = ?1 AND workflowid = ?2 AND periodid = ?3
               AND organisationunitid = ?4 AND attributeoptioncomboid = ?5",
        )
        .bind(approval.level_id)
        .bind(approval.workflow_id)
        .bind(period_id)
        .bind(approval.org_unit_id)
        .bind(approval.attribute_option_combo_id)
        .bind(approval.accepted)
        .bind(approval.created.to_rfc3339())
        .bind(&approval.creator)
        .execute(&self.pool)
        .await?;
        self.cache.invalidate_all();

        if result.rows_affected() == 0 {
            return Err(ApplicationError::not_found(
                "data approval",
                format!("{}:{}", approval.period.iso_date(), approval.org_unit_id),
            )
            .into());
        }
        Ok(())
    }

    async fn delete_data_approval(&self, approval: &DataApproval) -> Result<(), RepositoryError> {
        self.cache.invalidate_all();
        let period_id = self.stored_period_id(approval).await?;

        sqlx::query(
            "DELETE FROM dataapproval
             WHERE dataapprovallevelid = ?1 AND workflowid = ?2 AND periodid = ?3
               AND organisationunitid = ?4 AND attributeoptioncomboid = ?5",
        )
        .bind(approval.level_id)
        .bind(approval.workflow_id)
        .bind(period_id)
        .bind(approval.org_unit_id)
        .bind(approval.attribute_option_combo_id)
        .execute(&self.pool)
        .await?;
        self.cache.invalidate_all();
        Ok(())
    }

    async fn delete_data_approvals_for_org_unit(
        &self,
        org_unit_id: i64,
    ) -> Result<u64, RepositoryError> {
        self.cache.invalidate_all();

        let result = sqlx::query("DELETE FROM dataapproval WHERE organisationunitid = ?1")
            .bind(org_unit_id)
            .execute(&self.pool)
            .await?;
        self.cache.invalidate_all();
        Ok(result.rows_affected())
    }

    async fn get_data_approval(
        &self,
        key: &DataApprovalKey,
    ) -> Result<Option<DataApproval>, RepositoryError> {
        let Some(period_id) = self.period_id_for_key(key).await? else {
            return Ok(None);
        };

        let row = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} {APPROVAL_FROM}
             WHERE da.dataapprovallevelid = ?1 AND da.workflowid = ?2 AND da.periodid = ?3
               AND da.organisationunitid = ?4 AND da.attributeoptioncomboid = ?5"
        ))
        .bind(key.level_id)
        .bind(key.workflow_id)
        .bind(period_id)
        .bind(key.org_unit_id)
        .bind(key.attribute_option_combo_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_approval).transpose()
    }

    async fn get_data_approvals(
        &self,
        selection: &DataApprovalSelection,
    ) -> Result<Vec<DataApproval>, RepositoryError> {
        if selection.is_empty() {
            return Ok(Vec::new());
        }

        let mut period_ids = Vec::with_capacity(selection.periods.len());
        for period in &selection.periods {
            if let Some(id) = self.periods().find_period(period).await?.and_then(|p| p.id) {
                period_ids.push(id);
            }
        }
        if period_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut bindings = NamedBindings::new();
        let sql = format!(
            "SELECT {APPROVAL_COLUMNS} {APPROVAL_FROM}
             WHERE da.dataapprovallevelid IN ({levels})
               AND da.workflowid IN ({workflows})
               AND da.periodid IN ({periods})
               AND da.organisationunitid IN ({org_units})
               AND da.attributeoptioncomboid IN ({combos})
             ORDER BY da.dataapprovalid",
            levels = bindings.bind_list("levels", selection.level_ids.iter().copied()),
            workflows = bindings.bind_list("workflows", selection.workflow_ids.iter().copied()),
            periods = bindings.bind_list("periods", period_ids),
            org_units = bindings.bind_list("org_units", selection.org_unit_ids.iter().copied()),
            combos = bindings
                .bind_list("combos", selection.attribute_option_combo_ids.iter().copied()),
        );

        let rows =
            apply_bindings(sqlx::query(&sql), bindings.into_values()).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_approval).collect()
    }

    async fn data_approval_exists(&self, key: &DataApprovalKey) -> Result<bool, RepositoryError> {
        if let Some(exists) = self.cache.get(key) {
            return Ok(exists);
        }

        let loaded_at = self.cache.generation();
        let exists = match self.period_id_for_key(key).await? {
            Some(period_id) => {
                let found: i64 = sqlx::query_scalar(
                    "SELECT EXISTS(SELECT 1 FROM dataapproval
                     WHERE dataapprovallevelid = ?1 AND workflowid = ?2 AND periodid = ?3
                       AND organisationunitid = ?4 AND attributeoptioncomboid = ?5)",
                )
                .bind(key.level_id)
                .bind(key.workflow_id)
                .bind(period_id)
                .bind(key.org_unit_id)
                .bind(key.attribute_option_combo_id)
                .fetch_one(&self.pool)
                .await?;
                found == 1
            }
            None => false,
        };

        self.cache.insert_loaded(key.clone(), exists, loaded_at);
        Ok(exists)
    }

    async fn get_data_approval_statuses(
        &self,
        query: StatusQuery<'_>,
    ) -> Result<Vec<ApprovalStatus>, RepositoryError> {
        let user = self.users.current_user();
        Ok(self.resolver.resolve(&user, query).await?)
    }
}

fn row_to_approval(row: &sqlx::sqlite::SqliteRow) -> Result<DataApproval, RepositoryError> {
    let accepted: i64 = row.try_get("accepted").map_err(decode_error)?;
    let created: String = row.try_get("created").map_err(decode_error)?;

    Ok(DataApproval {
        id: Some(row.try_get("dataapprovalid").map_err(decode_error)?),
        level_id: row.try_get("dataapprovallevelid").map_err(decode_error)?,
        workflow_id: row.try_get("workflowid").map_err(decode_error)?,
        period: row_to_period(row, "periodid")?,
        org_unit_id: row.try_get("organisationunitid").map_err(decode_error)?,
        attribute_option_combo_id: row.try_get("attributeoptioncomboid").map_err(decode_error)?,
        accepted: accepted != 0,
        created: DateTime::parse_from_rfc3339(&created)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(decode_error)?,
        creator: row.try_get("creator").map_err(decode_error)?,
    })
}

use sqlx::Row;

use signoff_core::domain::approval::{ApprovalLevel, Workflow};
use signoff_core::domain::period::PeriodType;

use super::{decode_error, RepositoryError};
use crate::DbPool;

const LEVEL_COLUMNS: &str = "dal.dataapprovallevelid, dal.uid, dal.name, dal.level, dal.orgunitlevel";

#[derive(Clone)]
pub struct SqlWorkflowRepository {
    pool: DbPool,
}

impl SqlWorkflowRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn workflow_by_uid(&self, uid: &str) -> Result<Option<Workflow>, RepositoryError> {
        let row = sqlx::query(
            "SELECT w.workflowid, w.uid, w.name, pt.name AS periodtype
             FROM dataapprovalworkflow w
             JOIN periodtype pt ON pt.periodtypeid = w.periodtypeid
             WHERE w.uid = ?1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row.try_get("workflowid").map_err(decode_error)?;
        let uid: String = row.try_get("uid").map_err(decode_error)?;
        let name: String = row.try_get("name").map_err(decode_error)?;
        let period_type: String = row.try_get("periodtype").map_err(decode_error)?;

        Ok(Some(Workflow {
            id,
            uid,
            name,
            period_type: period_type.parse::<PeriodType>().map_err(decode_error)?,
            levels: self.levels_for_workflow(id).await?,
        }))
    }

    /// Levels of a workflow, ascending by ordinal.
    pub async fn levels_for_workflow(
        &self,
        workflow_id: i64,
    ) -> Result<Vec<ApprovalLevel>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEVEL_COLUMNS}
             FROM dataapprovallevel dal
             JOIN dataapprovalworkflowlevels wl ON wl.dataapprovallevelid = dal.dataapprovallevelid
             WHERE wl.workflowid = ?1
             ORDER BY dal.level"
        ))
        .bind(workflow_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_level).collect()
    }
}

fn row_to_level(row: &sqlx::sqlite::SqliteRow) -> Result<ApprovalLevel, RepositoryError> {
    let level: i64 = row.try_get("level").map_err(decode_error)?;
    let org_unit_level: i64 = row.try_get("orgunitlevel").map_err(decode_error)?;

    Ok(ApprovalLevel {
        id: row.try_get("dataapprovallevelid").map_err(decode_error)?,
        uid: row.try_get("uid").map_err(decode_error)?,
        name: row.try_get("name").map_err(decode_error)?,
        level: u32::try_from(level).map_err(decode_error)?,
        org_unit_level: u32::try_from(org_unit_level).map_err(decode_error)?,
    })
}

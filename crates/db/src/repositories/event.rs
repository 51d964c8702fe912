use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;

use signoff_core::domain::event::{EventDataValue, ProgramStageInstance};
use signoff_core::errors::ApplicationError;
use signoff_core::events::EventStore;

use super::{decode_error, RepositoryError};
use crate::DbPool;

/// Events with their data values serialized as one JSON object per row.
#[derive(Clone)]
pub struct SqlEventRepository {
    pool: DbPool,
}

impl SqlEventRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_uid(
        &self,
        uid: &str,
    ) -> Result<Option<ProgramStageInstance>, RepositoryError> {
        let row = sqlx::query(
            "SELECT programstageinstanceid, uid, eventdatavalues
             FROM programstageinstance WHERE uid = ?1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let values_json: String = row.try_get("eventdatavalues").map_err(decode_error)?;
        let event_data_values: BTreeMap<String, EventDataValue> =
            serde_json::from_str(&values_json).map_err(decode_error)?;

        Ok(Some(ProgramStageInstance {
            id: row.try_get("programstageinstanceid").map_err(decode_error)?,
            uid: row.try_get("uid").map_err(decode_error)?,
            event_data_values,
        }))
    }

    pub async fn save(&self, event: &ProgramStageInstance) -> Result<(), RepositoryError> {
        let values_json = serde_json::to_string(&event.event_data_values).map_err(decode_error)?;

        sqlx::query(
            "INSERT INTO programstageinstance (programstageinstanceid, uid, eventdatavalues, lastupdated)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(programstageinstanceid) DO UPDATE SET
                 eventdatavalues = excluded.eventdatavalues,
                 lastupdated = excluded.lastupdated",
        )
        .bind(event.id)
        .bind(&event.uid)
        .bind(values_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl EventStore for SqlEventRepository {
    async fn event(&self, uid: &str) -> Result<Option<ProgramStageInstance>, ApplicationError> {
        Ok(self.find_by_uid(uid).await?)
    }

    async fn update_event(&self, event: &ProgramStageInstance) -> Result<(), ApplicationError> {
        let values_json = serde_json::to_string(&event.event_data_values)
            .map_err(|e| ApplicationError::Persistence(e.to_string()))?;

        let result = sqlx::query(
            "UPDATE programstageinstance
             SET eventdatavalues = ?2, lastupdated = ?3
             WHERE uid = ?1",
        )
        .bind(&event.uid)
        .bind(values_json)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        if result.rows_affected() == 0 {
            return Err(ApplicationError::not_found("event", event.uid.clone()));
        }
        Ok(())
    }
}

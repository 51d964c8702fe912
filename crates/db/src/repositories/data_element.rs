use async_trait::async_trait;
use sqlx::Row;

use signoff_core::domain::event::{DataElement, ValueType};
use signoff_core::errors::ApplicationError;
use signoff_core::events::DataElementLookup;

use super::{decode_error, RepositoryError};
use crate::DbPool;

#[derive(Clone)]
pub struct SqlDataElementRepository {
    pool: DbPool,
}

impl SqlDataElementRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_uid(&self, uid: &str) -> Result<Option<DataElement>, RepositoryError> {
        let row = sqlx::query(
            "SELECT dataelementid, uid, name, valuetype FROM dataelement WHERE uid = ?1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let value_type: String = row.try_get("valuetype").map_err(decode_error)?;
        Ok(Some(DataElement {
            id: row.try_get("dataelementid").map_err(decode_error)?,
            uid: row.try_get("uid").map_err(decode_error)?,
            name: row.try_get("name").map_err(decode_error)?,
            value_type: value_type.parse::<ValueType>().map_err(RepositoryError::Decode)?,
        }))
    }

    pub async fn save(&self, element: &DataElement) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO dataelement (dataelementid, uid, name, valuetype)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(dataelementid) DO UPDATE SET
                 uid = excluded.uid,
                 name = excluded.name,
                 valuetype = excluded.valuetype",
        )
        .bind(element.id)
        .bind(&element.uid)
        .bind(&element.name)
        .bind(element.value_type.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl DataElementLookup for SqlDataElementRepository {
    async fn data_element(&self, uid: &str) -> Result<Option<DataElement>, ApplicationError> {
        Ok(self.find_by_uid(uid).await?)
    }
}

use async_trait::async_trait;
use sqlx::Row;

use signoff_core::domain::event::FileResource;
use signoff_core::errors::ApplicationError;
use signoff_core::events::FileResourceStore;

use super::{decode_error, RepositoryError};
use crate::DbPool;

#[derive(Clone)]
pub struct SqlFileResourceRepository {
    pool: DbPool,
}

impl SqlFileResourceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_uid(&self, uid: &str) -> Result<Option<FileResource>, RepositoryError> {
        let row = sqlx::query("SELECT uid, name, isassigned FROM fileresource WHERE uid = ?1")
            .bind(uid)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(ref r) => {
                let assigned: i64 = r.try_get("isassigned").map_err(decode_error)?;
                Ok(Some(FileResource {
                    uid: r.try_get("uid").map_err(decode_error)?,
                    name: r.try_get("name").map_err(decode_error)?,
                    assigned: assigned != 0,
                }))
            }
            None => Ok(None),
        }
    }

    pub async fn save(&self, resource: &FileResource) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO fileresource (uid, name, isassigned) VALUES (?1, ?2, ?3)
             ON CONFLICT(uid) DO UPDATE SET
                 name = excluded.name,
                 isassigned = excluded.isassigned",
        )
        .bind(&resource.uid)
        .bind(&resource.name)
        .bind(resource.assigned)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl FileResourceStore for SqlFileResourceRepository {
    async fn file_resource(&self, uid: &str) -> Result<Option<FileResource>, ApplicationError> {
        Ok(self.find_by_uid(uid).await?)
    }

    async fn update_file_resource(&self, resource: &FileResource) -> Result<(), ApplicationError> {
        Ok(self.save(resource).await?)
    }

    async fn delete_file_resource(&self, uid: &str) -> Result<(), ApplicationError> {
        sqlx::query("DELETE FROM fileresource WHERE uid = ?1")
            .bind(uid)
            .execute(&self.pool)
            .await
            .map_err(RepositoryError::from)?;
        Ok(())
    }
}

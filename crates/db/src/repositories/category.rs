use sqlx::Row;

use signoff_core::domain::category::{CategoryCombo, CategoryOptionCombo};

use super::{decode_error, RepositoryError};
use crate::DbPool;

#[derive(Clone)]
pub struct SqlCategoryRepository {
    pool: DbPool,
}

impl SqlCategoryRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn category_combo_by_uid(
        &self,
        uid: &str,
    ) -> Result<Option<CategoryCombo>, RepositoryError> {
        let row = sqlx::query(
            "SELECT categorycomboid, uid, name FROM categorycombo WHERE uid = ?1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(CategoryCombo {
                id: r.try_get("categorycomboid").map_err(decode_error)?,
                uid: r.try_get("uid").map_err(decode_error)?,
                name: r.try_get("name").map_err(decode_error)?,
            })),
            None => Ok(None),
        }
    }

    pub async fn option_combo_by_uid(
        &self,
        uid: &str,
    ) -> Result<Option<CategoryOptionCombo>, RepositoryError> {
        let row = sqlx::query(
            "SELECT categoryoptioncomboid, uid, name FROM categoryoptioncombo WHERE uid = ?1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_option_combo).transpose()
    }
}

fn row_to_option_combo(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<CategoryOptionCombo, RepositoryError> {
    Ok(CategoryOptionCombo {
        id: row.try_get("categoryoptioncomboid").map_err(decode_error)?,
        uid: row.try_get("uid").map_err(decode_error)?,
        name: row.try_get("name").map_err(decode_error)?,
    })
}

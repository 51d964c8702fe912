use sqlx::Row;

use signoff_core::domain::org_unit::OrganisationUnit;

use super::{decode_error, RepositoryError};
use crate::query::{apply_bindings, NamedBindings};
use crate::DbPool;

#[derive(Clone)]
pub struct SqlOrganisationUnitRepository {
    pool: DbPool,
}

impl SqlOrganisationUnitRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn org_unit_by_uid(
        &self,
        uid: &str,
    ) -> Result<Option<OrganisationUnit>, RepositoryError> {
        let row = sqlx::query(
            "SELECT organisationunitid, uid, name, path, hierarchylevel
             FROM organisationunit WHERE uid = ?1",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_org_unit).transpose()
    }

    /// Org units for `uids`, ordered by path. Unknown uids are skipped.
    pub async fn org_units_by_uids(
        &self,
        uids: &[String],
    ) -> Result<Vec<OrganisationUnit>, RepositoryError> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }

        let mut bindings = NamedBindings::new();
        let sql = format!(
            "SELECT organisationunitid, uid, name, path, hierarchylevel
             FROM organisationunit WHERE uid IN ({}) ORDER BY path",
            bindings.bind_list("uids", uids.iter().map(String::as_str))
        );

        let rows =
            apply_bindings(sqlx::query(&sql), bindings.into_values()).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_org_unit).collect()
    }
}

pub(crate) fn row_to_org_unit(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<OrganisationUnit, RepositoryError> {
    let hierarchy_level: i64 = row.try_get("hierarchylevel").map_err(decode_error)?;

    Ok(OrganisationUnit {
        id: row.try_get("organisationunitid").map_err(decode_error)?,
        uid: row.try_get("uid").map_err(decode_error)?,
        name: row.try_get("name").map_err(decode_error)?,
        path: row.try_get("path").map_err(decode_error)?,
        hierarchy_level: u32::try_from(hierarchy_level).map_err(decode_error)?,
    })
}

use sqlx::Row;

use signoff_core::domain::org_unit::OrganisationUnit;
use signoff_core::domain::user::User;

use super::org_unit::row_to_org_unit;
use super::{decode_error, RepositoryError};
use crate::DbPool;

#[derive(Clone)]
pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Loads a user with org-unit assignments, approval levels and dimension constraints.
    pub async fn user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT userinfoid, username, superuser FROM userinfo WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: i64 = row.try_get("userinfoid").map_err(decode_error)?;
        let super_user: i64 = row.try_get("superuser").map_err(decode_error)?;

        let approval_level_ids = sqlx::query_scalar(
            "SELECT dataapprovallevelid FROM userapprovallevels
             WHERE userinfoid = ?1 ORDER BY dataapprovallevelid",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(User {
            id,
            username: row.try_get("username").map_err(decode_error)?,
            super_user: super_user != 0,
            data_view_org_units: self.assigned_org_units("userdatavieworgunits", id).await?,
            data_capture_org_units: self.assigned_org_units("usermembership", id).await?,
            approval_level_ids,
            category_constraints: self.constraints(id, "category").await?,
            option_group_set_constraints: self.constraints(id, "optiongroupset").await?,
        }))
    }

    async fn assigned_org_units(
        &self,
        table: &'static str,
        user_id: i64,
    ) -> Result<Vec<OrganisationUnit>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT o.organisationunitid, o.uid, o.name, o.path, o.hierarchylevel
             FROM organisationunit o
             JOIN {table} a ON a.organisationunitid = o.organisationunitid
             WHERE a.userinfoid = ?1
             ORDER BY o.path"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_org_unit).collect()
    }

    async fn constraints(&self, user_id: i64, kind: &str) -> Result<Vec<String>, RepositoryError> {
        Ok(sqlx::query_scalar(
            "SELECT uid FROM userdimensionconstraints
             WHERE userinfoid = ?1 AND kind = ?2 ORDER BY uid",
        )
        .bind(user_id)
        .bind(kind)
        .fetch_all(&self.pool)
        .await?)
    }
}

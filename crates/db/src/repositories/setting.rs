use async_trait::async_trait;

use signoff_core::approvals::SystemSettings;
use signoff_core::errors::ApplicationError;

use super::RepositoryError;
use crate::DbPool;

pub const ACCEPTANCE_REQUIRED_FOR_APPROVAL: &str = "keyAcceptanceRequiredForApproval";

/// System settings stored in `systemsetting`, falling back to configured
/// defaults for keys that were never set.
#[derive(Clone)]
pub struct SqlSystemSettings {
    pool: DbPool,
    acceptance_required_default: bool,
}

impl SqlSystemSettings {
    pub fn new(pool: DbPool, acceptance_required_default: bool) -> Self {
        Self { pool, acceptance_required_default }
    }

    pub async fn get(&self, name: &str) -> Result<Option<String>, RepositoryError> {
        Ok(sqlx::query_scalar("SELECT value FROM systemsetting WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?)
    }

    pub async fn set(&self, name: &str, value: &str) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO systemsetting (name, value) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        )
        .bind(name)
        .bind(value)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_acceptance_required_for_approval(
        &self,
        required: bool,
    ) -> Result<(), RepositoryError> {
        self.set(ACCEPTANCE_REQUIRED_FOR_APPROVAL, if required { "true" } else { "false" }).await
    }
}

#[async_trait]
impl SystemSettings for SqlSystemSettings {
    async fn acceptance_required_for_approval(&self) -> Result<bool, ApplicationError> {
        let stored = self.get(ACCEPTANCE_REQUIRED_FOR_APPROVAL).await?;
        Ok(match stored.as_deref().map(str::trim) {
            Some(value) => value.eq_ignore_ascii_case("true"),
            None => self.acceptance_required_default,
        })
    }
}

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::Row;

use signoff_core::approvals::PeriodLookup;
use signoff_core::domain::period::{medium_date_string, Period, PeriodType};
use signoff_core::errors::ApplicationError;

use super::{decode_error, RepositoryError};
use crate::DbPool;

#[derive(Clone)]
pub struct SqlPeriodRepository {
    pool: DbPool,
}

impl SqlPeriodRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Stored form of `period`, without inserting it.
    pub async fn find_period(&self, period: &Period) -> Result<Option<Period>, RepositoryError> {
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT p.periodid
             FROM period p
             JOIN periodtype pt ON pt.periodtypeid = p.periodtypeid
             WHERE pt.name = ?1 AND p.startdate = ?2 AND p.enddate = ?3",
        )
        .bind(period.period_type.as_str())
        .bind(medium_date_string(period.start_date))
        .bind(medium_date_string(period.end_date))
        .fetch_optional(&self.pool)
        .await?;

        Ok(id.map(|id| period.clone().with_id(id)))
    }

    pub async fn save_period(&self, period: &Period) -> Result<Period, RepositoryError> {
        sqlx::query(
            "INSERT OR IGNORE INTO period (periodtypeid, startdate, enddate)
             SELECT periodtypeid, ?2, ?3 FROM periodtype WHERE name = ?1",
        )
        .bind(period.period_type.as_str())
        .bind(medium_date_string(period.start_date))
        .bind(medium_date_string(period.end_date))
        .execute(&self.pool)
        .await?;

        self.find_period(period).await?.ok_or_else(|| {
            RepositoryError::Decode(format!(
                "period type `{}` is not registered",
                period.period_type.as_str()
            ))
        })
    }

    pub async fn period_by_id(&self, id: i64) -> Result<Option<Period>, RepositoryError> {
        let row = sqlx::query(
            "SELECT p.periodid, pt.name AS periodtype, p.startdate, p.enddate
             FROM period p
             JOIN periodtype pt ON pt.periodtypeid = p.periodtypeid
             WHERE p.periodid = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(|row| row_to_period(row, "periodid")).transpose()
    }
}

/// Decodes `periodtype`, `startdate` and `enddate` columns plus the id column `id_column`.
pub(crate) fn row_to_period(
    row: &sqlx::sqlite::SqliteRow,
    id_column: &str,
) -> Result<Period, RepositoryError> {
    let id: i64 = row.try_get(id_column).map_err(decode_error)?;
    let period_type: String = row.try_get("periodtype").map_err(decode_error)?;
    let start_date: String = row.try_get("startdate").map_err(decode_error)?;
    let end_date: String = row.try_get("enddate").map_err(decode_error)?;

    let period_type = period_type.parse::<PeriodType>().map_err(decode_error)?;
    Ok(Period::new(period_type, parse_date(&start_date)?, parse_date(&end_date)?).with_id(id))
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(decode_error)
}

#[async_trait]
impl PeriodLookup for SqlPeriodRepository {
    async fn reload_period(&self, period: &Period) -> Result<Period, ApplicationError> {
        match self.find_period(period).await? {
            Some(stored) => Ok(stored),
            None => Ok(self.save_period(period).await?),
        }
    }

    async fn workflow_period_id(
        &self,
        period_type: PeriodType,
        end_date: NaiveDate,
    ) -> Result<Option<i64>, ApplicationError> {
        let end_date = medium_date_string(end_date);
        let id: Option<i64> = sqlx::query_scalar(
            "SELECT p.periodid
             FROM period p
             JOIN periodtype pt ON pt.periodtypeid = p.periodtypeid
             WHERE pt.name = ?1 AND p.startdate <= ?2 AND p.enddate >= ?2
             ORDER BY p.startdate
             LIMIT 1",
        )
        .bind(period_type.as_str())
        .bind(end_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(RepositoryError::from)?;

        Ok(id)
    }
}

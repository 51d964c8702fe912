//! Demo data for local runs and integration tests.
//!
//! The hierarchy is small enough to reason about by hand:
//!
//! ```text
//! National (level 1)
//! └── North District (level 2)
//!     ├── Riverside Clinic (level 3, reports)
//!     └── Hilltop Clinic   (level 3, reports)
//! ```
//!
//! Workflow `WfMonthly01` approves monthly at all three levels. The `Funding`
//! attribute combo has two option combos; `Donor B` is only shared with the
//! `UgDonorB001` user group, which starts out empty.

use sqlx::Executor;

use crate::repositories::RepositoryError;
use crate::DbPool;

pub const WORKFLOW_UID: &str = "WfMonthly01";
pub const PERIOD_ISO: &str = "202403";
pub const NATIONAL_UID: &str = "OuNational1";
pub const DISTRICT_UID: &str = "OuDistrict1";
pub const FACILITY_UIDS: [&str; 2] = ["OuFacility1", "OuFacility2"];
pub const FUNDING_COMBO_UID: &str = "CcFunding01";
pub const DEFAULT_OPTION_COMBO_UID: &str = "CocDefault1";
pub const DONOR_A_UID: &str = "CocDonorA01";
pub const DONOR_B_UID: &str = "CocDonorB01";
pub const DONOR_B_GROUP_ID: i64 = 1;
pub const EVENT_UID: &str = "EvVisit0001";
pub const USERNAMES: [&str; 3] = ["admin", "district", "clerk"];

const SEED_TABLE_COUNTS: &[(&str, i64)] = &[
    ("organisationunit", 4),
    ("userinfo", 3),
    ("dataapprovallevel", 3),
    ("dataapprovalworkflow", 1),
    ("categoryoptioncombo", 3),
    ("datasetsource", 2),
    ("dataelement", 3),
    ("programstageinstance", 1),
];

pub struct DemoHierarchy;

impl DemoHierarchy {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_hierarchy.sql");

    /// Loads the demo data. Rows that already exist are left untouched.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;

        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            workflow_uid: WORKFLOW_UID,
            period_iso: PERIOD_ISO,
            org_unit_uids: [NATIONAL_UID, DISTRICT_UID, FACILITY_UIDS[0], FACILITY_UIDS[1]]
                .to_vec(),
            usernames: USERNAMES.to_vec(),
        })
    }

    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::with_capacity(SEED_TABLE_COUNTS.len());

        for (table, expected) in SEED_TABLE_COUNTS {
            let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(1) FROM {table}"))
                .fetch_one(pool)
                .await?;
            checks.push((*table, count >= *expected));
        }

        let workflow_levels: i64 = sqlx::query_scalar(
            "SELECT COUNT(1) FROM dataapprovalworkflowlevels wl
             JOIN dataapprovalworkflow w ON w.workflowid = wl.workflowid
             WHERE w.uid = ?1",
        )
        .bind(WORKFLOW_UID)
        .fetch_one(pool)
        .await?;
        checks.push(("workflow-levels", workflow_levels == 3));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes approvals and demo rows, leaving the schema in place.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        for table in [
            "dataapproval",
            "datasetsource",
            "dataset",
            "userapprovallevels",
            "dataapprovalworkflowlevels",
            "dataapprovalworkflow",
            "dataapprovallevel",
            "categoryoptioncombos_categoryoptions",
            "categorycombos_optioncombos",
            "categoryoptioncombo",
            "dataelementcategoryoptionusergroupaccesses",
            "categoryoption_organisationunits",
            "dataelementcategoryoption",
            "categorycombo",
            "usergroupaccess",
            "usergroupmembers",
            "usergroup",
            "userdimensionconstraints",
            "usermembership",
            "userdatavieworgunits",
            "userinfo",
            "organisationunit",
            "period",
            "fileresource",
            "programstageinstance",
            "dataelement",
        ] {
            sqlx::query(&format!("DELETE FROM {table}")).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub workflow_uid: &'static str,
    pub period_iso: &'static str,
    pub org_unit_uids: Vec<&'static str>,
    pub usernames: Vec<&'static str>,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::approvals::classify::{classify, visible_approved_above, StateSignals};
use crate::approvals::eligibility::check_eligibility;
use crate::approvals::levels::{resolve_levels, LevelBoundaries, ResolvedLevels};
use crate::domain::approval::{ApprovalLevel, ApprovalStatus, Workflow};
use crate::domain::category::{is_default_selection, CategoryCombo, CategoryOptionCombo};
use crate::domain::org_unit::OrganisationUnit;
use crate::domain::period::{Period, PeriodType};
use crate::domain::user::User;
use crate::errors::ApplicationError;

/// Scope of a status request.
#[derive(Clone, Copy, Debug)]
pub struct StatusQuery<'a> {
    pub workflow: &'a Workflow,
    pub period: &'a Period,
    /// `None` means every org unit at the lowest approval level's org-unit level.
    pub org_units: Option<&'a [OrganisationUnit]>,
    pub org_unit_level: u32,
    pub attribute_combo: Option<&'a CategoryCombo>,
    pub attribute_option_combos: Option<&'a [CategoryOptionCombo]>,
}

/// Everything the cell-signal query needs, already resolved to ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellSignalRequest {
    pub workflow_id: i64,
    /// Period holding approvals for `end_date`; `None` means nothing is approved.
    pub workflow_period_id: Option<i64>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub org_unit_ids: Option<Vec<i64>>,
    pub org_unit_level: u32,
    pub attribute_combo_id: Option<i64>,
    /// Empty means no option-combo filter.
    pub attribute_option_combo_ids: Vec<i64>,
    pub default_combo: bool,
    pub user_id: i64,
    pub super_user: bool,
    /// Data-view subtree roots limiting the cells; empty means unrestricted.
    pub user_org_unit_uids: Vec<String>,
    /// Levels whose approvals the user may see; `None` means all of them.
    pub user_level_ids: Option<Vec<i64>>,
    pub approved_above_level: Option<ApprovalLevel>,
    pub level_below: Option<ApprovalLevel>,
    pub acceptance_required: bool,
}

/// Highest visible approval recorded for a cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HighestApproved {
    pub level: u32,
    pub accepted: bool,
    pub org_unit_id: i64,
}

/// One row of the cell-signal query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CellSignals {
    pub attribute_option_combo_uid: String,
    pub org_unit_uid: Option<String>,
    pub org_unit_name: Option<String>,
    pub highest_approved: Option<HighestApproved>,
    pub ready_below: bool,
    pub approved_above: bool,
}

#[async_trait]
pub trait CellSignalSource: Send + Sync {
    async fn fetch_cell_signals(
        &self,
        request: &CellSignalRequest,
    ) -> Result<Vec<CellSignals>, ApplicationError>;
}

#[async_trait]
pub trait PeriodLookup: Send + Sync {
    /// Stored form of `period`, inserting it when missing.
    async fn reload_period(&self, period: &Period) -> Result<Period, ApplicationError>;

    async fn workflow_period_id(
        &self,
        period_type: PeriodType,
        end_date: NaiveDate,
    ) -> Result<Option<i64>, ApplicationError>;
}

#[async_trait]
pub trait SystemSettings: Send + Sync {
    async fn acceptance_required_for_approval(&self) -> Result<bool, ApplicationError>;
}

pub trait CurrentUserProvider: Send + Sync {
    fn current_user(&self) -> User;
}

/// Provider returning a fixed user.
#[derive(Clone, Debug, Default)]
pub struct StaticUserProvider {
    user: User,
}

impl StaticUserProvider {
    pub fn new(user: User) -> Self {
        Self { user }
    }
}

impl CurrentUserProvider for StaticUserProvider {
    fn current_user(&self) -> User {
        self.user.clone()
    }
}

pub struct ApprovalStatusResolver<C, P, S> {
    cells: C,
    periods: P,
    settings: S,
}

impl<C, P, S> ApprovalStatusResolver<C, P, S>
where
    C: CellSignalSource,
    P: PeriodLookup,
    S: SystemSettings,
{
    pub fn new(cells: C, periods: P, settings: S) -> Self {
        Self { cells, periods, settings }
    }

    pub fn periods(&self) -> &P {
        &self.periods
    }

    /// Approval status of every visible (org unit, attribute option combo) cell.
    ///
    /// Requests the user may not see yield an empty list rather than an error.
    pub async fn resolve(
        &self,
        user: &User,
        query: StatusQuery<'_>,
    ) -> Result<Vec<ApprovalStatus>, ApplicationError> {
        let workflow = query.workflow;
        let levels = resolve_levels(workflow, user);

        if let Err(reason) = check_eligibility(
            workflow,
            user,
            &levels,
            query.org_units,
            query.attribute_option_combos,
        ) {
            if reason.is_routine() {
                debug!(event_name = "approval.status.ineligible", reason = %reason, "no approval statuses");
            } else {
                warn!(event_name = "approval.status.ineligible", reason = %reason, "no approval statuses");
            }
            return Ok(Vec::new());
        }

        let Some(bounds) =
            LevelBoundaries::locate(&levels, query.org_unit_level, query.org_units.is_some())
        else {
            return Ok(Vec::new());
        };

        debug!(
            event_name = "approval.status.levels",
            workflow = %workflow.name,
            levels = levels.approval_levels.len(),
            user_levels = levels.user_approval_levels.len(),
            lowest_for_org_unit = ?bounds.lowest_for_org_unit.as_ref().map(|level| level.level),
            above_org_unit = ?bounds.above_org_unit.as_ref().map(|level| level.level),
            below_org_unit = ?bounds.below_org_unit.as_ref().map(|level| level.level),
            above_user = ?bounds.above_user.as_ref().map(|level| level.level),
            approved_above = ?bounds.approved_above.as_ref().map(|level| level.level),
            "approval level boundaries located"
        );

        let acceptance_required = match bounds.below_org_unit {
            Some(_) => self.settings.acceptance_required_for_approval().await?,
            None => false,
        };

        let workflow_period_id =
            self.periods.workflow_period_id(workflow.period_type, query.period.end_date).await?;

        let request =
            build_request(user, &query, &levels, &bounds, workflow_period_id, acceptance_required);

        debug!(
            event_name = "approval.status.query",
            user = %user.username,
            super_user = user.super_user,
            workflow = %workflow.name,
            period = %query.period.iso_date(),
            org_units = ?request.org_unit_ids,
            attribute_combo = ?query.attribute_combo.map(|combo| combo.name.as_str()),
            "fetching approval cell signals"
        );

        let rows = self.cells.fetch_cell_signals(&request).await?;
        let boundary_hides_accepted = bounds.approved_above_is_user_boundary();

        Ok(rows
            .into_iter()
            .filter_map(|row| status_for_row(row, &levels, &bounds, boundary_hides_accepted))
            .collect())
    }
}

fn build_request(
    user: &User,
    query: &StatusQuery<'_>,
    levels: &ResolvedLevels,
    bounds: &LevelBoundaries,
    workflow_period_id: Option<i64>,
    acceptance_required: bool,
) -> CellSignalRequest {
    let user_org_unit_uids = if user.super_user {
        Vec::new()
    } else {
        user.data_view_org_units_with_fallback().iter().map(|unit| unit.uid.clone()).collect()
    };

    let user_level_ids = (!user.super_user && levels.user_levels_restricted())
        .then(|| levels.user_approval_levels.iter().map(|level| level.id).collect());

    CellSignalRequest {
        workflow_id: query.workflow.id,
        workflow_period_id,
        start_date: query.period.start_date,
        end_date: query.period.end_date,
        org_unit_ids: query.org_units.map(|units| units.iter().map(|unit| unit.id).collect()),
        org_unit_level: bounds.org_unit_level,
        attribute_combo_id: query.attribute_combo.map(|combo| combo.id),
        attribute_option_combo_ids: query
            .attribute_option_combos
            .unwrap_or_default()
            .iter()
            .map(|combo| combo.id)
            .collect(),
        default_combo: is_default_selection(query.attribute_option_combos),
        user_id: user.id,
        super_user: user.super_user,
        user_org_unit_uids,
        user_level_ids,
        approved_above_level: bounds.approved_above.clone(),
        level_below: bounds.below_org_unit.clone(),
        acceptance_required,
    }
}

fn status_for_row(
    row: CellSignals,
    levels: &ResolvedLevels,
    bounds: &LevelBoundaries,
    boundary_hides_accepted: bool,
) -> Option<ApprovalStatus> {
    let org_unit_uid = row.org_unit_uid?;

    let approved_level =
        row.highest_approved.and_then(|highest| levels.by_ordinal(highest.level)).cloned();
    let accepted = row.highest_approved.is_some_and(|highest| highest.accepted);
    let approved_org_unit_id = row.highest_approved.map_or(0, |highest| highest.org_unit_id);

    let signals = StateSignals {
        approved_here: approved_level.is_some(),
        accepted,
        approved_above: visible_approved_above(
            row.approved_above,
            accepted,
            boundary_hides_accepted,
        ),
        ready_below: row.ready_below,
        level_for_org_unit: bounds.lowest_for_org_unit.is_some(),
        level_above_org_unit: bounds.above_org_unit.is_some(),
    };

    let action_level = approved_level.clone().or_else(|| bounds.lowest_for_org_unit.clone());

    Some(ApprovalStatus {
        state: classify(&signals),
        approved_level,
        approved_org_unit_id,
        action_level,
        org_unit_uid,
        org_unit_name: row.org_unit_name,
        attribute_option_combo_uid: row.attribute_option_combo_uid,
        accepted,
        message: None,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::NaiveDate;

    use super::{
        ApprovalStatusResolver, CellSignalRequest, CellSignalSource, CellSignals,
        HighestApproved, PeriodLookup, StatusQuery, SystemSettings,
    };
    use crate::domain::approval::{ApprovalLevel, ApprovalState, Workflow};
    use crate::domain::category::CategoryOptionCombo;
    use crate::domain::org_unit::OrganisationUnit;
    use crate::domain::period::{Period, PeriodType};
    use crate::domain::user::User;
    use crate::errors::ApplicationError;

    #[derive(Default)]
    struct RecordingCells {
        rows: Vec<CellSignals>,
        requests: Mutex<Vec<CellSignalRequest>>,
    }

    #[async_trait]
    impl CellSignalSource for RecordingCells {
        async fn fetch_cell_signals(
            &self,
            request: &CellSignalRequest,
        ) -> Result<Vec<CellSignals>, ApplicationError> {
            self.requests.lock().expect("lock").push(request.clone());
            Ok(self.rows.clone())
        }
    }

    struct FixedPeriods(Option<i64>);

    #[async_trait]
    impl PeriodLookup for FixedPeriods {
        async fn reload_period(&self, period: &Period) -> Result<Period, ApplicationError> {
            Ok(period.clone().with_id(1))
        }

        async fn workflow_period_id(
            &self,
            _period_type: PeriodType,
            _end_date: NaiveDate,
        ) -> Result<Option<i64>, ApplicationError> {
            Ok(self.0)
        }
    }

    #[derive(Default)]
    struct CountingSettings {
        reads: AtomicUsize,
    }

    #[async_trait]
    impl SystemSettings for CountingSettings {
        async fn acceptance_required_for_approval(&self) -> Result<bool, ApplicationError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    struct Fixture {
        workflow: Workflow,
        period: Period,
        national: OrganisationUnit,
        district: OrganisationUnit,
        facility: OrganisationUnit,
    }

    fn level(level: u32) -> ApprovalLevel {
        ApprovalLevel {
            id: i64::from(level) * 10,
            uid: format!("Lvl{level:08}"),
            name: format!("Level {level}"),
            level,
            org_unit_level: level,
        }
    }

    fn fixture() -> Fixture {
        let national = OrganisationUnit::new(1, "OuNational1", "National", None);
        let district = OrganisationUnit::new(2, "OuDistrict1", "District", Some(&national));
        let facility = OrganisationUnit::new(3, "OuFacility1", "Facility", Some(&district));
        Fixture {
            workflow: Workflow {
                id: 1,
                uid: "WfMonthly01".to_string(),
                name: "Monthly".to_string(),
                period_type: PeriodType::Monthly,
                levels: vec![level(1), level(2), level(3)],
            },
            period: Period::from_iso("202403").expect("period"),
            national,
            district,
            facility,
        }
    }

    fn district_user(f: &Fixture) -> User {
        User {
            id: 9,
            username: "district".to_string(),
            data_view_org_units: vec![f.district.clone()],
            approval_level_ids: vec![20],
            option_group_set_constraints: vec!["CogsFund001".to_string()],
            ..User::default()
        }
    }

    fn row(uid: Option<&str>, highest: Option<HighestApproved>) -> CellSignals {
        CellSignals {
            attribute_option_combo_uid: "CocFund0001".to_string(),
            org_unit_uid: uid.map(str::to_string),
            org_unit_name: uid.map(|_| "District".to_string()),
            highest_approved: highest,
            ready_below: true,
            approved_above: false,
        }
    }

    fn resolver(
        rows: Vec<CellSignals>,
    ) -> ApprovalStatusResolver<RecordingCells, FixedPeriods, CountingSettings> {
        ApprovalStatusResolver::new(
            RecordingCells { rows, ..RecordingCells::default() },
            FixedPeriods(Some(42)),
            CountingSettings::default(),
        )
    }

    fn query<'a>(f: &'a Fixture, org_units: &'a [OrganisationUnit], level: u32) -> StatusQuery<'a> {
        StatusQuery {
            workflow: &f.workflow,
            period: &f.period,
            org_units: Some(org_units),
            org_unit_level: level,
            attribute_combo: None,
            attribute_option_combos: None,
        }
    }

    #[tokio::test]
    async fn ineligible_request_returns_empty_without_querying() {
        let f = fixture();
        let user = district_user(&f);
        let resolver = resolver(vec![row(Some("OuNational1"), None)]);
        let org_units = [f.national.clone()];

        let statuses = resolver.resolve(&user, query(&f, &org_units, 1)).await.expect("resolve");

        assert!(statuses.is_empty());
        assert!(resolver.cells.requests.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn default_combo_hidden_from_unconstrained_user() {
        let f = fixture();
        let mut user = district_user(&f);
        user.option_group_set_constraints.clear();
        let resolver = resolver(vec![row(Some("OuDistrict1"), None)]);
        let org_units = [f.district.clone()];
        let default = [CategoryOptionCombo {
            id: 1,
            uid: "CocDefault1".to_string(),
            name: "default".to_string(),
        }];
        let mut scoped = query(&f, &org_units, 2);
        scoped.attribute_option_combos = Some(&default);

        let statuses = resolver.resolve(&user, scoped).await.expect("resolve");
        assert!(statuses.is_empty());
    }

    #[tokio::test]
    async fn request_carries_user_restrictions_and_boundaries() {
        let f = fixture();
        let user = district_user(&f);
        let resolver = resolver(vec![row(Some("OuDistrict1"), None)]);
        let org_units = [f.district.clone()];

        let statuses = resolver.resolve(&user, query(&f, &org_units, 2)).await.expect("resolve");

        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0].state, ApprovalState::UnapprovedReady);
        assert_eq!(statuses[0].action_level.as_ref().map(|l| l.level), Some(2));

        let requests = resolver.cells.requests.lock().expect("lock");
        let request = &requests[0];
        assert_eq!(request.workflow_period_id, Some(42));
        assert_eq!(request.org_unit_ids, Some(vec![2]));
        assert_eq!(request.user_org_unit_uids, vec!["OuDistrict1".to_string()]);
        assert_eq!(request.user_level_ids, Some(vec![20]));
        assert_eq!(request.approved_above_level.as_ref().map(|l| l.level), Some(1));
        assert_eq!(request.level_below.as_ref().map(|l| l.level), Some(3));
        assert!(request.acceptance_required);
        assert_eq!(resolver.settings.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn settings_are_not_read_without_a_level_below() {
        let f = fixture();
        let user = district_user(&f);
        let resolver = resolver(vec![row(Some("OuFacility1"), None)]);
        let org_units = [f.facility.clone()];

        resolver.resolve(&user, query(&f, &org_units, 3)).await.expect("resolve");

        assert_eq!(resolver.settings.reads.load(Ordering::SeqCst), 0);
        let requests = resolver.cells.requests.lock().expect("lock");
        assert_eq!(requests[0].level_below, None);
        assert!(!requests[0].acceptance_required);
    }

    #[tokio::test]
    async fn super_user_request_is_unrestricted() {
        let f = fixture();
        let user = User {
            id: 1,
            username: "admin".to_string(),
            super_user: true,
            data_view_org_units: vec![f.national.clone()],
            category_constraints: vec!["CatFund0001".to_string()],
            ..User::default()
        };
        let resolver = resolver(Vec::new());
        let org_units = [f.district.clone()];

        resolver.resolve(&user, query(&f, &org_units, 2)).await.expect("resolve");

        let requests = resolver.cells.requests.lock().expect("lock");
        assert!(requests[0].user_org_unit_uids.is_empty());
        assert_eq!(requests[0].user_level_ids, None);
        assert_eq!(requests[0].approved_above_level, None);
    }

    #[tokio::test]
    async fn accepted_approval_directly_above_user_is_hidden() {
        let f = fixture();
        let user = district_user(&f);
        let mut hidden = row(
            Some("OuDistrict1"),
            Some(HighestApproved { level: 2, accepted: true, org_unit_id: 2 }),
        );
        hidden.approved_above = true;
        let mut shown = hidden.clone();
        shown.highest_approved =
            Some(HighestApproved { level: 2, accepted: false, org_unit_id: 2 });
        let resolver = resolver(vec![hidden, shown]);
        let org_units = [f.district.clone()];

        let statuses = resolver.resolve(&user, query(&f, &org_units, 2)).await.expect("resolve");

        assert_eq!(statuses[0].state, ApprovalState::AcceptedHere);
        assert_eq!(statuses[0].approved_org_unit_id, 2);
        assert_eq!(statuses[1].state, ApprovalState::ApprovedAbove);
    }

    #[tokio::test]
    async fn rows_without_org_unit_are_skipped_and_results_are_stable() {
        let f = fixture();
        let user = district_user(&f);
        let resolver = resolver(vec![
            row(None, None),
            row(
                Some("OuDistrict1"),
                Some(HighestApproved { level: 2, accepted: false, org_unit_id: 2 }),
            ),
        ]);
        let org_units = [f.district.clone()];

        let first = resolver.resolve(&user, query(&f, &org_units, 2)).await.expect("resolve");
        let second = resolver.resolve(&user, query(&f, &org_units, 2)).await.expect("resolve");

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].state, ApprovalState::ApprovedHere);
        assert_eq!(first[0].approved_level.as_ref().map(|l| l.level), Some(2));
        assert_eq!(first, second);
    }
}

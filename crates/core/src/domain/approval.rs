use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::period::{Period, PeriodType};

/// One tier in a workflow's sign-off chain. `level` 1 is the highest authority.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApprovalLevel {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub level: u32,
    pub org_unit_level: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub period_type: PeriodType,
    pub levels: Vec<ApprovalLevel>,
}

impl Workflow {
    /// Levels ordered from highest authority (level 1) downwards.
    pub fn sorted_levels(&self) -> Vec<ApprovalLevel> {
        let mut levels = self.levels.clone();
        levels.sort_by_key(|level| level.level);
        levels
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataApproval {
    pub id: Option<i64>,
    pub level_id: i64,
    pub workflow_id: i64,
    pub period: Period,
    pub org_unit_id: i64,
    pub attribute_option_combo_id: i64,
    pub accepted: bool,
    pub created: DateTime<Utc>,
    pub creator: Option<String>,
}

impl DataApproval {
    pub fn key(&self) -> DataApprovalKey {
        DataApprovalKey {
            level_id: self.level_id,
            workflow_id: self.workflow_id,
            period_type: self.period.period_type,
            start_date: self.period.start_date,
            end_date: self.period.end_date,
            org_unit_id: self.org_unit_id,
            attribute_option_combo_id: self.attribute_option_combo_id,
        }
    }
}

/// Identity of an approval record: at most one record exists per key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataApprovalKey {
    pub level_id: i64,
    pub workflow_id: i64,
    pub period_type: PeriodType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub org_unit_id: i64,
    pub attribute_option_combo_id: i64,
}

impl DataApprovalKey {
    pub fn period(&self) -> Period {
        Period::new(self.period_type, self.start_date, self.end_date)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalState {
    /// Approved at a level above this cell's level.
    ApprovedAbove,
    /// No approval level applies to this org unit or any level above it.
    Unapprovable,
    /// No level applies here, but a level exists above.
    UnapprovedAbove,
    UnapprovedReady,
    UnapprovedWaiting,
    AcceptedHere,
    ApprovedHere,
}

impl ApprovalState {
    pub const ALL: [ApprovalState; 7] = [
        Self::ApprovedAbove,
        Self::Unapprovable,
        Self::UnapprovedAbove,
        Self::UnapprovedReady,
        Self::UnapprovedWaiting,
        Self::AcceptedHere,
        Self::ApprovedHere,
    ];

    pub fn is_approved(self) -> bool {
        matches!(self, Self::ApprovedAbove | Self::ApprovedHere | Self::AcceptedHere)
    }

    pub fn is_approvable(self) -> bool {
        matches!(self, Self::UnapprovedReady | Self::UnapprovedWaiting)
    }

    pub fn is_unapprovable(self) -> bool {
        matches!(self, Self::Unapprovable | Self::UnapprovedAbove)
    }

    pub fn is_accepted(self) -> bool {
        matches!(self, Self::AcceptedHere)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::ApprovedAbove => "APPROVED_ABOVE",
            Self::Unapprovable => "UNAPPROVABLE",
            Self::UnapprovedAbove => "UNAPPROVED_ABOVE",
            Self::UnapprovedReady => "UNAPPROVED_READY",
            Self::UnapprovedWaiting => "UNAPPROVED_WAITING",
            Self::AcceptedHere => "ACCEPTED_HERE",
            Self::ApprovedHere => "APPROVED_HERE",
        }
    }
}

/// Read-time projection of one (org unit, attribute option combo) cell.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalStatus {
    pub state: ApprovalState,
    pub approved_level: Option<ApprovalLevel>,
    /// Org unit holding the highest approval, 0 when nothing is approved.
    pub approved_org_unit_id: i64,
    pub action_level: Option<ApprovalLevel>,
    pub org_unit_uid: String,
    pub org_unit_name: Option<String>,
    pub attribute_option_combo_uid: String,
    pub accepted: bool,
    pub message: Option<String>,
}

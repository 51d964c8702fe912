use thiserror::Error;

use crate::approvals::levels::ResolvedLevels;
use crate::domain::approval::Workflow;
use crate::domain::category::{is_default_selection, CategoryOptionCombo};
use crate::domain::org_unit::OrganisationUnit;
use crate::domain::user::User;

/// Why a status request yields no cells.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Ineligibility {
    #[error("default category combo selected but user `{username}` lacks permission to see it")]
    DefaultComboHidden { username: String },
    #[error("no approval levels configured for workflow `{workflow}`")]
    NoApprovalLevels { workflow: String },
    #[error("no user approval levels for user `{username}`, workflow `{workflow}`")]
    NoUserApprovalLevels { username: String, workflow: String },
    #[error("user `{username}` can't see org unit `{org_unit}`")]
    OrgUnitNotVisible { username: String, org_unit: String },
}

impl Ineligibility {
    /// Configuration and permission gaps are worth a warning; visibility misses are routine.
    pub fn is_routine(&self) -> bool {
        matches!(self, Self::OrgUnitNotVisible { .. })
    }
}

/// Default-combo visibility is withheld from users with no category and no
/// category-option-group-set constraints.
pub fn may_see_default_combo(user: &User) -> bool {
    user.has_dimension_constraints()
}

pub fn check_eligibility(
    workflow: &Workflow,
    user: &User,
    levels: &ResolvedLevels,
    org_units: Option<&[OrganisationUnit]>,
    attribute_option_combos: Option<&[CategoryOptionCombo]>,
) -> Result<(), Ineligibility> {
    if is_default_selection(attribute_option_combos) && !may_see_default_combo(user) {
        return Err(Ineligibility::DefaultComboHidden { username: user.username.clone() });
    }

    if levels.approval_levels.is_empty() {
        return Err(Ineligibility::NoApprovalLevels { workflow: workflow.name.clone() });
    }

    if levels.user_approval_levels.is_empty() {
        return Err(Ineligibility::NoUserApprovalLevels {
            username: user.username.clone(),
            workflow: workflow.name.clone(),
        });
    }

    let visible = user.data_view_org_units_with_fallback();
    if let Some(hidden) = org_units
        .unwrap_or_default()
        .iter()
        .find(|org_unit| !org_unit.is_descendant_of_any(visible))
    {
        return Err(Ineligibility::OrgUnitNotVisible {
            username: user.username.clone(),
            org_unit: hidden.name.clone(),
        });
    }

    Ok(())
}

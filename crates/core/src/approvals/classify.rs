use crate::domain::approval::ApprovalState;

/// Per-cell inputs to [`classify`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StateSignals {
    /// An approval record exists at this cell, at a level the user may see.
    pub approved_here: bool,
    pub accepted: bool,
    pub approved_above: bool,
    pub ready_below: bool,
    /// An approval level exists for the cell's org-unit level.
    pub level_for_org_unit: bool,
    /// An approval level exists above the cell's org-unit level.
    pub level_above_org_unit: bool,
}

pub fn classify(signals: &StateSignals) -> ApprovalState {
    if signals.approved_above {
        return ApprovalState::ApprovedAbove;
    }

    if !signals.approved_here {
        return match (signals.level_for_org_unit, signals.level_above_org_unit) {
            (false, false) => ApprovalState::Unapprovable,
            (false, true) => ApprovalState::UnapprovedAbove,
            (true, _) if signals.ready_below => ApprovalState::UnapprovedReady,
            (true, _) => ApprovalState::UnapprovedWaiting,
        };
    }

    if signals.accepted {
        ApprovalState::AcceptedHere
    } else {
        ApprovalState::ApprovedHere
    }
}

/// Hides an accepted approval made directly above the user's own level.
pub fn visible_approved_above(
    approved_above: bool,
    accepted: bool,
    above_is_user_boundary: bool,
) -> bool {
    approved_above && !(accepted && above_is_user_boundary)
}

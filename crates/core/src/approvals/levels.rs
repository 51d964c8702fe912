use crate::domain::approval::{ApprovalLevel, Workflow};
use crate::domain::user::User;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedLevels {
    /// Every level of the workflow, highest authority first.
    pub approval_levels: Vec<ApprovalLevel>,
    /// Levels the user may act at, highest authority first.
    pub user_approval_levels: Vec<ApprovalLevel>,
}

impl ResolvedLevels {
    pub fn highest(&self) -> Option<&ApprovalLevel> {
        self.approval_levels.first()
    }

    pub fn highest_user_level(&self) -> Option<&ApprovalLevel> {
        self.user_approval_levels.first()
    }

    /// True when the user may act at only part of the chain.
    pub fn user_levels_restricted(&self) -> bool {
        self.user_approval_levels.len() != self.approval_levels.len()
    }

    pub fn by_ordinal(&self, level: u32) -> Option<&ApprovalLevel> {
        self.approval_levels.iter().find(|candidate| candidate.level == level)
    }
}

/// Levels of `workflow`, and the subset `user` may act at.
///
/// Super users act at every level. Other users act at their explicitly assigned
/// levels, or at the workflow's lowest level when none of their assignments
/// belong to this workflow.
pub fn resolve_levels(workflow: &Workflow, user: &User) -> ResolvedLevels {
    let approval_levels = workflow.sorted_levels();

    let user_approval_levels = if user.super_user {
        approval_levels.clone()
    } else {
        let assigned: Vec<ApprovalLevel> = approval_levels
            .iter()
            .filter(|level| user.approval_level_ids.contains(&level.id))
            .cloned()
            .collect();

        if assigned.is_empty() {
            approval_levels.last().cloned().into_iter().collect()
        } else {
            assigned
        }
    };

    ResolvedLevels { approval_levels, user_approval_levels }
}

/// Where the requested org-unit level sits inside the approval chain.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LevelBoundaries {
    /// Org-unit level the cells are taken from.
    pub org_unit_level: u32,
    pub org_units_requested: bool,
    pub highest_user_level: ApprovalLevel,
    pub lowest_for_org_unit: Option<ApprovalLevel>,
    pub above_org_unit: Option<ApprovalLevel>,
    pub below_org_unit: Option<ApprovalLevel>,
    pub above_user: Option<ApprovalLevel>,
    /// Level whose approval counts as "approved above" for these cells.
    pub approved_above: Option<ApprovalLevel>,
}

impl LevelBoundaries {
    /// Returns `None` when either level list is empty.
    ///
    /// Without requested org units the cells come from the org-unit level of the
    /// lowest approval level, whatever `org_unit_level` says.
    pub fn locate(
        levels: &ResolvedLevels,
        org_unit_level: u32,
        org_units_requested: bool,
    ) -> Option<Self> {
        let highest = levels.highest()?;
        let highest_user_level = levels.highest_user_level()?.clone();

        let org_unit_level = if org_units_requested {
            org_unit_level
        } else {
            levels.approval_levels.last()?.org_unit_level
        };

        let mut lowest_for_org_unit = None;
        let mut above_org_unit = None;
        let mut below_org_unit = None;
        let mut above_user = None;

        for level in &levels.approval_levels {
            if level.level < highest_user_level.level {
                above_user = Some(level.clone());
            }

            if level.org_unit_level < org_unit_level {
                above_org_unit = Some(level.clone());
            } else if level.org_unit_level == org_unit_level {
                lowest_for_org_unit = Some(level.clone());
            } else {
                below_org_unit = Some(level.clone());
                break;
            }
        }

        let at_user_level = org_unit_level == highest_user_level.org_unit_level;
        let approved_above = if highest_user_level.level != highest.level
            && (!org_units_requested || at_user_level)
        {
            above_user.clone()
        } else if org_units_requested && !at_user_level {
            above_org_unit.clone()
        } else {
            None
        };

        Some(Self {
            org_unit_level,
            org_units_requested,
            highest_user_level,
            lowest_for_org_unit,
            above_org_unit,
            below_org_unit,
            above_user,
            approved_above,
        })
    }

    /// True when the approved-above level is the one directly above the user.
    pub fn approved_above_is_user_boundary(&self) -> bool {
        level_id(&self.approved_above) == level_id(&self.above_user)
    }
}

fn level_id(level: &Option<ApprovalLevel>) -> Option<i64> {
    level.as_ref().map(|level| level.id)
}

#[cfg(test)]
mod tests {
    use super::{resolve_levels, LevelBoundaries, ResolvedLevels};
    use crate::domain::approval::{ApprovalLevel, Workflow};
    use crate::domain::period::PeriodType;
    use crate::domain::user::User;

    fn level(level: u32, org_unit_level: u32) -> ApprovalLevel {
        ApprovalLevel {
            id: i64::from(level) * 10,
            uid: format!("Lvl{level:08}"),
            name: format!("Level {level}"),
            level,
            org_unit_level,
        }
    }

    fn workflow(levels: Vec<ApprovalLevel>) -> Workflow {
        Workflow {
            id: 1,
            uid: "WfMonthly01".to_string(),
            name: "Monthly".to_string(),
            period_type: PeriodType::Monthly,
            levels,
        }
    }

    fn three_levels() -> Workflow {
        workflow(vec![level(3, 3), level(1, 1), level(2, 2)])
    }

    fn user_at(level_ids: &[i64]) -> User {
        User {
            id: 7,
            username: "approver".to_string(),
            approval_level_ids: level_ids.to_vec(),
            ..User::default()
        }
    }

    fn ordinals(levels: &[ApprovalLevel]) -> Vec<u32> {
        levels.iter().map(|level| level.level).collect()
    }

    #[test]
    fn assigned_levels_are_sorted_and_filtered_to_workflow() {
        let resolved = resolve_levels(&three_levels(), &user_at(&[30, 20, 999]));

        assert_eq!(ordinals(&resolved.approval_levels), vec![1, 2, 3]);
        assert_eq!(ordinals(&resolved.user_approval_levels), vec![2, 3]);
        assert!(resolved.user_levels_restricted());
    }

    #[test]
    fn unassigned_user_falls_back_to_lowest_level() {
        let resolved = resolve_levels(&three_levels(), &user_at(&[]));

        assert_eq!(ordinals(&resolved.user_approval_levels), vec![3]);
    }

    #[test]
    fn super_user_acts_at_every_level() {
        let mut user = user_at(&[]);
        user.super_user = true;

        let resolved = resolve_levels(&three_levels(), &user);
        assert!(!resolved.user_levels_restricted());
    }

    #[test]
    fn empty_workflow_resolves_to_no_levels() {
        let resolved = resolve_levels(&workflow(Vec::new()), &user_at(&[10]));

        assert!(resolved.approval_levels.is_empty());
        assert!(resolved.user_approval_levels.is_empty());
        assert!(LevelBoundaries::locate(&resolved, 2, true).is_none());
    }

    #[test]
    fn boundaries_for_user_at_own_org_unit_level() {
        let resolved = resolve_levels(&three_levels(), &user_at(&[20]));
        let bounds = LevelBoundaries::locate(&resolved, 2, true).expect("bounds");

        assert_eq!(bounds.lowest_for_org_unit.as_ref().map(|l| l.level), Some(2));
        assert_eq!(bounds.above_org_unit.as_ref().map(|l| l.level), Some(1));
        assert_eq!(bounds.below_org_unit.as_ref().map(|l| l.level), Some(3));
        assert_eq!(bounds.above_user.as_ref().map(|l| l.level), Some(1));
        assert_eq!(bounds.approved_above.as_ref().map(|l| l.level), Some(1));
        assert!(bounds.approved_above_is_user_boundary());
    }

    #[test]
    fn boundaries_below_user_level_use_level_above_org_unit() {
        let resolved = resolve_levels(&three_levels(), &user_at(&[20]));
        let bounds = LevelBoundaries::locate(&resolved, 3, true).expect("bounds");

        assert_eq!(bounds.lowest_for_org_unit.as_ref().map(|l| l.level), Some(3));
        assert_eq!(bounds.below_org_unit, None);
        assert_eq!(bounds.approved_above.as_ref().map(|l| l.level), Some(2));
        assert!(!bounds.approved_above_is_user_boundary());
    }

    #[test]
    fn top_level_user_sees_nothing_above() {
        let resolved = resolve_levels(&three_levels(), &user_at(&[10]));
        let bounds = LevelBoundaries::locate(&resolved, 1, true).expect("bounds");

        assert_eq!(bounds.above_user, None);
        assert_eq!(bounds.above_org_unit, None);
        assert_eq!(bounds.approved_above, None);
    }

    #[test]
    fn without_org_units_cells_come_from_lowest_level() {
        let resolved = resolve_levels(&three_levels(), &user_at(&[]));
        let bounds = LevelBoundaries::locate(&resolved, 1, false).expect("bounds");

        assert_eq!(bounds.org_unit_level, 3);
        assert_eq!(bounds.approved_above.as_ref().map(|l| l.level), Some(2));
    }

    #[test]
    fn org_unit_level_between_approval_levels_has_no_own_level() {
        let resolved = ResolvedLevels {
            approval_levels: vec![level(1, 1), level(2, 3)],
            user_approval_levels: vec![level(1, 1), level(2, 3)],
        };
        let bounds = LevelBoundaries::locate(&resolved, 2, true).expect("bounds");

        assert_eq!(bounds.lowest_for_org_unit, None);
        assert_eq!(bounds.above_org_unit.as_ref().map(|l| l.level), Some(1));
        assert_eq!(bounds.below_org_unit.as_ref().map(|l| l.level), Some(2));
    }
}

use serde::{Deserialize, Serialize};

use crate::domain::org_unit::OrganisationUnit;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub super_user: bool,
    pub data_view_org_units: Vec<OrganisationUnit>,
    pub data_capture_org_units: Vec<OrganisationUnit>,
    /// Approval levels explicitly assigned to this user, by level row id.
    pub approval_level_ids: Vec<i64>,
    pub category_constraints: Vec<String>,
    pub option_group_set_constraints: Vec<String>,
}

impl User {
    /// Data-view org units, or data-capture org units when none are set.
    pub fn data_view_org_units_with_fallback(&self) -> &[OrganisationUnit] {
        if self.data_view_org_units.is_empty() {
            &self.data_capture_org_units
        } else {
            &self.data_view_org_units
        }
    }

    pub fn has_dimension_constraints(&self) -> bool {
        !self.category_constraints.is_empty() || !self.option_group_set_constraints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::User;
    use crate::domain::org_unit::OrganisationUnit;

    #[test]
    fn data_view_falls_back_to_data_capture_units() {
        let national = OrganisationUnit::new(1, "OuNational1", "National", None);
        let district = OrganisationUnit::new(2, "OuDistrict1", "District", Some(&national));

        let mut user = User {
            username: "clerk".to_string(),
            data_capture_org_units: vec![district.clone()],
            ..User::default()
        };
        assert_eq!(user.data_view_org_units_with_fallback(), &[district]);

        user.data_view_org_units = vec![national.clone()];
        assert_eq!(user.data_view_org_units_with_fallback(), &[national]);
    }
}

use serde::{Deserialize, Serialize};

pub const UID_LENGTH: usize = 11;

/// Width of one `/uid` segment in a materialized org-unit path.
const PATH_SEGMENT_WIDTH: usize = UID_LENGTH + 1;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrganisationUnit {
    pub id: i64,
    pub uid: String,
    pub name: String,
    /// Ancestry encoded as `/rootUid/childUid/.../selfUid`.
    pub path: String,
    pub hierarchy_level: u32,
}

impl OrganisationUnit {
    pub fn new(
        id: i64,
        uid: impl Into<String>,
        name: impl Into<String>,
        parent: Option<&OrganisationUnit>,
    ) -> Self {
        let uid = uid.into();
        let (path, hierarchy_level) = match parent {
            Some(parent) => (format!("{}/{uid}", parent.path), parent.hierarchy_level + 1),
            None => (format!("/{uid}"), 1),
        };

        Self { id, uid, name: name.into(), path, hierarchy_level }
    }

    /// True when `ancestor` is this unit or one of its ancestors.
    pub fn is_descendant_of(&self, ancestor: &OrganisationUnit) -> bool {
        let Some(rest) = self.path.strip_prefix(ancestor.path.as_str()) else {
            return false;
        };
        rest.is_empty() || rest.starts_with('/')
    }

    pub fn is_descendant_of_any<'a, I>(&self, ancestors: I) -> bool
    where
        I: IntoIterator<Item = &'a OrganisationUnit>,
    {
        ancestors.into_iter().any(|ancestor| self.is_descendant_of(ancestor))
    }

    pub fn ancestor_uids(&self) -> Vec<&str> {
        self.path.split('/').filter(|segment| !segment.is_empty()).collect()
    }
}

/// 1-based character position of the ancestor UID at `org_unit_level` inside a path.
pub fn path_position_at_level(org_unit_level: u32) -> i64 {
    (i64::from(org_unit_level) - 1) * PATH_SEGMENT_WIDTH as i64 + 2
}

pub fn is_valid_uid(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    value.chars().count() == UID_LENGTH
        && first.is_ascii_alphabetic()
        && chars.all(|ch| ch.is_ascii_alphanumeric())
}

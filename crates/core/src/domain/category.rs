use serde::{Deserialize, Serialize};

pub const DEFAULT_NAME: &str = "default";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryCombo {
    pub id: i64,
    pub uid: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryOptionCombo {
    pub id: i64,
    pub uid: String,
    pub name: String,
}

impl CategoryOptionCombo {
    pub fn is_default(&self) -> bool {
        self.name == DEFAULT_NAME
    }
}

/// True when the requested set is exactly the default option combo.
pub fn is_default_selection(option_combos: Option<&[CategoryOptionCombo]>) -> bool {
    matches!(option_combos, Some([only]) if only.is_default())
}

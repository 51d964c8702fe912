//! Named parameter bindings for hand-assembled SQL.
//!
//! SQLite numbers its placeholders (`?1`, `?2`, ...). Fragments refer to
//! values by name; binding the same name again yields the placeholder that
//! was handed out the first time, so a value used in several subqueries is
//! passed to the driver once.

use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BindValue {
    Int(i64),
    Text(String),
    Bool(bool),
    Null,
}

impl From<i64> for BindValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for BindValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for BindValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<String> for BindValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for BindValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl<T: Into<BindValue>> From<Option<T>> for BindValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

#[derive(Clone, Debug, Default)]
pub struct NamedBindings {
    names: Vec<String>,
    values: Vec<BindValue>,
}

impl NamedBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Placeholder for `name`. A name keeps the value it was first bound with.
    pub fn bind(&mut self, name: &str, value: impl Into<BindValue>) -> String {
        if let Some(index) = self.names.iter().position(|existing| existing == name) {
            return placeholder(index);
        }

        self.names.push(name.to_owned());
        self.values.push(value.into());
        placeholder(self.values.len() - 1)
    }

    /// Comma-separated placeholders for a list, named `name[0]`, `name[1]`, ...
    ///
    /// An empty list renders as `NULL` so that `x IN (NULL)` matches nothing.
    pub fn bind_list<I, T>(&mut self, name: &str, values: I) -> String
    where
        I: IntoIterator<Item = T>,
        T: Into<BindValue>,
    {
        let placeholders = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| self.bind(&format!("{name}[{index}]"), value))
            .collect::<Vec<_>>();

        if placeholders.is_empty() {
            "NULL".to_owned()
        } else {
            placeholders.join(", ")
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[BindValue] {
        &self.values
    }

    pub fn into_values(self) -> Vec<BindValue> {
        self.values
    }
}

fn placeholder(index: usize) -> String {
    format!("?{}", index + 1)
}

/// Binds `values` onto `query` in placeholder order.
pub fn apply_bindings<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: Vec<BindValue>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            BindValue::Int(v) => query.bind(v),
            BindValue::Text(v) => query.bind(v),
            BindValue::Bool(v) => query.bind(v),
            BindValue::Null => query.bind(Option::<i64>::None),
        };
    }
    query
}

#[cfg(test)]
mod tests {
    use super::{BindValue, NamedBindings};

    #[test]
    fn same_name_reuses_placeholder() {
        let mut bindings = NamedBindings::new();

        assert_eq!(bindings.bind("workflow", 7_i64), "?1");
        assert_eq!(bindings.bind("end", "2024-03-31"), "?2");
        assert_eq!(bindings.bind("workflow", 7_i64), "?1");

        assert_eq!(bindings.len(), 2);
        assert_eq!(
            bindings.values(),
            &[BindValue::Int(7), BindValue::Text("2024-03-31".to_owned())]
        );
    }

    #[test]
    fn lists_get_one_placeholder_per_item() {
        let mut bindings = NamedBindings::new();
        bindings.bind("user", 3_i64);

        assert_eq!(bindings.bind_list("units", [10_i64, 11, 12]), "?2, ?3, ?4");
        assert_eq!(bindings.bind_list("units", [10_i64, 11, 12]), "?2, ?3, ?4");
        assert_eq!(bindings.len(), 4);
    }

    #[test]
    fn empty_list_matches_nothing() {
        let mut bindings = NamedBindings::new();

        assert_eq!(bindings.bind_list("units", Vec::<i64>::new()), "NULL");
        assert!(bindings.is_empty());
    }

    #[test]
    fn optional_values_bind_null() {
        let mut bindings = NamedBindings::new();
        bindings.bind("period", Option::<i64>::None);
        bindings.bind("accepted", Some(true));

        assert_eq!(bindings.into_values(), vec![BindValue::Null, BindValue::Bool(true)]);
    }
}

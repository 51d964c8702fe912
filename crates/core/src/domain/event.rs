use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValueType {
    Text,
    LongText,
    Letter,
    Number,
    UnitInterval,
    Percentage,
    Integer,
    IntegerPositive,
    IntegerNegative,
    IntegerZeroOrPositive,
    Boolean,
    TrueOnly,
    Date,
    DateTime,
    Time,
    Email,
    PhoneNumber,
    Url,
    Coordinate,
    OrganisationUnit,
    FileResource,
    Image,
}

impl ValueType {
    pub fn is_file(self) -> bool {
        matches!(self, Self::FileResource | Self::Image)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::LongText => "LONG_TEXT",
            Self::Letter => "LETTER",
            Self::Number => "NUMBER",
            Self::UnitInterval => "UNIT_INTERVAL",
            Self::Percentage => "PERCENTAGE",
            Self::Integer => "INTEGER",
            Self::IntegerPositive => "INTEGER_POSITIVE",
            Self::IntegerNegative => "INTEGER_NEGATIVE",
            Self::IntegerZeroOrPositive => "INTEGER_ZERO_OR_POSITIVE",
            Self::Boolean => "BOOLEAN",
            Self::TrueOnly => "TRUE_ONLY",
            Self::Date => "DATE",
            Self::DateTime => "DATETIME",
            Self::Time => "TIME",
            Self::Email => "EMAIL",
            Self::PhoneNumber => "PHONE_NUMBER",
            Self::Url => "URL",
            Self::Coordinate => "COORDINATE",
            Self::OrganisationUnit => "ORGANISATION_UNIT",
            Self::FileResource => "FILE_RESOURCE",
            Self::Image => "IMAGE",
        }
    }
}

impl std::str::FromStr for ValueType {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        let all = [
            Self::Text,
            Self::LongText,
            Self::Letter,
            Self::Number,
            Self::UnitInterval,
            Self::Percentage,
            Self::Integer,
            Self::IntegerPositive,
            Self::IntegerNegative,
            Self::IntegerZeroOrPositive,
            Self::Boolean,
            Self::TrueOnly,
            Self::Date,
            Self::DateTime,
            Self::Time,
            Self::Email,
            Self::PhoneNumber,
            Self::Url,
            Self::Coordinate,
            Self::OrganisationUnit,
            Self::FileResource,
            Self::Image,
        ];
        all.into_iter()
            .find(|value_type| value_type.as_str() == normalized)
            .ok_or_else(|| format!("unknown value type `{value}`"))
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataElement {
    pub id: i64,
    pub uid: String,
    pub name: String,
    pub value_type: ValueType,
}

impl DataElement {
    pub fn is_file_type(&self) -> bool {
        self.value_type.is_file()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDataValue {
    pub data_element: String,
    pub value: Option<String>,
    pub stored_by: Option<String>,
    #[serde(default)]
    pub provided_elsewhere: bool,
    pub created: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    /// Value before the current change; not persisted.
    #[serde(skip)]
    pub audit_value: Option<String>,
}

impl EventDataValue {
    pub fn new(data_element: impl Into<String>, value: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            data_element: data_element.into(),
            value: Some(value.into()),
            stored_by: None,
            provided_elsewhere: false,
            created: now,
            last_updated: now,
            audit_value: None,
        }
    }

    pub fn has_value(&self) -> bool {
        self.value.as_deref().is_some_and(|value| !value.trim().is_empty())
    }
}

/// An event. Its data values are keyed by data element uid.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramStageInstance {
    pub id: i64,
    pub uid: String,
    pub event_data_values: BTreeMap<String, EventDataValue>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResource {
    pub uid: String,
    pub name: String,
    pub assigned: bool,
}

#[cfg(test)]
mod tests {
    use super::{EventDataValue, ValueType};

    #[test]
    fn value_type_round_trips_through_storage_name() {
        let parsed: ValueType = "integer_zero_or_positive".parse().expect("parse");
        assert_eq!(parsed, ValueType::IntegerZeroOrPositive);
        assert_eq!(parsed.as_str(), "INTEGER_ZERO_OR_POSITIVE");
        assert!("MONEY".parse::<ValueType>().is_err());
    }

    #[test]
    fn blank_values_are_not_values() {
        let mut value = EventDataValue::new("DeWeight001", "  ");
        assert!(!value.has_value());

        value.value = Some("3.2".to_string());
        assert!(value.has_value());
    }
}

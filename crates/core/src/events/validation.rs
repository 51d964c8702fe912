use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

use crate::domain::event::ValueType;
use crate::domain::org_unit::is_valid_uid;

pub const VALUE_MAX_LENGTH: usize = 50_000;

/// Returns the i18n key describing why `value` is invalid for `value_type`,
/// or `None` when it is valid. Blank values are always valid.
pub fn data_value_is_valid(value: &str, value_type: ValueType) -> Option<&'static str> {
    if value.trim().is_empty() {
        return None;
    }

    if value.chars().count() > VALUE_MAX_LENGTH {
        return Some("value_length_greater_than_max_length");
    }

    let valid = match value_type {
        ValueType::Text | ValueType::LongText => true,
        ValueType::Letter => is_letter(value),
        ValueType::Number => is_numeric(value),
        ValueType::UnitInterval => numeric_within(value, 0.0, 1.0),
        ValueType::Percentage => numeric_within(value, 0.0, 100.0),
        ValueType::Integer => matches(integer(), value),
        ValueType::IntegerPositive => matches(positive_integer(), value),
        ValueType::IntegerNegative => matches(negative_integer(), value),
        ValueType::IntegerZeroOrPositive => value == "0" || matches(positive_integer(), value),
        ValueType::Boolean => value == "true" || value == "false",
        ValueType::TrueOnly => value == "true",
        ValueType::Date => NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok(),
        ValueType::DateTime => is_date_time(value),
        ValueType::Time => matches(time(), value),
        ValueType::Email => matches(email(), value),
        ValueType::PhoneNumber => matches(phone_number(), value),
        ValueType::Url => matches(url(), value),
        ValueType::Coordinate => is_coordinate(value),
        ValueType::OrganisationUnit | ValueType::FileResource | ValueType::Image => {
            is_valid_uid(value)
        }
    };

    if valid {
        None
    } else {
        Some(invalid_key(value_type))
    }
}

fn invalid_key(value_type: ValueType) -> &'static str {
    match value_type {
        ValueType::Text | ValueType::LongText => "value_not_valid",
        ValueType::Letter => "value_not_valid_letter",
        ValueType::Number => "value_not_numeric",
        ValueType::UnitInterval => "value_not_unit_interval",
        ValueType::Percentage => "value_not_percentage",
        ValueType::Integer => "value_not_integer",
        ValueType::IntegerPositive => "value_not_positive_integer",
        ValueType::IntegerNegative => "value_not_negative_integer",
        ValueType::IntegerZeroOrPositive => "value_not_zero_or_positive_integer",
        ValueType::Boolean => "value_not_bool",
        ValueType::TrueOnly => "value_not_true_only",
        ValueType::Date => "value_not_valid_date",
        ValueType::DateTime => "value_not_valid_datetime",
        ValueType::Time => "value_not_valid_time",
        ValueType::Email => "value_not_valid_email",
        ValueType::PhoneNumber => "value_not_valid_phone_number",
        ValueType::Url => "value_not_url",
        ValueType::Coordinate => "value_not_coordinate",
        ValueType::OrganisationUnit => "value_not_valid_org_unit_uid",
        ValueType::FileResource | ValueType::Image => "value_not_valid_file_resource_uid",
    }
}

fn matches(pattern: &Regex, value: &str) -> bool {
    pattern.is_match(value)
}

fn is_letter(value: &str) -> bool {
    let mut chars = value.chars();
    matches!((chars.next(), chars.next()), (Some(ch), None) if ch.is_alphabetic())
}

fn is_numeric(value: &str) -> bool {
    matches(numeric(), value) && value.parse::<f64>().is_ok_and(f64::is_finite)
}

fn numeric_within(value: &str, min: f64, max: f64) -> bool {
    is_numeric(value) && value.parse::<f64>().is_ok_and(|number| (min..=max).contains(&number))
}

fn is_date_time(value: &str) -> bool {
    const FORMATS: [&str; 4] =
        ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

    DateTime::parse_from_rfc3339(value).is_ok()
        || FORMATS.iter().any(|format| NaiveDateTime::parse_from_str(value, format).is_ok())
}

/// `[longitude,latitude]`
fn is_coordinate(value: &str) -> bool {
    let Some(inner) = value.trim().strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) else {
        return false;
    };
    let Some((longitude, latitude)) = inner.split_once(',') else {
        return false;
    };

    let within = |raw: &str, bound: f64| {
        raw.trim().parse::<f64>().is_ok_and(|number| (-bound..=bound).contains(&number))
    };
    within(longitude, 180.0) && within(latitude, 90.0)
}

macro_rules! pattern {
    ($name:ident, $source:expr) => {
        fn $name() -> &'static Regex {
            static PATTERN: OnceLock<Regex> = OnceLock::new();
            PATTERN.get_or_init(|| Regex::new($source).expect("value pattern must compile"))
        }
    };
}

pattern!(numeric, r"^(-?0|-?[1-9]\d*)(\.\d+)?([eE][-+]?\d+)?$");
pattern!(integer, r"^(0|-?[1-9]\d*)$");
pattern!(positive_integer, r"^[1-9]\d*$");
pattern!(negative_integer, r"^-[1-9]\d*$");
pattern!(time, r"^([01]?[0-9]|2[0-3]):[0-5][0-9]$");
pattern!(email, r"^[^@\s]+@[^@\s]+\.[^@\s]+$");
pattern!(phone_number, r"^[0-9+()#.\s/ext-]{6,50}$");
pattern!(url, r"^(?i)(https?|ftp)://[^\s/$.?#][^\s]*$");

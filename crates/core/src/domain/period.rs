use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PeriodType {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    SixMonthly,
    Yearly,
    FinancialApril,
}

impl PeriodType {
    pub const ALL: [PeriodType; 7] = [
        Self::Daily,
        Self::Weekly,
        Self::Monthly,
        Self::Quarterly,
        Self::SixMonthly,
        Self::Yearly,
        Self::FinancialApril,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "Daily",
            Self::Weekly => "Weekly",
            Self::Monthly => "Monthly",
            Self::Quarterly => "Quarterly",
            Self::SixMonthly => "SixMonthly",
            Self::Yearly => "Yearly",
            Self::FinancialApril => "FinancialApril",
        }
    }

    /// The period of this type that contains `date`.
    pub fn period_containing(self, date: NaiveDate) -> Option<Period> {
        let (start, end) = match self {
            Self::Daily => (date, date),
            Self::Weekly => {
                let start = date - Duration::days(i64::from(date.weekday().num_days_from_monday()));
                (start, start + Duration::days(6))
            }
            Self::Monthly => month_span(date.year(), date.month(), 1)?,
            Self::Quarterly => month_span(date.year(), (date.month0() / 3) * 3 + 1, 3)?,
            Self::SixMonthly => month_span(date.year(), (date.month0() / 6) * 6 + 1, 6)?,
            Self::Yearly => month_span(date.year(), 1, 12)?,
            Self::FinancialApril => {
                let year = if date.month() >= 4 { date.year() } else { date.year() - 1 };
                month_span(year, 4, 12)?
            }
        };

        Some(Period::new(self, start, end))
    }
}

impl std::str::FromStr for PeriodType {
    type Err = PeriodParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|period_type| period_type.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| PeriodParseError::UnknownPeriodType(value.to_string()))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PeriodParseError {
    #[error("unknown period type `{0}`")]
    UnknownPeriodType(String),
    #[error("`{0}` is not a recognised ISO period")]
    InvalidIso(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// Row id once the period has been persisted.
    pub id: Option<i64>,
    pub period_type: PeriodType,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

impl Period {
    pub fn new(period_type: PeriodType, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self { id: None, period_type, start_date, end_date }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    pub fn iso_date(&self) -> String {
        let start = self.start_date;
        match self.period_type {
            PeriodType::Daily => start.format("%Y%m%d").to_string(),
            PeriodType::Weekly => {
                let week = start.iso_week();
                format!("{}W{}", week.year(), week.week())
            }
            PeriodType::Monthly => start.format("%Y%m").to_string(),
            PeriodType::Quarterly => format!("{}Q{}", start.year(), start.month0() / 3 + 1),
            PeriodType::SixMonthly => format!("{}S{}", start.year(), start.month0() / 6 + 1),
            PeriodType::Yearly => start.year().to_string(),
            PeriodType::FinancialApril => format!("{}April", start.year()),
        }
    }

    pub fn from_iso(iso: &str) -> Result<Self, PeriodParseError> {
        let invalid = || PeriodParseError::InvalidIso(iso.to_string());
        let value = iso.trim();

        let year_of = |digits: &str| -> Result<i32, PeriodParseError> {
            if digits.len() != 4 || !digits.chars().all(|ch| ch.is_ascii_digit()) {
                return Err(invalid());
            }
            digits.parse::<i32>().map_err(|_| invalid())
        };

        let (period_type, anchor) = if let Some(year) = value.strip_suffix("April") {
            (PeriodType::FinancialApril, NaiveDate::from_ymd_opt(year_of(year)?, 4, 1))
        } else if let Some((year, week)) = value.split_once('W') {
            let week = week.parse::<u32>().map_err(|_| invalid())?;
            (PeriodType::Weekly, NaiveDate::from_isoywd_opt(year_of(year)?, week, Weekday::Mon))
        } else if let Some((year, quarter)) = value.split_once('Q') {
            let quarter = quarter.parse::<u32>().map_err(|_| invalid())?;
            if !(1..=4).contains(&quarter) {
                return Err(invalid());
            }
            (PeriodType::Quarterly, NaiveDate::from_ymd_opt(year_of(year)?, (quarter - 1) * 3 + 1, 1))
        } else if let Some((year, half)) = value.split_once('S') {
            let half = half.parse::<u32>().map_err(|_| invalid())?;
            if !(1..=2).contains(&half) {
                return Err(invalid());
            }
            (PeriodType::SixMonthly, NaiveDate::from_ymd_opt(year_of(year)?, (half - 1) * 6 + 1, 1))
        } else {
            if !value.chars().all(|ch| ch.is_ascii_digit()) {
                return Err(invalid());
            }
            match value.len() {
                4 => (PeriodType::Yearly, NaiveDate::from_ymd_opt(year_of(value)?, 1, 1)),
                6 => {
                    let month = value[4..].parse::<u32>().map_err(|_| invalid())?;
                    (PeriodType::Monthly, NaiveDate::from_ymd_opt(year_of(&value[..4])?, month, 1))
                }
                8 => (
                    PeriodType::Daily,
                    NaiveDate::parse_from_str(value, "%Y%m%d").ok(),
                ),
                _ => return Err(invalid()),
            }
        };

        let anchor = anchor.ok_or_else(invalid)?;
        period_type.period_containing(anchor).ok_or_else(invalid)
    }
}

fn month_span(year: i32, first_month: u32, months: u32) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, first_month, 1)?;
    let after = first_month - 1 + months;
    let next = NaiveDate::from_ymd_opt(year + (after / 12) as i32, after % 12 + 1, 1)?;
    Some((start, next.pred_opt()?))
}

/// `YYYY-MM-DD`, the form dates are stored and compared in.
pub fn medium_date_string(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Period, PeriodParseError, PeriodType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn monthly_period_spans_calendar_month() {
        let period = Period::from_iso("202402").expect("parse");

        assert_eq!(period.period_type, PeriodType::Monthly);
        assert_eq!(period.start_date, date(2024, 2, 1));
        assert_eq!(period.end_date, date(2024, 2, 29));
        assert_eq!(period.iso_date(), "202402");
    }

    #[test]
    fn quarter_and_financial_year_cross_boundaries() {
        let quarter = Period::from_iso("2024Q4").expect("parse quarter");
        assert_eq!(quarter.end_date, date(2024, 12, 31));

        let financial = PeriodType::FinancialApril
            .period_containing(date(2025, 2, 10))
            .expect("financial year");
        assert_eq!(financial.start_date, date(2024, 4, 1));
        assert_eq!(financial.end_date, date(2025, 3, 31));
        assert_eq!(financial.iso_date(), "2024April");
    }

    #[test]
    fn weekly_periods_start_on_monday() {
        let week = Period::from_iso("2024W10").expect("parse week");

        assert_eq!(week.start_date, date(2024, 3, 4));
        assert_eq!(week.end_date, date(2024, 3, 10));
        assert_eq!(week.iso_date(), "2024W10");
    }

    #[test]
    fn yearly_period_contains_its_days() {
        let year = Period::from_iso("2024").expect("parse year");

        assert!(year.contains(date(2024, 3, 31)));
        assert!(!year.contains(date(2025, 1, 1)));
    }

    #[test]
    fn rejects_malformed_iso_values() {
        for raw in ["2024Q5", "202413", "24", "2024S3", "abcd"] {
            assert!(
                matches!(Period::from_iso(raw), Err(PeriodParseError::InvalidIso(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn period_type_parses_case_insensitively() {
        assert_eq!("monthly".parse::<PeriodType>(), Ok(PeriodType::Monthly));
        assert!("fortnightly".parse::<PeriodType>().is_err());
    }
}

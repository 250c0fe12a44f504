use std::fmt::{Display, Formatter};

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::macros::format_description;
use time::{Date, Duration, OffsetDateTime};

use crate::ValidationError;

/// Calendar date of a daily bar. Serialized as `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TradingDate(Date);

impl TradingDate {
    pub fn new(date: Date) -> Self {
        Self(date)
    }

    pub fn today() -> Self {
        Self(OffsetDateTime::now_utc().date())
    }

    pub fn from_ymd(year: i32, month: u8, day: u8) -> Result<Self, ValidationError> {
        let invalid_date = || invalid(&format!("{year}-{month}-{day}"));
        let month = time::Month::try_from(month).map_err(|_| invalid_date())?;
        Date::from_calendar_date(year, month, day)
            .map(Self)
            .map_err(|_| invalid_date())
    }

    /// Accepts `YYYY-MM-DD`, `YYYYMMDD` (KRX request form) and `YYYY/MM/DD` (KRX response form).
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        let dashed = format_description!("[year]-[month]-[day]");
        let compact = format_description!("[year][month][day]");
        let slashed = format_description!("[year]/[month]/[day]");

        Date::parse(trimmed, &dashed)
            .or_else(|_| Date::parse(trimmed, &compact))
            .or_else(|_| Date::parse(trimmed, &slashed))
            .map(Self)
            .map_err(|_| invalid(input))
    }

    pub fn into_inner(self) -> Date {
        self.0
    }

    pub fn minus_days(self, days: i64) -> Self {
        Self(self.0.saturating_sub(Duration::days(days)))
    }

    /// `YYYYMMDD`, the KRX request form.
    pub fn format_compact(self) -> String {
        self.0
            .format(format_description!("[year][month][day]"))
            .unwrap_or_else(|_| self.0.to_string().replace('-', ""))
    }

    pub fn format_iso(self) -> String {
        // `Date`'s own Display is already `YYYY-MM-DD`.
        self.0
            .format(format_description!("[year]-[month]-[day]"))
            .unwrap_or_else(|_| self.0.to_string())
    }

    /// Midnight UTC epoch seconds, used for `period1`/`period2` query params.
    pub fn unix_seconds(self) -> i64 {
        self.0.midnight().assume_utc().unix_timestamp()
    }
}

fn invalid(value: &str) -> ValidationError {
    ValidationError::InvalidTradingDate {
        value: value.to_owned(),
    }
}

impl Display for TradingDate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.format_iso())
    }
}

impl Serialize for TradingDate {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.format_iso())
    }
}

impl<'de> Deserialize<'de> for TradingDate {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        Self::parse(&value).map_err(D::Error::custom)
    }
}

//! Date utilities for registry payloads
//!
//! Registries report recording timestamps in several shapes (ISO dates,
//! US slash dates with or without a time part, RFC 3339, compact
//! `YYYYMMDD`, and .NET-style `/Date(millis)/`). Everything is reduced to a
//! `NaiveDate`; an unparseable value yields `None` so callers can attach a
//! data-quality warning instead of defaulting.

use chrono::{DateTime, Months, NaiveDate, NaiveDateTime, Utc};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%Y%m%d",
    "%B %d, %Y",
    "%B %d %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
];

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Today's date in UTC
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parse a recording date from any of the known registry shapes
pub fn parse_recording_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Some(millis) = parse_dotnet_date(value) {
        return DateTime::from_timestamp_millis(millis).map(|dt| dt.date_naive());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.date_naive());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    None
}

/// `/Date(1577836800000)/` or `/Date(1577836800000-0500)/`
fn parse_dotnet_date(value: &str) -> Option<i64> {
    let inner = value.strip_prefix("/Date(")?.strip_suffix(")/")?;
    let digits_end = inner
        .char_indices()
        .skip(1)
        .find(|(_, c)| *c == '-' || *c == '+')
        .map(|(i, _)| i)
        .unwrap_or(inner.len());
    inner[..digits_end].parse().ok()
}

/// Add whole years, clamping Feb 29 to Feb 28 when needed
pub fn add_years(date: NaiveDate, years: u32) -> NaiveDate {
    date.checked_add_months(Months::new(years.saturating_mul(12)))
        .unwrap_or(NaiveDate::MAX)
}

/// Fractional years between two dates (negative when `to` precedes `from`)
pub fn years_between(from: NaiveDate, to: NaiveDate) -> f64 {
    (to - from).num_days() as f64 / 365.25
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_iso_and_slash_dates() {
        assert_eq!(parse_recording_date("2019-03-14"), Some(ymd(2019, 3, 14)));
        assert_eq!(parse_recording_date("03/14/2019"), Some(ymd(2019, 3, 14)));
        assert_eq!(parse_recording_date(" 20190314 "), Some(ymd(2019, 3, 14)));
    }

    #[test]
    fn test_parse_datetime_shapes() {
        assert_eq!(
            parse_recording_date("2019-03-14T10:22:01"),
            Some(ymd(2019, 3, 14))
        );
        assert_eq!(
            parse_recording_date("3/14/2019 10:22:01 AM"),
            Some(ymd(2019, 3, 14))
        );
        assert_eq!(
            parse_recording_date("2019-03-14T10:22:01Z"),
            Some(ymd(2019, 3, 14))
        );
    }

    #[test]
    fn test_parse_dotnet_date() {
        // 2020-01-01T00:00:00Z
        assert_eq!(
            parse_recording_date("/Date(1577836800000)/"),
            Some(ymd(2020, 1, 1))
        );
        assert_eq!(
            parse_recording_date("/Date(1577836800000-0500)/"),
            Some(ymd(2020, 1, 1))
        );
    }

    #[test]
    fn test_unparseable_is_none() {
        assert_eq!(parse_recording_date(""), None);
        assert_eq!(parse_recording_date("sometime in 1987"), None);
        assert_eq!(parse_recording_date("13/45/2019"), None);
    }

    #[test]
    fn test_add_years_leap_day() {
        assert_eq!(add_years(ymd(2020, 2, 29), 1), ymd(2021, 2, 28));
        assert_eq!(add_years(ymd(2010, 6, 1), 10), ymd(2020, 6, 1));
    }

    #[test]
    fn test_years_between() {
        let span = years_between(ymd(1990, 1, 1), ymd(2020, 1, 1));
        assert!((span - 30.0).abs() < 0.01);
        assert!(years_between(ymd(2020, 1, 1), ymd(2019, 1, 1)) < 0.0);
    }
}

use crate::error::{CompensationError, Result};
use chrono::{Datelike, Months, NaiveDate};

/// Adds one calendar month, clamping to the last day of a shorter month
/// (2024-01-31 becomes 2024-02-29).
pub fn add_one_month(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(1))
}

pub fn first_day_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// True when `date` lies in `year` and, if given, in `month` of that year.
pub fn falls_in_period(date: NaiveDate, year: i32, month: Option<u32>) -> bool {
    date.year() == year && month.map_or(true, |m| date.month() == m)
}

pub fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(CompensationError::InvalidMonth(month));
    }
    Ok(())
}

pub fn validate_optional_month(month: Option<u32>) -> Result<()> {
    match month {
        Some(m) => validate_month(m),
        None => Ok(()),
    }
}

/// Parses a raw date cell. Accepts ISO dates, ISO date-times (time is dropped),
/// `YYYY/MM/DD` and US-style `MM/DD/YYYY`. Anything else yields `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            return Some(date);
        }
    }

    const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];
    for format in DATETIME_FORMATS {
        if let Ok(dt) = chrono::NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.date());
        }
    }

    None
}

/// Parses a raw money cell such as `"$12,500.00"`. Negative or non-finite values
/// are rejected so every amount that reaches the engine is non-negative.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Some(v),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_one_month() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(
            add_one_month(date),
            NaiveDate::from_ymd_opt(2024, 2, 15)
        );

        let date = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        assert_eq!(
            add_one_month(date),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );

        let date = NaiveDate::from_ymd_opt(2023, 12, 10).unwrap();
        assert_eq!(
            add_one_month(date),
            NaiveDate::from_ymd_opt(2024, 1, 10)
        );
    }

    #[test]
    fn test_falls_in_period() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert!(falls_in_period(date, 2024, None));
        assert!(falls_in_period(date, 2024, Some(3)));
        assert!(!falls_in_period(date, 2024, Some(4)));
        assert!(!falls_in_period(date, 2023, None));
    }

    #[test]
    fn test_validate_month() {
        assert!(validate_month(1).is_ok());
        assert!(validate_month(12).is_ok());
        assert!(matches!(
            validate_month(0),
            Err(CompensationError::InvalidMonth(0))
        ));
        assert!(validate_month(13).is_err());
        assert!(validate_optional_month(None).is_ok());
    }

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 2, 5);
        assert_eq!(parse_date("2024-02-05"), expected);
        assert_eq!(parse_date(" 2024/02/05 "), expected);
        assert_eq!(parse_date("02/05/2024"), expected);
        assert_eq!(parse_date("2024-02-05 13:45:00"), expected);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("12500"), Some(12_500.0));
        assert_eq!(parse_amount("$12,500.50"), Some(12_500.5));
        assert_eq!(parse_amount("  42 "), Some(42.0));
        assert_eq!(parse_amount("n/a"), None);
        assert_eq!(parse_amount("-5"), None);
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount(""), None);
    }
}

use chrono::{DateTime, NaiveDate, NaiveTime, SubsecRound, Utc};
use thiserror::Error;

use crate::error::AppError;

pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Error, PartialEq)]
#[error("{0}")]
pub struct ValidationError(pub String);

impl From<ValidationError> for AppError {
    fn from(e: ValidationError) -> Self {
        AppError::Validation(e.0)
    }
}

type Result<T> = std::result::Result<T, ValidationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: i64,
    pub skip: i64,
}

/// Applies the listing defaults and bounds (`limit` 1..=1000, `skip` >= 0).
pub fn pagination(limit: Option<i64>, skip: Option<i64>) -> Result<Pagination> {
    let limit = limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ValidationError(format!(
            "limit must be between 1 and {}",
            MAX_LIMIT
        )));
    }

    let skip = skip.unwrap_or(0);
    if skip < 0 {
        return Err(ValidationError("skip must not be negative".to_string()));
    }

    Ok(Pagination { limit, skip })
}

/// Query-string flags are on only for the literal `"true"`.
pub fn flag(value: Option<&str>) -> bool {
    value == Some("true")
}

/// Fails with every missing field named, in the order given.
pub fn require_fields(fields: &[(&str, bool)]) -> Result<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, present)| !present)
        .map(|(name, _)| *name)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError(format!(
            "Missing required fields: {}",
            missing.join(", ")
        )))
    }
}

/// Returns the trimmed value when it is present and not blank.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Trims and lowercases an email address after a basic shape check.
pub fn normalize_email(email: &str) -> Result<String> {
    let email = email.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.contains(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(ValidationError(format!("Invalid email address: {}", email)))
    }
}

/// Accepts a three-letter currency code in any case and returns it uppercase.
pub fn normalize_currency(currency: &str) -> Result<String> {
    let code = currency.trim();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code.to_ascii_uppercase())
    } else {
        Err(ValidationError(format!(
            "Invalid currency code: {}",
            currency
        )))
    }
}

pub fn positive_amount(field: &str, amount: f64) -> Result<f64> {
    if amount.is_finite() && amount > 0.0 {
        Ok(amount)
    } else {
        Err(ValidationError(format!("{} must be greater than 0", field)))
    }
}

pub fn non_negative_amount(field: &str, amount: f64) -> Result<f64> {
    if amount.is_finite() && amount >= 0.0 {
        Ok(amount)
    } else {
        Err(ValidationError(format!("{} must not be negative", field)))
    }
}

pub fn risk_score(score: i32) -> Result<i32> {
    if (0..=100).contains(&score) {
        Ok(score)
    } else {
        Err(ValidationError(
            "risk_score must be between 0 and 100".to_string(),
        ))
    }
}

/// Brings a confidence value onto the stored 0–1 scale.
///
/// Producers send either a fraction (`0.3`) or a percentage (`30`). Anything
/// above 1 is read as a percentage. Values outside 0–100 are rejected.
pub fn normalize_confidence(field: &str, confidence: f64) -> Result<f64> {
    if !confidence.is_finite() || !(0.0..=100.0).contains(&confidence) {
        return Err(ValidationError(format!(
            "{} must be between 0 and 1 (or 0 and 100 as a percentage)",
            field
        )));
    }

    if confidence > 1.0 {
        Ok(confidence / 100.0)
    } else {
        Ok(confidence)
    }
}

/// Parses an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
///
/// A bare date resolves to the start of that day, or to its last microsecond
/// when `end_of_day` is set, so that an end date includes the whole day.
pub fn parse_date(field: &str, value: &str, end_of_day: bool) -> Result<DateTime<Utc>> {
    let value = value.trim();

    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        ValidationError(format!(
            "Invalid {}: expected RFC 3339 timestamp or YYYY-MM-DD",
            field
        ))
    })?;

    let time = if end_of_day {
        NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999)
    } else {
        NaiveTime::from_hms_opt(0, 0, 0)
    }
    .ok_or_else(|| ValidationError(format!("Invalid {}", field)))?;

    Ok(date.and_time(time).and_utc())
}

/// Drops sub-microsecond digits from a client timestamp. Postgres stores
/// microseconds, so a created row echoes back exactly what was read later.
pub fn stored_precision(ts: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    ts.map(|ts| ts.trunc_subsecs(6))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_stored_precision_truncates_nanoseconds() {
        let ts = DateTime::parse_from_rfc3339("2024-03-01T10:00:05.123456789Z")
            .unwrap()
            .with_timezone(&Utc);
        let stored = stored_precision(Some(ts)).unwrap();
        assert_eq!(stored.nanosecond(), 123_456_000);
        assert_eq!(stored.to_rfc3339(), "2024-03-01T10:00:05.123456+00:00");

        let whole = DateTime::parse_from_rfc3339("2024-03-01T10:00:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(stored_precision(Some(whole)), Some(whole));
        assert_eq!(stored_precision(None), None);
    }

    #[test]
    fn test_pagination_defaults() {
        assert_eq!(
            pagination(None, None).unwrap(),
            Pagination {
                limit: 100,
                skip: 0
            }
        );
    }

    #[test]
    fn test_pagination_bounds() {
        assert!(pagination(Some(1), Some(0)).is_ok());
        assert!(pagination(Some(1000), Some(5)).is_ok());
        assert!(pagination(Some(0), None).is_err());
        assert!(pagination(Some(1001), None).is_err());
        assert!(pagination(None, Some(-1)).is_err());
    }

    #[test]
    fn test_flag_requires_literal_true() {
        assert!(flag(Some("true")));
        assert!(!flag(Some("TRUE")));
        assert!(!flag(Some("1")));
        assert!(!flag(None));
    }

    #[test]
    fn test_require_fields_lists_all_missing() {
        let err = require_fields(&[("email", true), ("name", false), ("phone", false)])
            .unwrap_err();
        assert_eq!(err.0, "Missing required fields: name, phone");
        assert!(require_fields(&[("email", true)]).is_ok());
    }

    #[test]
    fn test_non_blank() {
        assert_eq!(non_blank(Some("  a ".to_string())), Some("a".to_string()));
        assert_eq!(non_blank(Some("   ".to_string())), None);
        assert_eq!(non_blank(None), None);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(
            normalize_email(" Alice@Example.COM ").unwrap(),
            "alice@example.com"
        );
        assert!(normalize_email("alice").is_err());
        assert!(normalize_email("@example.com").is_err());
        assert!(normalize_email("alice@example").is_err());
        assert!(normalize_email("al ice@example.com").is_err());
    }

    #[test]
    fn test_normalize_currency() {
        assert_eq!(normalize_currency("usd").unwrap(), "USD");
        assert_eq!(normalize_currency(" Eur ").unwrap(), "EUR");
        assert!(normalize_currency("US").is_err());
        assert!(normalize_currency("U5D").is_err());
    }

    #[test]
    fn test_amount_checks() {
        assert!(positive_amount("amount", 0.01).is_ok());
        assert!(positive_amount("amount", 0.0).is_err());
        assert!(positive_amount("amount", f64::NAN).is_err());
        assert!(non_negative_amount("price_amount", 0.0).is_ok());
        assert!(non_negative_amount("price_amount", -1.0).is_err());
    }

    #[test]
    fn test_risk_score_range() {
        assert_eq!(risk_score(0).unwrap(), 0);
        assert_eq!(risk_score(100).unwrap(), 100);
        assert!(risk_score(101).is_err());
        assert!(risk_score(-1).is_err());
    }

    #[test]
    fn test_normalize_confidence_units() {
        assert_eq!(normalize_confidence("confidence", 0.3).unwrap(), 0.3);
        assert_eq!(normalize_confidence("confidence", 1.0).unwrap(), 1.0);
        assert_eq!(normalize_confidence("confidence", 30.0).unwrap(), 0.3);
        assert_eq!(normalize_confidence("confidence", 100.0).unwrap(), 1.0);
        assert!(normalize_confidence("confidence", -0.1).is_err());
        assert!(normalize_confidence("confidence", 150.0).is_err());
    }

    #[test]
    fn test_parse_date_formats() {
        let ts = parse_date("startDate", "2024-03-01T10:30:00Z", false).unwrap();
        assert_eq!(ts.hour(), 10);

        let start = parse_date("startDate", "2024-03-01", false).unwrap();
        assert_eq!((start.day(), start.hour()), (1, 0));

        let end = parse_date("endDate", "2024-03-01", true).unwrap();
        assert_eq!((end.day(), end.hour(), end.minute()), (1, 23, 59));

        let err = parse_date("endDate", "yesterday", true).unwrap_err();
        assert!(err.0.contains("endDate"));
    }
}

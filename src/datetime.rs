//! Date-string alignment for DATE predicate preprocessing
//!
//! Callers send dates as strings, either `yyyy-MM-dd` or
//! `yyyy-MM-dd HH:mm:ss`. Alignment fills the missing time-of-day with the
//! begin (`00:00:00`) or end (`23:59:59`) of the day; with `override_time`
//! set, an explicitly supplied time is replaced as well. The work happens at
//! the string level; values pass straight back into predicates, so there is
//! no reason to round-trip through a datetime object.

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::error::{MappingError, Result};

/// Interchange format for datetime strings
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Interchange format for date-only strings
pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub const TIME_DAY_BEGIN: &str = "00:00:00";
pub const TIME_DAY_END: &str = "23:59:59";

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));
static DATETIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d{4}-\d{2}-\d{2})[ T](\d{2}:\d{2}:\d{2})$").expect("valid datetime regex")
});

/// The epoch datetime, the conventional "never deleted" marker
pub fn epoch_datetime() -> NaiveDateTime {
    NaiveDateTime::new(
        NaiveDate::from_ymd_opt(1970, 1, 1).expect("valid epoch date"),
        NaiveTime::MIN,
    )
}

/// Format a datetime in the interchange format
pub fn format_datetime(datetime: NaiveDateTime) -> String {
    datetime.format(DATETIME_FORMAT).to_string()
}

/// Parse an interchange string of either accepted shape
pub fn parse(text: &str) -> Result<NaiveDateTime> {
    if let Some(captures) = DATETIME_RE.captures(text) {
        let normalized = format!("{} {}", &captures[1], &captures[2]);
        return NaiveDateTime::parse_from_str(&normalized, DATETIME_FORMAT)
            .map_err(|e| MappingError::invalid_predicate(format!("bad datetime '{}': {}", text, e)));
    }
    if DATE_RE.is_match(text) {
        let date = NaiveDate::parse_from_str(text, DATE_FORMAT)
            .map_err(|e| MappingError::invalid_predicate(format!("bad date '{}': {}", text, e)))?;
        return Ok(NaiveDateTime::new(date, NaiveTime::MIN));
    }
    Err(MappingError::invalid_predicate(format!(
        "date value '{}' must be yyyy-MM-dd or yyyy-MM-dd HH:mm:ss",
        text
    )))
}

fn align(text: &str, padding: &str, override_time: bool) -> Result<String> {
    if let Some(captures) = DATETIME_RE.captures(text) {
        let (date_part, time_part) = (&captures[1], &captures[2]);
        validate_date(date_part)?;
        if override_time {
            return Ok(format!("{} {}", date_part, padding));
        }
        return Ok(format!("{} {}", date_part, time_part));
    }
    if DATE_RE.is_match(text) {
        validate_date(text)?;
        return Ok(format!("{} {}", text, padding));
    }
    Err(MappingError::invalid_predicate(format!(
        "date value '{}' must be yyyy-MM-dd or yyyy-MM-dd HH:mm:ss",
        text
    )))
}

fn validate_date(text: &str) -> Result<()> {
    NaiveDate::parse_from_str(text, DATE_FORMAT)
        .map(|_| ())
        .map_err(|e| MappingError::invalid_predicate(format!("bad date '{}': {}", text, e)))
}

/// Align a date string to the begin of its day
pub fn align_to_begin(text: &str, override_time: bool) -> Result<String> {
    align(text, TIME_DAY_BEGIN, override_time)
}

/// Align a date string to the end of its day
pub fn align_to_end(text: &str, override_time: bool) -> Result<String> {
    align(text, TIME_DAY_END, override_time)
}

/// Align one date string to both bounds of its day
pub fn align_to_begin_and_end(text: &str, override_time: bool) -> Result<(String, String)> {
    Ok((
        align_to_begin(text, override_time)?,
        align_to_end(text, override_time)?,
    ))
}

/// First instant of the datetime's day
pub fn day_begin(datetime: NaiveDateTime) -> NaiveDateTime {
    NaiveDateTime::new(datetime.date(), NaiveTime::MIN)
}

/// Last whole second of the datetime's day
pub fn day_end(datetime: NaiveDateTime) -> NaiveDateTime {
    NaiveDateTime::new(
        datetime.date(),
        NaiveTime::from_hms_opt(23, 59, 59).expect("valid end-of-day time"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Alignment Tests
    // =========================================================================

    #[test]
    fn test_align_date_only_to_begin() {
        assert_eq!(
            align_to_begin("2024-01-01", false).unwrap(),
            "2024-01-01 00:00:00"
        );
    }

    #[test]
    fn test_align_date_only_to_end() {
        assert_eq!(
            align_to_end("2024-01-01", false).unwrap(),
            "2024-01-01 23:59:59"
        );
    }

    #[test]
    fn test_align_keeps_explicit_time_without_override() {
        assert_eq!(
            align_to_begin("2024-01-02 10:00:00", false).unwrap(),
            "2024-01-02 10:00:00"
        );
        assert_eq!(
            align_to_end("2024-01-02 10:00:00", false).unwrap(),
            "2024-01-02 10:00:00"
        );
    }

    #[test]
    fn test_align_override_replaces_explicit_time() {
        assert_eq!(
            align_to_begin("2024-01-02 10:00:00", true).unwrap(),
            "2024-01-02 00:00:00"
        );
        assert_eq!(
            align_to_end("2024-01-02 10:00:00", true).unwrap(),
            "2024-01-02 23:59:59"
        );
    }

    #[test]
    fn test_align_accepts_iso_t_separator() {
        assert_eq!(
            align_to_end("2024-01-02T10:00:00", false).unwrap(),
            "2024-01-02 10:00:00"
        );
    }

    #[test]
    fn test_align_both_bounds() {
        let (begin, end) = align_to_begin_and_end("2024-01-01", true).unwrap();
        assert_eq!(begin, "2024-01-01 00:00:00");
        assert_eq!(end, "2024-01-01 23:59:59");
    }

    #[test]
    fn test_align_rejects_garbage() {
        assert!(align_to_begin("yesterday", false).is_err());
        assert!(align_to_begin("2024/01/01", false).is_err());
        assert!(align_to_begin("2024-13-40", false).is_err());
    }

    // =========================================================================
    // Parse / Format Tests
    // =========================================================================

    #[test]
    fn test_parse_date_only() {
        let parsed = parse("2024-06-15").unwrap();
        assert_eq!(format_datetime(parsed), "2024-06-15 00:00:00");
    }

    #[test]
    fn test_parse_datetime() {
        let parsed = parse("2024-06-15 08:30:00").unwrap();
        assert_eq!(format_datetime(parsed), "2024-06-15 08:30:00");
    }

    #[test]
    fn test_epoch() {
        assert_eq!(format_datetime(epoch_datetime()), "1970-01-01 00:00:00");
    }

    #[test]
    fn test_day_bounds() {
        let noon = parse("2024-06-15 12:00:00").unwrap();
        assert_eq!(format_datetime(day_begin(noon)), "2024-06-15 00:00:00");
        assert_eq!(format_datetime(day_end(noon)), "2024-06-15 23:59:59");
    }
}

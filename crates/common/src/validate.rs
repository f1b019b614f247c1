//! Race-window validation, used by the CRUD layer before touching storage.

use chrono::{DateTime, Datelike, NaiveDateTime, TimeZone, Timelike, Utc, Weekday};

use crate::config::ValidationConfig;
use crate::error::Error;
use crate::Result;

/// Accepted timestamp shapes besides RFC 3339. Naive values are read as UTC.
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"];

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    None
}

/// Validate a proposed race window.
///
/// Checks, in order: all five fields non-empty, both timestamps parseable,
/// neither in the past, `start != end`, `start < end`, then whatever optional
/// rules the deployment enabled. Returns the parsed pair on success.
///
/// # Errors
/// `Error::Validation` with a human-readable reason for the first failed check.
pub fn validate(
    name: &str,
    lat: &str,
    lon: &str,
    start: &str,
    end: &str,
    rules: &ValidationConfig,
) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    if name.is_empty() || lat.is_empty() || lon.is_empty() || start.is_empty() || end.is_empty() {
        return Err(Error::Validation("all fields must be provided".into()));
    }

    let (Some(start), Some(end)) = (parse_timestamp(start), parse_timestamp(end)) else {
        return Err(Error::Validation("race times are not valid timestamps".into()));
    };

    let now = Utc::now();
    if start < now || end < now {
        return Err(Error::Validation("a race cannot take place in the past".into()));
    }
    if start == end {
        return Err(Error::Validation(
            "a race cannot start and end at the same time".into(),
        ));
    }
    if start > end {
        return Err(Error::Validation("a race cannot end before it starts".into()));
    }

    if rules.enforce_weekend_only {
        if start.date_naive() != end.date_naive() {
            return Err(Error::Validation(
                "a race must start and end on the same day".into(),
            ));
        }
        if !matches!(start.weekday(), Weekday::Sat | Weekday::Sun) {
            return Err(Error::Validation("a race must take place on a weekend".into()));
        }
    }

    if rules.enforce_business_hours
        && (!(9..=18).contains(&start.hour()) || !(9..=18).contains(&end.hour()))
    {
        return Err(Error::Validation(
            "a race must take place between 09:00 and 18:59".into(),
        ));
    }

    Ok((start, end))
}

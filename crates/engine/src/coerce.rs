//! Best-effort casting of numeric- and date-like values.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use trustgrid_core::FieldValue;

/// Outcome of a coercion attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// Nothing to coerce.
    Missing,
    /// Canonical representation.
    Value(FieldValue),
    /// Could not be cast; the raw value stays as-is.
    Failed,
}

const DATE_FORMATS: [&str; 6] = [
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%B %d, %Y",
    "%d %B %Y",
    "%b %d, %Y",
];

const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

/// Integers stay integers; decimal text becomes a float. Currency symbols,
/// thousands separators and inner whitespace are ignored.
pub fn to_number(value: &FieldValue) -> Coerced {
    match value {
        v if v.is_missing() => Coerced::Missing,
        FieldValue::Int(_) | FieldValue::Float(_) => Coerced::Value(value.clone()),
        FieldValue::Text(s) => parse_number(s).map(Coerced::Value).unwrap_or(Coerced::Failed),
        _ => Coerced::Failed,
    }
}

fn parse_number(s: &str) -> Option<FieldValue> {
    let cleaned: String = s
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(n) = cleaned.parse::<i64>() {
        return Some(FieldValue::Int(n));
    }
    match cleaned.parse::<f64>() {
        Ok(x) if x.is_finite() => Some(FieldValue::Float(x)),
        _ => None,
    }
}

/// Date text in any accepted format, or a Unix timestamp in seconds or
/// milliseconds, becomes a calendar date (UTC).
pub fn to_date(value: &FieldValue) -> Coerced {
    let date = match value {
        v if v.is_missing() => return Coerced::Missing,
        FieldValue::Date(d) => Some(*d),
        FieldValue::Int(n) => from_epoch(*n),
        FieldValue::Text(s) => parse_date(s).or_else(|| s.trim().parse::<i64>().ok().and_then(from_epoch)),
        _ => None,
    };
    date.map(|d| Coerced::Value(FieldValue::Date(d))).unwrap_or(Coerced::Failed)
}

// Seconds from 1973 up to year 5138; larger magnitudes are milliseconds.
const EPOCH_SECS: std::ops::Range<i64> = 100_000_000..100_000_000_000;
const EPOCH_MILLIS: std::ops::Range<i64> = 100_000_000_000..100_000_000_000_000;

fn from_epoch(n: i64) -> Option<NaiveDate> {
    let at = if EPOCH_SECS.contains(&n) {
        DateTime::from_timestamp(n, 0)
    } else if EPOCH_MILLIS.contains(&n) {
        DateTime::from_timestamp_millis(n)
    } else {
        None
    };
    at.map(|dt| dt.date_naive())
}

pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d);
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc().date());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.date());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> FieldValue {
        FieldValue::Date(NaiveDate::from_ymd_opt(y, m, day).unwrap())
    }

    #[test]
    fn numbers() {
        assert_eq!(to_number(&FieldValue::text("$250,000")), Coerced::Value(FieldValue::Int(250000)));
        assert_eq!(to_number(&FieldValue::text(" 1 200.50 ")), Coerced::Value(FieldValue::Float(1200.5)));
        assert_eq!(to_number(&FieldValue::text("€-3")), Coerced::Value(FieldValue::Int(-3)));
        assert_eq!(to_number(&FieldValue::Int(4)), Coerced::Value(FieldValue::Int(4)));
        assert_eq!(to_number(&FieldValue::text("call agent")), Coerced::Failed);
        assert_eq!(to_number(&FieldValue::text("NaN")), Coerced::Failed);
        assert_eq!(to_number(&FieldValue::Bool(true)), Coerced::Failed);
        assert_eq!(to_number(&FieldValue::text("  ")), Coerced::Missing);
        assert_eq!(to_number(&FieldValue::Null), Coerced::Missing);
    }

    #[test]
    fn dates() {
        assert_eq!(to_date(&FieldValue::text("2026-01-04")), Coerced::Value(d(2026, 1, 4)));
        assert_eq!(to_date(&FieldValue::text("2026/01/04")), Coerced::Value(d(2026, 1, 4)));
        assert_eq!(to_date(&FieldValue::text("01/04/2026")), Coerced::Value(d(2026, 1, 4)));
        assert_eq!(to_date(&FieldValue::text("January 4, 2026")), Coerced::Value(d(2026, 1, 4)));
        assert_eq!(to_date(&FieldValue::text("4 January 2026")), Coerced::Value(d(2026, 1, 4)));
        assert_eq!(to_date(&FieldValue::text("2026-01-04T23:30:00-05:00")), Coerced::Value(d(2026, 1, 5)));
        assert_eq!(to_date(&FieldValue::text("2026-01-04 08:15:00")), Coerced::Value(d(2026, 1, 4)));
        assert_eq!(to_date(&FieldValue::text("2026-02-30")), Coerced::Failed);
        assert_eq!(to_date(&FieldValue::Int(20260104)), Coerced::Failed);
    }

    #[test]
    fn epoch_timestamps() {
        // 2026-01-01T00:00:00Z
        assert_eq!(to_date(&FieldValue::Int(1_767_225_600)), Coerced::Value(d(2026, 1, 1)));
        assert_eq!(to_date(&FieldValue::Int(1_767_225_600_000)), Coerced::Value(d(2026, 1, 1)));
        assert_eq!(to_date(&FieldValue::text("1767225600")), Coerced::Value(d(2026, 1, 1)));
        // too small to be a plausible timestamp
        assert_eq!(to_date(&FieldValue::Int(42)), Coerced::Failed);
        assert_eq!(to_date(&FieldValue::text("20260104")), Coerced::Failed);
    }

    #[test]
    fn coercion_is_stable() {
        let Coerced::Value(v) = to_number(&FieldValue::text("$1,000")) else {
            panic!("expected a value");
        };
        assert_eq!(to_number(&v), Coerced::Value(v.clone()));
        let Coerced::Value(d) = to_date(&FieldValue::text("March 1, 2026")) else {
            panic!("expected a date");
        };
        assert_eq!(to_date(&d), Coerced::Value(d.clone()));
    }
}

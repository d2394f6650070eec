//! C2 — timestamp parser. §4.2.
//!
//! Grounded on `original_source/services/python-ai/app/ingestion/normalizer.py`
//! `_parse_timestamp`: integer/float epoch seconds, all-digit epoch strings,
//! or ISO-8601 (`Z` → `+00:00`, naive assumed UTC).

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

/// Parse an upstream timestamp value into a UTC instant. Returns `None` on
/// anything unparseable rather than erroring — callers treat an absent
/// timestamp as a normalization failure only when it was a *required* field.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Utc.timestamp_opt(i, 0).single()
            } else {
                n.as_f64().and_then(|f| Utc.timestamp_opt(f as i64, 0).single())
            }
        }
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

/// As `parse_timestamp`, but from an already-extracted string (the common
/// case for `datetime`/`published_at` fields pulled out of a payload map).
pub fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.chars().all(|c| c.is_ascii_digit()) {
        return trimmed
            .parse::<i64>()
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
    }

    let normalized = if let Some(stripped) = trimmed.strip_suffix('Z') {
        format!("{stripped}+00:00")
    } else {
        trimmed.to_string()
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }

    // Naive datetime (no offset) — assumed UTC.
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_integer_epoch() {
        let dt = parse_timestamp(&json!(1700000000)).unwrap();
        assert_eq!(dt.timestamp(), 1700000000);
    }

    #[test]
    fn parses_float_epoch() {
        let dt = parse_timestamp(&json!(1700000000.0)).unwrap();
        assert_eq!(dt.timestamp(), 1700000000);
    }

    #[test]
    fn parses_all_digit_string_epoch() {
        let dt = parse_timestamp(&json!("1700000000")).unwrap();
        assert_eq!(dt.timestamp(), 1700000000);
    }

    #[test]
    fn parses_iso8601_with_trailing_z() {
        let dt = parse_timestamp(&json!("2023-11-14T22:13:20Z")).unwrap();
        assert_eq!(dt.timestamp(), 1700000000);
    }

    #[test]
    fn parses_naive_iso8601_as_utc() {
        let dt = parse_timestamp_str("2023-11-14T22:13:20").unwrap();
        assert_eq!(dt.timestamp(), 1700000000);
    }

    #[test]
    fn unparseable_returns_none() {
        assert!(parse_timestamp(&json!("not a date")).is_none());
        assert!(parse_timestamp(&Value::Null).is_none());
    }
}

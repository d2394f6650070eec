//! Window selection, §4.7 step 3.
//!
//! Grounded on `original_source/.../ingestion/run.py::main` window math: the
//! upstream API only understands date-range granularity, and its dates are
//! read in New York local time regardless of where this process runs.

use chrono::{DateTime, Duration, Utc};
use chrono_tz::America::New_York;
use chrono_tz::Tz;

pub struct IngestionWindow {
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub date_from: String,
    pub date_to: String,
}

/// `window_end = now`; `window_start = now - minutes_back`. Returns the
/// window as UTC instants plus the NYC-local calendar dates the upstream
/// date-range query should use.
pub fn compute_window(now_utc: DateTime<Utc>, minutes_back: i64) -> IngestionWindow {
    let window_end = now_utc;
    let window_start = now_utc - Duration::minutes(minutes_back);

    let tz: Tz = New_York;
    let start_local = window_start.with_timezone(&tz);
    let end_local = now_utc.with_timezone(&tz);

    IngestionWindow {
        window_start,
        window_end,
        date_from: start_local.date_naive().to_string(),
        date_to: end_local.date_naive().to_string(),
    }
}

/// The NYC-local calendar date for rate-shaping's daily bucket key.
pub fn local_date_key(instant: DateTime<Utc>) -> String {
    let tz: Tz = New_York;
    instant.with_timezone(&tz).date_naive().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_spans_minutes_back() {
        let now: DateTime<Utc> = "2026-01-15T14:30:00Z".parse().unwrap();
        let w = compute_window(now, 60);
        assert_eq!(w.window_end, now);
        assert_eq!(w.window_start, now - Duration::minutes(60));
    }

    #[test]
    fn dates_are_nyc_local_not_utc() {
        // 2026-01-15T02:30:00Z is still 2026-01-14 evening in New York (EST, UTC-5).
        let now: DateTime<Utc> = "2026-01-15T02:30:00Z".parse().unwrap();
        let w = compute_window(now, 60);
        assert_eq!(w.date_to, "2026-01-14");
    }
}

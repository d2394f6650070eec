//! Rate shaping, §4.7 step 6.
//!
//! Grounded on `original_source/.../ingestion/run.py` `_rank_items` /
//! `_limit_items_per_day`: rank newest-first, cap per local calendar date,
//! then cap the remaining count per run.

use crate::window::local_date_key;
use chrono::{DateTime, Utc};
use serde_json::Value;

fn item_timestamp(item: &Value) -> Option<DateTime<Utc>> {
    item.get("datetime")
        .or_else(|| item.get("published_at"))
        .and_then(news_core::parse_timestamp)
}

/// Sort newest-first; items with no parseable timestamp sort last.
pub fn rank_items(items: Vec<Value>) -> Vec<(Option<DateTime<Utc>>, Value)> {
    let mut ranked: Vec<(Option<DateTime<Utc>>, Value)> =
        items.into_iter().map(|item| (item_timestamp(&item), item)).collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked
}

pub struct DailyLimitOutcome {
    pub kept: Vec<Value>,
    pub dropped: usize,
}

/// Keep at most `limit` items per NYC-local calendar date. `limit <= 0`
/// disables the cap entirely.
pub fn limit_items_per_day(ranked: &[(Option<DateTime<Utc>>, Value)], limit: i64) -> DailyLimitOutcome {
    if limit <= 0 {
        return DailyLimitOutcome { kept: ranked.iter().map(|(_, v)| v.clone()).collect(), dropped: 0 };
    }

    let mut counts: std::collections::HashMap<String, i64> = std::collections::HashMap::new();
    let mut kept = Vec::new();
    for (published_at, item) in ranked {
        let date_key = published_at.map(local_date_key).unwrap_or_else(|| "unknown".to_string());
        let count = counts.entry(date_key).or_insert(0);
        if *count >= limit {
            continue;
        }
        *count += 1;
        kept.push(item.clone());
    }
    let dropped = ranked.len() - kept.len();
    DailyLimitOutcome { kept, dropped }
}

pub struct PerRunLimitOutcome {
    pub kept: Vec<Value>,
    pub dropped: usize,
}

/// Keep the first `limit` items (already daily-capped and newest-first).
/// `limit <= 0` disables the cap.
pub fn limit_items_per_run(items: Vec<Value>, limit: i64) -> PerRunLimitOutcome {
    if limit <= 0 || (items.len() as i64) <= limit {
        return PerRunLimitOutcome { kept: items, dropped: 0 };
    }
    let limit = limit as usize;
    let dropped = items.len() - limit;
    let kept = items.into_iter().take(limit).collect();
    PerRunLimitOutcome { kept, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ranks_newest_first() {
        let items = vec![json!({"datetime": 100}), json!({"datetime": 300}), json!({"datetime": 200})];
        let ranked = rank_items(items);
        let stamps: Vec<i64> = ranked.iter().map(|(ts, _)| ts.unwrap().timestamp()).collect();
        assert_eq!(stamps, vec![300, 200, 100]);
    }

    #[test]
    fn daily_cap_keeps_newest_n_per_date() {
        let day1 = 1_700_000_000i64; // fixed reference instant
        let items = vec![
            json!({"datetime": day1}),
            json!({"datetime": day1 + 60}),
            json!({"datetime": day1 + 120}),
        ];
        let ranked = rank_items(items);
        let outcome = limit_items_per_day(&ranked, 2);
        assert_eq!(outcome.kept.len(), 2);
        assert_eq!(outcome.dropped, 1);
    }

    #[test]
    fn zero_limit_disables_daily_cap() {
        let items = vec![json!({"datetime": 1}), json!({"datetime": 2})];
        let ranked = rank_items(items);
        let outcome = limit_items_per_day(&ranked, 0);
        assert_eq!(outcome.kept.len(), 2);
        assert_eq!(outcome.dropped, 0);
    }

    #[test]
    fn per_run_cap_keeps_first_n() {
        let items = vec![json!(1), json!(2), json!(3)];
        let outcome = limit_items_per_run(items, 2);
        assert_eq!(outcome.kept, vec![json!(1), json!(2)]);
        assert_eq!(outcome.dropped, 1);
    }
}

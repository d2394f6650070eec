//! C3 — news normalizer. §4.3.
//!
//! Grounded on `original_source/services/python-ai/app/ingestion/normalizer.py`.
//! Upstream payloads flow in as an opaque JSON object; every field this
//! module needs is extracted here, once, into a typed `NewNewsEvent` — see
//! `SPEC_FULL.md` §9 on boundary types.

use chrono::{DateTime, Utc};
use news_schemas::NewNewsEvent;
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::timestamp::{parse_timestamp, parse_timestamp_str};
use crate::url_canon::{canonicalize_url, news_id};

pub const DEFAULT_SOURCE: &str = "finnhub";

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] anyhow::Error),
}

fn str_field<'a>(payload: &'a Value, key: &str) -> Option<&'a str> {
    payload.get(key).and_then(Value::as_str)
}

fn first_str_field<'a>(payload: &'a Value, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|k| str_field(payload, k))
}

/// `dedup_preserve_order(uppercase(trim(x)) for x in related.split(','))`,
/// empties removed — the exact shape of
/// `_parse_related`/`_dedupe_preserve` in the reference normalizer.
pub fn parse_related_tickers(related: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for raw in related.split(',') {
        let t = raw.trim().to_ascii_uppercase();
        if t.is_empty() {
            continue;
        }
        if seen.insert(t.clone()) {
            out.push(t);
        }
    }
    out
}

/// Normalize one upstream payload into a `NewNewsEvent`.
///
/// `request_ticker` is the symbol this item was fetched under (if the
/// orchestrator is iterating per-ticker); it is carried through onto the
/// event unchanged.
pub fn normalize(
    payload: &Value,
    trace_id: Uuid,
    ingested_at: DateTime<Utc>,
    request_ticker: Option<&str>,
) -> Result<NewNewsEvent, NewsError> {
    let url = str_field(payload, "url").ok_or(NewsError::MissingField("url"))?;
    let title =
        first_str_field(payload, &["headline", "title"]).ok_or(NewsError::MissingField("headline|title"))?;

    let published_at = payload
        .get("datetime")
        .and_then(parse_timestamp)
        .or_else(|| str_field(payload, "published_at").and_then(parse_timestamp_str))
        .ok_or(NewsError::MissingField("datetime|published_at"))?;

    let canonical_url = canonicalize_url(url)?;
    let source = first_str_field(payload, &["source"])
        .unwrap_or(DEFAULT_SOURCE)
        .to_string();

    let content = first_str_field(payload, &["summary", "content"])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    let tickers = first_str_field(payload, &["related"])
        .map(parse_related_tickers)
        .unwrap_or_default();

    let id = news_id(&source, &canonical_url);

    Ok(NewNewsEvent {
        news_id: id,
        trace_id,
        source,
        request_ticker: request_ticker.map(str::to_string),
        published_at,
        ingested_at,
        title: title.to_string(),
        url: canonical_url,
        content,
        tickers,
        raw_payload: payload.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts() -> (Uuid, DateTime<Utc>) {
        (Uuid::nil(), Utc::now())
    }

    #[test]
    fn happy_path_normalizes_all_fields() {
        let (trace, ingested) = ts();
        let payload = json!({
            "headline": "A",
            "url": "https://x.com/a?utm_source=z",
            "datetime": 1700000000,
            "related": "AAPL,MSFT",
        });
        let ev = normalize(&payload, trace, ingested, Some("AAPL")).unwrap();
        assert_eq!(ev.url, "https://x.com/a");
        assert_eq!(ev.tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(ev.title, "A");
        assert_eq!(ev.request_ticker.as_deref(), Some("AAPL"));
    }

    #[test]
    fn missing_url_is_normalization_error() {
        let (trace, ingested) = ts();
        let payload = json!({"headline": "A", "datetime": 1700000000});
        assert!(matches!(
            normalize(&payload, trace, ingested, None),
            Err(NewsError::MissingField("url"))
        ));
    }

    #[test]
    fn missing_headline_is_normalization_error() {
        let (trace, ingested) = ts();
        let payload = json!({"url": "https://x.com/a", "datetime": 1700000000});
        assert!(matches!(
            normalize(&payload, trace, ingested, None),
            Err(NewsError::MissingField(_))
        ));
    }

    #[test]
    fn missing_timestamp_is_normalization_error() {
        let (trace, ingested) = ts();
        let payload = json!({"url": "https://x.com/a", "headline": "A"});
        assert!(matches!(
            normalize(&payload, trace, ingested, None),
            Err(NewsError::MissingField(_))
        ));
    }

    #[test]
    fn related_dedupes_preserving_order_and_drops_empties() {
        let out = parse_related_tickers(" aapl, AAPL ,,msft,AAPL");
        assert_eq!(out, vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn default_source_used_when_absent() {
        let (trace, ingested) = ts();
        let payload = json!({"headline": "A", "url": "https://x.com/a", "datetime": 1700000000});
        let ev = normalize(&payload, trace, ingested, None).unwrap();
        assert_eq!(ev.source, DEFAULT_SOURCE);
    }
}

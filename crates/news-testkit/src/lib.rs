//! Shared fixtures for the integration test suites of the other crates in
//! this workspace — a real Postgres connection, migrated and truncated
//! between tests, plus a handful of builders for the fixture rows the
//! scenarios in `SPEC_FULL.md` §8 exercise.

use chrono::{DateTime, Utc};
use news_schemas::FetchedItem;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

pub const ENV_TEST_DATABASE_URL: &str = "NEWS_TEST_DATABASE_URL";

/// Connect to the integration-test database and apply migrations. Panics
/// with a clear message if `NEWS_TEST_DATABASE_URL` is unset — integration
/// tests are expected to be skipped (not silently no-op) when no database is
/// available, matching the teacher's fixture contract.
pub async fn test_pool() -> PgPool {
    let url = std::env::var(ENV_TEST_DATABASE_URL)
        .unwrap_or_else(|_| panic!("{ENV_TEST_DATABASE_URL} must be set to run integration tests"));

    let pool = news_db::connect(&url).await.expect("connect to test database");
    news_db::migrate(&pool).await.expect("run migrations");
    truncate_all(&pool).await;
    pool
}

/// Wipe every table this workspace owns, in FK-safe order, so each test
/// starts from an empty schema rather than depending on execution order.
pub async fn truncate_all(pool: &PgPool) {
    sqlx::query(
        "truncate table analysis_tickers, llm_analyses, analysis_jobs, news_events, \
         raw_news_items, ingestion_runs, tickers restart identity cascade",
    )
    .execute(pool)
    .await
    .expect("truncate_all failed");
}

/// Build a minimal well-formed `FetchedItem` for raw-store tests.
pub fn fetched_item(url: &str, title: &str, published_at: DateTime<Utc>) -> FetchedItem {
    FetchedItem {
        published_at: Some(published_at),
        url: Some(url.to_string()),
        title: Some(title.to_string()),
        request_ticker: Some("AAPL".to_string()),
        raw_payload: json!({
            "headline": title,
            "url": url,
            "datetime": published_at.timestamp(),
            "related": "AAPL",
        }),
    }
}

/// Insert one `news_events` row directly and return its id, bypassing C3/C5
/// normalization — useful for C8/C9 tests that only need an event to exist.
pub async fn seed_news_event(pool: &PgPool, source: &str, url: &str) -> i64 {
    let news_id = news_core::news_id(source, url);
    let event = news_schemas::NewNewsEvent {
        news_id,
        trace_id: Uuid::new_v4(),
        source: source.to_string(),
        request_ticker: Some("AAPL".to_string()),
        published_at: Utc::now(),
        ingested_at: Utc::now(),
        title: "seeded event".to_string(),
        url: url.to_string(),
        content: None,
        tickers: vec!["AAPL".to_string()],
        raw_payload: json!({}),
    };
    let (id, _inserted) = news_db::upsert_news_event(pool, &event).await.expect("seed_news_event");
    id
}

/// A fixed instant for deterministic visibility-timeout and backoff
/// assertions, so tests never race real wall-clock time.
pub fn fixed_instant() -> DateTime<Utc> {
    "2026-01-15T14:30:00Z".parse().expect("valid fixed instant")
}

//! §8 end-to-end scenario 5 (concurrent ingestion / advisory-lock mutual
//! exclusion) plus a full happy-path run through a `FakeCompanyNewsSource`.

use news_config::IngestConfig;
use news_ingest::{FakeCompanyNewsSource, RunOptions, RunOutcome};
use news_testkit::test_pool;
use serde_json::json;
use std::collections::HashMap;

fn ingest_config() -> IngestConfig {
    IngestConfig {
        finnhub_token: Some("test-token".to_string()),
        latest_per_run_per_ticker: 10,
        daily_max_per_ticker: 100,
    }
}

fn database_url() -> String {
    std::env::var(news_testkit::ENV_TEST_DATABASE_URL).expect("NEWS_TEST_DATABASE_URL must be set")
}

#[tokio::test]
async fn happy_path_fetches_normalizes_and_enqueues() {
    let pool = test_pool().await;
    news_db::seed_tickers(&pool, &["AAPL".to_string()]).await.unwrap();

    let mut items_by_symbol = HashMap::new();
    items_by_symbol.insert(
        "AAPL".to_string(),
        Ok(vec![json!({
            "headline": "Apple posts record quarter",
            "url": "https://news.example.com/aapl?utm_source=z",
            "datetime": 1_700_000_000,
            "related": "AAPL",
            "source": "finnhub",
        })]),
    );
    let source = FakeCompanyNewsSource::new(items_by_symbol);

    let options = RunOptions {
        tickers: Some(vec!["AAPL".to_string()]),
        minutes_back: 60,
        process_limit: 200,
        replay_only: false,
    };

    let outcome = news_ingest::run(&pool, &database_url(), &source, &ingest_config(), options).await.unwrap();

    let run_id = match outcome {
        RunOutcome::Succeeded { run_id } => run_id,
        other => panic!("expected success, got {other:?}"),
    };

    let run = news_db::fetch_ingestion_run(&pool, run_id).await.unwrap();
    assert_eq!(run.status.as_str(), "succeeded");
    assert_eq!(run.inserted_count, 1);

    let event_id: i64 = sqlx::query_scalar("select id from news_events where url = $1")
        .bind("https://news.example.com/aapl")
        .fetch_one(&pool)
        .await
        .unwrap();
    let event = news_db::fetch_news_event(&pool, event_id).await.unwrap().expect("event should exist");
    assert_eq!(event.tickers, vec!["AAPL".to_string()]);
}

#[tokio::test]
async fn replay_only_skips_fetch_and_processes_existing_raw_rows() {
    let pool = test_pool().await;

    let item = news_testkit::fetched_item(
        "https://news.example.com/replay",
        "Replay headline",
        "2026-01-15T14:30:00Z".parse().unwrap(),
    );
    news_db::insert_raw_items(&pool, "finnhub", uuid::Uuid::new_v4(), chrono::Utc::now(), &[item])
        .await
        .unwrap();

    let source = FakeCompanyNewsSource::new(HashMap::new());
    let options = RunOptions { tickers: None, minutes_back: 60, process_limit: 200, replay_only: true };

    let outcome = news_ingest::run(&pool, &database_url(), &source, &ingest_config(), options).await.unwrap();

    match outcome {
        RunOutcome::Succeeded { run_id } => {
            let run = news_db::fetch_ingestion_run(&pool, run_id).await.unwrap();
            assert_eq!(run.status.as_str(), "succeeded");
            assert_eq!(run.inserted_count, 1);
        }
        other => panic!("expected success, got {other:?}"),
    }
}

#[tokio::test]
async fn concurrent_runs_only_one_writes_a_run_row() {
    let pool = test_pool().await;
    let url = database_url();
    let source = FakeCompanyNewsSource::new(HashMap::new());
    let options_for = || RunOptions { tickers: None, minutes_back: 60, process_limit: 200, replay_only: true };

    let held_lock = news_db::AdvisoryLock::try_acquire(&url, news_ingest::JOB_NAME)
        .await
        .unwrap()
        .expect("should acquire the lock first");

    let outcome = news_ingest::run(&pool, &url, &source, &ingest_config(), options_for()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::LockNotAcquired));

    let runs_before = sqlx::query_scalar::<_, i64>("select count(*) from ingestion_runs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(runs_before, 0);

    held_lock.release().await.unwrap();

    let outcome = news_ingest::run(&pool, &url, &source, &ingest_config(), options_for()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Succeeded { .. }));

    let runs_after = sqlx::query_scalar::<_, i64>("select count(*) from ingestion_runs")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(runs_after, 1);
}

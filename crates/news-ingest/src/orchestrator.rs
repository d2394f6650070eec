//! C7 — ingestion orchestrator. Single entry point `run(...)`, §4.7.
//!
//! Grounded step-for-step on
//! `original_source/services/python-ai/app/ingestion/run.py::main`.

use crate::finnhub::CompanyNewsSource;
use crate::provenance::{git_hash, host_fingerprint};
use crate::rate_shape::{limit_items_per_day, limit_items_per_run, rank_items};
use crate::window::compute_window;
use chrono::Utc;
use news_config::IngestConfig;
use news_db::{AdvisoryLock, NewIngestionRun};
use news_schemas::{FetchedItem, RunStatus, JOB_TYPE_LLM_ANALYSIS};
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

pub const JOB_NAME: &str = "finnhub_ingestion";

pub struct RunOptions {
    pub tickers: Option<Vec<String>>,
    pub minutes_back: i64,
    pub process_limit: i64,
    pub replay_only: bool,
}

#[derive(Debug)]
pub enum RunOutcome {
    LockNotAcquired,
    Succeeded { run_id: i64 },
    Failed { run_id: i64, error: String },
}

#[derive(Default)]
struct Counters {
    fetched: i64,
    raw_inserted: i64,
    raw_updated: i64,
    normalized_ok: i64,
    normalized_failed: i64,
    news_inserted: i64,
    news_upserts: i64,
    jobs_enqueued: i64,
    jobs_skipped: i64,
}

/// Run one ingestion pass to completion. `database_url` is used only to
/// acquire the dedicated advisory-lock connection (§4.7 step 1); `pool` is
/// used for every other statement.
pub async fn run(
    pool: &PgPool,
    database_url: &str,
    source: &dyn CompanyNewsSource,
    ingest_config: &IngestConfig,
    options: RunOptions,
) -> anyhow::Result<RunOutcome> {
    let trace_id = Uuid::new_v4();

    let Some(lock) = AdvisoryLock::try_acquire(database_url, JOB_NAME).await? else {
        info!(trace_id = %trace_id, "ingestion_lock_not_acquired");
        return Ok(RunOutcome::LockNotAcquired);
    };

    let result = run_locked(pool, source, ingest_config, &options, trace_id).await;
    lock.release().await?;
    result
}

async fn run_locked(
    pool: &PgPool,
    source: &dyn CompanyNewsSource,
    ingest_config: &IngestConfig,
    options: &RunOptions,
    trace_id: Uuid,
) -> anyhow::Result<RunOutcome> {
    let now_utc = Utc::now();
    let window = compute_window(now_utc, options.minutes_back);
    info!(trace_id = %trace_id, start = %window.window_start, end = %window.window_end, "finnhub_window");

    let requested: Option<Vec<String>> = options
        .tickers
        .as_ref()
        .map(|ts| ts.iter().map(|t| t.trim().to_ascii_uppercase()).filter(|t| !t.is_empty()).collect());

    let mut missing_tickers: Vec<String> = Vec::new();
    let tickers: Vec<String> = if !options.replay_only {
        let resolved = news_db::fetch_ticker_symbols(pool).await?;
        match &requested {
            Some(req) => {
                let resolved_set: std::collections::HashSet<&String> = resolved.iter().collect();
                for symbol in req {
                    if !resolved_set.contains(symbol) {
                        missing_tickers.push(symbol.clone());
                        warn!(trace_id = %trace_id, symbol = %symbol, "ticker_not_in_db");
                    }
                }
                req.iter().filter(|s| resolved_set.contains(s)).cloned().collect()
            }
            None => resolved,
        }
    } else {
        requested.clone().unwrap_or_default()
    };

    let run_id = news_db::insert_ingestion_run(
        pool,
        &NewIngestionRun {
            job_name: JOB_NAME.to_string(),
            trace_id,
            tickers: tickers.clone(),
            window_from: window.window_start,
            window_to: window.window_end,
        },
    )
    .await?;

    let mut counters = Counters::default();
    let mut skipped_tickers: Vec<Value> = Vec::new();

    if tickers.is_empty() && !options.replay_only {
        info!(trace_id = %trace_id, "no_tickers_found");
        finalize(pool, run_id, RunStatus::Succeeded, &counters, None, ingest_config, options, &missing_tickers, &skipped_tickers)
            .await?;
        return Ok(RunOutcome::Succeeded { run_id });
    }

    let outcome = do_ingest(pool, source, ingest_config, options, &tickers, trace_id, now_utc, &window, &mut counters, &mut skipped_tickers)
        .await;

    match outcome {
        Ok(()) => {
            finalize(pool, run_id, RunStatus::Succeeded, &counters, None, ingest_config, options, &missing_tickers, &skipped_tickers)
                .await?;
            Ok(RunOutcome::Succeeded { run_id })
        }
        Err(e) => {
            let error_message = e.to_string();
            finalize(
                pool,
                run_id,
                RunStatus::Failed,
                &counters,
                Some(&error_message),
                ingest_config,
                options,
                &missing_tickers,
                &skipped_tickers,
            )
            .await?;
            Ok(RunOutcome::Failed { run_id, error: error_message })
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn do_ingest(
    pool: &PgPool,
    source: &dyn CompanyNewsSource,
    ingest_config: &IngestConfig,
    options: &RunOptions,
    tickers: &[String],
    trace_id: Uuid,
    now_utc: chrono::DateTime<Utc>,
    window: &crate::window::IngestionWindow,
    counters: &mut Counters,
    skipped_tickers: &mut Vec<Value>,
) -> anyhow::Result<()> {
    if !options.replay_only {
        let mut raw_items: Vec<FetchedItem> = Vec::new();

        for symbol in tickers {
            let items = match source.fetch_company_news(symbol, &window.date_from, &window.date_to, trace_id).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(trace_id = %trace_id, ticker = %symbol, error = %e, "finnhub_fetch_failed");
                    skipped_tickers.push(json!({"ticker": symbol, "error": e.to_string()}));
                    continue;
                }
            };

            let ranked = rank_items(items);
            let daily = limit_items_per_day(&ranked, ingest_config.daily_max_per_ticker);
            if daily.dropped > 0 {
                info!(trace_id = %trace_id, ticker = %symbol, limit = ingest_config.daily_max_per_ticker, dropped = daily.dropped, "finnhub_daily_limit_applied");
            }
            let per_run = limit_items_per_run(daily.kept, ingest_config.latest_per_run_per_ticker);
            if per_run.dropped > 0 {
                info!(trace_id = %trace_id, ticker = %symbol, limit = ingest_config.latest_per_run_per_ticker, dropped = per_run.dropped, "finnhub_latest_limit_applied");
            }

            for mut item in per_run.kept {
                // The `request_ticker` column doesn't exist on `raw_news_items` — it
                // rides along inside `raw_payload` itself, same as the reference's
                // `enriched["request_ticker"] = symbol`, so normalization can recover
                // it after a `select_raw_items` round-trip.
                if let Some(obj) = item.as_object_mut() {
                    obj.insert("request_ticker".to_string(), json!(symbol));
                }
                raw_items.push(FetchedItem {
                    published_at: item.get("datetime").or_else(|| item.get("published_at")).and_then(news_core::parse_timestamp),
                    url: item.get("url").and_then(Value::as_str).map(str::to_string),
                    title: item
                        .get("headline")
                        .or_else(|| item.get("title"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    request_ticker: Some(symbol.clone()),
                    raw_payload: item,
                });
            }
        }

        counters.fetched = raw_items.len() as i64;
        let insert_outcome = news_db::insert_raw_items(pool, "finnhub", trace_id, now_utc, &raw_items).await?;
        counters.raw_inserted = insert_outcome.inserted;
        counters.raw_updated = insert_outcome.updated;
    }

    let raw_rows = news_db::select_raw_items(pool, "finnhub", options.process_limit).await?;
    let ingested_at = Utc::now();

    for raw_row in raw_rows {
        let request_ticker = raw_row.raw_payload.get("request_ticker").and_then(Value::as_str);
        match news_core::normalize(&raw_row.raw_payload, trace_id, ingested_at, request_ticker) {
            Ok(event) => match persist_normalized_event(pool, &event, trace_id).await {
                Ok((inserted, job_inserted)) => {
                    counters.news_upserts += 1;
                    if inserted {
                        counters.news_inserted += 1;
                    }
                    if job_inserted {
                        counters.jobs_enqueued += 1;
                    } else {
                        counters.jobs_skipped += 1;
                    }
                    news_db::mark_raw_normalized(pool, raw_row.raw_id).await?;
                    counters.normalized_ok += 1;
                }
                // A raw row is its own unit of work — a DB hiccup persisting one
                // event must not abort progress on the rest of the batch.
                Err(e) => {
                    news_db::mark_raw_failed(pool, raw_row.raw_id, &format!("unexpected_error: {e}")).await?;
                    counters.normalized_failed += 1;
                }
            },
            Err(e) => {
                news_db::mark_raw_failed(pool, raw_row.raw_id, &e.to_string()).await?;
                counters.normalized_failed += 1;
            }
        }
    }

    Ok(())
}

async fn persist_normalized_event(
    pool: &PgPool,
    event: &news_schemas::NewNewsEvent,
    trace_id: Uuid,
) -> anyhow::Result<(bool, bool)> {
    let (event_id, inserted) = news_db::upsert_news_event(pool, event).await?;
    let job_inserted = news_db::publish_job(pool, event_id, trace_id, JOB_TYPE_LLM_ANALYSIS).await?;
    Ok((inserted, job_inserted))
}

#[allow(clippy::too_many_arguments)]
async fn finalize(
    pool: &PgPool,
    run_id: i64,
    status: RunStatus,
    counters: &Counters,
    error_message: Option<&str>,
    ingest_config: &IngestConfig,
    options: &RunOptions,
    missing_tickers: &[String],
    skipped_tickers: &[Value],
) -> anyhow::Result<()> {
    let deduped_count = (counters.news_upserts - counters.news_inserted).max(0);
    let meta = json!({
        "raw_inserted_count": counters.raw_inserted,
        "raw_updated_count": counters.raw_updated,
        "normalized_ok_count": counters.normalized_ok,
        "normalized_failed_count": counters.normalized_failed,
        "jobs_enqueued_count": counters.jobs_enqueued,
        "jobs_skipped_count": counters.jobs_skipped,
        "latest_per_run": ingest_config.latest_per_run_per_ticker,
        "daily_max": ingest_config.daily_max_per_ticker,
        "process_limit": options.process_limit,
        "minutes_back": options.minutes_back,
        "missing_tickers": missing_tickers,
        "skipped_tickers": skipped_tickers,
        "git_hash": git_hash(),
        "host_fingerprint": host_fingerprint(),
    });

    news_db::finish_ingestion_run(
        pool,
        run_id,
        status,
        counters.fetched,
        counters.news_inserted,
        deduped_count,
        error_message,
        meta,
    )
    .await
}

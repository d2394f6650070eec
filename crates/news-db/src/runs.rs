//! `ingestion_runs` bookkeeping (§3 `IngestionRun`, §4.7 steps 2 and 9) and
//! the canonical `tickers` table (§4.7 step 4).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use news_schemas::{IngestionRun, RunStatus};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct NewIngestionRun {
    pub job_name: String,
    pub trace_id: Uuid,
    pub tickers: Vec<String>,
    pub window_from: DateTime<Utc>,
    pub window_to: DateTime<Utc>,
}

/// Insert a `running` run row. §4.7 step 2.
pub async fn insert_ingestion_run(pool: &PgPool, run: &NewIngestionRun) -> Result<i64> {
    let row = sqlx::query(
        r#"
        insert into ingestion_runs (
            job_name, trace_id, status, tickers, window_from, window_to
        ) values ($1, $2, 'running', $3, $4, $5)
        returning id
        "#,
    )
    .bind(&run.job_name)
    .bind(run.trace_id)
    .bind(serde_json::to_value(&run.tickers)?)
    .bind(run.window_from)
    .bind(run.window_to)
    .fetch_one(pool)
    .await
    .context("insert_ingestion_run failed")?;

    Ok(row.try_get::<i64, _>("id")?)
}

#[allow(clippy::too_many_arguments)]
/// Finalize a run with terminal status, counts, and free-form `meta`. §4.7
/// step 9 — called from every exit path, success or failure.
pub async fn finish_ingestion_run(
    pool: &PgPool,
    run_id: i64,
    status: RunStatus,
    fetched_count: i64,
    inserted_count: i64,
    deduped_count: i64,
    error_message: Option<&str>,
    meta: Value,
) -> Result<()> {
    sqlx::query(
        r#"
        update ingestion_runs
        set status = $2,
            fetched_count = $3,
            inserted_count = $4,
            deduped_count = $5,
            error_message = $6,
            meta = $7,
            updated_at = now()
        where id = $1
        "#,
    )
    .bind(run_id)
    .bind(status.as_str())
    .bind(fetched_count)
    .bind(inserted_count)
    .bind(deduped_count)
    .bind(error_message)
    .bind(meta)
    .execute(pool)
    .await
    .context("finish_ingestion_run failed")?;

    Ok(())
}

pub async fn fetch_ingestion_run(pool: &PgPool, run_id: i64) -> Result<IngestionRun> {
    let row = sqlx::query(
        r#"
        select id, job_name, trace_id, status, tickers, window_from, window_to,
               fetched_count, inserted_count, deduped_count, error_message, meta
        from ingestion_runs where id = $1
        "#,
    )
    .bind(run_id)
    .fetch_one(pool)
    .await
    .context("fetch_ingestion_run failed")?;

    let tickers: Value = row.try_get("tickers")?;
    Ok(IngestionRun {
        id: row.try_get("id")?,
        job_name: row.try_get("job_name")?,
        trace_id: row.try_get("trace_id")?,
        status: RunStatus::parse(row.try_get::<String, _>("status")?.as_str())?,
        tickers: serde_json::from_value(tickers).unwrap_or_default(),
        window_from: row.try_get("window_from")?,
        window_to: row.try_get("window_to")?,
        fetched_count: row.try_get("fetched_count")?,
        inserted_count: row.try_get("inserted_count")?,
        deduped_count: row.try_get("deduped_count")?,
        error_message: row.try_get("error_message")?,
        meta: row.try_get("meta")?,
    })
}

/// All symbols in the canonical ticker table, uppercased. Empty if the
/// table hasn't been seeded — callers treat that as "use operator-supplied
/// tickers verbatim" (§4.7 step 4).
pub async fn fetch_ticker_symbols(pool: &PgPool) -> Result<Vec<String>> {
    let rows = sqlx::query("select symbol from tickers order by symbol asc")
        .fetch_all(pool)
        .await
        .context("fetch_ticker_symbols failed")?;

    rows.into_iter()
        .map(|r| r.try_get::<String, _>("symbol").map_err(Into::into))
        .collect()
}

/// Idempotently seed the ticker table (upsert, no-op on conflict).
pub async fn seed_tickers(pool: &PgPool, symbols: &[String]) -> Result<()> {
    for s in symbols {
        sqlx::query("insert into tickers (symbol) values ($1) on conflict (symbol) do nothing")
            .bind(s.to_ascii_uppercase())
            .execute(pool)
            .await
            .context("seed_tickers failed")?;
    }
    Ok(())
}

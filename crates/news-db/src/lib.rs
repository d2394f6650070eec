//! Postgres access layer: migrations, connection, and one module per
//! persisted entity (§6 Persisted schema).

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

pub mod analyses;
pub mod events;
pub mod jobs;
pub mod lock;
pub mod raw;
pub mod runs;

pub use analyses::{
    fetch_llm_analysis, mark_analysis_failed, mark_analysis_succeeded, replace_analysis_tickers,
    start_analysis,
};
pub use events::{fetch_news_event, upsert_news_event};
pub use jobs::{
    claim_jobs, mark_job_done, mark_job_failed_terminal, mark_job_retry, probe_schedule_column,
    publish_job, sweep_stuck_leases,
};
pub use lock::AdvisoryLock;
pub use raw::{insert_raw_items, mark_raw_failed, mark_raw_normalized, select_raw_items, InsertRawItemsOutcome};
pub use runs::{
    fetch_ingestion_run, fetch_ticker_symbols, finish_ingestion_run, insert_ingestion_run,
    seed_tickers, NewIngestionRun,
};

/// Open a pool against a given connection string.
pub async fn connect(database_url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

/// Open a pool using `news_config::DbConfig::from_env()`.
pub async fn connect_from_env() -> Result<PgPool> {
    let cfg = news_config::DbConfig::from_env()?;
    connect(&cfg.connection_url()).await
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

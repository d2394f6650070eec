//! C8 — worker pool poll loop. §4.8.
//!
//! Grounded on the original's worker control flow (sweep before claim,
//! lease discipline, dispatch-by-job-type) and the teacher's
//! `mqk-daemon` shutdown-flag pattern for graceful signal handling.

use crate::retry::{classify, next_run_after, RetryDecision};
use chrono::Utc;
use news_schemas::{AnalysisJob, JOB_TYPE_LLM_ANALYSIS};
use sqlx::PgPool;
use tracing::{error, info, warn};

pub struct WorkerOptions {
    pub poll_seconds: u64,
    pub batch_size: i64,
    pub max_attempts: i32,
    pub visibility_timeout_seconds: i64,
    pub worker_id: String,
    pub once: bool,
}

/// Run the poll loop until `options.once` completes a single cycle, or a
/// shutdown signal arrives. Returns once it is safe to exit — any in-flight
/// job from the last cycle has already been marked done/retry/failed.
pub async fn run(pool: &PgPool, options: WorkerOptions) -> anyhow::Result<()> {
    let schedule_column = news_db::probe_schedule_column(pool).await?;
    info!(worker_id = %options.worker_id, schedule_column, "worker_started");

    loop {
        run_cycle(pool, schedule_column, &options).await?;

        if options.once {
            return Ok(());
        }

        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_secs(options.poll_seconds)) => {}
            _ = shutdown_signal() => {
                info!(worker_id = %options.worker_id, "worker_shutdown_requested");
                return Ok(());
            }
        }
    }
}

async fn run_cycle(pool: &PgPool, schedule_column: &'static str, options: &WorkerOptions) -> anyhow::Result<()> {
    let swept = news_db::sweep_stuck_leases(pool, options.visibility_timeout_seconds).await?;
    if swept > 0 {
        info!(worker_id = %options.worker_id, swept, "worker_swept_stuck_leases");
    }

    let jobs = news_db::claim_jobs(pool, schedule_column, options.batch_size, options.max_attempts, &options.worker_id).await?;
    if jobs.is_empty() {
        return Ok(());
    }

    for job in jobs {
        process_job(pool, schedule_column, options.max_attempts, &job).await?;
    }

    Ok(())
}

async fn process_job(pool: &PgPool, schedule_column: &str, max_attempts: i32, job: &AnalysisJob) -> anyhow::Result<()> {
    info!(job_id = job.id, job_type = %job.job_type, attempts = job.attempts, "worker_job_claimed");

    match dispatch(pool, job).await {
        Ok(()) => {
            news_db::mark_job_done(pool, job.id).await?;
            info!(job_id = job.id, "worker_job_done");
        }
        Err(error_message) => {
            let would_retry = job.attempts + 1 < max_attempts && classify(&error_message) == RetryDecision::Retry;
            if would_retry {
                let run_after = next_run_after(Utc::now(), job.attempts);
                news_db::mark_job_retry(pool, schedule_column, job.id, run_after, &error_message).await?;
                warn!(job_id = job.id, error = %error_message, run_after = %run_after, "worker_job_retry_scheduled");
            } else {
                news_db::mark_job_failed_terminal(pool, job.id, &error_message).await?;
                error!(job_id = job.id, error = %error_message, "worker_job_failed_terminal");
            }
        }
    }
    Ok(())
}

/// Invoke the handler for `job.job_type`. An unknown type is a fatal
/// per-job error, handled exactly like any other dispatch failure (§4.8
/// "Dispatch table").
async fn dispatch(pool: &PgPool, job: &AnalysisJob) -> Result<(), String> {
    match job.job_type.as_str() {
        JOB_TYPE_LLM_ANALYSIS => match news_llm::analyze(pool, job.news_event_id).await {
            Ok(news_llm::AnalyzeOutcome::Succeeded { .. }) => Ok(()),
            Ok(news_llm::AnalyzeOutcome::Failed { error_message, .. }) => Err(error_message),
            Ok(news_llm::AnalyzeOutcome::NotFound) => Err(format!("news_event {} not found", job.news_event_id)),
            Err(e) => Err(format!("unexpected_error: {e}")),
        },
        other => Err(format!("unknown_job_type: {other}")),
    }
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

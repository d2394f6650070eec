//! C6 (job publisher, §4.6) and the C8 worker-pool queue primitives (§4.8).

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use news_schemas::{AnalysisJob, JobStatus};
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Idempotent enqueue. Returns `true` iff a new row was created. §4.6.
pub async fn publish_job(
    pool: &PgPool,
    news_event_id: i64,
    trace_id: Uuid,
    job_type: &str,
) -> Result<bool> {
    let row = sqlx::query(
        r#"
        insert into analysis_jobs (job_uuid, news_event_id, job_type, trace_id, status)
        values ($1, $2, $3, $4, 'pending')
        on conflict (news_event_id, job_type) do nothing
        returning id
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(news_event_id)
    .bind(job_type)
    .bind(trace_id)
    .fetch_optional(pool)
    .await
    .context("publish_job failed")?;

    Ok(row.is_some())
}

/// §4.8 "Schema compatibility shim": probe which scheduling column this
/// `analysis_jobs` table actually has. `run_after` is preferred; `next_run_at`
/// is accepted for compatibility with an older deployment of the schema.
/// Fails fast if neither is present.
pub async fn probe_schedule_column(pool: &PgPool) -> Result<&'static str> {
    let has_column = |name: &str| {
        sqlx::query_scalar::<_, bool>(
            r#"
            select exists (
                select 1 from information_schema.columns
                where table_name = 'analysis_jobs' and column_name = $1
            )
            "#,
        )
        .bind(name)
    };

    if has_column("run_after").fetch_one(pool).await.context("probe run_after")? {
        return Ok("run_after");
    }
    if has_column("next_run_at").fetch_one(pool).await.context("probe next_run_at")? {
        return Ok("next_run_at");
    }
    bail!("analysis_jobs has neither 'run_after' nor 'next_run_at' — schema misconfigured");
}

fn row_to_job(row: sqlx::postgres::PgRow, schedule_column: &str) -> Result<AnalysisJob> {
    Ok(AnalysisJob {
        id: row.try_get("id")?,
        job_uuid: row.try_get("job_uuid")?,
        news_event_id: row.try_get("news_event_id")?,
        job_type: row.try_get("job_type")?,
        trace_id: row.try_get("trace_id")?,
        status: JobStatus::parse(row.try_get::<String, _>("status")?.as_str())?,
        attempts: row.try_get("attempts")?,
        run_after: row.try_get(schedule_column)?,
        locked_at: row.try_get("locked_at")?,
        locked_by: row.try_get("locked_by")?,
        last_error: row.try_get("last_error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Atomically select-and-lease up to `batch_size` eligible jobs. The
/// select+update is one statement, with `for update skip locked`, so no two
/// concurrent workers ever observe the same row as claimable (§4.8, §5, and
/// the "no overlap" Invariant of §8) — adapted from the teacher's
/// `outbox_claim_batch` CTE in `mqk-db::lib::outbox_claim_batch`.
pub async fn claim_jobs(
    pool: &PgPool,
    schedule_column: &str,
    batch_size: i64,
    max_attempts: i32,
    worker_id: &str,
) -> Result<Vec<AnalysisJob>> {
    let sql = format!(
        r#"
        with to_claim as (
            select id
            from analysis_jobs
            where status = 'pending'
              and {col} <= now()
              and attempts < $1
            order by {col} asc, created_at asc
            limit $2
            for update skip locked
        )
        update analysis_jobs
        set status = 'running', locked_at = now(), locked_by = $3, updated_at = now()
        where id in (select id from to_claim)
        returning id, job_uuid, news_event_id, job_type, trace_id, status, attempts,
                  {col}, locked_at, locked_by, last_error, created_at, updated_at
        "#,
        col = schedule_column
    );

    let rows = sqlx::query(&sql)
        .bind(max_attempts)
        .bind(batch_size)
        .bind(worker_id)
        .fetch_all(pool)
        .await
        .context("claim_jobs failed")?;

    rows.into_iter().map(|r| row_to_job(r, schedule_column)).collect()
}

/// Stuck-lease recovery sweep: any `running` row whose lease has expired is
/// returned to `pending` with cleared lease fields. §4.8.
pub async fn sweep_stuck_leases(pool: &PgPool, visibility_timeout_seconds: i64) -> Result<u64> {
    let result = sqlx::query(
        r#"
        update analysis_jobs
        set status = 'pending', locked_at = null, locked_by = null, updated_at = now()
        where status = 'running'
          and locked_at < now() - make_interval(secs => $1)
        "#,
    )
    .bind(visibility_timeout_seconds as f64)
    .execute(pool)
    .await
    .context("sweep_stuck_leases failed")?;

    Ok(result.rows_affected())
}

pub async fn mark_job_done(pool: &PgPool, job_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        update analysis_jobs
        set status = 'done', last_error = null, locked_at = null, locked_by = null, updated_at = now()
        where id = $1
        "#,
    )
    .bind(job_id)
    .execute(pool)
    .await
    .context("mark_job_done failed")?;
    Ok(())
}

/// Return the job to `pending` for a later retry: increments `attempts`,
/// sets the next eligible instant, clears the lease, truncates the stored
/// error to 500 characters (§4.8).
pub async fn mark_job_retry(
    pool: &PgPool,
    schedule_column: &str,
    job_id: i64,
    run_after: DateTime<Utc>,
    error: &str,
) -> Result<()> {
    let truncated: String = error.chars().take(500).collect();
    let sql = format!(
        r#"
        update analysis_jobs
        set status = 'pending', attempts = attempts + 1, {col} = $2,
            locked_at = null, locked_by = null, last_error = $3, updated_at = now()
        where id = $1
        "#,
        col = schedule_column
    );
    sqlx::query(&sql)
        .bind(job_id)
        .bind(run_after)
        .bind(truncated)
        .execute(pool)
        .await
        .context("mark_job_retry failed")?;
    Ok(())
}

/// Terminal failure: `attempts` still increments, status becomes `failed`
/// and stays there — no further claim is possible. §4.8.
pub async fn mark_job_failed_terminal(pool: &PgPool, job_id: i64, error: &str) -> Result<()> {
    let truncated: String = error.chars().take(500).collect();
    sqlx::query(
        r#"
        update analysis_jobs
        set status = 'failed', attempts = attempts + 1,
            locked_at = null, locked_by = null, last_error = $2, updated_at = now()
        where id = $1
        "#,
    )
    .bind(job_id)
    .bind(truncated)
    .execute(pool)
    .await
    .context("mark_job_failed_terminal failed")?;
    Ok(())
}

//! Ingestion singleton advisory lock, §4.7 step 1 / §5.
//!
//! Grounded on `original_source/.../ingestion/run.py` `_try_advisory_lock`
//! (`pg_try_advisory_lock(hashtext(%s))`) and the teacher's
//! `mqk-db`/`mqk-execution` pattern of holding the session that owns a
//! Postgres advisory lock for the run's lifetime.

use anyhow::{Context, Result};
use sqlx::postgres::PgConnection;
use sqlx::Connection;

/// A held session-level advisory lock, keyed by `hashtext(job_name)`. The
/// lock is released when this value is dropped (the connection returns to
/// the pool, or `release` is called explicitly) or when the process exits.
pub struct AdvisoryLock {
    conn: Option<PgConnection>,
    job_name: String,
}

impl AdvisoryLock {
    /// Attempt a non-blocking acquire. Returns `None` if another holder has
    /// the lock — the caller must exit success without writing anything
    /// (§4.7 step 1).
    pub async fn try_acquire(database_url: &str, job_name: &str) -> Result<Option<Self>> {
        let mut conn = PgConnection::connect(database_url)
            .await
            .context("advisory lock: connect failed")?;

        let (acquired,): (bool,) = sqlx::query_as("select pg_try_advisory_lock(hashtext($1))")
            .bind(job_name)
            .fetch_one(&mut conn)
            .await
            .context("advisory lock: pg_try_advisory_lock failed")?;

        if acquired {
            Ok(Some(Self {
                conn: Some(conn),
                job_name: job_name.to_string(),
            }))
        } else {
            Ok(None)
        }
    }

    /// Explicitly release. Also happens implicitly when the session ends.
    pub async fn release(mut self) -> Result<()> {
        if let Some(mut conn) = self.conn.take() {
            sqlx::query("select pg_advisory_unlock(hashtext($1))")
                .bind(&self.job_name)
                .execute(&mut conn)
                .await
                .context("advisory lock: pg_advisory_unlock failed")?;
        }
        Ok(())
    }
}

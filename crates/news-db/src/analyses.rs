//! C9 persistence — the audit trail behind the LLM orchestrator. §4.9.

use anyhow::{Context, Result};
use news_schemas::{AnalysisStatus, LlmAnalysis};
use serde_json::Value;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Start (or restart) an analysis attempt for `(news_event_id, provider,
/// model)`. On conflict the row is reset to `pending` with the new request
/// payload — a job that is retried from scratch (e.g. after a stuck-lease
/// recovery) gets a clean attempt record rather than stale output sitting
/// next to a new one.
pub async fn start_analysis(
    pool: &PgPool,
    news_event_id: i64,
    trace_id: Uuid,
    provider: &str,
    model: &str,
    request: &Value,
) -> Result<i64> {
    let row = sqlx::query(
        r#"
        insert into llm_analyses (news_event_id, trace_id, provider, model, status, request)
        values ($1, $2, $3, $4, 'pending', $5)
        on conflict (news_event_id, provider, model) do update set
            trace_id = excluded.trace_id,
            status = 'pending',
            request = excluded.request,
            raw_output = null,
            error_message = null,
            updated_at = now()
        returning id
        "#,
    )
    .bind(news_event_id)
    .bind(trace_id)
    .bind(provider)
    .bind(model)
    .bind(request)
    .fetch_one(pool)
    .await
    .context("start_analysis failed")?;

    Ok(row.try_get("id")?)
}

#[allow(clippy::too_many_arguments)]
/// Record a schema-validated verdict. §4.9 "persist the validated result".
pub async fn mark_analysis_succeeded(
    pool: &PgPool,
    analysis_id: i64,
    sentiment: &str,
    confidence: f64,
    summary: &str,
    raw_output: &Value,
    request: &Value,
) -> Result<()> {
    sqlx::query(
        r#"
        update llm_analyses
        set status = 'succeeded', sentiment = $2, confidence = $3, summary = $4,
            raw_output = $5, request = $6, error_message = null, updated_at = now()
        where id = $1
        "#,
    )
    .bind(analysis_id)
    .bind(sentiment)
    .bind(confidence)
    .bind(summary)
    .bind(raw_output)
    .bind(request)
    .execute(pool)
    .await
    .context("mark_analysis_succeeded failed")?;
    Ok(())
}

/// Record a terminal failure (all reprompt attempts exhausted, or a
/// non-retryable provider error). `raw_output` carries the last-seen
/// malformed payload, if any, for postmortem review.
pub async fn mark_analysis_failed(
    pool: &PgPool,
    analysis_id: i64,
    error_message: &str,
    raw_output: Option<&Value>,
    request: Option<&Value>,
) -> Result<()> {
    sqlx::query(
        r#"
        update llm_analyses
        set status = 'failed', error_message = $2, raw_output = coalesce($3, raw_output),
            request = coalesce($4, request), updated_at = now()
        where id = $1
        "#,
    )
    .bind(analysis_id)
    .bind(error_message)
    .bind(raw_output)
    .bind(request)
    .execute(pool)
    .await
    .context("mark_analysis_failed failed")?;
    Ok(())
}

/// Replace the ticker set for an analysis: delete-then-batch-insert, inside
/// one transaction, so a reader never observes a partially replaced set.
pub async fn replace_analysis_tickers(pool: &PgPool, analysis_id: i64, tickers: &[String]) -> Result<()> {
    let mut tx = pool.begin().await.context("replace_analysis_tickers: begin")?;

    sqlx::query("delete from analysis_tickers where llm_analysis_id = $1")
        .bind(analysis_id)
        .execute(&mut *tx)
        .await
        .context("replace_analysis_tickers: delete failed")?;

    for ticker in tickers {
        sqlx::query("insert into analysis_tickers (llm_analysis_id, ticker) values ($1, $2)")
            .bind(analysis_id)
            .bind(ticker)
            .execute(&mut *tx)
            .await
            .context("replace_analysis_tickers: insert failed")?;
    }

    tx.commit().await.context("replace_analysis_tickers: commit")?;
    Ok(())
}

pub async fn fetch_llm_analysis(pool: &PgPool, analysis_id: i64) -> Result<LlmAnalysis> {
    let row = sqlx::query(
        r#"
        select id, news_event_id, trace_id, provider, model, status, sentiment,
               confidence, summary, request, raw_output, error_message
        from llm_analyses where id = $1
        "#,
    )
    .bind(analysis_id)
    .fetch_one(pool)
    .await
    .context("fetch_llm_analysis failed")?;

    let entities = sqlx::query("select ticker from analysis_tickers where llm_analysis_id = $1 order by id asc")
        .bind(analysis_id)
        .fetch_all(pool)
        .await
        .context("fetch_llm_analysis: tickers failed")?
        .into_iter()
        .map(|r| r.try_get::<String, _>("ticker"))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(LlmAnalysis {
        id: row.try_get("id")?,
        news_event_id: row.try_get("news_event_id")?,
        trace_id: row.try_get("trace_id")?,
        provider: row.try_get("provider")?,
        model: row.try_get("model")?,
        status: AnalysisStatus::parse(row.try_get::<String, _>("status")?.as_str())?,
        sentiment: row.try_get("sentiment")?,
        confidence: row.try_get("confidence")?,
        summary: row.try_get("summary")?,
        entities,
        request: row.try_get("request")?,
        raw_output: row.try_get("raw_output")?,
        error_message: row.try_get("error_message")?,
    })
}

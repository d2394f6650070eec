//! C5 — event store. §4.5.

use anyhow::{Context, Result};
use news_schemas::NewNewsEvent;
use sqlx::{PgPool, Row};

/// Insert a normalized event; on `(source, url)` conflict, a no-op update
/// (`id = excluded.id` is never applied — we set `id = news_events.id`, a
/// true no-op) returns the existing row's id without overwriting any
/// content. `inserted` distinguishes the two cases atomically.
pub async fn upsert_news_event(pool: &PgPool, event: &NewNewsEvent) -> Result<(i64, bool)> {
    let row = sqlx::query(
        r#"
        insert into news_events (
            news_id, trace_id, source, request_ticker, published_at, ingested_at,
            title, url, content, tickers, raw_payload
        ) values ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        on conflict (source, url) do update set id = news_events.id
        returning id, (xmax = 0) as inserted
        "#,
    )
    .bind(&event.news_id)
    .bind(event.trace_id)
    .bind(&event.source)
    .bind(&event.request_ticker)
    .bind(event.published_at)
    .bind(event.ingested_at)
    .bind(&event.title)
    .bind(&event.url)
    .bind(&event.content)
    .bind(serde_json::to_value(&event.tickers)?)
    .bind(&event.raw_payload)
    .fetch_one(pool)
    .await
    .context("upsert_news_event failed")?;

    Ok((row.try_get("id")?, row.try_get("inserted")?))
}

pub async fn fetch_news_event(pool: &PgPool, news_event_id: i64) -> Result<Option<news_schemas::NewsEvent>> {
    let row = sqlx::query(
        r#"
        select id, news_id, trace_id, source, request_ticker, published_at, ingested_at,
               title, url, content, tickers, raw_payload
        from news_events where id = $1
        "#,
    )
    .bind(news_event_id)
    .fetch_optional(pool)
    .await
    .context("fetch_news_event failed")?;

    let Some(row) = row else { return Ok(None) };
    let tickers: serde_json::Value = row.try_get("tickers")?;
    Ok(Some(news_schemas::NewsEvent {
        id: row.try_get("id")?,
        news_id: row.try_get("news_id")?,
        trace_id: row.try_get("trace_id")?,
        source: row.try_get("source")?,
        request_ticker: row.try_get("request_ticker")?,
        published_at: row.try_get("published_at")?,
        ingested_at: row.try_get("ingested_at")?,
        title: row.try_get("title")?,
        url: row.try_get("url")?,
        content: row.try_get("content")?,
        tickers: serde_json::from_value(tickers).unwrap_or_default(),
        raw_payload: row.try_get("raw_payload")?,
    }))
}

//! C4 — raw store. §4.4.
//!
//! Grounded on `original_source/.../raw_store.py`: batch upsert with
//! last-occurrence-wins collision collapsing, storing `canonical_url or url`
//! exactly as `insert_raw_items` does, `RETURNING (xmax = 0) AS inserted` to
//! distinguish insert from update atomically (the same idiom the teacher
//! uses in `mqk-db::md::ingest_csv_to_md_bars`).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use news_core::{canonicalize_url, dedup_key};
use news_schemas::{FetchedItem, RawItem, RawItemStatus};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use uuid::Uuid;

pub struct InsertRawItemsOutcome {
    pub inserted: i64,
    pub updated: i64,
}

/// Upsert a batch of fetched items on `(source, dedup_key)`. Within the
/// batch, a dedup-key collision collapses to the last occurrence — mirroring
/// the reference's dict-keyed collapse before `execute_values`.
pub async fn insert_raw_items(
    pool: &PgPool,
    source: &str,
    trace_id: Uuid,
    fetched_at: DateTime<Utc>,
    items: &[FetchedItem],
) -> Result<InsertRawItemsOutcome> {
    let mut by_key: HashMap<String, &FetchedItem> = HashMap::new();
    let mut order: Vec<String> = Vec::new();
    for item in items {
        let key = dedup_key(
            source,
            item.url.as_deref(),
            item.title.as_deref(),
            item.published_at,
        );
        if !by_key.contains_key(&key) {
            order.push(key.clone());
        }
        by_key.insert(key, item);
    }

    let mut tx = pool.begin().await.context("insert_raw_items: begin")?;
    let mut inserted = 0i64;
    let mut updated = 0i64;

    for key in order {
        let item = by_key[&key];
        // `canonical_url or url`, matching the reference's storage of the
        // already-canonicalized url rather than the raw fetched one.
        let stored_url = item
            .url
            .as_deref()
            .map(|u| canonicalize_url(u).unwrap_or_else(|_| u.to_string()));
        let row = sqlx::query(
            r#"
            insert into raw_news_items (
                source, trace_id, fetched_at, published_at, url, title,
                dedup_key, raw_payload, status, attempts
            ) values ($1, $2, $3, $4, $5, $6, $7, $8, 'fetched', 0)
            on conflict (source, dedup_key) do update set
                fetched_at = excluded.fetched_at,
                trace_id = excluded.trace_id,
                raw_payload = excluded.raw_payload,
                updated_at = now()
            returning (xmax = 0) as inserted
            "#,
        )
        .bind(source)
        .bind(trace_id)
        .bind(fetched_at)
        .bind(item.published_at)
        .bind(&stored_url)
        .bind(&item.title)
        .bind(&key)
        .bind(&item.raw_payload)
        .fetch_one(&mut *tx)
        .await
        .context("insert_raw_items: upsert row failed")?;

        let was_insert: bool = row.try_get("inserted")?;
        if was_insert {
            inserted += 1;
        } else {
            updated += 1;
        }
    }

    tx.commit().await.context("insert_raw_items: commit")?;

    Ok(InsertRawItemsOutcome { inserted, updated })
}

/// Select a bounded batch of raw rows eligible for normalization. §4.4.
pub async fn select_raw_items(pool: &PgPool, source: &str, limit: i64) -> Result<Vec<RawItem>> {
    let rows = sqlx::query(
        r#"
        select raw_id, source, trace_id, fetched_at, published_at, url, title,
               dedup_key, raw_payload, status, attempts, last_error
        from raw_news_items
        where source = $1
          and status in ('fetched', 'failed')
          and attempts < 3
        order by fetched_at desc
        limit $2
        "#,
    )
    .bind(source)
    .bind(limit)
    .fetch_all(pool)
    .await
    .context("select_raw_items failed")?;

    rows.into_iter().map(row_to_raw_item).collect()
}

fn row_to_raw_item(row: sqlx::postgres::PgRow) -> Result<RawItem> {
    Ok(RawItem {
        raw_id: row.try_get("raw_id")?,
        source: row.try_get("source")?,
        trace_id: row.try_get("trace_id")?,
        fetched_at: row.try_get("fetched_at")?,
        published_at: row.try_get("published_at")?,
        url: row.try_get("url")?,
        title: row.try_get("title")?,
        dedup_key: row.try_get("dedup_key")?,
        raw_payload: row.try_get("raw_payload")?,
        status: RawItemStatus::parse(row.try_get::<String, _>("status")?.as_str())?,
        attempts: row.try_get("attempts")?,
        last_error: row.try_get("last_error")?,
    })
}

/// Status → `normalized`, `attempts += 1`, clear `last_error`. §4.4.
pub async fn mark_raw_normalized(pool: &PgPool, raw_id: i64) -> Result<()> {
    sqlx::query(
        r#"
        update raw_news_items
        set status = 'normalized', attempts = attempts + 1, last_error = null, updated_at = now()
        where raw_id = $1
        "#,
    )
    .bind(raw_id)
    .execute(pool)
    .await
    .context("mark_raw_normalized failed")?;
    Ok(())
}

/// Status → `failed`, `attempts += 1`, store the error message. §4.4.
pub async fn mark_raw_failed(pool: &PgPool, raw_id: i64, error: &str) -> Result<()> {
    sqlx::query(
        r#"
        update raw_news_items
        set status = 'failed', attempts = attempts + 1, last_error = $2, updated_at = now()
        where raw_id = $1
        "#,
    )
    .bind(raw_id)
    .bind(error)
    .execute(pool)
    .await
    .context("mark_raw_failed failed")?;
    Ok(())
}

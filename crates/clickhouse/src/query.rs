//! Read-side queries: the dedup point lookup, plus helpers for tests and admin.

use crate::client::ClickHouseClient;
use crate::insert::{EventLogRow, PageViewLogRow};
use ingest_core::{Error, RecordKind, Result};
use std::time::Instant;
use telemetry::metrics;

/// Point lookup by natural key, reading at most one row.
pub async fn key_exists(client: &ClickHouseClient, kind: RecordKind, key: &str) -> Result<bool> {
    let start = Instant::now();
    let sql = format!(
        "SELECT {col} FROM {table} WHERE {col} = ? LIMIT 1",
        col = kind.key_column(),
        table = kind.table(),
    );

    let rows: Vec<String> = client
        .inner()
        .query(&sql)
        .bind(key)
        .fetch_all()
        .await
        .map_err(|e| Error::store(format!("Lookup error: {}", e)))?;

    metrics()
        .lookup_latency_ms
        .observe(start.elapsed().as_millis() as u64);
    Ok(!rows.is_empty())
}

/// Count rows in a table.
pub async fn count_rows(client: &ClickHouseClient, kind: RecordKind) -> Result<u64> {
    let count: u64 = client
        .inner()
        .query(&format!("SELECT count() FROM {}", kind.table()))
        .fetch_one()
        .await
        .map_err(|e| Error::store(format!("Query error: {}", e)))?;
    Ok(count)
}

/// Count rows sharing a natural key (more than one means a duplicate slipped in).
pub async fn count_key(client: &ClickHouseClient, kind: RecordKind, key: &str) -> Result<u64> {
    let sql = format!(
        "SELECT count() FROM {} WHERE {} = ?",
        kind.table(),
        kind.key_column()
    );
    let count: u64 = client
        .inner()
        .query(&sql)
        .bind(key)
        .fetch_one()
        .await
        .map_err(|e| Error::store(format!("Query error: {}", e)))?;
    Ok(count)
}

/// Fetch a stored page view by page id.
pub async fn fetch_pageview(
    client: &ClickHouseClient,
    page_id: &str,
) -> Result<Option<PageViewLogRow>> {
    let rows: Vec<PageViewLogRow> = client
        .inner()
        .query("SELECT ?fields FROM pageviewlogs WHERE page_id = ? LIMIT 1")
        .bind(page_id)
        .fetch_all()
        .await
        .map_err(|e| Error::store(format!("Query error: {}", e)))?;
    Ok(rows.into_iter().next())
}

/// Fetch a stored event by id.
pub async fn fetch_eventlog(client: &ClickHouseClient, id: &str) -> Result<Option<EventLogRow>> {
    let rows: Vec<EventLogRow> = client
        .inner()
        .query("SELECT ?fields FROM eventlogs WHERE id = ? LIMIT 1")
        .bind(id)
        .fetch_all()
        .await
        .map_err(|e| Error::store(format!("Query error: {}", e)))?;
    Ok(rows.into_iter().next())
}

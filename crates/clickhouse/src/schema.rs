//! ClickHouse table schemas.
//!
//! Both tables are append-only MergeTrees partitioned by the month of
//! `time` (Unix seconds) and ordered by `time`. Low-cardinality strings
//! (site names, hosts, browsers, ...) use `LowCardinality(String)`.

use crate::client::ClickHouseClient;
use crate::store::DedupMode;
use ingest_core::{Error, RecordKind, Result};
use tracing::info;

/// Keys remembered per table for token-based insert deduplication.
pub const DEDUP_WINDOW: u64 = 100_000;

const PAGEVIEWLOGS_COLUMNS: &str = r#"
    page_id String,
    web_name LowCardinality(String),
    host LowCardinality(String),
    url LowCardinality(String),
    title String,
    status Int32,

    machine_id String,
    machine_type String,
    user_agent String,
    auto_ua Bool,
    system LowCardinality(String),
    screen LowCardinality(String),
    browser LowCardinality(String),
    browser_version String,
    proto LowCardinality(String),
    robot Bool,

    lang String,
    ip String,
    continent String,
    country String,
    province String,
    city String,
    location String,

    session_id String,
    depth Int32,
    referer LowCardinality(String),
    view_type String,

    time Int64
"#;

const EVENTLOGS_COLUMNS: &str = r#"
    id String,
    event_type LowCardinality(String),
    web_name LowCardinality(String),
    url LowCardinality(String),
    page_id String,
    -- JSON text; query with JSONExtract* which keeps numbers exact
    payload String,
    time Int64
"#;

/// `CREATE TABLE IF NOT EXISTS` for one record kind.
///
/// Strict mode enables token-based insert deduplication on the table so
/// that a repeated natural key is discarded by the server itself.
pub fn create_table(kind: RecordKind, mode: DedupMode) -> String {
    let columns = match kind {
        RecordKind::PageView => PAGEVIEWLOGS_COLUMNS,
        RecordKind::EventLog => EVENTLOGS_COLUMNS,
    };

    let settings = match mode {
        DedupMode::Lenient => String::new(),
        DedupMode::Strict => format!(
            "\nSETTINGS non_replicated_deduplication_window = {}",
            DEDUP_WINDOW
        ),
    };

    format!(
        "CREATE TABLE IF NOT EXISTS {table} ({columns})\n\
         ENGINE = MergeTree()\n\
         PARTITION BY toYYYYMM(toDateTime(time))\n\
         ORDER BY time{settings}",
        table = kind.table(),
    )
}

/// DDL for every table, in creation order.
pub fn all_tables(mode: DedupMode) -> Vec<String> {
    RecordKind::ALL
        .iter()
        .map(|&kind| create_table(kind, mode))
        .collect()
}

/// Creates both tables if missing. Safe to run on every start.
pub async fn init_schema(client: &ClickHouseClient, mode: DedupMode) -> Result<()> {
    for ddl in all_tables(mode) {
        client
            .inner()
            .query(&ddl)
            .execute()
            .await
            .map_err(|e| Error::store(format!("Failed to execute DDL: {}", e)))?;
    }

    info!(?mode, "ClickHouse schema initialized");
    Ok(())
}

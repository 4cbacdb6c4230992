//! Row types and single-record inserts.

use crate::client::ClickHouseClient;
use crate::store::DedupMode;
use clickhouse::Row;
use ingest_core::{EnrichedRecord, Error, EventLog, PageViewLog, RecordKind, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use telemetry::metrics;
use tracing::debug;

/// Row for the `pageviewlogs` table.
#[derive(Debug, Clone, PartialEq, Row, Serialize, Deserialize)]
pub struct PageViewLogRow {
    pub page_id: String,
    pub web_name: String,
    pub host: String,
    pub url: String,
    pub title: String,
    pub status: i32,

    pub machine_id: String,
    pub machine_type: String,
    pub user_agent: String,
    pub auto_ua: bool,
    pub system: String,
    pub screen: String,
    pub browser: String,
    pub browser_version: String,
    pub proto: String,
    pub robot: bool,

    pub lang: String,
    pub ip: String,
    pub continent: String,
    pub country: String,
    pub province: String,
    pub city: String,
    pub location: String,

    pub session_id: String,
    pub depth: i32,
    pub referer: String,
    pub view_type: String,

    pub time: i64,
}

impl From<&PageViewLog> for PageViewLogRow {
    fn from(p: &PageViewLog) -> Self {
        Self {
            page_id: p.page_id.clone(),
            web_name: p.web_name.clone(),
            host: p.host.clone(),
            url: p.url.clone(),
            title: p.title.clone(),
            status: p.status,
            machine_id: p.machine_id.clone(),
            machine_type: p.machine_type.clone(),
            user_agent: p.user_agent.clone(),
            auto_ua: p.auto_ua,
            system: p.system.clone(),
            screen: p.screen.clone(),
            browser: p.browser.clone(),
            browser_version: p.browser_version.clone(),
            proto: p.proto.clone(),
            robot: p.robot,
            lang: p.lang.clone(),
            ip: p.ip.clone(),
            continent: p.continent.clone(),
            country: p.country.clone(),
            province: p.province.clone(),
            city: p.city.clone(),
            location: p.location.clone(),
            session_id: p.session_id.clone(),
            depth: p.depth,
            referer: p.referer.clone(),
            view_type: p.view_type.clone(),
            time: p.time,
        }
    }
}

/// Row for the `eventlogs` table.
#[derive(Debug, Clone, PartialEq, Row, Serialize, Deserialize)]
pub struct EventLogRow {
    pub id: String,
    pub event_type: String,
    pub web_name: String,
    pub url: String,
    pub page_id: String,
    pub payload: String,
    pub time: i64,
}

impl From<&EventLog> for EventLogRow {
    fn from(e: &EventLog) -> Self {
        Self {
            id: e.id.clone(),
            event_type: e.event_type.clone(),
            web_name: e.web_name.clone(),
            url: e.url.clone(),
            page_id: e.page_id.clone(),
            payload: e.payload.clone(),
            time: e.time,
        }
    }
}

/// Writes one row in its own INSERT.
async fn write_row<T>(client: &clickhouse::Client, table: &str, row: &T) -> Result<()>
where
    T: Row + Serialize + Send + Sync,
{
    let mut insert = client
        .insert(table)
        .map_err(|e| Error::store(format!("Insert error: {}", e)))?;

    insert
        .write(row)
        .await
        .map_err(|e| Error::store(format!("Write error: {}", e)))?;

    insert
        .end()
        .await
        .map_err(|e| Error::store(format!("End error: {}", e)))
}

/// Inserts one enriched record into its table.
///
/// In strict mode the natural key doubles as the insert deduplication
/// token, so a repeat of the same key is dropped server-side.
pub async fn insert_record(
    client: &ClickHouseClient,
    record: &EnrichedRecord,
    mode: DedupMode,
) -> Result<()> {
    let start = Instant::now();
    let kind = record.kind();

    let ch = match mode {
        DedupMode::Lenient => client.inner().clone(),
        DedupMode::Strict => client
            .inner()
            .clone()
            .with_option("insert_deduplication_token", record.natural_key()),
    };

    let result = match record {
        EnrichedRecord::PageView(p) => {
            write_row(&ch, kind.table(), &PageViewLogRow::from(p)).await
        }
        EnrichedRecord::EventLog(e) => write_row(&ch, kind.table(), &EventLogRow::from(e)).await,
    };

    let elapsed = start.elapsed();
    metrics().insert_latency_ms.observe(elapsed.as_millis() as u64);
    result?;

    match kind {
        RecordKind::PageView => metrics().pageviews_inserted.inc(),
        RecordKind::EventLog => metrics().events_inserted.inc(),
    }

    debug!(
        table = kind.table(),
        key = %record.natural_key(),
        partition = record.partition_month(),
        latency_ms = %elapsed.as_millis(),
        "Inserted record into ClickHouse"
    );

    Ok(())
}

//! The store as seen by the write policy.

use crate::client::ClickHouseClient;
use crate::{insert, query};
use async_trait::async_trait;
use ingest_core::{EnrichedRecord, RecordKind, Result};
use serde::{Deserialize, Serialize};

/// How hard the pipeline tries to keep natural keys unique.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupMode {
    /// Check-then-insert. Two passes over the same key that both check
    /// before either inserts will both insert.
    #[default]
    Lenient,
    /// Check-then-insert, and each insert carries its natural key as a
    /// deduplication token so the server drops a racing second insert.
    Strict,
}

/// Analytical store operations needed by the pipeline.
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Whether a row with this natural key is already stored.
    async fn exists(&self, kind: RecordKind, key: &str) -> Result<bool>;

    /// Appends one record to its table.
    async fn insert(&self, record: &EnrichedRecord, mode: DedupMode) -> Result<()>;
}

#[async_trait]
impl AnalyticsStore for ClickHouseClient {
    async fn exists(&self, kind: RecordKind, key: &str) -> Result<bool> {
        query::key_exists(self, kind, key).await
    }

    async fn insert(&self, record: &EnrichedRecord, mode: DedupMode) -> Result<()> {
        insert::insert_record(self, record, mode).await
    }
}

//! Check-then-insert write policy keyed on natural keys.

use clickhouse_client::{AnalyticsStore, DedupMode};
use ingest_core::{EnrichedRecord, Result};
use std::sync::Arc;
use telemetry::metrics;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    SkippedDuplicate,
}

/// Writes a record unless a row with the same natural key exists.
///
/// A failed existence check is treated as "absent": the record is inserted
/// rather than lost, at the cost of a possible duplicate.
#[derive(Clone)]
pub struct WritePolicy {
    store: Arc<dyn AnalyticsStore>,
    mode: DedupMode,
}

impl WritePolicy {
    pub fn new(store: Arc<dyn AnalyticsStore>, mode: DedupMode) -> Self {
        Self { store, mode }
    }

    pub fn mode(&self) -> DedupMode {
        self.mode
    }

    pub async fn upsert_if_absent(&self, record: &EnrichedRecord) -> Result<WriteOutcome> {
        let kind = record.kind();
        let key = record.natural_key();

        match self.store.exists(kind, key).await {
            Ok(true) => {
                debug!(kind = %kind, key = %key, "Natural key already stored");
                return Ok(WriteOutcome::SkippedDuplicate);
            }
            Ok(false) => {}
            Err(e) => {
                metrics().lookup_errors.inc();
                warn!(kind = %kind, key = %key, error = %e, "Duplicate lookup failed, inserting anyway");
            }
        }

        self.store.insert(record, self.mode).await?;
        Ok(WriteOutcome::Inserted)
    }
}

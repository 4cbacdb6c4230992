//! In-memory doubles for the queue, the store and the GeoIP database.

use async_trait::async_trait;
use clickhouse_client::{AnalyticsStore, DedupMode};
use ingest_core::{EnrichedRecord, Error, EventLog, PageViewLog, RecordKind, Result};
use parking_lot::Mutex;
use pipeline::{GeoError, GeoLocation, GeoLookup};
use redpanda::{QueueRecord, RecordSource};
use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::Arc;

#[derive(Default)]
struct SourceState {
    queue: VecDeque<Result<QueueRecord>>,
    next_offset: i64,
    reconnects: usize,
    fail_reconnect: bool,
}

/// Queue double. Clones share state, so a test keeps a handle after the
/// dispatcher takes ownership of the source.
#[derive(Clone, Default)]
pub struct MockSource {
    state: Arc<Mutex<SourceState>>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a record with the next offset.
    pub fn push(&self, tag: &str, payload: impl Into<Vec<u8>>) -> i64 {
        let mut state = self.state.lock();
        let offset = state.next_offset;
        state.next_offset += 1;
        state
            .queue
            .push_back(Ok(QueueRecord::new(tag, payload, offset)));
        offset
    }

    /// Queues a read failure.
    pub fn push_error(&self, error: Error) {
        self.state.lock().queue.push_back(Err(error));
    }

    pub fn set_fail_reconnect(&self, fail: bool) {
        self.state.lock().fail_reconnect = fail;
    }

    pub fn reconnect_count(&self) -> usize {
        self.state.lock().reconnects
    }

    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }
}

#[async_trait]
impl RecordSource for MockSource {
    async fn next_record(&mut self) -> Result<QueueRecord> {
        self.state
            .lock()
            .queue
            .pop_front()
            .unwrap_or(Err(Error::Timeout(0)))
    }

    async fn reconnect(&mut self) -> Result<()> {
        let mut state = self.state.lock();
        state.reconnects += 1;
        if state.fail_reconnect {
            return Err(Error::queue("mock broker unreachable"));
        }
        Ok(())
    }
}

#[derive(Default)]
struct StoreState {
    rows: Vec<EnrichedRecord>,
    modes: Vec<DedupMode>,
    lookups: usize,
    insert_attempts: usize,
    fail_lookup: bool,
    fail_insert: bool,
}

/// Store double keeping rows in insertion order.
#[derive(Clone, Default)]
pub struct MockStore {
    state: Arc<Mutex<StoreState>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_fail_lookup(&self, fail: bool) {
        self.state.lock().fail_lookup = fail;
    }

    pub fn set_fail_insert(&self, fail: bool) {
        self.state.lock().fail_insert = fail;
    }

    /// Stored rows.
    pub fn rows(&self) -> Vec<EnrichedRecord> {
        self.state.lock().rows.clone()
    }

    pub fn pageviews(&self) -> Vec<PageViewLog> {
        self.rows()
            .into_iter()
            .filter_map(|r| match r {
                EnrichedRecord::PageView(p) => Some(p),
                EnrichedRecord::EventLog(_) => None,
            })
            .collect()
    }

    pub fn events(&self) -> Vec<EventLog> {
        self.rows()
            .into_iter()
            .filter_map(|r| match r {
                EnrichedRecord::EventLog(e) => Some(e),
                EnrichedRecord::PageView(_) => None,
            })
            .collect()
    }

    /// Modes passed to successful inserts.
    pub fn insert_modes(&self) -> Vec<DedupMode> {
        self.state.lock().modes.clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.state.lock().lookups
    }

    pub fn insert_attempts(&self) -> usize {
        self.state.lock().insert_attempts
    }

    /// Every call the pipeline made into the store.
    pub fn call_count(&self) -> usize {
        let state = self.state.lock();
        state.lookups + state.insert_attempts
    }
}

#[async_trait]
impl AnalyticsStore for MockStore {
    async fn exists(&self, kind: RecordKind, key: &str) -> Result<bool> {
        let mut state = self.state.lock();
        state.lookups += 1;
        if state.fail_lookup {
            return Err(Error::store("mock lookup failure"));
        }
        Ok(state
            .rows
            .iter()
            .any(|r| r.kind() == kind && r.natural_key() == key))
    }

    async fn insert(&self, record: &EnrichedRecord, mode: DedupMode) -> Result<()> {
        let mut state = self.state.lock();
        state.insert_attempts += 1;
        if state.fail_insert {
            return Err(Error::store("mock insert failure"));
        }
        state.rows.push(record.clone());
        state.modes.push(mode);
        Ok(())
    }
}

/// GeoIP double answering every public address with one location.
#[derive(Debug, Clone)]
pub struct StaticGeo {
    pub location: GeoLocation,
}

impl Default for StaticGeo {
    fn default() -> Self {
        Self {
            location: GeoLocation {
                continent: "North America".into(),
                country: "United States".into(),
                province: String::new(),
                city: String::new(),
                location: GeoLocation::format_coordinates(37.751, -97.822),
            },
        }
    }
}

impl GeoLookup for StaticGeo {
    fn lookup(&self, ip: IpAddr) -> std::result::Result<GeoLocation, GeoError> {
        let private = match ip {
            IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
            IpAddr::V6(v6) => v6.is_loopback(),
        };
        if private {
            return Err(GeoError::NotFound(ip));
        }
        Ok(self.location.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> EnrichedRecord {
        EnrichedRecord::EventLog(EventLog {
            id: id.into(),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_mock_source_hands_out_offsets_in_order() {
        let handle = MockSource::new();
        let mut source = handle.clone();
        handle.push("eventlog", b"{}".to_vec());
        handle.push("pageview", b"{}".to_vec());

        assert_eq!(source.next_record().await.unwrap().offset, 0);
        assert_eq!(source.next_record().await.unwrap().key, "pageview");
        assert!(source.next_record().await.unwrap_err().is_timeout());
        assert_eq!(handle.pending(), 0);
    }

    #[tokio::test]
    async fn test_mock_store_tracks_rows_and_failures() {
        let store = MockStore::new();
        store.insert(&event("e1"), DedupMode::Lenient).await.unwrap();
        assert!(store.exists(RecordKind::EventLog, "e1").await.unwrap());
        assert!(!store.exists(RecordKind::PageView, "e1").await.unwrap());

        store.set_fail_insert(true);
        assert!(store.insert(&event("e2"), DedupMode::Lenient).await.is_err());
        assert_eq!(store.events().len(), 1);
        assert_eq!(store.call_count(), 4);
    }

    #[test]
    fn test_static_geo_skips_private_addresses() {
        let geo = StaticGeo::default();
        assert!(geo.lookup("8.8.8.8".parse().unwrap()).is_ok());
        assert!(geo.lookup("10.0.0.1".parse().unwrap()).is_err());
    }
}

//! Common test setup functions.

use clickhouse_client::{schema::init_schema, ClickHouseClient, DedupMode};
use pipeline::{Dispatcher, Enricher, GeoLookup, Outcome, PipelineConfig, WritePolicy};
use std::sync::Arc;
use uuid::Uuid;

use crate::containers::TestContainers;
use crate::mocks::{MockSource, MockStore, StaticGeo};

/// No sleeps between records or before reconnects.
pub fn fast_config(dedup_mode: DedupMode) -> PipelineConfig {
    PipelineConfig {
        reconnect_delay_ms: 0,
        record_delay_ms: 0,
        dedup_mode,
        ..PipelineConfig::default()
    }
}

/// Dispatcher wired to in-memory doubles.
///
/// Runs the real decode, enrichment and write-policy code; only the
/// queue transport, the store and the GeoIP database are replaced.
pub struct TestPipeline {
    pub dispatcher: Dispatcher<MockSource>,
    pub source: MockSource,
    pub store: MockStore,
}

impl TestPipeline {
    pub fn new() -> Self {
        Self::with(Arc::new(StaticGeo::default()), DedupMode::Lenient)
    }

    pub fn with(geo: Arc<dyn GeoLookup>, dedup_mode: DedupMode) -> Self {
        let source = MockSource::new();
        let store = MockStore::new();

        let dispatcher = Dispatcher::new(
            source.clone(),
            Enricher::new(geo),
            WritePolicy::new(Arc::new(store.clone()), dedup_mode),
            fast_config(dedup_mode),
        );

        Self {
            dispatcher,
            source,
            store,
        }
    }

    /// Steps until the queue is empty, returning every outcome.
    pub async fn drain(&mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        while self.source.pending() > 0 {
            outcomes.push(self.dispatcher.step().await);
        }
        outcomes
    }
}

impl Default for TestPipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Real ClickHouse with the pipeline schema in a fresh database.
pub struct ClickHouseContext {
    pub containers: TestContainers,
    pub clickhouse: Arc<ClickHouseClient>,
    pub database: String,
}

impl ClickHouseContext {
    pub async fn new(mode: DedupMode) -> Self {
        let containers = TestContainers::start().await;

        let admin = ClickHouseClient::new(containers.clickhouse_config("default"))
            .expect("Failed to create ClickHouse client");
        let database = format!("analysisdb_{}", Uuid::new_v4().simple());
        admin
            .inner()
            .query(&format!("CREATE DATABASE IF NOT EXISTS {}", database))
            .execute()
            .await
            .expect("Failed to create test database");

        let clickhouse = Arc::new(
            ClickHouseClient::new(containers.clickhouse_config(&database))
                .expect("Failed to create ClickHouse client"),
        );

        init_schema(&clickhouse, mode)
            .await
            .expect("Failed to initialize schema");

        Self {
            containers,
            clickhouse,
            database,
        }
    }
}

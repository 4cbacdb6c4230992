//! The pipeline against a real ClickHouse.
//!
//! Requires Docker for the ClickHouse testcontainer, or
//! `ANALYSISDB_TEST_CLICKHOUSE_URL` pointing at a running server:
//!
//! ```sh
//! cargo test -p integration-tests --test clickhouse_store -- --ignored
//! ```

use clickhouse_client::{
    count_key, count_rows, fetch_eventlog, fetch_pageview, insert::insert_record, key_exists,
    AnalyticsStore, DedupMode,
};
use ingest_core::{decode, RecordKind};
use integration_tests::{
    fixtures,
    mocks::{MockSource, StaticGeo},
    setup::{fast_config, ClickHouseContext},
};
use pipeline::{Dispatcher, Enricher, Outcome, WritePolicy};
use std::sync::Arc;

fn dispatcher(ctx: &ClickHouseContext, mode: DedupMode) -> (Dispatcher<MockSource>, MockSource) {
    let source = MockSource::new();
    let dispatcher = Dispatcher::new(
        source.clone(),
        Enricher::new(Arc::new(StaticGeo::default())),
        WritePolicy::new(ctx.clickhouse.clone(), mode),
        fast_config(mode),
    );
    (dispatcher, source)
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_pageview_round_trip() {
    let ctx = ClickHouseContext::new(DedupMode::Lenient).await;
    let (mut dispatcher, source) = dispatcher(&ctx, DedupMode::Lenient);

    let payload = fixtures::pageview("pv-ch-1", "https://a.test/x", fixtures::CHROME_UA, "8.8.8.8");
    source.push("pageview", fixtures::bytes(&payload));
    assert!(matches!(dispatcher.step().await, Outcome::Inserted { .. }));

    let row = fetch_pageview(&ctx.clickhouse, "pv-ch-1")
        .await
        .expect("Query failed")
        .expect("Row missing");
    assert_eq!(row.host, "a.test");
    assert_eq!(row.browser, "Chrome");
    assert_eq!(row.country, "United States");
    assert!(!row.robot);
    assert_eq!(row.time, fixtures::JAN_2024);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_event_payload_precision_in_store() {
    let ctx = ClickHouseContext::new(DedupMode::Lenient).await;
    let (mut dispatcher, source) = dispatcher(&ctx, DedupMode::Lenient);

    source.push("eventlog", fixtures::precise_event("ev-ch-1"));
    dispatcher.step().await;

    let row = fetch_eventlog(&ctx.clickhouse, "ev-ch-1")
        .await
        .expect("Query failed")
        .expect("Row missing");
    assert_eq!(row.payload, r#"{"amount":12345678901234567890.123456789}"#);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redelivery_is_deduplicated() {
    let ctx = ClickHouseContext::new(DedupMode::Lenient).await;
    let (mut dispatcher, source) = dispatcher(&ctx, DedupMode::Lenient);

    let payload = fixtures::bytes(&fixtures::random_pageview());
    source.push("pageview", payload.clone());
    source.push("pageview", payload);

    assert!(matches!(dispatcher.step().await, Outcome::Inserted { .. }));
    assert!(matches!(dispatcher.step().await, Outcome::Duplicate { .. }));
    assert_eq!(count_rows(&ctx.clickhouse, RecordKind::PageView).await.unwrap(), 1);
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_key_exists_per_table() {
    let ctx = ClickHouseContext::new(DedupMode::Lenient).await;

    let record = decode(RecordKind::EventLog, &fixtures::precise_event("shared")).unwrap();
    ctx.clickhouse
        .insert(&record, DedupMode::Lenient)
        .await
        .expect("Insert failed");

    assert!(key_exists(&ctx.clickhouse, RecordKind::EventLog, "shared").await.unwrap());
    assert!(!key_exists(&ctx.clickhouse, RecordKind::PageView, "shared").await.unwrap());
    assert!(!ctx.clickhouse.exists(RecordKind::EventLog, "other").await.unwrap());
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_strict_mode_drops_racing_insert() {
    let ctx = ClickHouseContext::new(DedupMode::Strict).await;

    // Two writers that both checked before either inserted
    let record = decode(RecordKind::EventLog, &fixtures::precise_event("ev-race")).unwrap();
    insert_record(&ctx.clickhouse, &record, DedupMode::Strict).await.unwrap();
    insert_record(&ctx.clickhouse, &record, DedupMode::Strict).await.unwrap();

    assert_eq!(
        count_key(&ctx.clickhouse, RecordKind::EventLog, "ev-race").await.unwrap(),
        1
    );
}

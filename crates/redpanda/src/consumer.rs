//! Redpanda consumer for the ingest loop.
//!
//! Uses rskafka against partition 0 of a single topic:
//! - Bounded poll per fetch; an empty poll surfaces as a timeout
//! - Offset tracked in memory and kept across reconnects, unless the broker
//!   reports it out of range, in which case it is resolved again from
//!   `start_offset`
//! - Fetched records buffered and handed out one at a time

use crate::config::{RedpandaConfig, StartOffset};
use crate::source::{QueueRecord, RecordSource};
use async_trait::async_trait;
use ingest_core::{Error, Result};
use rskafka::client::{
    error::{Error as KafkaError, ProtocolError},
    partition::{OffsetAt, PartitionClient, UnknownTopicHandling},
    Client, ClientBuilder, Credentials, SaslConfig,
};
use std::collections::VecDeque;
use std::sync::Arc;
use telemetry::metrics;
use tracing::{debug, info, warn};

const PARTITION: i32 = 0;

/// Creates a TLS configuration for Redpanda Cloud.
fn create_tls_config() -> Arc<rustls::ClientConfig> {
    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
}

fn is_offset_out_of_range(error: &KafkaError) -> bool {
    matches!(
        error,
        KafkaError::ServerError {
            protocol_error: ProtocolError::OffsetOutOfRange,
            ..
        }
    )
}

/// Dials the brokers, with TLS and SCRAM when credentials are configured.
pub async fn connect(config: &RedpandaConfig) -> Result<Client> {
    let mut builder = ClientBuilder::new(vec![config.broker_string()]);

    if let Some((username, password)) = config.credentials() {
        builder = builder
            .tls_config(create_tls_config())
            .sasl_config(SaslConfig::ScramSha256(Credentials::new(
                username.to_string(),
                password.to_string(),
            )));
    }

    builder
        .build()
        .await
        .map_err(|e| Error::queue(format!("Failed to connect to Redpanda: {}", e)))
}

/// Consumer for reading page views and events from Redpanda.
pub struct Consumer {
    config: RedpandaConfig,
    partition_client: Option<Arc<PartitionClient>>,
    /// Next offset to fetch; resolved from `start_offset` on first connect
    next_offset: Option<i64>,
    buffered: VecDeque<QueueRecord>,
}

impl Consumer {
    /// Creates a consumer. No connection is made until the first read.
    pub fn new(config: RedpandaConfig) -> Self {
        info!(
            topic = %config.topic,
            brokers = %config.broker_string(),
            start_offset = ?config.start_offset,
            "Creating Redpanda consumer"
        );

        Self {
            config,
            partition_client: None,
            next_offset: None,
            buffered: VecDeque::new(),
        }
    }

    /// Returns the partition client, dialing if there is none.
    async fn ensure_connected(&mut self) -> Result<Arc<PartitionClient>> {
        if let Some(ref client) = self.partition_client {
            return Ok(client.clone());
        }

        let client = connect(&self.config).await?;
        let partition_client = client
            .partition_client(self.config.topic.clone(), PARTITION, UnknownTopicHandling::Error)
            .await
            .map_err(|e| Error::queue(format!("Failed to get partition client: {}", e)))?;
        let partition_client = Arc::new(partition_client);

        if self.next_offset.is_none() {
            let at = match self.config.start_offset {
                StartOffset::Earliest => OffsetAt::Earliest,
                StartOffset::Latest => OffsetAt::Latest,
            };
            let offset = partition_client
                .get_offset(at)
                .await
                .map_err(|e| Error::queue(format!("Failed to get offset: {}", e)))?;

            self.next_offset = Some(offset);
            metrics().consumer_offset.set(offset);

            info!(
                topic = %self.config.topic,
                partition = PARTITION,
                offset = offset,
                "Consumer initialized at offset"
            );
        }

        self.partition_client = Some(partition_client.clone());
        Ok(partition_client)
    }

    /// Fetches the next batch into the buffer.
    async fn fill(&mut self) -> Result<()> {
        let client = self.ensure_connected().await?;
        let offset = self.next_offset.unwrap_or_default();
        let max_wait_ms = i32::try_from(self.config.poll_timeout_ms).unwrap_or(i32::MAX);

        let (records, high_watermark) = match client
            .fetch_records(offset, 1..self.config.max_fetch_bytes, max_wait_ms)
            .await
        {
            Ok(fetched) => fetched,
            Err(e) => {
                self.on_fetch_error(is_offset_out_of_range(&e), offset);
                return Err(Error::queue(format!("Failed to fetch records: {}", e)));
            }
        };

        metrics().consumer_lag.set(high_watermark - offset);

        if records.is_empty() {
            return Err(Error::Timeout(self.config.poll_timeout_ms));
        }

        let mut next = offset;
        for record in records {
            // A fetch may start inside a compressed batch preceding our offset
            if record.offset < offset {
                continue;
            }
            next = next.max(record.offset + 1);

            let key = record
                .record
                .key
                .map(|k| String::from_utf8_lossy(&k).into_owned())
                .unwrap_or_default();
            let value = record.record.value.unwrap_or_default();
            self.buffered
                .push_back(QueueRecord::new(key, value, record.offset));
        }

        debug!(
            fetched = self.buffered.len(),
            offset_start = offset,
            offset_end = next,
            high_watermark = high_watermark,
            "Fetched records from Redpanda"
        );

        self.next_offset = Some(next);
        metrics().consumer_offset.set(next);
        Ok(())
    }

    /// Forgets an offset the broker no longer holds, typically after
    /// retention deleted the segment behind a lagging consumer. The next
    /// connect resolves it again from `start_offset`.
    fn on_fetch_error(&mut self, out_of_range: bool, offset: i64) {
        if !out_of_range {
            return;
        }

        warn!(
            topic = %self.config.topic,
            partition = PARTITION,
            offset = offset,
            start_offset = ?self.config.start_offset,
            "Offset out of range, resetting from start offset"
        );
        self.next_offset = None;
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RedpandaConfig {
        &self.config
    }

    /// Next offset to be fetched, once known.
    pub fn next_offset(&self) -> Option<i64> {
        self.next_offset
    }
}

#[async_trait]
impl RecordSource for Consumer {
    async fn next_record(&mut self) -> Result<QueueRecord> {
        if self.buffered.is_empty() {
            self.fill().await?;
        }

        let record = self
            .buffered
            .pop_front()
            .ok_or(Error::Timeout(self.config.poll_timeout_ms))?;
        metrics().records_consumed.inc();
        Ok(record)
    }

    async fn reconnect(&mut self) -> Result<()> {
        self.partition_client = None;
        metrics().reconnects.inc();
        info!(topic = %self.config.topic, "Reconnecting Redpanda consumer");

        self.ensure_connected().await.map(|_| ())
    }
}

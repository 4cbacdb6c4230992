//! The consume loop: read one record, route it by kind tag, decode, enrich,
//! write. Runs until the process is stopped.
//!
//! Every failure is contained to the record (or read) that caused it and
//! surfaces exactly once, in [`Dispatcher::report`].

use crate::config::PipelineConfig;
use crate::dedup::{WriteOutcome, WritePolicy};
use crate::enrichment::Enricher;
use ingest_core::{decode, DecodeError, Error, RecordKind};
use redpanda::{QueueRecord, RecordSource};
use telemetry::{health, metrics};
use tracing::{debug, error, info, warn};

/// Result of one pass through the loop.
#[derive(Debug)]
pub enum Outcome {
    Inserted { kind: RecordKind, key: String },
    Duplicate { kind: RecordKind, key: String },
    /// Key tag names no known record kind.
    Ignored { tag: String },
    Dropped(DecodeError),
    WriteFailed { kind: RecordKind, key: String, error: Error },
    ReadFailed(Error),
}

impl Outcome {
    pub fn is_read_failure(&self) -> bool {
        matches!(self, Self::ReadFailed(_))
    }
}

/// Single-owner consume loop over a [`RecordSource`].
pub struct Dispatcher<Q: RecordSource> {
    source: Q,
    enricher: Enricher,
    policy: WritePolicy,
    config: PipelineConfig,
    processed: u64,
}

impl<Q: RecordSource> Dispatcher<Q> {
    pub fn new(source: Q, enricher: Enricher, policy: WritePolicy, config: PipelineConfig) -> Self {
        Self {
            source,
            enricher,
            policy,
            config,
            processed: 0,
        }
    }

    pub fn source(&self) -> &Q {
        &self.source
    }

    /// Runs forever. Cancel by dropping the future.
    pub async fn run(&mut self) {
        info!(
            dedup_mode = ?self.policy.mode(),
            reconnect_delay_ms = self.config.reconnect_delay_ms,
            record_delay_ms = self.config.record_delay_ms,
            "Dispatcher starting"
        );

        loop {
            self.step().await;
        }
    }

    /// One Listening -> Processing -> Listening pass.
    pub async fn step(&mut self) -> Outcome {
        match self.source.next_record().await {
            Ok(record) => {
                health().redpanda.set_healthy();

                let offset = record.offset;
                let outcome = self.process(record).await;
                self.report(Some(offset), &outcome);

                let delay = self.config.record_delay();
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                outcome
            }
            Err(e) => {
                let outcome = Outcome::ReadFailed(e);
                self.report(None, &outcome);

                tokio::time::sleep(self.config.reconnect_delay()).await;
                if let Err(e) = self.source.reconnect().await {
                    warn!(error = %e, "Reconnect failed, retrying on next read");
                }
                outcome
            }
        }
    }

    /// Routes one record through decode, enrich and write.
    pub async fn process(&self, record: QueueRecord) -> Outcome {
        let Some(kind) = RecordKind::from_tag(&record.key) else {
            return Outcome::Ignored { tag: record.key };
        };

        let mut decoded = match decode(kind, &record.value) {
            Ok(decoded) => decoded,
            Err(e) => return Outcome::Dropped(e),
        };

        self.enricher.enrich(&mut decoded);
        let key = decoded.natural_key().to_string();

        match self.policy.upsert_if_absent(&decoded).await {
            Ok(WriteOutcome::Inserted) => Outcome::Inserted { kind, key },
            Ok(WriteOutcome::SkippedDuplicate) => Outcome::Duplicate { kind, key },
            Err(error) => Outcome::WriteFailed { kind, key, error },
        }
    }

    /// Logs and counts an outcome.
    fn report(&mut self, offset: Option<i64>, outcome: &Outcome) {
        let m = metrics();

        match outcome {
            Outcome::Inserted { kind, key } => {
                health().clickhouse.set_healthy();
                debug!(offset, kind = %kind, key = %key, "Record stored");
            }
            Outcome::Duplicate { kind, key } => {
                m.duplicates_skipped.inc();
                debug!(offset, kind = %kind, key = %key, "Duplicate skipped");
            }
            Outcome::Ignored { tag } => {
                m.unknown_kind.inc();
                debug!(offset, tag = %tag, "Ignoring record with unknown kind");
            }
            Outcome::Dropped(e) => {
                m.decode_errors.inc();
                warn!(offset, kind = %e.kind(), error = %e, "Dropping undecodable record");
            }
            Outcome::WriteFailed { kind, key, error: e } => {
                m.write_errors.inc();
                health().clickhouse.set_unhealthy(e.to_string());
                error!(offset, kind = %kind, key = %key, error = %e, "Failed to store record");
            }
            Outcome::ReadFailed(e) => {
                m.read_failures.inc();
                if e.is_timeout() {
                    debug!(error = %e, "Read timed out, reconnecting");
                } else {
                    health().redpanda.set_unhealthy(e.to_string());
                    warn!(error = %e, "Read failed, reconnecting");
                }
                return;
            }
        }

        self.processed += 1;
        let interval = self.config.stats_interval_records;
        if interval > 0 && self.processed % interval == 0 {
            let s = m.snapshot();
            info!(
                processed = self.processed,
                offset = s.consumer_offset,
                lag = s.consumer_lag,
                pageviews = s.pageviews_inserted,
                events = s.events_inserted,
                duplicates = s.duplicates_skipped,
                decode_errors = s.decode_errors,
                write_errors = s.write_errors,
                reconnects = s.reconnects,
                insert_p99_ms = s.insert_latency_p99_ms,
                "Pipeline stats"
            );
        }
    }

    /// Records that completed processing (anything but a read failure).
    pub fn processed(&self) -> u64 {
        self.processed
    }
}

//! Pipeline counters and latency histograms.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Last observed value, may be negative (e.g. an offset not yet resolved).
#[derive(Debug, Default)]
pub struct Gauge(AtomicI64);

impl Gauge {
    pub fn set(&self, val: i64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Millisecond latency histogram.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 1ms, 5ms, 10ms, 25ms, 50ms, 100ms, 250ms, 500ms, 1s, 5s, 10s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [1, 5, 10, 25, 50, 100, 250, 500, 1000, 5000, 10000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum.load(Ordering::Relaxed) as f64 / count as f64
        }
    }

    /// Upper bound of the bucket holding the given quantile (0.0..=1.0).
    pub fn quantile_bound(&self, q: f64) -> u64 {
        let count = self.count();
        if count == 0 {
            return 0;
        }

        let target = (count as f64 * q.clamp(0.0, 1.0)).ceil().max(1.0) as u64;
        let mut seen = 0;
        for (bucket, &bound) in self.buckets.iter().zip(Self::BUCKET_BOUNDS.iter()) {
            seen += bucket.load(Ordering::Relaxed);
            if seen >= target {
                return bound;
            }
        }
        Self::BUCKET_BOUNDS[Self::BUCKET_BOUNDS.len() - 1]
    }
}

/// Collected metrics for the ingestion pipeline.
#[derive(Debug, Default)]
pub struct Metrics {
    // Queue
    pub records_consumed: Counter,
    pub read_failures: Counter,
    pub reconnects: Counter,
    pub consumer_offset: Gauge,
    pub consumer_lag: Gauge,

    // Dispatch
    pub unknown_kind: Counter,
    pub decode_errors: Counter,
    pub geo_failures: Counter,

    // Dedup / write
    pub pageviews_inserted: Counter,
    pub events_inserted: Counter,
    pub duplicates_skipped: Counter,
    pub lookup_errors: Counter,
    pub write_errors: Counter,

    // Store round trips
    pub lookup_latency_ms: Histogram,
    pub insert_latency_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            records_consumed: self.records_consumed.get(),
            read_failures: self.read_failures.get(),
            reconnects: self.reconnects.get(),
            consumer_offset: self.consumer_offset.get(),
            consumer_lag: self.consumer_lag.get(),
            unknown_kind: self.unknown_kind.get(),
            decode_errors: self.decode_errors.get(),
            geo_failures: self.geo_failures.get(),
            pageviews_inserted: self.pageviews_inserted.get(),
            events_inserted: self.events_inserted.get(),
            duplicates_skipped: self.duplicates_skipped.get(),
            lookup_errors: self.lookup_errors.get(),
            write_errors: self.write_errors.get(),
            lookup_latency_mean_ms: self.lookup_latency_ms.mean(),
            insert_latency_mean_ms: self.insert_latency_ms.mean(),
            insert_latency_p99_ms: self.insert_latency_ms.quantile_bound(0.99),
        }
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub records_consumed: u64,
    pub read_failures: u64,
    pub reconnects: u64,
    pub consumer_offset: i64,
    pub consumer_lag: i64,
    pub unknown_kind: u64,
    pub decode_errors: u64,
    pub geo_failures: u64,
    pub pageviews_inserted: u64,
    pub events_inserted: u64,
    pub duplicates_skipped: u64,
    pub lookup_errors: u64,
    pub write_errors: u64,
    pub lookup_latency_mean_ms: f64,
    pub insert_latency_mean_ms: f64,
    pub insert_latency_p99_ms: u64,
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}

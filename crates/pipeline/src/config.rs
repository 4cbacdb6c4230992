//! Pipeline configuration (`[pipeline]` section).

use clickhouse_client::DedupMode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// GeoLite2-City database, opened once at startup
    #[serde(default = "default_geoip_path")]
    pub geoip_path: String,
    /// Pause between a failed read and the reconnect
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Pause after each processed record (throughput throttle)
    #[serde(default = "default_record_delay_ms")]
    pub record_delay_ms: u64,
    #[serde(default)]
    pub dedup_mode: DedupMode,
    /// Log a metrics snapshot every N records; 0 disables
    #[serde(default = "default_stats_interval")]
    pub stats_interval_records: u64,
}

fn default_geoip_path() -> String {
    "GeoLite2-City.mmdb".to_string()
}

fn default_reconnect_delay_ms() -> u64 {
    100
}

fn default_record_delay_ms() -> u64 {
    10
}

fn default_stats_interval() -> u64 {
    10_000
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            geoip_path: default_geoip_path(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            record_delay_ms: default_record_delay_ms(),
            dedup_mode: DedupMode::default(),
            stats_interval_records: default_stats_interval(),
        }
    }
}

impl PipelineConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn record_delay(&self) -> Duration {
        Duration::from_millis(self.record_delay_ms)
    }
}

//! Redpanda configuration.

use serde::{Deserialize, Serialize};

/// Where a fresh consumer starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StartOffset {
    /// Replay everything retained; dedup absorbs the repeats.
    Earliest,
    /// Only records produced after startup.
    Latest,
}

/// Redpanda consumer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedpandaConfig {
    /// Broker addresses
    pub brokers: Vec<String>,
    /// Topic carrying both page views and events
    #[serde(default = "default_topic")]
    pub topic: String,
    /// SASL username (enables TLS + SCRAM-SHA-256 together with the password)
    #[serde(default)]
    pub sasl_username: Option<String>,
    /// SASL password
    #[serde(default)]
    pub sasl_password: Option<String>,
    #[serde(default = "default_start_offset")]
    pub start_offset: StartOffset,
    /// Bounded wait for the next record; an empty poll is a read failure
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Upper bound on bytes per fetch
    #[serde(default = "default_max_fetch_bytes")]
    pub max_fetch_bytes: i32,
}

fn default_topic() -> String {
    "analysis".to_string()
}

fn default_start_offset() -> StartOffset {
    StartOffset::Earliest
}

fn default_poll_timeout_ms() -> u64 {
    10_000
}

fn default_max_fetch_bytes() -> i32 {
    1024 * 1024
}

impl Default for RedpandaConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            topic: default_topic(),
            sasl_username: None,
            sasl_password: None,
            start_offset: default_start_offset(),
            poll_timeout_ms: default_poll_timeout_ms(),
            max_fetch_bytes: default_max_fetch_bytes(),
        }
    }
}

impl RedpandaConfig {
    /// Returns the broker list as a comma-separated string.
    pub fn broker_string(&self) -> String {
        self.brokers.join(",")
    }

    /// SASL credentials, only when both halves are set.
    pub fn credentials(&self) -> Option<(&str, &str)> {
        match (&self.sasl_username, &self.sasl_password) {
            (Some(user), Some(pass)) => Some((user.as_str(), pass.as_str())),
            _ => None,
        }
    }
}

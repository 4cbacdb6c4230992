//! Error types for the ingestion pipeline.
//!
//! Everything raised after the consume loop starts is recoverable: decode
//! errors drop one record, queue errors trigger a reconnect, store errors
//! lose one record. Only [`Error::Config`] is raised during startup.

use crate::records::RecordKind;
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// A queue payload that could not be turned into a record.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Not JSON, invalid UTF-8, or a field with the wrong type.
    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: RecordKind,
        #[source]
        source: serde_json::Error,
    },

    /// The payload decoded but carries no natural key.
    #[error("{kind} payload is missing its natural key `{field}`")]
    MissingKey {
        kind: RecordKind,
        field: &'static str,
    },
}

impl DecodeError {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Malformed { kind, .. } | Self::MissingKey { kind, .. } => *kind,
        }
    }

    /// Line and column of a JSON failure, if any.
    pub fn position(&self) -> Option<(usize, usize)> {
        match self {
            Self::Malformed { source, .. } => Some((source.line(), source.column())),
            Self::MissingKey { .. } => None,
        }
    }
}

/// Unified error type for the ingestion pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("queue error: {0}")]
    Queue(String),

    #[error("no record within {0}ms")]
    Timeout(u64),

    #[error("store error: {0}")]
    Store(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn queue(msg: impl Into<String>) -> Self {
        Self::Queue(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for an empty poll, as opposed to a broken connection.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

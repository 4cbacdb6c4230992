//! The queue as seen by the dispatcher.

use async_trait::async_trait;
use ingest_core::Result;

/// One record off the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueRecord {
    /// Kind tag (`pageview`, `eventlog`, ...). Lossy UTF-8 of the record key.
    pub key: String,
    pub value: Vec<u8>,
    pub offset: i64,
}

impl QueueRecord {
    pub fn new(key: impl Into<String>, value: impl Into<Vec<u8>>, offset: i64) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            offset,
        }
    }
}

/// Source of queue records, owned by exactly one dispatcher.
///
/// Implemented by [`crate::Consumer`]; tests substitute an in-memory queue.
#[async_trait]
pub trait RecordSource: Send {
    /// Waits a bounded time for the next record.
    ///
    /// An empty wait is `Error::Timeout`, a broken connection `Error::Queue`.
    async fn next_record(&mut self) -> Result<QueueRecord>;

    /// Drops the current connection and dials again.
    async fn reconnect(&mut self) -> Result<()>;
}

//! Internal telemetry for the analysisdb ingestion pipeline.
//!
//! Counters and health live in process; the dispatcher logs a snapshot
//! at a fixed record interval rather than exporting them anywhere.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;

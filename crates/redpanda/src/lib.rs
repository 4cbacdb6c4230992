//! Redpanda consumer for the ingestion pipeline.

pub mod config;
pub mod consumer;
pub mod health;
pub mod source;

pub use config::*;
pub use consumer::*;
pub use source::*;

//! Core types and codecs for the analysisdb ingestion pipeline.

pub mod codec;
pub mod error;
pub mod records;

pub use codec::decode;
pub use error::{DecodeError, Error, Result};
pub use records::*;

//! The ingest-enrich-dedup-persist pipeline.
//!
//! - Enrichment (host, user agent, GeoIP) for page views
//! - Write policy (check by natural key, then insert)
//! - Dispatcher (the consume loop that ties it together)

pub mod config;
pub mod dedup;
pub mod dispatcher;
pub mod enrichment;
pub mod geo;

pub use config::*;
pub use dedup::{WriteOutcome, WritePolicy};
pub use dispatcher::{Dispatcher, Outcome};
pub use enrichment::Enricher;
pub use geo::{GeoError, GeoLocation, GeoLookup, MaxMindGeo, UnavailableGeo};

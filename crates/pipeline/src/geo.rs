//! GeoIP lookup capability.
//!
//! The database is opened once at startup and shared read-only for the
//! life of the process. When it cannot be opened, [`UnavailableGeo`] stands
//! in and page views are stored without location fields.

use maxminddb::{geoip2, MaxMindDBError, Reader};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("GeoIP database unavailable")]
    Unavailable,

    #[error("invalid IP address: {0:?}")]
    InvalidIp(String),

    #[error("no GeoIP entry for {0}")]
    NotFound(IpAddr),

    #[error("GeoIP database error: {0}")]
    Database(String),
}

impl From<MaxMindDBError> for GeoError {
    fn from(e: MaxMindDBError) -> Self {
        Self::Database(e.to_string())
    }
}

/// Location fields of a page view, English names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeoLocation {
    pub continent: String,
    pub country: String,
    /// First subdivision (province/state), if any.
    pub province: String,
    pub city: String,
    /// `"lat,lon"` with six decimals, empty without coordinates.
    pub location: String,
}

impl GeoLocation {
    pub fn format_coordinates(latitude: f64, longitude: f64) -> String {
        format!("{:.6},{:.6}", latitude, longitude)
    }
}

/// Synchronous `ip -> location` lookup.
pub trait GeoLookup: Send + Sync {
    fn lookup(&self, ip: IpAddr) -> Result<GeoLocation, GeoError>;
}

/// MaxMind GeoLite2/GeoIP2 City database held in memory.
pub struct MaxMindGeo {
    reader: Reader<Vec<u8>>,
}

impl MaxMindGeo {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GeoError> {
        let path = path.as_ref();
        let reader = Reader::open_readfile(path)?;

        info!(
            path = %path.display(),
            database_type = %reader.metadata.database_type,
            "Opened GeoIP database"
        );
        Ok(Self { reader })
    }
}

fn english(names: Option<&BTreeMap<&str, &str>>) -> String {
    names
        .and_then(|n| n.get("en"))
        .map(|name| name.to_string())
        .unwrap_or_default()
}

impl GeoLookup for MaxMindGeo {
    fn lookup(&self, ip: IpAddr) -> Result<GeoLocation, GeoError> {
        let city: geoip2::City = self.reader.lookup(ip).map_err(|e| match e {
            MaxMindDBError::AddressNotFoundError(_) => GeoError::NotFound(ip),
            other => GeoError::from(other),
        })?;

        let province = city
            .subdivisions
            .as_ref()
            .and_then(|subs| subs.first())
            .map(|sub| english(sub.names.as_ref()))
            .unwrap_or_default();

        let location = city
            .location
            .as_ref()
            .and_then(|loc| Some((loc.latitude?, loc.longitude?)))
            .map(|(lat, lon)| GeoLocation::format_coordinates(lat, lon))
            .unwrap_or_default();

        Ok(GeoLocation {
            continent: english(city.continent.as_ref().and_then(|c| c.names.as_ref())),
            country: english(city.country.as_ref().and_then(|c| c.names.as_ref())),
            province,
            city: english(city.city.as_ref().and_then(|c| c.names.as_ref())),
            location,
        })
    }
}

/// Stand-in when no database could be opened.
#[derive(Debug, Default)]
pub struct UnavailableGeo;

impl GeoLookup for UnavailableGeo {
    fn lookup(&self, _ip: IpAddr) -> Result<GeoLocation, GeoError> {
        Err(GeoError::Unavailable)
    }
}

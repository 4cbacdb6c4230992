//! Record kinds and their wire/stored shapes.
//!
//! The browser SDK sends short keys (`i`, `u`, `sc`, ...) to keep beacons
//! small. Raw shapes mirror that wire format; the `*Log` shapes are what
//! lands in ClickHouse, one column per field.
//!
//! Keys match exactly, plus the all-lowercase alias where one is listed
//! (`ip` for `IP`, `time` for `Time`). Other casings such as `Ip` or `Ua`
//! are unknown keys and ignored. A JSON `null` in any field decodes as the
//! field's zero value.

use chrono::{DateTime, Datelike};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Discriminator carried in the queue record key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    PageView,
    EventLog,
}

impl RecordKind {
    pub const ALL: [RecordKind; 2] = [RecordKind::PageView, RecordKind::EventLog];

    /// Parses a queue key. Anything unrecognised is `None`.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "pageview" => Some(Self::PageView),
            "eventlog" => Some(Self::EventLog),
            _ => None,
        }
    }

    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::PageView => "pageview",
            Self::EventLog => "eventlog",
        }
    }

    /// Destination table.
    pub fn table(&self) -> &'static str {
        match self {
            Self::PageView => "pageviewlogs",
            Self::EventLog => "eventlogs",
        }
    }

    /// Column holding the natural key.
    pub fn key_column(&self) -> &'static str {
        match self {
            Self::PageView => "page_id",
            Self::EventLog => "id",
        }
    }

    /// Wire field holding the natural key.
    pub fn key_field(&self) -> &'static str {
        match self {
            Self::PageView => "i",
            Self::EventLog => "Id",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Page view as sent by the browser SDK.
///
/// `Viewtype` is the semantic form of `window.performance.navigation.type`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawPageView {
    #[serde(rename = "i", deserialize_with = "null_as_default")]
    pub page_id: String,
    #[serde(rename = "WebName", alias = "webname", deserialize_with = "null_as_default")]
    pub web_name: String,
    #[serde(rename = "u", deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(rename = "t", deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(rename = "s", deserialize_with = "null_as_default")]
    pub status: i32,
    #[serde(rename = "m", deserialize_with = "null_as_default")]
    pub machine_id: String,
    #[serde(rename = "UA", alias = "ua", deserialize_with = "null_as_default")]
    pub user_agent: String,
    #[serde(rename = "w", deserialize_with = "null_as_default")]
    pub auto_ua: bool,
    #[serde(rename = "sc", deserialize_with = "null_as_default")]
    pub screen: String,
    #[serde(rename = "p", deserialize_with = "null_as_default")]
    pub proto: String,
    #[serde(rename = "Lang", alias = "lang", deserialize_with = "null_as_default")]
    pub lang: String,
    #[serde(rename = "IP", alias = "ip", deserialize_with = "null_as_default")]
    pub ip: String,
    #[serde(rename = "Sessionid", alias = "sessionid", deserialize_with = "null_as_default")]
    pub session_id: String,
    #[serde(rename = "Depth", alias = "depth", deserialize_with = "null_as_default")]
    pub depth: i32,
    #[serde(rename = "r", deserialize_with = "null_as_default")]
    pub referer: String,
    #[serde(rename = "v", deserialize_with = "null_as_default")]
    pub view_type: String,
    #[serde(rename = "Time", alias = "time", deserialize_with = "null_as_default")]
    pub time: i64,
}

/// Stored page view: the raw fields plus everything enrichment derives.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageViewLog {
    pub page_id: String,
    pub web_name: String,
    /// Derived from `url`.
    pub host: String,
    pub url: String,
    pub title: String,
    pub status: i32,

    pub machine_id: String,
    /// `"mobile"` or empty.
    pub machine_type: String,
    pub user_agent: String,
    pub auto_ua: bool,
    pub system: String,
    pub screen: String,
    pub browser: String,
    pub browser_version: String,
    pub proto: String,
    pub robot: bool,

    pub lang: String,
    pub ip: String,
    pub continent: String,
    pub country: String,
    pub province: String,
    pub city: String,
    /// `"lat,lon"`.
    pub location: String,

    pub session_id: String,
    pub depth: i32,
    pub referer: String,
    pub view_type: String,

    /// Unix seconds.
    pub time: i64,
}

impl From<RawPageView> for PageViewLog {
    fn from(raw: RawPageView) -> Self {
        Self {
            page_id: raw.page_id,
            web_name: raw.web_name,
            url: raw.url,
            title: raw.title,
            status: raw.status,
            machine_id: raw.machine_id,
            user_agent: raw.user_agent,
            auto_ua: raw.auto_ua,
            screen: raw.screen,
            proto: raw.proto,
            lang: raw.lang,
            ip: raw.ip,
            session_id: raw.session_id,
            depth: raw.depth,
            referer: raw.referer,
            view_type: raw.view_type,
            time: raw.time,
            ..Self::default()
        }
    }
}

/// Custom event as sent by the browser SDK.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct RawEvent {
    #[serde(rename = "Id", alias = "id", deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(rename = "e", deserialize_with = "null_as_default")]
    pub event_type: String,
    #[serde(rename = "WebName", alias = "webname", deserialize_with = "null_as_default")]
    pub web_name: String,
    #[serde(rename = "u", deserialize_with = "null_as_default")]
    pub url: String,
    #[serde(rename = "i", deserialize_with = "null_as_default")]
    pub page_id: String,
    /// Arbitrary JSON, either pre-serialised as a string or inline.
    #[serde(rename = "c")]
    pub payload: serde_json::Value,
    #[serde(rename = "Time", alias = "time", deserialize_with = "null_as_default")]
    pub time: i64,
}

/// Stored event. Same fields as the raw event, payload as JSON text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    pub id: String,
    pub event_type: String,
    pub web_name: String,
    pub url: String,
    pub page_id: String,
    pub payload: String,
    pub time: i64,
}

impl From<RawEvent> for EventLog {
    fn from(raw: RawEvent) -> Self {
        let payload = match raw.payload {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(text) => text,
            other => other.to_string(),
        };

        Self {
            id: raw.id,
            event_type: raw.event_type,
            web_name: raw.web_name,
            url: raw.url,
            page_id: raw.page_id,
            payload,
            time: raw.time,
        }
    }
}

/// A decoded record on its way to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichedRecord {
    PageView(PageViewLog),
    EventLog(EventLog),
}

impl EnrichedRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::PageView(_) => RecordKind::PageView,
            Self::EventLog(_) => RecordKind::EventLog,
        }
    }

    pub fn natural_key(&self) -> &str {
        match self {
            Self::PageView(p) => &p.page_id,
            Self::EventLog(e) => &e.id,
        }
    }

    pub fn time(&self) -> i64 {
        match self {
            Self::PageView(p) => p.time,
            Self::EventLog(e) => e.time,
        }
    }

    /// Storage partition (`YYYYMM`).
    pub fn partition_month(&self) -> u32 {
        partition_month(self.time())
    }
}

/// `YYYYMM` of a Unix-seconds timestamp in UTC, matching
/// `toYYYYMM(toDateTime(time))`. Out-of-range timestamps give 0.
pub fn partition_month(epoch_secs: i64) -> u32 {
    DateTime::from_timestamp(epoch_secs, 0)
        .and_then(|t| {
            u32::try_from(t.year())
                .ok()?
                .checked_mul(100)?
                .checked_add(t.month())
        })
        .unwrap_or(0)
}

//! Page view enrichment.
//!
//! Three independent, best-effort transforms: host from URL, browser/OS
//! from the user agent, location from the client IP. Each degrades to
//! empty fields on failure and never stops the record from being stored.

use crate::geo::{GeoError, GeoLookup};
use ingest_core::{EnrichedRecord, PageViewLog};
use std::net::IpAddr;
use std::sync::Arc;
use telemetry::metrics;
use tracing::warn;
use url::Url;
use woothee::parser::Parser;

/// Value woothee reports for anything it cannot classify.
const UNKNOWN: &str = "UNKNOWN";

/// Device tag for phones and other mobile agents.
pub const MOBILE: &str = "mobile";

/// Host component of a URL, empty when the URL does not parse.
pub fn extract_host(raw: &str) -> String {
    Url::parse(raw)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_matches(['[', ']']).to_string()))
        .unwrap_or_default()
}

/// What a user-agent string says about the client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAgentInfo {
    pub system: String,
    pub browser: String,
    pub browser_version: String,
    pub machine_type: Option<&'static str>,
    pub robot: bool,
}

fn known(value: &str) -> String {
    if value == UNKNOWN {
        String::new()
    } else {
        value.to_string()
    }
}

/// Page view enricher.
///
/// Uses woothee for UA parsing and an injected [`GeoLookup`] for IPs.
pub struct Enricher {
    parser: Parser,
    geo: Arc<dyn GeoLookup>,
}

impl Enricher {
    pub fn new(geo: Arc<dyn GeoLookup>) -> Self {
        Self {
            parser: Parser::new(),
            geo,
        }
    }

    /// Classifies a user agent. An empty or unparseable agent yields defaults.
    pub fn classify_user_agent(&self, user_agent: &str) -> UserAgentInfo {
        if user_agent.is_empty() {
            return UserAgentInfo::default();
        }

        let Some(result) = self.parser.parse(user_agent) else {
            return UserAgentInfo::default();
        };

        // woothee categories: pc, smartphone, mobilephone, crawler, appliance, misc
        let machine_type = match result.category {
            "smartphone" | "mobilephone" => Some(MOBILE),
            _ => None,
        };

        UserAgentInfo {
            system: known(result.os),
            browser: known(result.name),
            browser_version: known(result.version),
            machine_type,
            robot: result.category == "crawler",
        }
    }

    /// Fills in derived fields of a page view. Events pass through untouched.
    pub fn enrich(&self, record: &mut EnrichedRecord) {
        if let EnrichedRecord::PageView(page) = record {
            self.enrich_pageview(page);
        }
    }

    pub fn enrich_pageview(&self, page: &mut PageViewLog) {
        page.host = extract_host(&page.url);

        let ua = self.classify_user_agent(&page.user_agent);
        page.system = ua.system;
        page.browser = ua.browser;
        page.browser_version = ua.browser_version;
        page.machine_type = ua.machine_type.unwrap_or_default().to_string();
        page.robot = ua.robot;

        match self.locate(&page.ip) {
            Ok(geo) => {
                page.continent = geo.continent;
                page.country = geo.country;
                page.province = geo.province;
                page.city = geo.city;
                page.location = geo.location;
            }
            Err(e) => {
                metrics().geo_failures.inc();
                warn!(page_id = %page.page_id, ip = %page.ip, error = %e, "GeoIP lookup failed");
            }
        }
    }

    fn locate(&self, ip: &str) -> Result<crate::geo::GeoLocation, GeoError> {
        let addr: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| GeoError::InvalidIp(ip.to_string()))?;
        self.geo.lookup(addr)
    }
}

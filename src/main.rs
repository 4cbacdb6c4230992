//! analysisdb ingestion pipeline
//!
//! Consumes page views and events from Redpanda, enriches page views with
//! host, user-agent and GeoIP fields, drops records whose natural key is
//! already stored, and appends the rest to ClickHouse.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use clickhouse_client::{ClickHouseClient, ClickHouseConfig};
use pipeline::{
    Dispatcher, Enricher, GeoLookup, MaxMindGeo, PipelineConfig, UnavailableGeo, WritePolicy,
};
use redpanda::{Consumer, RedpandaConfig};
use telemetry::{health, init_tracing, LogConfig};

/// Application configuration.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default)]
    redpanda: RedpandaConfig,

    #[serde(default)]
    clickhouse: ClickHouseConfig,

    #[serde(default)]
    pipeline: PipelineConfig,

    #[serde(default)]
    log: LogConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23+ requires explicit crypto provider selection before any TLS
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    dotenvy::dotenv().ok();

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            init_tracing(&LogConfig::default().with_env_overrides());
            error!("Invalid configuration: {:#}", e);
            return Err(e);
        }
    };

    init_tracing(&config.log.clone().with_env_overrides());

    info!("Starting analysisdb ingest v{}", env!("CARGO_PKG_VERSION"));

    info!(
        brokers = %config.redpanda.broker_string(),
        topic = %config.redpanda.topic,
        sasl_username = config.redpanda.sasl_username.as_deref().unwrap_or("none"),
        clickhouse_url = %config.clickhouse.url,
        database = %config.clickhouse.database,
        dedup_mode = ?config.pipeline.dedup_mode,
        "Loaded configuration"
    );

    let clickhouse = Arc::new(
        ClickHouseClient::new(config.clickhouse.clone())
            .context("Failed to create ClickHouse client")?,
    );

    if let Err(e) =
        clickhouse_client::schema::init_schema(&clickhouse, config.pipeline.dedup_mode).await
    {
        error!("Failed to initialize ClickHouse schema: {}", e);
        // Continue anyway - tables may already exist
    }

    check_health(&config, &clickhouse).await;

    let geo = open_geo(&config.pipeline);
    let enricher = Enricher::new(geo);
    let policy = WritePolicy::new(clickhouse.clone(), config.pipeline.dedup_mode);
    let consumer = Consumer::new(config.redpanda.clone());

    let mut dispatcher = Dispatcher::new(consumer, enricher, policy, config.pipeline.clone());

    tokio::select! {
        _ = dispatcher.run() => {}
        _ = shutdown_signal() => {}
    }

    let s = telemetry::metrics().snapshot();
    info!(
        processed = dispatcher.processed(),
        pageviews = s.pageviews_inserted,
        events = s.events_inserted,
        duplicates = s.duplicates_skipped,
        "Shutdown complete"
    );
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("ANALYSISDB")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // The config crate's nested parsing doesn't work reliably with underscored field names
    if let Ok(brokers) = std::env::var("ANALYSISDB_REDPANDA_BROKERS") {
        config.redpanda.brokers = brokers.split(',').map(|s| s.trim().to_string()).collect();
    }
    if let Ok(topic) = std::env::var("ANALYSISDB_REDPANDA_TOPIC") {
        config.redpanda.topic = topic;
    }
    if let Ok(username) = std::env::var("ANALYSISDB_REDPANDA_SASL_USERNAME") {
        config.redpanda.sasl_username = Some(username);
    }
    if let Ok(password) = std::env::var("ANALYSISDB_REDPANDA_SASL_PASSWORD") {
        config.redpanda.sasl_password = Some(password);
    }
    if let Ok(url) = std::env::var("ANALYSISDB_CLICKHOUSE_URL") {
        config.clickhouse.url = url;
    }
    if let Ok(password) = std::env::var("ANALYSISDB_CLICKHOUSE_PASSWORD") {
        config.clickhouse.password = Some(password);
    }
    if let Ok(path) = std::env::var("ANALYSISDB_GEOIP_PATH") {
        config.pipeline.geoip_path = path;
    }

    if config.redpanda.brokers.is_empty() {
        anyhow::bail!("No Redpanda brokers configured");
    }

    Ok(config)
}

/// Opens the GeoIP database, falling back to no location data.
fn open_geo(config: &PipelineConfig) -> Arc<dyn GeoLookup> {
    match MaxMindGeo::open(&config.geoip_path) {
        Ok(geo) => {
            health().geoip.set_healthy();
            Arc::new(geo)
        }
        Err(e) => {
            health().geoip.set_unhealthy(e.to_string());
            warn!(
                path = %config.geoip_path,
                error = %e,
                "GeoIP database unavailable, page views will be stored without location"
            );
            Arc::new(UnavailableGeo)
        }
    }
}

/// Check component health on startup.
async fn check_health(config: &Config, clickhouse: &ClickHouseClient) {
    if redpanda::health::check_connection(&config.redpanda).await {
        health().redpanda.set_healthy();
        info!("Redpanda connection: healthy");
    } else {
        health().redpanda.set_unhealthy("Connection failed");
        error!("Redpanda connection: unhealthy");
    }

    if clickhouse_client::health::check_connection(clickhouse).await {
        health().clickhouse.set_healthy();
        info!("ClickHouse connection: healthy");
    } else {
        health().clickhouse.set_unhealthy("Connection failed");
        error!("ClickHouse connection: unhealthy");
    }

    let report = health().report();
    info!(status = ?report.status, "Startup health");
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}

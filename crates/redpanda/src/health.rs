//! Redpanda health checks.

use crate::config::RedpandaConfig;
use crate::consumer::connect;
use std::time::Duration;
use tracing::{debug, error, warn};

/// rskafka retries dialing indefinitely; startup checks must not.
const CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Check Redpanda connection health and that the topic exists.
pub async fn check_connection(config: &RedpandaConfig) -> bool {
    let probe = async {
        let client = connect(config).await?;
        client
            .list_topics()
            .await
            .map_err(|e| ingest_core::Error::queue(format!("Failed to list topics: {}", e)))
    };

    match tokio::time::timeout(CHECK_TIMEOUT, probe).await {
        Ok(Ok(topics)) => {
            let found = topics.iter().any(|t| t.name == config.topic);
            if !found {
                warn!(topic = %config.topic, "Topic not found on Redpanda");
            }
            debug!(topics = topics.len(), "Redpanda connection healthy");
            found
        }
        Ok(Err(e)) => {
            error!("Redpanda health check failed: {}", e);
            false
        }
        Err(_) => {
            error!(
                timeout_secs = CHECK_TIMEOUT.as_secs(),
                "Redpanda health check timed out"
            );
            false
        }
    }
}

//! Kafka probe implementation.

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};

use super::{ProbeError, ProbeOutcome};
use crate::db::KafkaOptions;

const DEFAULT_CLIENT_ID: &str = "service-weaver-healthcheck";

/// Fetch cluster metadata from the broker. A configured topic must exist and
/// have at least one partition, otherwise the service degrades.
///
/// librdkafka's metadata fetch is blocking, so the whole exchange runs on
/// the blocking pool.
pub(super) async fn probe(
    host: &str,
    port: u16,
    opts: &KafkaOptions,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let brokers = format!("{}:{}", host, port);
    let client_id = opts
        .client_id
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_CLIENT_ID.to_string());
    let topic = opts.topic.clone().filter(|s| !s.is_empty());

    tokio::task::spawn_blocking(move || {
        let consumer: BaseConsumer = ClientConfig::new()
            .set("bootstrap.servers", &brokers)
            .set("client.id", &client_id)
            .create()
            .map_err(|e| ProbeError::Config(e.to_string()))?;

        let metadata = consumer
            .fetch_metadata(None, deadline)
            .map_err(|e| ProbeError::Network(e.to_string()))?;

        if metadata.brokers().is_empty() {
            return Err(ProbeError::Network("no brokers available".to_string()));
        }

        if let Some(topic) = topic {
            match metadata.topics().iter().find(|t| t.name() == topic) {
                None => {
                    return Ok(ProbeOutcome::degraded(format!(
                        "topic '{}' does not exist",
                        topic
                    )))
                }
                Some(t) if t.partitions().is_empty() => {
                    return Ok(ProbeOutcome::degraded(format!(
                        "topic '{}' has no partitions",
                        topic
                    )))
                }
                Some(_) => {}
            }
        }

        Ok(ProbeOutcome::alive())
    })
    .await
    .map_err(|e| ProbeError::Command(format!("kafka probe task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_broker_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let opts = KafkaOptions {
            topic: None,
            client_id: None,
        };
        assert!(probe("127.0.0.1", port, &opts, Duration::from_millis(500))
            .await
            .is_err());
    }
}

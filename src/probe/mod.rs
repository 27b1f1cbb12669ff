//! Protocol probe library.
//!
//! One module per protocol. Every probe opens its own transport, takes the
//! per-service deadline, and shares no state with other probes.

mod classify;
mod dns;
mod ftp;
mod grpc;
mod http;
mod icmp;
mod kafka;
mod mongo;
mod mysql;
mod postgres;
mod redis;
mod smtp;
mod ssh;
mod tcp;
mod udp;
mod ws;

use std::time::Duration;

use thiserror::Error;

use crate::config::PostgresProbeConfig;
use crate::db::{ProbeSpec, ServiceSpec, ServiceStatus};

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("command failed: {0}")]
    Command(String),
}

impl From<std::io::Error> for ProbeError {
    fn from(e: std::io::Error) -> Self {
        ProbeError::Network(e.to_string())
    }
}

/// Outcome of one probe invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub status: ServiceStatus,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl ProbeOutcome {
    pub fn alive() -> Self {
        Self {
            status: ServiceStatus::Alive,
            status_code: None,
            error: None,
        }
    }

    pub fn degraded(detail: impl Into<String>) -> Self {
        Self {
            status: ServiceStatus::Degraded,
            status_code: None,
            error: Some(detail.into()),
        }
    }

    pub fn dead(error: impl Into<String>) -> Self {
        Self {
            status: ServiceStatus::Dead,
            status_code: None,
            error: Some(error.into()),
        }
    }
}

/// Run the probe selected by the spec's method.
///
/// Errors never propagate upward; they become `Dead` outcomes with the
/// error text recorded. Unrecognized methods fail before any I/O.
pub async fn run_probe(
    spec: &ServiceSpec,
    deadline: Duration,
    pg: &PostgresProbeConfig,
) -> ProbeOutcome {
    let result = match &spec.probe {
        ProbeSpec::Http(opts) => http::probe(&spec.host, spec.port, opts, false, deadline).await,
        ProbeSpec::Https(opts) => http::probe(&spec.host, spec.port, opts, true, deadline).await,
        ProbeSpec::Tcp(opts) => tcp::probe(&spec.host, spec.port, opts, deadline).await,
        ProbeSpec::Udp(opts) => udp::probe(&spec.host, spec.port, opts, deadline).await,
        ProbeSpec::Icmp(opts) => icmp::probe(&spec.host, opts, deadline).await,
        ProbeSpec::Dns(opts) => dns::probe(&spec.host, opts, deadline).await,
        ProbeSpec::WebSocket(opts) => ws::probe(&spec.host, spec.port, opts, false, deadline).await,
        ProbeSpec::Wss(opts) => ws::probe(&spec.host, spec.port, opts, true, deadline).await,
        ProbeSpec::Grpc(opts) => grpc::probe(&spec.host, spec.port, opts, deadline).await,
        ProbeSpec::Smtp => smtp::probe(&spec.host, spec.port, deadline).await,
        ProbeSpec::Ftp => ftp::probe(&spec.host, spec.port, deadline).await,
        ProbeSpec::Ssh => ssh::probe(&spec.host, spec.port, deadline).await,
        ProbeSpec::Redis => redis::probe(&spec.host, spec.port, deadline).await,
        ProbeSpec::Mysql => mysql::probe(&spec.host, spec.port, deadline).await,
        ProbeSpec::Postgres(opts) => {
            postgres::probe(&spec.host, spec.port, opts, pg, deadline).await
        }
        ProbeSpec::MongoDb => mongo::probe(&spec.host, spec.port, deadline).await,
        ProbeSpec::Kafka(opts) => kafka::probe(&spec.host, spec.port, opts, deadline).await,
        ProbeSpec::Unsupported { requested } => {
            return ProbeOutcome::dead(format!("unsupported health check method: {}", requested));
        }
    };

    result.unwrap_or_else(|e| ProbeOutcome::dead(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UdpOptions;

    fn spec(probe: ProbeSpec) -> ServiceSpec {
        ServiceSpec {
            id: 1,
            host: "localhost".to_string(),
            port: 9,
            polling_interval: 30,
            timeout: 1,
            probe,
        }
    }

    #[tokio::test]
    async fn unsupported_method_dies_without_io() {
        let outcome = run_probe(
            &spec(ProbeSpec::Unsupported {
                requested: "GOPHER".into(),
            }),
            Duration::from_secs(1),
            &PostgresProbeConfig::default(),
        )
        .await;
        assert_eq!(outcome.status, ServiceStatus::Dead);
        assert_eq!(
            outcome.error.as_deref(),
            Some("unsupported health check method: GOPHER")
        );
    }

    #[tokio::test]
    async fn config_errors_become_dead_outcomes() {
        let outcome = run_probe(
            &spec(ProbeSpec::Udp(UdpOptions {
                send_data: String::new(),
                expect_data: None,
            })),
            Duration::from_secs(1),
            &PostgresProbeConfig::default(),
        )
        .await;
        assert_eq!(outcome.status, ServiceStatus::Dead);
        assert!(outcome.error.unwrap().contains("send data is required"));
    }
}

//! gRPC probe against the standard health-check service.

use std::time::Duration;

use tonic::transport::Endpoint;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;
use tonic_health::pb::HealthCheckRequest;

use super::{ProbeError, ProbeOutcome};
use crate::db::GrpcOptions;

/// Open a plaintext channel and call `grpc.health.v1.Health/Check` with the
/// configured service name. SERVING means alive; any other valid response
/// status degrades; transport errors kill.
pub(super) async fn probe(
    host: &str,
    port: u16,
    opts: &GrpcOptions,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let endpoint = Endpoint::from_shared(format!("http://{}:{}", host, port))
        .map_err(|e| ProbeError::Config(format!("invalid gRPC endpoint: {}", e)))?
        .connect_timeout(deadline)
        .timeout(deadline);

    let channel = endpoint
        .connect()
        .await
        .map_err(|e| ProbeError::Network(e.to_string()))?;

    let mut client = HealthClient::new(channel);
    let response = client
        .check(HealthCheckRequest {
            service: opts.service.clone(),
        })
        .await
        .map_err(|e| ProbeError::Network(format!("gRPC health check failed: {}", e)))?;

    let status = response.into_inner().status();
    if status == ServingStatus::Serving {
        Ok(ProbeOutcome::alive())
    } else {
        Ok(ProbeOutcome::degraded(format!(
            "gRPC service status: {:?}",
            status
        )))
    }
}

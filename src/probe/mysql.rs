//! MySQL probe implementation.

use std::time::{Duration, Instant};

use sqlx::mysql::MySqlConnectOptions;
use sqlx::{ConnectOptions, Connection};
use tokio::time::timeout;

use super::{ProbeError, ProbeOutcome};

/// Connect with the fixed healthcheck credentials and ping. Servers that
/// reject the credentials fail the connect, which is the intended signal:
/// the probe checks the listener, not the account.
pub(super) async fn probe(
    host: &str,
    port: u16,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let started = Instant::now();
    let options = MySqlConnectOptions::new()
        .host(host)
        .port(port)
        .username("healthcheck")
        .password("healthcheck");

    let mut conn = timeout(deadline, options.connect())
        .await
        .map_err(|_| ProbeError::Timeout(deadline))?
        .map_err(|e| ProbeError::Network(e.to_string()))?;

    let remaining = deadline.saturating_sub(started.elapsed());
    timeout(remaining, conn.ping())
        .await
        .map_err(|_| ProbeError::Timeout(deadline))?
        .map_err(|e| ProbeError::Network(e.to_string()))?;

    let _ = conn.close().await;
    Ok(ProbeOutcome::alive())
}

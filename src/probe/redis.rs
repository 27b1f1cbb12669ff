//! Redis probe implementation.

use std::time::{Duration, Instant};

use tokio::time::timeout;

use super::{ProbeError, ProbeOutcome};

/// Connect and issue a PING; anything but PONG is a failure.
pub(super) async fn probe(
    host: &str,
    port: u16,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let started = Instant::now();
    let client = redis::Client::open(format!("redis://{}:{}/", host, port))
        .map_err(|e| ProbeError::Config(e.to_string()))?;

    let mut conn = timeout(deadline, client.get_multiplexed_async_connection())
        .await
        .map_err(|_| ProbeError::Timeout(deadline))?
        .map_err(|e| ProbeError::Network(e.to_string()))?;

    let remaining = deadline.saturating_sub(started.elapsed());
    let reply: String = timeout(remaining, redis::cmd("PING").query_async(&mut conn))
        .await
        .map_err(|_| ProbeError::Timeout(deadline))?
        .map_err(|e| ProbeError::Network(e.to_string()))?;

    if reply != "PONG" {
        return Err(ProbeError::Network(format!(
            "unexpected PING reply: {}",
            reply
        )));
    }

    Ok(ProbeOutcome::alive())
}

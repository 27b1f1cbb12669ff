//! TCP probe implementation.

use std::time::{Duration, Instant};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{ProbeError, ProbeOutcome};
use crate::db::TcpOptions;

/// Dial `{host}:{port}`; optionally write `send_data` and require
/// `expect_data` as a substring of the first 1 KiB read back.
pub(super) async fn probe(
    host: &str,
    port: u16,
    opts: &TcpOptions,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let started = Instant::now();
    let addr = format!("{}:{}", host, port);

    let mut stream = timeout(deadline, TcpStream::connect(&addr))
        .await
        .map_err(|_| ProbeError::Timeout(deadline))??;

    if let Some(send) = opts.send_data.as_deref().filter(|s| !s.is_empty()) {
        stream.write_all(send.as_bytes()).await?;

        if let Some(expect) = opts.expect_data.as_deref().filter(|s| !s.is_empty()) {
            let remaining = deadline.saturating_sub(started.elapsed());
            let mut buf = vec![0u8; 1024];
            let n = timeout(remaining, stream.read(&mut buf))
                .await
                .map_err(|_| ProbeError::Timeout(deadline))??;
            let response = String::from_utf8_lossy(&buf[..n]).into_owned();
            if !response.contains(expect) {
                return Err(ProbeError::Network(format!(
                    "expected response '{}' not found in '{}'",
                    expect, response
                )));
            }
        }
    }

    Ok(ProbeOutcome::alive())
}

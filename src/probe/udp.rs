//! UDP probe implementation.

use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::{ProbeError, ProbeOutcome};
use crate::db::UdpOptions;

/// Send `send_data` to `{host}:{port}`; when `expect_data` is set, require it
/// as a substring of the reply. Send data is mandatory for UDP, since a bare
/// datagram socket gives no liveness signal.
pub(super) async fn probe(
    host: &str,
    port: u16,
    opts: &UdpOptions,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    if opts.send_data.is_empty() {
        return Err(ProbeError::Config("UDP send data is required".to_string()));
    }

    let started = Instant::now();
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    timeout(deadline, socket.connect(format!("{}:{}", host, port)))
        .await
        .map_err(|_| ProbeError::Timeout(deadline))??;

    socket.send(opts.send_data.as_bytes()).await?;

    if let Some(expect) = opts.expect_data.as_deref().filter(|s| !s.is_empty()) {
        let remaining = deadline.saturating_sub(started.elapsed());
        let mut buf = vec![0u8; 1024];
        let n = timeout(remaining, socket.recv(&mut buf))
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

    Ok(ProbeOutcome::alive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ServiceStatus;

    async fn echo_server(reply: &'static [u8]) -> u16 {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let port = socket.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut buf = [0u8; 256];
            if let Ok((_, peer)) = socket.recv_from(&mut buf).await {
                let _ = socket.send_to(reply, peer).await;
            }
        });
        port
    }

    #[tokio::test]
    async fn missing_send_data_fails_before_io() {
        let opts = UdpOptions {
            send_data: String::new(),
            expect_data: None,
        };
        let err = probe("127.0.0.1", 9, &opts, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Config(_)));
    }

    #[tokio::test]
    async fn send_without_expect_is_alive() {
        let port = echo_server(b"ignored").await;
        let opts = UdpOptions {
            send_data: "status".into(),
            expect_data: None,
        };
        let outcome = probe("127.0.0.1", port, &opts, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome.status, ServiceStatus::Alive);
    }

    #[tokio::test]
    async fn matching_reply_is_alive() {
        let port = echo_server(b"version 1.2.3").await;
        let opts = UdpOptions {
            send_data: "version".into(),
            expect_data: Some("1.2".into()),
        };
        let outcome = probe("127.0.0.1", port, &opts, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome.status, ServiceStatus::Alive);
    }

    #[tokio::test]
    async fn mismatched_reply_is_an_error() {
        let port = echo_server(b"nope").await;
        let opts = UdpOptions {
            send_data: "version".into(),
            expect_data: Some("1.2".into()),
        };
        let err = probe("127.0.0.1", port, &opts, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected response"));
    }
}

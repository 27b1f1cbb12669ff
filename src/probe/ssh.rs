//! SSH probe implementation.
//!
//! Reads the server's identification exchange instead of opening an
//! authenticated session: a listener that presents an `SSH-` identification
//! string within the deadline is considered alive.

use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{ProbeError, ProbeOutcome};

pub(super) async fn probe(
    host: &str,
    port: u16,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let started = Instant::now();
    let stream = timeout(deadline, TcpStream::connect(format!("{}:{}", host, port)))
        .await
        .map_err(|_| ProbeError::Timeout(deadline))??;
    let mut lines = BufReader::new(stream).lines();

    // Servers may send free-form lines before the identification string
    // (RFC 4253 §4.2); skip until it arrives or the peer hangs up.
    loop {
        let remaining = deadline.saturating_sub(started.elapsed());
        let line = timeout(remaining, lines.next_line())
            .await
            .map_err(|_| ProbeError::Timeout(deadline))??;
        match line {
            None => {
                return Err(ProbeError::Network(
                    "connection closed before SSH identification".to_string(),
                ))
            }
            Some(line) => {
                if line.trim_end_matches('\r').starts_with("SSH-") {
                    return Ok(ProbeOutcome::alive());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ServiceStatus;
    use tokio::io::AsyncWriteExt;

    async fn server_sending(payload: &'static str) -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let _ = stream.write_all(payload.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        port
    }

    #[tokio::test]
    async fn identification_string_is_alive() {
        let port = server_sending("SSH-2.0-OpenSSH_9.6\r\n").await;
        let outcome = probe("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome.status, ServiceStatus::Alive);
    }

    #[tokio::test]
    async fn pre_identification_banner_is_skipped() {
        let port = server_sending("welcome to the bastion\r\nSSH-2.0-OpenSSH_9.6\r\n").await;
        let outcome = probe("127.0.0.1", port, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome.status, ServiceStatus::Alive);
    }

    #[tokio::test]
    async fn non_ssh_service_is_an_error() {
        let port = server_sending("HTTP/1.1 200 OK\r\n\r\n").await;
        assert!(probe("127.0.0.1", port, Duration::from_secs(1)).await.is_err());
    }
}

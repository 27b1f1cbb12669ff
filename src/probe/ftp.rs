//! FTP probe implementation.

use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{ProbeError, ProbeOutcome};

/// Read the server banner, send QUIT, read the goodbye line. Every step must
/// succeed within the deadline.
pub(super) async fn probe(
    host: &str,
    port: u16,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let started = Instant::now();
    let stream = timeout(deadline, TcpStream::connect(format!("{}:{}", host, port)))
        .await
        .map_err(|_| ProbeError::Timeout(deadline))??;
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let remaining = deadline.saturating_sub(started.elapsed());
    timeout(remaining, lines.next_line())
        .await
        .map_err(|_| ProbeError::Timeout(deadline))??
        .ok_or_else(|| ProbeError::Network("connection closed before banner".to_string()))?;

    write_half.write_all(b"QUIT\r\n").await?;

    let remaining = deadline.saturating_sub(started.elapsed());
    timeout(remaining, lines.next_line())
        .await
        .map_err(|_| ProbeError::Timeout(deadline))??
        .ok_or_else(|| ProbeError::Network("connection closed before QUIT reply".to_string()))?;

    Ok(ProbeOutcome::alive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ServiceStatus;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

    async fn ftp_server(send_banner: bool) -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let (read_half, mut write_half) = stream.into_split();
                if !send_banner {
                    return;
                }
                let _ = write_half.write_all(b"220 FTP ready\r\n").await;
                let mut lines = BufReader::new(read_half).lines();
                if let Ok(Some(line)) = lines.next_line().await {
                    if line.starts_with("QUIT") {
                        let _ = write_half.write_all(b"221 Bye\r\n").await;
                    }
                }
            }
        });
        port
    }

    #[tokio::test]
    async fn banner_and_quit_is_alive() {
        let port = ftp_server(true).await;
        let outcome = probe("127.0.0.1", port, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(outcome.status, ServiceStatus::Alive);
    }

    #[tokio::test]
    async fn silent_server_is_an_error() {
        let port = ftp_server(false).await;
        assert!(probe("127.0.0.1", port, Duration::from_secs(1)).await.is_err());
    }
}

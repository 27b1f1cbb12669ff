//! SMTP probe implementation.

use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;
use tokio::time::timeout;

use super::{ProbeError, ProbeOutcome};

/// Dial the mail server, expect a 220 greeting, send NOOP, expect 250.
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

    let greeting = read_reply(&mut lines, remaining(deadline, started)).await?;
    if !greeting.starts_with("220") {
        return Err(ProbeError::Network(format!(
            "unexpected SMTP greeting: {}",
            greeting
        )));
    }

    write_half.write_all(b"NOOP\r\n").await?;

    let reply = read_reply(&mut lines, remaining(deadline, started)).await?;
    if !reply.starts_with("250") {
        return Err(ProbeError::Network(format!("SMTP NOOP rejected: {}", reply)));
    }

    Ok(ProbeOutcome::alive())
}

fn remaining(deadline: Duration, started: Instant) -> Duration {
    deadline.saturating_sub(started.elapsed())
}

/// Read one SMTP reply, consuming multiline continuations ("250-...").
async fn read_reply(
    lines: &mut Lines<BufReader<OwnedReadHalf>>,
    deadline: Duration,
) -> Result<String, ProbeError> {
    loop {
        let line = timeout(deadline, lines.next_line())
            .await
            .map_err(|_| ProbeError::Timeout(deadline))??
            .ok_or_else(|| ProbeError::Network("connection closed mid-reply".to_string()))?;
        if line.len() < 4 || line.as_bytes()[3] != b'-' {
            return Ok(line);
        }
    }
}

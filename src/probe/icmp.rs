//! ICMP probe via the host ping utility.

use std::process::Stdio;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;

use super::{ProbeError, ProbeOutcome};
use crate::db::IcmpOptions;

/// Run `ping -c N -W t` against the host. Zero packets received means the
/// target is dead regardless of the exit code.
pub(super) async fn probe(
    host: &str,
    opts: &IcmpOptions,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let count = opts.effective_count();
    let wait_secs = deadline.as_secs().max(1);

    let output = Command::new("ping")
        .args([
            "-c",
            &count.to_string(),
            "-W",
            &wait_secs.to_string(),
            host,
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| ProbeError::Command(format!("failed to execute ping: {}", e)))?;

    let stdout = String::from_utf8_lossy(&output.stdout);

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let detail = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };
        return Err(ProbeError::Command(format!("ping failed: {}", detail)));
    }

    if received_count(&stdout) == Some(0) || stdout.contains("0 received") {
        return Err(ProbeError::Command(format!(
            "ping failed: {}",
            stdout.trim()
        )));
    }

    Ok(ProbeOutcome::alive())
}

/// Parse the received-packet count from the ping summary line.
/// Handles both the Linux ("2 received") and BSD ("2 packets received")
/// formats.
fn received_count(output: &str) -> Option<u32> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"(\d+)\s+(?:packets\s+)?received").unwrap());
    re.captures(output)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_linux_summary() {
        let output = r#"PING 8.8.8.8 (8.8.8.8) 56(84) bytes of data.
64 bytes from 8.8.8.8: icmp_seq=1 ttl=117 time=12.3 ms

--- 8.8.8.8 ping statistics ---
3 packets transmitted, 3 received, 0% packet loss, time 2003ms
rtt min/avg/max/mdev = 12.300/12.400/12.500/0.100 ms"#;
        assert_eq!(received_count(output), Some(3));
    }

    #[test]
    fn parses_bsd_summary() {
        let output = r#"PING google.com (142.250.69.174): 56 data bytes

--- google.com ping statistics ---
3 packets transmitted, 2 packets received, 33.3% packet loss
round-trip min/avg/max/stddev = 17.906/18.120/18.334/0.214 ms"#;
        assert_eq!(received_count(output), Some(2));
    }

    #[test]
    fn detects_total_loss() {
        let output = "3 packets transmitted, 0 received, 100% packet loss, time 2031ms";
        assert_eq!(received_count(output), Some(0));
    }

    #[test]
    fn unparseable_output_yields_none() {
        assert_eq!(received_count("ping: unknown host"), None);
    }
}

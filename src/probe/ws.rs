//! WebSocket and WSS probe implementation.

use std::time::{Duration, Instant};

use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, connect_async_tls_with_config, Connector};

use super::{ProbeError, ProbeOutcome};
use crate::db::WsOptions;

/// Dial `{scheme}://{host}:{port}{path}`, send a ping frame, and require any
/// response frame before the deadline. WSS honors `ssl_verify`.
pub(super) async fn probe(
    host: &str,
    port: u16,
    opts: &WsOptions,
    tls: bool,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let started = Instant::now();
    let scheme = if tls { "wss" } else { "ws" };
    let url = format!("{}://{}:{}{}", scheme, host, port, opts.path);

    let connected = if tls && !opts.ssl_verify {
        let connector = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ProbeError::Network(e.to_string()))?;
        timeout(
            deadline,
            connect_async_tls_with_config(&url, None, false, Some(Connector::NativeTls(connector))),
        )
        .await
    } else {
        timeout(deadline, connect_async(&url)).await
    };

    let (mut stream, _response) = connected
        .map_err(|_| ProbeError::Timeout(deadline))?
        .map_err(|e| ProbeError::Network(e.to_string()))?;

    stream
        .send(Message::Ping(Vec::new().into()))
        .await
        .map_err(|e| ProbeError::Network(e.to_string()))?;

    let remaining = deadline.saturating_sub(started.elapsed());
    match timeout(remaining, stream.next()).await {
        Err(_) => Err(ProbeError::Timeout(deadline)),
        Ok(None) => Err(ProbeError::Network(
            "connection closed before any response frame".to_string(),
        )),
        Ok(Some(Err(e))) => Err(ProbeError::Network(e.to_string())),
        Ok(Some(Ok(_))) => Ok(ProbeOutcome::alive()),
    }
}

//! HTTP and HTTPS probe implementation.

use std::time::Duration;

use super::{classify, ProbeError, ProbeOutcome};
use crate::db::{HttpMethod, HttpOptions};

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

/// Issue one request against `{scheme}://{host}:{port}{path}` and classify
/// the response code. Transport errors map to `Dead` via `ProbeError`.
pub(super) async fn probe(
    host: &str,
    port: u16,
    opts: &HttpOptions,
    tls: bool,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let scheme = if tls { "https" } else { "http" };
    let url = format!("{}://{}:{}{}", scheme, host, port, opts.path);

    let mut builder = reqwest::Client::builder().timeout(deadline);
    if tls && !opts.ssl_verify {
        builder = builder.danger_accept_invalid_certs(true);
    }
    if !opts.follow_redirects {
        builder = builder.redirect(reqwest::redirect::Policy::none());
    }
    let client = builder
        .build()
        .map_err(|e| ProbeError::Network(e.to_string()))?;

    let mut request = client.request(opts.method.into(), &url);
    for (key, value) in &opts.headers {
        request = request.header(key, value);
    }
    if !opts.body.is_empty() && opts.method.has_body() {
        request = request.body(opts.body.clone());
    }

    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            ProbeError::Timeout(deadline)
        } else {
            ProbeError::Network(e.to_string())
        }
    })?;

    let code = response.status().as_u16();
    Ok(ProbeOutcome {
        status: classify::http_status(code, opts),
        status_code: Some(code),
        error: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::ServiceStatus;
    use std::collections::HashMap;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn opts(expected: u16, mapping: &[(&str, &str)]) -> HttpOptions {
        HttpOptions {
            path: "/healthz".to_string(),
            method: HttpMethod::Get,
            headers: HashMap::new(),
            body: String::new(),
            expected_status: expected,
            status_mapping: mapping
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            ssl_verify: true,
            follow_redirects: true,
        }
    }

    /// Serve a single canned HTTP response on an ephemeral port.
    async fn serve_once(status_line: &'static str) -> u16 {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut buf = [0u8; 2048];
                let _ = stream.read(&mut buf).await;
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    status_line
                );
                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            }
        });
        port
    }

    #[tokio::test]
    async fn expected_status_is_alive() {
        let port = serve_once("200 OK").await;
        let outcome = probe("127.0.0.1", port, &opts(200, &[]), false, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(outcome.status, ServiceStatus::Alive);
        assert_eq!(outcome.status_code, Some(200));
        assert!(outcome.error.is_none());
    }

    #[tokio::test]
    async fn throttled_response_degrades() {
        let port = serve_once("429 Too Many Requests").await;
        let outcome = probe("127.0.0.1", port, &opts(200, &[]), false, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(outcome.status, ServiceStatus::Degraded);
        assert_eq!(outcome.status_code, Some(429));
    }

    #[tokio::test]
    async fn mapping_overrides_classification() {
        let port = serve_once("500 Internal Server Error").await;
        let outcome = probe(
            "127.0.0.1",
            port,
            &opts(200, &[("500", "alive")]),
            false,
            Duration::from_secs(2),
        )
        .await
        .unwrap();
        assert_eq!(outcome.status, ServiceStatus::Alive);
        assert_eq!(outcome.status_code, Some(500));
    }

    #[tokio::test]
    async fn connection_refused_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let result = probe("127.0.0.1", port, &opts(200, &[]), false, Duration::from_secs(1)).await;
        assert!(result.is_err());
    }
}

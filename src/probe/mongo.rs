//! MongoDB probe implementation.

use std::time::Duration;

use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::Client;

use super::{ProbeError, ProbeOutcome};

/// Connect and run the `ping` command against the admin database.
pub(super) async fn probe(
    host: &str,
    port: u16,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let mut options = ClientOptions::parse(format!("mongodb://{}:{}", host, port))
        .await
        .map_err(|e| ProbeError::Config(e.to_string()))?;
    options.connect_timeout = Some(deadline);
    options.server_selection_timeout = Some(deadline);

    let client = Client::with_options(options).map_err(|e| ProbeError::Network(e.to_string()))?;
    client
        .database("admin")
        .run_command(doc! { "ping": 1 })
        .await
        .map_err(|e| ProbeError::Network(e.to_string()))?;

    Ok(ProbeOutcome::alive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        assert!(probe("127.0.0.1", port, Duration::from_millis(500))
            .await
            .is_err());
    }
}

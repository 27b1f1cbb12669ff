//! PostgreSQL probe implementation.

use std::time::{Duration, Instant};

use sqlx::postgres::{PgConnectOptions, PgSslMode};
use sqlx::{ConnectOptions, Connection};
use tokio::time::timeout;

use super::{ProbeError, ProbeOutcome};
use crate::config::PostgresProbeConfig;
use crate::db::PostgresOptions;

/// Connect with the environment-configured credentials and ping, then run
/// `SELECT version()`. A failed ping kills; a failed query on a live
/// connection degrades.
pub(super) async fn probe(
    host: &str,
    port: u16,
    opts: &PostgresOptions,
    cfg: &PostgresProbeConfig,
    deadline: Duration,
) -> Result<ProbeOutcome, ProbeError> {
    let started = Instant::now();
    let host = opts
        .frontend_host
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(strip_frontend_host)
        .unwrap_or_else(|| host.to_string());

    let options = PgConnectOptions::new()
        .host(&host)
        .port(port)
        .username(&cfg.user)
        .password(&cfg.password)
        .database(&cfg.database)
        .ssl_mode(ssl_mode(&cfg.ssl_mode));

    let mut conn = timeout(deadline, options.connect())
        .await
        .map_err(|_| ProbeError::Timeout(deadline))?
        .map_err(|e| ProbeError::Network(format!("PostgreSQL ping failed: {}", e)))?;

    let remaining = deadline.saturating_sub(started.elapsed());
    timeout(remaining, conn.ping())
        .await
        .map_err(|_| ProbeError::Timeout(deadline))?
        .map_err(|e| ProbeError::Network(format!("PostgreSQL ping failed: {}", e)))?;

    let remaining = deadline.saturating_sub(started.elapsed());
    let version = timeout(
        remaining,
        sqlx::query_scalar::<_, String>("SELECT version()").fetch_one(&mut conn),
    )
    .await;

    let outcome = match version {
        Ok(Ok(_)) => ProbeOutcome::alive(),
        Ok(Err(e)) => ProbeOutcome::degraded(format!("PostgreSQL query failed: {}", e)),
        Err(_) => ProbeOutcome::degraded(format!(
            "PostgreSQL query failed: timed out after {:?}",
            deadline
        )),
    };

    let _ = conn.close().await;
    Ok(outcome)
}

/// Reduce a frontend URL to its bare hostname: drop the scheme, any path,
/// and any port.
fn strip_frontend_host(url: &str) -> String {
    let stripped = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))
        .unwrap_or(url);
    let host = stripped.split('/').next().unwrap_or(stripped);
    host.split(':').next().unwrap_or(host).to_string()
}

fn ssl_mode(mode: &str) -> PgSslMode {
    match mode {
        "allow" => PgSslMode::Allow,
        "prefer" => PgSslMode::Prefer,
        "require" => PgSslMode::Require,
        "verify-ca" => PgSslMode::VerifyCa,
        "verify-full" => PgSslMode::VerifyFull,
        _ => PgSslMode::Disable,
    }
}

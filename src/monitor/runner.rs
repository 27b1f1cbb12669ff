//! Probe runner: executes one probe and records its outcome.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;

use crate::config::PostgresProbeConfig;
use crate::db::{HealthcheckResult, ResultSink, ServiceSpec, ServiceStatus, SpecStore, StatusUpdate};
use crate::hub::Hub;
use crate::probe::{self, ProbeOutcome};

/// Run one probe for the given spec: publish `Checking`, invoke the probe
/// library under the per-service deadline, persist the result, update the
/// latest projection, and publish the terminal status.
pub(super) async fn run_healthcheck(
    store: Arc<dyn SpecStore>,
    results: Arc<dyn ResultSink>,
    hub: Hub,
    postgres: PostgresProbeConfig,
    spec: ServiceSpec,
) {
    // Spread dispatch bursts so a tick of many due services does not open
    // every transport at the same instant.
    let jitter = rand::random::<u64>() % 100;
    tokio::time::sleep(Duration::from_millis(jitter)).await;

    publish_status(&*store, &hub, spec.id, ServiceStatus::Checking);

    let deadline = Duration::from_secs(spec.timeout.max(1) as u64);
    let started = Instant::now();
    let outcome = match tokio::time::timeout(deadline, probe::run_probe(&spec, deadline, &postgres))
        .await
    {
        Ok(outcome) => outcome,
        Err(_) => ProbeOutcome::dead(format!("probe timed out after {}s", spec.timeout)),
    };
    let latency_ms = started.elapsed().as_millis() as u64;
    let checked_at = Utc::now();

    let result = HealthcheckResult {
        service_id: spec.id,
        status: outcome.status,
        status_code: outcome.status_code,
        latency_ms,
        error: outcome.error.clone(),
        checked_at,
    };
    if let Err(e) = results.append_result(&result) {
        tracing::error!("Failed to save healthcheck result for service {}: {}", spec.id, e);
    }

    // The latest projection should land; retry once, then give up until the
    // next tick.
    if let Err(e) = store.update_latest(spec.id, outcome.status, checked_at) {
        tracing::warn!(
            "Failed to update status for service {}: {}, retrying",
            spec.id,
            e
        );
        if let Err(e) = store.update_latest(spec.id, outcome.status, checked_at) {
            tracing::error!("Giving up on status update for service {}: {}", spec.id, e);
        }
    }

    // Published even when persistence failed: connected viewers get the
    // freshest state the engine knows.
    hub.publish(StatusUpdate {
        service_id: spec.id,
        status: outcome.status,
        timestamp: checked_at,
    });
}

fn publish_status(store: &dyn SpecStore, hub: &Hub, service_id: i64, status: ServiceStatus) {
    let now = Utc::now();
    if let Err(e) = store.update_latest(service_id, status, now) {
        tracing::warn!(
            "Failed to record {} status for service {}: {}",
            status.as_str(),
            service_id,
            e
        );
    }
    hub.publish(StatusUpdate {
        service_id,
        status,
        timestamp: now,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{DbError, ProbeSpec, Service};
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tokio::time::timeout;

    /// Store double that can fail a fixed number of latest-updates.
    #[derive(Default)]
    struct FlakyStore {
        fail_updates: AtomicUsize,
        latest: Mutex<Vec<(i64, ServiceStatus)>>,
        results: Mutex<Vec<HealthcheckResult>>,
    }

    impl SpecStore for FlakyStore {
        fn list_all(&self) -> Result<Vec<Service>, DbError> {
            Ok(Vec::new())
        }

        fn update_latest(
            &self,
            service_id: i64,
            status: ServiceStatus,
            _checked_at: DateTime<Utc>,
        ) -> Result<(), DbError> {
            if self
                .fail_updates
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(DbError::Sqlite(rusqlite::Error::InvalidQuery));
            }
            self.latest.lock().unwrap().push((service_id, status));
            Ok(())
        }
    }

    impl ResultSink for FlakyStore {
        fn append_result(&self, result: &HealthcheckResult) -> Result<(), DbError> {
            self.results.lock().unwrap().push(result.clone());
            Ok(())
        }
    }

    fn unsupported_spec() -> ServiceSpec {
        ServiceSpec {
            id: 3,
            host: "example.test".to_string(),
            port: 80,
            polling_interval: 30,
            timeout: 1,
            probe: ProbeSpec::Unsupported {
                requested: "XMODEM".into(),
            },
        }
    }

    #[tokio::test]
    async fn records_result_and_publishes_checking_then_terminal() {
        let store = Arc::new(FlakyStore::default());
        let hub = Hub::new(10);
        let mut sub = hub.subscribe();

        run_healthcheck(
            store.clone(),
            store.clone(),
            hub,
            PostgresProbeConfig::default(),
            unsupported_spec(),
        )
        .await;

        let first = timeout(Duration::from_secs(1), sub.next()).await.unwrap().unwrap();
        assert_eq!(first.status, ServiceStatus::Checking);
        let second = timeout(Duration::from_secs(1), sub.next()).await.unwrap().unwrap();
        assert_eq!(second.status, ServiceStatus::Dead);

        let results = store.results.lock().unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].service_id, 3);
        assert_eq!(results[0].status, ServiceStatus::Dead);
        assert!(results[0]
            .error
            .as_deref()
            .unwrap()
            .contains("unsupported health check method"));

        let latest = store.latest.lock().unwrap();
        assert_eq!(
            *latest,
            vec![(3, ServiceStatus::Checking), (3, ServiceStatus::Dead)]
        );
    }

    #[tokio::test]
    async fn update_failures_are_retried_and_still_published() {
        let store = Arc::new(FlakyStore {
            // First write (Checking) and the first terminal attempt fail;
            // the terminal retry lands.
            fail_updates: AtomicUsize::new(2),
            ..FlakyStore::default()
        });
        let hub = Hub::new(10);
        let mut sub = hub.subscribe();

        run_healthcheck(
            store.clone(),
            store.clone(),
            hub,
            PostgresProbeConfig::default(),
            unsupported_spec(),
        )
        .await;

        let first = timeout(Duration::from_secs(1), sub.next()).await.unwrap().unwrap();
        assert_eq!(first.status, ServiceStatus::Checking);
        let second = timeout(Duration::from_secs(1), sub.next()).await.unwrap().unwrap();
        assert_eq!(second.status, ServiceStatus::Dead);

        let latest = store.latest.lock().unwrap();
        assert_eq!(*latest, vec![(3, ServiceStatus::Dead)]);
    }
}

//! Health-monitoring engine: the tick scheduler and probe dispatch.

mod runner;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};

use crate::config::{PostgresProbeConfig, ServerConfig};
use crate::db::{ResultSink, Service, SpecStore};
use crate::hub::Hub;

/// The probing engine. `start` spawns the scheduler; `stop` shuts it down
/// and returns once in-flight probes have observed the signal.
pub struct Engine {
    store: Arc<dyn SpecStore>,
    results: Arc<dyn ResultSink>,
    hub: Hub,
    tick: Duration,
    postgres: PostgresProbeConfig,
    inflight: Arc<Mutex<HashSet<i64>>>,
    stop_tx: broadcast::Sender<()>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn SpecStore>,
        results: Arc<dyn ResultSink>,
        hub: Hub,
        cfg: &ServerConfig,
    ) -> Self {
        let (stop_tx, _) = broadcast::channel(1);
        Self {
            store,
            results,
            hub,
            tick: cfg.sched_tick,
            postgres: cfg.postgres_probe.clone(),
            inflight: Arc::new(Mutex::new(HashSet::new())),
            stop_tx,
            handle: Mutex::new(None),
        }
    }

    /// Start the scheduler loop. Does nothing if already running.
    pub fn start(&self) {
        let mut handle = self.handle.lock().unwrap();
        if handle.is_some() {
            return;
        }
        tracing::info!("Scheduler: starting with tick {:?}", self.tick);
        *handle = Some(tokio::spawn(run_scheduler(
            self.store.clone(),
            self.results.clone(),
            self.hub.clone(),
            self.tick,
            self.postgres.clone(),
            self.inflight.clone(),
            self.stop_tx.clone(),
        )));
    }

    /// Stop the scheduler and wait for it to quiesce.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(());
        let handle = self.handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::info!("Scheduler: stopped");
    }
}

async fn run_scheduler(
    store: Arc<dyn SpecStore>,
    results: Arc<dyn ResultSink>,
    hub: Hub,
    tick: Duration,
    postgres: PostgresProbeConfig,
    inflight: Arc<Mutex<HashSet<i64>>>,
    stop_tx: broadcast::Sender<()>,
) {
    let mut stop_rx = stop_tx.subscribe();
    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut probes = JoinSet::new();

    loop {
        tokio::select! {
            _ = stop_rx.recv() => break,
            _ = interval.tick() => {
                // Reap finished probe tasks; a panic in one must not end the
                // scheduler.
                while probes.try_join_next().is_some() {}

                let services = match store.list_all() {
                    Ok(services) => services,
                    Err(e) => {
                        tracing::error!("Scheduler: failed to read services: {}", e);
                        continue;
                    }
                };

                let now = Utc::now();
                for service in services {
                    if !should_check(&service, now) {
                        continue;
                    }
                    let id = service.spec.id;
                    let Some(guard) = InflightGuard::acquire(&inflight, id) else {
                        // A previous probe of this service is still running.
                        continue;
                    };

                    let store = store.clone();
                    let results = results.clone();
                    let hub = hub.clone();
                    let postgres = postgres.clone();
                    let mut probe_stop = stop_tx.subscribe();
                    probes.spawn(async move {
                        let _guard = guard;
                        tokio::select! {
                            _ = runner::run_healthcheck(store, results, hub, postgres, service.spec) => {}
                            _ = probe_stop.recv() => {}
                        }
                    });
                }
            }
        }
    }

    // Quiesce: in-flight probes observe the stop signal and finish promptly.
    while probes.join_next().await.is_some() {}
}

/// Whether a service is due for a probe at `now`.
fn should_check(service: &Service, now: DateTime<Utc>) -> bool {
    if service.spec.host.is_empty() {
        return false;
    }
    // URL-style methods need a path (or service name) to probe.
    if matches!(service.spec.probe.required_path(), Some("")) {
        return false;
    }
    match service.last_checked {
        None => true,
        Some(last) => {
            now.signed_duration_since(last)
                >= chrono::Duration::seconds(service.spec.polling_interval as i64)
        }
    }
}

/// Holds the per-service exclusion slot; released on drop so a panicking
/// probe cannot leave its service permanently busy.
struct InflightGuard {
    id: i64,
    set: Arc<Mutex<HashSet<i64>>>,
}

impl InflightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<i64>>>, id: i64) -> Option<Self> {
        if set.lock().unwrap().insert(id) {
            Some(Self {
                id,
                set: set.clone(),
            })
        } else {
            None
        }
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        self.set.lock().unwrap().remove(&self.id);
    }
}

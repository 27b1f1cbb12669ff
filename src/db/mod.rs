//! Persistence layer: model types, the collaborator contracts consumed by
//! the probing engine, and the SQLite store implementing them.

mod models;
mod store;

pub use models::*;
pub use store::{DbError, Store};

use chrono::{DateTime, Utc};

/// Read side consumed by the scheduler and runner: a consistent snapshot of
/// all service specs plus the per-service latest projection.
pub trait SpecStore: Send + Sync {
    fn list_all(&self) -> Result<Vec<Service>, DbError>;

    /// Idempotent write of the latest projection for one service.
    fn update_latest(
        &self,
        service_id: i64,
        status: ServiceStatus,
        checked_at: DateTime<Utc>,
    ) -> Result<(), DbError>;
}

/// Append-only sink for probe outcomes.
pub trait ResultSink: Send + Sync {
    fn append_result(&self, result: &HealthcheckResult) -> Result<(), DbError>;
}

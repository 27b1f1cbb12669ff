//! service-weaver monitor backend.
//!
//! Continuously probes the services of a topology, stores outcomes, and
//! streams live status transitions to connected viewers.

mod config;
mod db;
mod hub;
mod monitor;
mod probe;
mod web;

use config::ServerConfig;
use db::Store;
use hub::Hub;
use monitor::Engine;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("service_weaver=info".parse()?),
        )
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting service-weaver monitor on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Start the probing engine
    let hub = Hub::new(cfg.hub_inbox_cap);
    let engine = Engine::new(store.clone(), store.clone(), hub.clone(), &cfg);
    engine.start();

    // Serve viewers until shutdown, then quiesce the engine
    let server = Server::new(cfg, store, hub);
    server.start().await?;
    engine.stop().await;

    Ok(())
}

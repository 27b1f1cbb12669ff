//! Web server module: the status API and the live update stream.

mod handlers;

use crate::config::ServerConfig;
use crate::db::Store;
use crate::hub::Hub;

use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub hub: Hub,
}

/// Web server bridging viewers to the probing engine.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    pub fn new(config: ServerConfig, store: Arc<Store>, hub: Hub) -> Self {
        Self {
            config,
            state: AppState { store, hub },
        }
    }

    /// Build the router with all routes.
    pub(crate) fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/ws", get(handlers::handle_ws))
            .route("/healthz", get(handlers::handle_healthz))
            .route("/api/services", get(handlers::handle_get_services))
            .route("/api/services/{id}/results", get(handlers::handle_get_results))
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Serve until a shutdown signal arrives.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("Shutdown signal received");
}

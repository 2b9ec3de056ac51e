//! Web server module.

mod handlers;

pub use handlers::*;

use crate::db::Store;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
///
/// The configuration document is re-read per request, so settings saved
/// through the API take effect immediately; only the listen port needs a
/// restart.
#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub config_path: PathBuf,
}

/// JSON API server for the feederwatch dashboard.
pub struct Server {
    state: AppState,
    port: u16,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(store: Store, config_path: PathBuf, port: u16) -> Self {
        Self {
            state: AppState { store, config_path },
            port,
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/api/dashboard", get(handlers::handle_dashboard))
            .route("/api/events", get(handlers::handle_get_events))
            .route("/api/events/{id}", delete(handlers::handle_delete_event))
            .route("/api/trend", get(handlers::handle_get_trend))
            .route("/api/settings", get(handlers::handle_get_settings))
            .route("/api/settings", put(handlers::handle_put_settings))
            .route("/api/settings/reset", post(handlers::handle_reset_settings))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
            .with_state(self.state.clone())
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let router = self.routes();

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}

use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Endpoints the site answers itself. They pass through the access gate like any
/// other unlisted path and pick up the baseline security headers.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness for load balancers. Returns "ok" without calling the backend.
        .route("/health", get(handlers::health))
        // GET /status
        // Backend reachability for the status indicator: online or offline.
        .route("/status", get(handlers::backend_status))
}

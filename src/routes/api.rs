use crate::{AppState, handlers};
use axum::{Router, routing::any};

/// API Router Module
///
/// Everything under `/api` belongs to the backend. Any method is accepted and
/// relayed, including `OPTIONS` preflights, which then receive the gate's CORS set.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api", any(handlers::proxy_api))
        .route("/api/{*path}", any(handlers::proxy_api))
}

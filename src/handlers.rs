use crate::{
    backend::{BackendState, ProxyRequest},
    models::{BackendHealth, BackendStatus, ErrorResponse},
};
use axum::{
    Json,
    body::{self, Body},
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;

/// Largest request body relayed to the backend.
pub const MAX_PROXY_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Message shown to the browser whenever the backend cannot be reached.
pub const BACKEND_UNAVAILABLE: &str = "Backend service unavailable";

// --- Handlers ---

/// health
///
/// [Public Route] Liveness of the site itself. Does not touch the backend.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Site is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}

/// backend_status
///
/// [Public Route] Feeds the site's status indicator. A failed health check is reported as
/// `offline`, never as an error response, and is not retried.
#[utoipa::path(
    get,
    path = "/status",
    responses((status = 200, description = "Backend reachability", body = BackendStatus))
)]
pub async fn backend_status(State(backend): State<BackendState>) -> Json<BackendStatus> {
    let backend_health = if backend.health().await {
        BackendHealth::Online
    } else {
        BackendHealth::Offline
    };

    Json(BackendStatus {
        backend: backend_health,
        checked_at: Utc::now(),
    })
}

/// proxy_api
///
/// [API Route] Relays `/api/*` to the backend with method, path, query, headers and
/// body intact. The access-token cookie travels along untouched; the backend is the
/// one that verifies it. CORS headers are added afterwards by the access gate.
pub async fn proxy_api(State(backend): State<BackendState>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let body = match body::to_bytes(body, MAX_PROXY_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "Rejected API request body");
            return (
                StatusCode::PAYLOAD_TOO_LARGE,
                Json(ErrorResponse {
                    error: "Request body too large".to_string(),
                }),
            )
                .into_response();
        }
    };

    let path_and_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let proxied = ProxyRequest {
        method: parts.method,
        path_and_query,
        headers: parts.headers,
        body,
    };

    match backend.forward(proxied).await {
        Ok(upstream) => {
            let mut response = Response::new(Body::from(upstream.body));
            *response.status_mut() = upstream.status;
            *response.headers_mut() = upstream.headers;
            response
        }
        Err(e) => {
            tracing::error!(error = %e, "API proxy could not reach backend");
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorResponse {
                    error: BACKEND_UNAVAILABLE.to_string(),
                }),
            )
                .into_response()
        }
    }
}

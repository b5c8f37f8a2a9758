use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use std::path::Path;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::{ServeDir, ServeFile},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Request-edge components.
pub mod backend;
pub mod config;
pub mod gate;
pub mod handlers;
pub mod models;

// Browser-side consent components.
pub mod consent;
pub mod integrations;
pub mod storage;

pub mod routes;
use routes::{api, public};

// --- Public Re-exports ---

pub use backend::{BackendState, HttpBackendClient, MockBackendService};
pub use config::AppConfig;
pub use consent::ConsentStore;
pub use gate::{RouteTable, RouteTableState};

/// ApiDoc
///
/// OpenAPI document for the JSON endpoints the site answers itself. Served at
/// `/api-docs/openapi.json`. The `/api` proxy is the backend's surface and is
/// documented there.
#[derive(OpenApi)]
#[openapi(
    paths(handlers::health, handlers::backend_status),
    components(schemas(models::BackendStatus, models::BackendHealth, models::ErrorResponse)),
    tags((name = "mister-api-site", description = "Mister API site edge"))
)]
struct ApiDoc;

/// AppState
///
/// Everything a request may need, shared read-only across all requests.
#[derive(Clone)]
pub struct AppState {
    /// Client for the external backend (proxy and health check).
    pub backend: BackendState,
    /// The loaded, immutable environment configuration.
    pub config: AppConfig,
    /// Route classification used by the access gate.
    pub routes: RouteTableState,
}

impl FromRef<AppState> for BackendState {
    fn from_ref(app_state: &AppState) -> BackendState {
        app_state.backend.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

impl FromRef<AppState> for RouteTableState {
    fn from_ref(app_state: &AppState) -> RouteTableState {
        app_state.routes.clone()
    }
}

/// create_router
///
/// Assembles the site: own endpoints, the `/api` proxy, Swagger UI and the static
/// page fallback, all wrapped by the access gate and then by the request-id and
/// tracing layers.
pub fn create_router(state: AppState) -> Router {
    let static_dir = Path::new(&state.config.static_dir);
    let pages = ServeDir::new(static_dir)
        .append_index_html_on_directories(true)
        .not_found_service(ServeFile::new(static_dir.join("404.html")));

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(api::api_routes())
        .fallback_service(pages)
        .with_state(state.clone())
        // The gate sees every request, the static fallback included.
        .layer(middleware::from_fn_with_state(state, gate::access_gate));

    base_router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(trace_span_logger)
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(tower_http::LatencyUnit::Millis),
                    ),
            )
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

/// trace_span_logger
///
/// Span for every request, correlated by the `x-request-id` header.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}

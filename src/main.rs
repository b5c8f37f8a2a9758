use mister_api_site::{
    AppState,
    backend::{BackendState, HttpBackendClient},
    config::{AppConfig, Env},
    create_router,
    gate::RouteTable,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Entry point: configuration, logging, backend client, route table, HTTP server.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast in production)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging: RUST_LOG wins, otherwise verbose defaults for local work.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mister_api_site=debug,tower_http=info,axum=trace".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Site starting in {:?} mode", config.env);
    tracing::info!(
        frontend_url = %config.frontend_url,
        backend_url = %config.backend_url,
        static_dir = %config.static_dir,
        "Configuration loaded"
    );

    // 3. Backend client. No connection is made until the first request.
    let backend = Arc::new(HttpBackendClient::new(config.backend_base())) as BackendState;

    // 4. Route table, fixed for the life of the process.
    let routes = Arc::new(RouteTable::default());

    let bind_addr = config.bind_addr.clone();
    let app = create_router(AppState {
        backend,
        config,
        routes,
    });

    // 5. Server
    let listener = TcpListener::bind(&bind_addr)
        .await
        .expect("FATAL: Failed to bind listener. Check BIND_ADDR.");

    tracing::info!("Listening on {}", bind_addr);
    tracing::info!("API Documentation (Swagger UI) available at /swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: HTTP server terminated unexpectedly");
}

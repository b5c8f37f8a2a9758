use std::env;

/// Default origin of the site's own frontend, used for the CORS allow-origin header
/// when `FRONTEND_URL` is not set.
pub const DEFAULT_FRONTEND_URL: &str = "http://localhost:3000";
/// Default location of the external backend service in local development.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// AppConfig
///
/// Holds the site's entire configuration state. It is loaded once at startup and
/// never mutated afterwards; handlers and the access gate pull it out of the
/// shared `AppState` via FromRef.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Selects log format and fail-fast rules.
    pub env: Env,
    // Origin allowed to call `/api/*` cross-origin with credentials.
    pub frontend_url: String,
    // Base URL of the backend that owns auth, quotas, billing and logs.
    pub backend_url: String,
    // Socket address the HTTP server binds to.
    pub bind_addr: String,
    // Directory holding the pre-rendered site pages.
    pub static_dir: String,
}

/// Env
///
/// Defines the runtime context: local development (pretty logs, defaults allowed)
/// or production (JSON logs, every URL must be configured explicitly).
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Safe, non-panicking configuration for tests and in-process router setup.
    fn default() -> Self {
        Self {
            env: Env::Local,
            frontend_url: DEFAULT_FRONTEND_URL.to_string(),
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            bind_addr: "127.0.0.1:0".to_string(),
            static_dir: "public".to_string(),
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads every parameter from the environment.
    ///
    /// # Panics
    /// Panics in production if `FRONTEND_URL` or `BACKEND_URL` is missing, so the
    /// site never starts pointing CORS or the API proxy at a development host.
    pub fn load() -> Self {
        let env_str = env::var("APP_ENV").unwrap_or_else(|_| "local".to_string());
        let env = match env_str.as_str() {
            "production" => Env::Production,
            _ => Env::Local,
        };

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let static_dir = env::var("STATIC_DIR").unwrap_or_else(|_| "public".to_string());

        match env {
            Env::Local => Self {
                env: Env::Local,
                frontend_url: env::var("FRONTEND_URL")
                    .unwrap_or_else(|_| DEFAULT_FRONTEND_URL.to_string()),
                backend_url: env::var("BACKEND_URL")
                    .unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
                bind_addr,
                static_dir,
            },
            Env::Production => Self {
                env: Env::Production,
                frontend_url: env::var("FRONTEND_URL")
                    .expect("FATAL: FRONTEND_URL required in prod"),
                backend_url: env::var("BACKEND_URL").expect("FATAL: BACKEND_URL required in prod"),
                bind_addr,
                static_dir,
            },
        }
    }

    /// Backend base URL without a trailing slash, ready for path concatenation.
    pub fn backend_base(&self) -> &str {
        self.backend_url.trim_end_matches('/')
    }
}

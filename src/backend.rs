use async_trait::async_trait;
use axum::{
    body::Bytes,
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// BackendError
///
/// Failures reaching the external backend. Never retried; the proxy turns them
/// into a generic 502.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

/// ProxyRequest
///
/// An incoming `/api/*` request, reduced to what is forwarded upstream.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path and query exactly as received, e.g. `/api/keys?page=2`.
    pub path_and_query: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// ProxyResponse
///
/// The backend's answer, relayed back to the browser.
#[derive(Debug, Clone)]
pub struct ProxyResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Connection-scoped headers that must not cross the proxy.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "host",
    "content-length",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
    "proxy-authorization",
];

/// strip_hop_by_hop
///
/// Copies a header map without the hop-by-hop headers.
pub fn strip_hop_by_hop(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP {
        forwarded.remove(name);
    }
    forwarded
}

// 1. BackendService Contract
/// BackendService
///
/// Everything the site needs from the backend: a liveness check for the status
/// indicator and a verbatim forwarder for API calls. Authentication, quotas,
/// billing and logs all live behind this boundary.
#[async_trait]
pub trait BackendService: Send + Sync {
    /// True when the backend answers its health endpoint with a success status.
    async fn health(&self) -> bool;

    /// Sends the request upstream unchanged and returns the raw answer.
    async fn forward(&self, request: ProxyRequest) -> Result<ProxyResponse, BackendError>;
}

// 2. The Real Implementation (reqwest)
/// HttpBackendClient
#[derive(Clone)]
pub struct HttpBackendClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackendClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl BackendService for HttpBackendClient {
    async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, url = %url, "Backend health check failed");
                false
            }
        }
    }

    async fn forward(&self, request: ProxyRequest) -> Result<ProxyResponse, BackendError> {
        let url = format!("{}{}", self.base_url, request.path_and_query);

        let response = self
            .client
            .request(request.method, url)
            .headers(strip_hop_by_hop(&request.headers))
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        let headers = strip_hop_by_hop(response.headers());
        let body = response.bytes().await?;

        Ok(ProxyResponse {
            status,
            headers,
            body,
        })
    }
}

// 3. The Mock Implementation (For Tests)
/// MockBackendService
///
/// Answers every forwarded call with a fixed JSON body that echoes the method and
/// path, and remembers each request it saw.
#[derive(Clone, Default)]
pub struct MockBackendService {
    /// When true, the backend behaves as unreachable.
    pub should_fail: bool,
    received: Arc<Mutex<Vec<ProxyRequest>>>,
}

impl MockBackendService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Requests forwarded so far, oldest first.
    pub fn received(&self) -> Vec<ProxyRequest> {
        self.received
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl BackendService for MockBackendService {
    async fn health(&self) -> bool {
        !self.should_fail
    }

    async fn forward(&self, request: ProxyRequest) -> Result<ProxyResponse, BackendError> {
        if self.should_fail {
            return Err(BackendError::Unavailable(
                "Mock Backend Error: Simulation requested".to_string(),
            ));
        }

        let body = serde_json::json!({
            "method": request.method.as_str(),
            "path": request.path_and_query.as_str(),
        });

        if let Ok(mut requests) = self.received.lock() {
            requests.push(request);
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        // Upstream CORS headers get replaced at the gate.
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        headers.insert(
            header::ACCESS_CONTROL_EXPOSE_HEADERS,
            HeaderValue::from_static("x-backend"),
        );

        Ok(ProxyResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::from(body.to_string()),
        })
    }
}

/// BackendState
///
/// The concrete type used to share backend access across the application state.
pub type BackendState = Arc<dyn BackendService>;

use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, HeaderValue,
        header::{self, HeaderName},
    },
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use percent_encoding::percent_decode_str;
use std::sync::Arc;

use crate::config::{AppConfig, DEFAULT_FRONTEND_URL};

/// Cookie names accepted as the authentication signal. The backend has issued
/// both spellings over time; either one counts.
pub const ACCESS_TOKEN_COOKIES: [&str; 2] = ["access_token", "accessToken"];

pub const CORS_ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
pub const CORS_ALLOWED_HEADERS: &str = "Content-Type, Authorization, X-Refresh-Token";

/// RouteClass
///
/// Coarse classification of a request path against the route table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Static assets and framework internals; never inspected.
    Excluded,
    Api,
    Protected,
    Admin,
    Public,
    Unlisted,
}

/// GateDecision
///
/// The outcome of running a request through the access gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// Forward untouched, no headers added.
    Bypass,
    /// Forward and attach the CORS header set.
    Api,
    /// No authentication cookie on a protected or admin path.
    RedirectToLogin,
    /// Already signed in but visiting the login or registration page.
    RedirectToDashboard,
    /// Forward and attach the baseline security headers.
    PassThrough,
}

/// RouteTable
///
/// Static, process-wide route classification. Built once at startup and shared
/// read-only through `RouteTableState`; nothing mutates it afterwards.
///
/// Matching is case-sensitive starts-with against fixed lists, evaluated in the
/// order API, protected, admin, public. A prefix of `/` only matches the root
/// path itself.
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub api_prefix: String,
    pub protected_prefixes: Vec<String>,
    pub admin_prefixes: Vec<String>,
    pub public_prefixes: Vec<String>,
    pub excluded_prefixes: Vec<String>,
    pub login_path: String,
    pub register_path: String,
    pub dashboard_path: String,
}

/// RouteTableState
///
/// Shared handle to the immutable route table.
pub type RouteTableState = Arc<RouteTable>;

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            api_prefix: "/api".to_string(),
            protected_prefixes: owned(&["/dashboard", "/profile", "/api-keys", "/billing"]),
            admin_prefixes: owned(&["/admin"]),
            public_prefixes: owned(&[
                "/", "/pricing", "/docs", "/apis", "/login", "/register", "/about", "/contact",
                "/privacy", "/terms",
            ]),
            excluded_prefixes: owned(&["/assets/", "/_next/static", "/_next/image", "/favicon.ico"]),
            login_path: "/login".to_string(),
            register_path: "/register".to_string(),
            dashboard_path: "/dashboard".to_string(),
        }
    }
}

fn matches_prefix(path: &str, prefix: &str) -> bool {
    if prefix == "/" {
        return path == "/";
    }
    path.starts_with(prefix)
}

fn matches_any(path: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| matches_prefix(path, prefix))
}

impl RouteTable {
    /// `/api` itself or anything below `/api/`. `/api-keys` is a page, not an API call.
    pub fn is_api(&self, path: &str) -> bool {
        match path.strip_prefix(self.api_prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        matches_any(path, &self.excluded_prefixes)
    }

    pub fn is_auth_page(&self, path: &str) -> bool {
        path.starts_with(self.login_path.as_str()) || path.starts_with(self.register_path.as_str())
    }

    /// classify
    ///
    /// First-match classification in the fixed evaluation order.
    pub fn classify(&self, path: &str) -> RouteClass {
        if self.is_excluded(path) {
            RouteClass::Excluded
        } else if self.is_api(path) {
            RouteClass::Api
        } else if matches_any(path, &self.protected_prefixes) {
            RouteClass::Protected
        } else if matches_any(path, &self.admin_prefixes) {
            RouteClass::Admin
        } else if matches_any(path, &self.public_prefixes) {
            RouteClass::Public
        } else {
            RouteClass::Unlisted
        }
    }

    /// decide
    ///
    /// Pure access decision for a request path and its headers. The cookie is a
    /// presence-only signal: the token is never decoded or checked for expiry here,
    /// the backend verifies it on every API call.
    pub fn decide(&self, path: &str, headers: &HeaderMap) -> GateDecision {
        let path = normalize_path(path);
        let path = path.as_str();
        let class = self.classify(path);
        match class {
            RouteClass::Excluded => return GateDecision::Bypass,
            RouteClass::Api => return GateDecision::Api,
            _ => {}
        }

        let authenticated = has_access_token(headers);

        if matches!(class, RouteClass::Protected | RouteClass::Admin) && !authenticated {
            return GateDecision::RedirectToLogin;
        }

        if authenticated && self.is_auth_page(path) {
            return GateDecision::RedirectToDashboard;
        }

        GateDecision::PassThrough
    }
}

/// normalize_path
///
/// Canonical form of a request path, resolved the way the static file service
/// resolves it: percent-decoded, empty and `.` segments dropped, `..` applied,
/// no trailing slash. Every spelling that reaches the same file classifies the same.
pub fn normalize_path(raw: &str) -> String {
    let decoded = percent_decode_str(raw).decode_utf8_lossy();
    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}

/// get_cookie
///
/// Looks up a cookie value across every `Cookie` header on the request.
pub fn get_cookie<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|raw| raw.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim())
}

/// True when either access-token cookie is present with a non-empty value.
pub fn has_access_token(headers: &HeaderMap) -> bool {
    ACCESS_TOKEN_COOKIES
        .iter()
        .any(|name| get_cookie(headers, name).is_some_and(|value| !value.is_empty()))
}

/// apply_cors_headers
///
/// Replaces any upstream `access-control-*` headers with the four the site allows.
pub fn apply_cors_headers(headers: &mut HeaderMap, frontend_url: &str) {
    let upstream: Vec<HeaderName> = headers
        .keys()
        .filter(|name| name.as_str().starts_with("access-control-"))
        .cloned()
        .collect();
    for name in upstream {
        headers.remove(name);
    }

    let origin = HeaderValue::from_str(frontend_url).unwrap_or_else(|_| {
        tracing::warn!(frontend_url, "FRONTEND_URL is not a valid header value, using default");
        HeaderValue::from_static(DEFAULT_FRONTEND_URL)
    });

    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(CORS_ALLOWED_METHODS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(CORS_ALLOWED_HEADERS),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
        HeaderValue::from_static("true"),
    );
}

/// apply_security_headers
///
/// Baseline headers for every page response: no cross-origin framing, no MIME
/// sniffing, origin-only referrer on cross-origin navigation.
pub fn apply_security_headers(headers: &mut HeaderMap) {
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("SAMEORIGIN"));
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("origin-when-cross-origin"),
    );
}

/// access_gate
///
/// Middleware wrapping the whole site, static fallback included. Evaluation order:
/// excluded assets, API prefix, protected routes, signed-in users on auth pages,
/// then the default pass-through. None of the branches can fail.
pub async fn access_gate(
    State(routes): State<RouteTableState>,
    State(config): State<AppConfig>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    let decision = routes.decide(&path, request.headers());
    tracing::debug!(path = %path, ?decision, "access gate decision");

    match decision {
        GateDecision::Bypass => next.run(request).await,
        GateDecision::Api => {
            let mut response = next.run(request).await;
            apply_cors_headers(response.headers_mut(), &config.frontend_url);
            response
        }
        GateDecision::RedirectToLogin => {
            tracing::info!(path = %path, "No access token on protected route, redirecting to login");
            Redirect::temporary(&routes.login_path).into_response()
        }
        GateDecision::RedirectToDashboard => {
            tracing::info!(path = %path, "Authenticated user on auth page, redirecting to dashboard");
            Redirect::temporary(&routes.dashboard_path).into_response()
        }
        GateDecision::PassThrough => {
            let mut response = next.run(request).await;
            apply_security_headers(response.headers_mut());
            response
        }
    }
}

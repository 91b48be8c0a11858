//! Cross-origin handling.
//!
//! # Responsibilities
//! - Decide whether a request `Origin` is allowed
//! - Build the `CorsLayer` that reflects allowed origins (with credentials)
//! - Refuse OPTIONS from other origins when short-circuiting is enabled
//!
//! # Design Decisions
//! - Bare hosts in config mean `https://host`
//! - Entries containing regex metacharacters are full-match regexes
//! - An origin also matches when its `/`-suffixed form does
//! - The layer reads the allowed list from the current snapshot, so a
//!   reload changes it without rebuilding the server

use axum::{
    body::Body,
    extract::State,
    http::{header::ORIGIN, HeaderMap, HeaderValue, Method, Request},
    middleware::Next,
    response::Response,
};
use regex::Regex;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::CorsConfig;
use crate::http::response;
use crate::http::server::AppState;
use crate::routing::SharedRouter;

const REGEX_METACHARACTERS: &[char] = &['*', '\\', '[', ']', '?', '$', '^', '(', ')'];

/// Methods the edge answers, advertised in `Allow`.
pub const ALLOWED_METHODS: &str = "GET, HEAD, POST, OPTIONS";

#[derive(Debug, Clone)]
enum OriginMatcher {
    Literal(String),
    Regex(Regex),
}

impl OriginMatcher {
    fn parse(entry: &str) -> Self {
        let entry = entry.trim();
        let entry = if entry.starts_with("http://") || entry.starts_with("https://") {
            entry.to_string()
        } else {
            format!("https://{}", entry)
        };

        if !entry.contains(REGEX_METACHARACTERS) {
            return Self::Literal(entry);
        }

        match Regex::new(&format!("^(?:{})$", entry)) {
            Ok(regex) => Self::Regex(regex),
            Err(e) => {
                tracing::warn!(origin = %entry, error = %e, "Origin is not a valid regex, matching literally");
                Self::Literal(entry)
            }
        }
    }

    fn matches(&self, origin: &str) -> bool {
        match self {
            Self::Literal(literal) => literal == origin,
            Self::Regex(regex) => regex.is_match(origin),
        }
    }
}

/// Compiled `cors.allowed_origins`.
#[derive(Debug, Clone, Default)]
pub struct AllowedOrigins {
    matchers: Vec<OriginMatcher>,
    shortcircuit_options: bool,
}

impl AllowedOrigins {
    pub fn from_config(config: &CorsConfig) -> Self {
        Self {
            matchers: config
                .allowed_origins
                .iter()
                .filter(|o| !o.trim().is_empty())
                .map(|o| OriginMatcher::parse(o))
                .collect(),
            shortcircuit_options: config.shortcircuit_options,
        }
    }

    pub fn allows(&self, origin: &str) -> bool {
        let slashed = format!("{}/", origin);
        self.matchers
            .iter()
            .any(|m| m.matches(origin) || m.matches(&slashed))
    }

    /// The request's `Origin`, when present and allowed.
    pub fn allowed_origin<'h>(&self, headers: &'h HeaderMap) -> Option<&'h HeaderValue> {
        let origin = headers.get(ORIGIN)?;
        let allowed = origin.to_str().map(|o| self.allows(o)).unwrap_or(false);
        if !allowed {
            tracing::debug!(origin = ?origin, "Origin not in allowed list");
        }
        allowed.then_some(origin)
    }

    /// Whether OPTIONS requests are answered before any rule runs.
    pub fn shortcircuits(&self, method: &Method) -> bool {
        self.shortcircuit_options && method == Method::OPTIONS
    }
}

/// CORS for every response: allowed origins are reflected with credentials,
/// preflights echo the requested method and headers.
pub fn cors_layer(router: SharedRouter) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(move |origin: &HeaderValue, _| {
            origin
                .to_str()
                .map(|o| router.snapshot().origins().allows(o))
                .unwrap_or(false)
        }))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// With `cors.shortcircuit_options`, OPTIONS from a disallowed origin gets
/// 403 before the `CorsLayer` answers it.
pub async fn options_guard(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let refused = {
        let snapshot = state.router.snapshot();
        let origins = snapshot.origins();
        origins.shortcircuits(request.method()) && origins.allowed_origin(request.headers()).is_none()
    };

    if refused {
        tracing::debug!(path = request.uri().path(), "Rejecting OPTIONS from disallowed origin");
        return response::forbidden();
    }
    next.run(request).await
}

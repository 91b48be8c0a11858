//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge router.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

/// Status used whenever a configured redirect code is unusable.
pub const FALLBACK_REDIRECT_STATUS: u16 = 302;

/// Root configuration for the edge router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EdgeConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Object store holding the site content and the control documents.
    pub storage: StorageConfig,

    /// Keys of the control documents inside the object store.
    pub control: ControlDocumentConfig,

    /// Basic authentication settings.
    pub auth: AuthConfig,

    /// Redirect rule defaults.
    pub redirects: RedirectConfig,

    /// Remote function invocation settings.
    pub functions: FunctionConfig,

    /// Static fallback behavior.
    pub static_site: StaticSiteConfig,

    /// Cross-origin settings.
    pub cors: CorsConfig,

    /// Advisory response headers.
    pub headers: HeadersConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Which object store implementation backs the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// A local directory; the bucket is a sub-directory of `root`.
    Fs,
    /// An S3-compatible HTTP endpoint.
    Http,
}

/// Object store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,

    /// Root directory for the `fs` backend.
    pub root: String,

    /// Base URL for the `http` backend (e.g., "http://127.0.0.1:9000").
    pub endpoint: String,

    /// Bucket holding the site.
    pub bucket: String,

    /// Key prefix prepended to every static asset lookup.
    pub prefix: String,

    /// Deadline for a single object fetch, in seconds.
    pub fetch_timeout_secs: u64,

    /// Objects larger than this are answered with a 303 to their public URL.
    pub overflow_bytes: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Fs,
            root: ".".to_string(),
            endpoint: "http://127.0.0.1:9000".to_string(),
            bucket: "site".to_string(),
            prefix: String::new(),
            fetch_timeout_secs: 10,
            overflow_bytes: 4_718_592, // 4.5 MiB
        }
    }
}

/// Object keys of the control documents. An empty key disables the feature.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlDocumentConfig {
    pub authorizations: String,
    pub redirects: String,
    pub functions: String,
    pub locales: String,
}

impl Default for ControlDocumentConfig {
    fn default() -> Self {
        Self {
            authorizations: "authorizations.json".to_string(),
            redirects: "redirects.json".to_string(),
            functions: "11ty-serverless.json".to_string(),
            locales: "locales.json".to_string(),
        }
    }
}

/// Basic authentication settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Realm used when a rule does not name one.
    pub default_realm: String,

    /// Path prefixes that never require credentials.
    pub exempt_prefixes: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            default_realm: "Authorization Required".to_string(),
            exempt_prefixes: Vec::new(),
        }
    }
}

/// Redirect rule defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RedirectConfig {
    /// Status for rules that do not specify one.
    pub default_status: u16,

    /// Trailing-slash handling for rules that do not specify it.
    pub trailing_slash: bool,

    /// When set, root-relative targets are made absolute against this host.
    pub target_host: Option<String>,
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            default_status: FALLBACK_REDIRECT_STATUS,
            trailing_slash: false,
            target_host: None,
        }
    }
}

impl RedirectConfig {
    /// The default status, falling back to 302 when out of the 3xx range.
    pub fn default_status_code(&self) -> StatusCode {
        redirect_status_or_fallback(self.default_status, "redirects.default_status")
    }
}

/// Remote function invocation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FunctionConfig {
    /// Invocation endpoint; function ids are appended as the last path segment.
    pub base_url: String,

    /// Deadline for one invocation, in seconds.
    pub timeout_secs: u64,

    /// Drop headers whose name mentions `auth` or `token` before forwarding.
    pub strip_credential_headers: bool,

    /// Largest request body forwarded to a function, in bytes.
    pub max_body_bytes: usize,
}

impl Default for FunctionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9001/functions".to_string(),
            timeout_secs: 30,
            strip_credential_headers: true,
            max_body_bytes: 6 * 1024 * 1024,
        }
    }
}

/// Static fallback behavior.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticSiteConfig {
    /// Pages live at `path/index.html`; `path` redirects to `path/` when only
    /// the index document exists.
    pub trailing_slash_only: bool,

    /// Redirect `path/` to `path` instead of serving it.
    pub trailing_slash_redirection: bool,

    /// Status for trailing-slash redirects.
    pub redirect_status: u16,

    /// Regexes (searched, not anchored) of paths that keep their trailing slash.
    pub leave_trailing_slash: Vec<String>,

    /// Paths on which a preferred locale triggers a redirect to `/{locale}`.
    pub locale_switch_paths: Vec<String>,

    /// Also pick the preferred locale from the viewer-country header.
    pub geo_locale_switch: bool,

    /// Document served for directory-like paths.
    pub index_document: String,

    /// Route prefixes served from another bucket, e.g. `"/docs" = "docs-site"`.
    /// Keys in that bucket keep the prefix (`/docs/a` reads `docs/a`).
    pub subroutes: BTreeMap<String, String>,
}

impl Default for StaticSiteConfig {
    fn default() -> Self {
        Self {
            trailing_slash_only: false,
            trailing_slash_redirection: true,
            redirect_status: FALLBACK_REDIRECT_STATUS,
            leave_trailing_slash: Vec::new(),
            locale_switch_paths: vec!["/".to_string()],
            geo_locale_switch: false,
            index_document: "index.html".to_string(),
            subroutes: BTreeMap::new(),
        }
    }
}

impl StaticSiteConfig {
    pub fn redirect_status_code(&self) -> StatusCode {
        redirect_status_or_fallback(self.redirect_status, "static_site.redirect_status")
    }
}

/// Cross-origin settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// Literal origins or regexes; bare hosts are treated as `https://host`.
    pub allowed_origins: Vec<String>,

    /// Answer OPTIONS requests directly, before any rule is consulted.
    pub shortcircuit_options: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec![".*".to_string()],
            shortcircuit_options: false,
        }
    }
}

/// Advisory response headers.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HeadersConfig {
    /// Add long-lived cache headers to successful asset responses.
    pub cache_headers: bool,

    /// CSP directive name -> source list (e.g. `default-src = ["'self'"]`).
    pub content_security_policy: BTreeMap<String, Vec<String>>,
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

pub(crate) fn is_redirect_status(code: u16) -> bool {
    (300..400).contains(&code)
}

fn redirect_status_or_fallback(code: u16, option: &str) -> StatusCode {
    match StatusCode::from_u16(code) {
        Ok(status) if status.is_redirection() => status,
        _ => {
            tracing::warn!(option, code, "Ignoring redirect code outside of the 3xx range");
            StatusCode::FOUND
        }
    }
}

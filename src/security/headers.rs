//! Advisory response headers.
//!
//! # Responsibilities
//! - Build the `Content-Security-Policy` value from configured source lists
//! - Add long-lived cache headers to successful asset responses
//!
//! # Design Decisions
//! - Headers already set upstream (object metadata, function output) win
//! - Text and application payloads never get the immutable cache policy

use std::collections::BTreeMap;

use axum::http::{
    header::{CACHE_CONTROL, CONTENT_SECURITY_POLICY, CONTENT_TYPE, VARY},
    HeaderMap, HeaderValue, StatusCode,
};

use crate::config::HeadersConfig;

pub const IMMUTABLE_CACHE_CONTROL: &str = "public,max-age=2592000,s-maxage=2592000,immutable";

pub const ASSET_VARY: &str =
    "Accept-Encoding,Origin,Access-Control-Request-Headers,Access-Control-Request-Method";

/// Render `directive src src; directive src` from configured lists.
pub fn content_security_policy(directives: &BTreeMap<String, Vec<String>>) -> Option<String> {
    let policy = directives
        .iter()
        .filter(|(name, _)| !name.trim().is_empty())
        .map(|(name, sources)| {
            let sources: Vec<&str> = sources
                .iter()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .collect();
            if sources.is_empty() {
                name.trim().to_string()
            } else {
                format!("{} {}", name.trim(), sources.join(" "))
            }
        })
        .collect::<Vec<_>>()
        .join("; ");

    (!policy.is_empty()).then_some(policy)
}

/// Response header policy, computed once per configuration.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaderPolicy {
    csp: Option<HeaderValue>,
    cache_headers: bool,
}

impl ResponseHeaderPolicy {
    pub fn from_config(config: &HeadersConfig) -> Self {
        let csp = content_security_policy(&config.content_security_policy).and_then(|policy| {
            HeaderValue::from_str(&policy)
                .map_err(|_| tracing::warn!(policy = %policy, "Ignoring unrepresentable CSP"))
                .ok()
        });

        Self {
            csp,
            cache_headers: config.cache_headers,
        }
    }

    pub fn apply(&self, status: StatusCode, headers: &mut HeaderMap) {
        if let Some(csp) = &self.csp {
            if !headers.contains_key(CONTENT_SECURITY_POLICY) {
                headers.insert(CONTENT_SECURITY_POLICY, csp.clone());
            }
        }

        if self.cache_headers {
            apply_cache_headers(status, headers);
        }
    }
}

fn apply_cache_headers(status: StatusCode, headers: &mut HeaderMap) {
    if status != StatusCode::OK {
        return;
    }

    let Some(content_type) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return;
    };
    if content_type.contains("text") || content_type.contains("application") {
        return;
    }

    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(IMMUTABLE_CACHE_CONTROL));
    }
    if !headers.contains_key(VARY) {
        headers.insert(VARY, HeaderValue::from_static(ASSET_VARY));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(content_type: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers
    }

    #[test]
    fn test_csp_rendering() {
        let mut directives = BTreeMap::new();
        directives.insert("default-src".to_string(), vec!["'self'".to_string()]);
        directives.insert(
            "img-src".to_string(),
            vec!["'self'".to_string(), " data: ".to_string()],
        );
        directives.insert("upgrade-insecure-requests".to_string(), vec![]);

        assert_eq!(
            content_security_policy(&directives).as_deref(),
            Some("default-src 'self'; img-src 'self' data:; upgrade-insecure-requests")
        );
        assert_eq!(content_security_policy(&BTreeMap::new()), None);
    }

    #[test]
    fn test_cache_headers_only_on_ok_assets() {
        let policy = ResponseHeaderPolicy::from_config(&HeadersConfig {
            cache_headers: true,
            ..HeadersConfig::default()
        });

        let mut image = headers("image/png");
        policy.apply(StatusCode::OK, &mut image);
        assert_eq!(image[CACHE_CONTROL], IMMUTABLE_CACHE_CONTROL);
        assert_eq!(image[VARY], ASSET_VARY);

        let mut html = headers("text/html");
        policy.apply(StatusCode::OK, &mut html);
        assert!(!html.contains_key(CACHE_CONTROL));

        let mut json = headers("application/json");
        policy.apply(StatusCode::OK, &mut json);
        assert!(!json.contains_key(CACHE_CONTROL));

        let mut missing = headers("image/png");
        policy.apply(StatusCode::NOT_FOUND, &mut missing);
        assert!(!missing.contains_key(CACHE_CONTROL));
    }

    #[test]
    fn test_existing_cache_control_kept() {
        let policy = ResponseHeaderPolicy::from_config(&HeadersConfig {
            cache_headers: true,
            ..HeadersConfig::default()
        });
        let mut image = headers("image/png");
        image.insert(CACHE_CONTROL, HeaderValue::from_static("no-store"));
        policy.apply(StatusCode::OK, &mut image);
        assert_eq!(image[CACHE_CONTROL], "no-store");
    }
}

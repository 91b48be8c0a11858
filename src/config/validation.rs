//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, redirect codes in 3xx)
//! - Detect conflicting options (trailing-slash redirect loops)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use regex::Regex;
use thiserror::Error;

use crate::config::schema::{is_redirect_status, EdgeConfig, StorageBackend};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("storage.bucket must not be empty")]
    EmptyBucket,

    #[error("storage.endpoint '{0}' is not a valid URL")]
    StorageEndpoint(String),

    #[error("functions.base_url '{0}' is not a valid URL")]
    FunctionEndpoint(String),

    #[error("{option} must be a 3xx status, got {code}")]
    RedirectStatus { option: &'static str, code: u16 },

    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("static_site.leave_trailing_slash entry '{0}' is not a valid regex")]
    LeaveTrailingSlashPattern(String),

    #[error("static_site.trailing_slash_only and trailing_slash_redirection would redirect in a loop")]
    TrailingSlashLoop,

    #[error("static_site.subroutes entry '{route}' needs a route below '/' and a bucket")]
    Subroute { route: String },
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.storage.bucket.trim().is_empty() {
        errors.push(ValidationError::EmptyBucket);
    }

    if config.storage.backend == StorageBackend::Http
        && url::Url::parse(&config.storage.endpoint).is_err()
    {
        errors.push(ValidationError::StorageEndpoint(config.storage.endpoint.clone()));
    }

    if url::Url::parse(&config.functions.base_url).is_err() {
        errors.push(ValidationError::FunctionEndpoint(config.functions.base_url.clone()));
    }

    for (option, code) in [
        ("redirects.default_status", config.redirects.default_status),
        ("static_site.redirect_status", config.static_site.redirect_status),
    ] {
        if !is_redirect_status(code) {
            errors.push(ValidationError::RedirectStatus { option, code });
        }
    }

    for (option, secs) in [
        ("storage.fetch_timeout_secs", config.storage.fetch_timeout_secs),
        ("functions.timeout_secs", config.functions.timeout_secs),
        ("timeouts.request_secs", config.timeouts.request_secs),
    ] {
        if secs == 0 {
            errors.push(ValidationError::ZeroTimeout(option));
        }
    }

    for pattern in &config.static_site.leave_trailing_slash {
        if Regex::new(pattern).is_err() {
            errors.push(ValidationError::LeaveTrailingSlashPattern(pattern.clone()));
        }
    }

    if config.static_site.trailing_slash_only && config.static_site.trailing_slash_redirection {
        errors.push(ValidationError::TrailingSlashLoop);
    }

    for (route, bucket) in &config.static_site.subroutes {
        if route.trim_matches('/').is_empty() || bucket.trim().is_empty() {
            errors.push(ValidationError::Subroute {
                route: route.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&EdgeConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = EdgeConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.redirects.default_status = 200;
        config.timeouts.request_secs = 0;
        config.static_site.leave_trailing_slash = vec!["(".into()];

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::RedirectStatus {
            option: "redirects.default_status",
            code: 200,
        }));
        assert!(errors.contains(&ValidationError::ZeroTimeout("timeouts.request_secs")));
    }

    #[test]
    fn test_trailing_slash_loop_is_rejected() {
        let mut config = EdgeConfig::default();
        config.static_site.trailing_slash_only = true;
        config.static_site.trailing_slash_redirection = true;

        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::TrailingSlashLoop])
        );
    }

    #[test]
    fn test_subroutes_need_prefix_and_bucket() {
        let mut config = EdgeConfig::default();
        config.static_site.subroutes.insert("/docs".into(), "docs-site".into());
        assert_eq!(validate_config(&config), Ok(()));

        config.static_site.subroutes.insert("/".into(), "root".into());
        config.static_site.subroutes.insert("/blog".into(), " ".into());
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(errors.contains(&ValidationError::Subroute { route: "/".into() }));
    }
}

//! Redirect resolver.

use axum::http::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::config::schema::is_redirect_status;
use crate::config::RedirectConfig;
use crate::routing::decision::RoutingDecision;
use crate::routing::matcher::PathPattern;
use crate::rules::table::{Keyed, RuleTable};
use crate::rules::RuleError;

/// Value of one entry in `redirects.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RedirectEntry {
    /// A bare target; status and trailing-slash handling use the defaults.
    Target(String),
    Detailed {
        target: String,
        #[serde(default)]
        status: Option<StatusValue>,
        #[serde(default, rename = "trailing-slash", alias = "trailing_slash")]
        trailing_slash: Option<bool>,
    },
}

/// Status codes are authored as numbers or strings.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StatusValue {
    Code(u16),
    Text(String),
}

impl StatusValue {
    fn code(&self) -> Option<u16> {
        match self {
            Self::Code(code) => Some(*code),
            Self::Text(text) => text.trim().parse().ok(),
        }
    }

    fn raw(&self) -> String {
        match self {
            Self::Code(code) => code.to_string(),
            Self::Text(text) => text.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRule {
    pattern: PathPattern,
    target: String,
    status: StatusCode,
    trailing_slash_variant: bool,
}

impl RedirectRule {
    pub fn new(
        pattern: &str,
        target: impl Into<String>,
        status: u16,
        trailing_slash_variant: bool,
    ) -> Result<Self, RuleError> {
        let target = target.into();
        if target.trim().is_empty() {
            return Err(RuleError::EmptyTarget(pattern.to_string()));
        }

        let status = StatusCode::from_u16(status)
            .ok()
            .filter(|_| is_redirect_status(status))
            .ok_or_else(|| RuleError::Status {
                pattern: pattern.to_string(),
                status: status.to_string(),
            })?;

        Ok(Self {
            pattern: PathPattern::compile(pattern)?,
            target,
            status,
            // The root has no slash-less twin.
            trailing_slash_variant: trailing_slash_variant && pattern != "/",
        })
    }

    /// Normalize a control-document entry, filling gaps from the defaults.
    pub fn from_entry(
        pattern: &str,
        entry: RedirectEntry,
        defaults: &RedirectConfig,
    ) -> Result<Self, RuleError> {
        let default_status = defaults.default_status_code().as_u16();
        match entry {
            RedirectEntry::Target(target) => {
                Self::new(pattern, target, default_status, defaults.trailing_slash)
            }
            RedirectEntry::Detailed {
                target,
                status,
                trailing_slash,
            } => {
                let status = match status {
                    None => default_status,
                    Some(value) => value.code().ok_or_else(|| RuleError::Status {
                        pattern: pattern.to_string(),
                        status: value.raw(),
                    })?,
                };
                Self::new(
                    pattern,
                    target,
                    status,
                    trailing_slash.unwrap_or(defaults.trailing_slash),
                )
            }
        }
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn includes_trailing_slash_variant(&self) -> bool {
        self.trailing_slash_variant
    }

    /// Match `path`, or its trailing-slash twin when the rule opts in.
    pub fn matches(&self, path: &str) -> bool {
        if self.pattern.matches(path) {
            return true;
        }
        if !self.trailing_slash_variant {
            return false;
        }
        match path.strip_suffix('/') {
            Some(stripped) if !stripped.is_empty() => self.pattern.matches(stripped),
            Some(_) => false,
            None => self.pattern.matches(&format!("{}/", path)),
        }
    }
}

impl Keyed for RedirectRule {
    fn key(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Host that root-relative redirect targets are made absolute against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetHost {
    base: Url,
}

impl TargetHost {
    /// Accepts `example.com` (assumed https) or a full `scheme://host[:port]`.
    pub fn parse(host: &str) -> Result<Self, url::ParseError> {
        let host = host.trim().trim_end_matches('/');
        let base = if host.contains("://") {
            Url::parse(host)?
        } else {
            Url::parse(&format!("https://{}", host))?
        };
        Ok(Self { base })
    }

    /// Absolute and protocol-relative targets are returned unchanged.
    pub fn apply(&self, target: &str) -> String {
        if !target.starts_with('/') || target.starts_with("//") {
            return target.to_string();
        }
        self.base
            .join(target)
            .map(String::from)
            .unwrap_or_else(|_| target.to_string())
    }
}

/// Consults the redirect table for each request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectResolver {
    rules: RuleTable<RedirectRule>,
    target_host: Option<TargetHost>,
}

impl RedirectResolver {
    pub fn new(rules: RuleTable<RedirectRule>, target_host: Option<TargetHost>) -> Self {
        Self { rules, target_host }
    }

    pub fn rules(&self) -> &RuleTable<RedirectRule> {
        &self.rules
    }

    pub fn target_host(&self) -> Option<&TargetHost> {
        self.target_host.as_ref()
    }

    /// Apply the host override, if any, to a root-relative target.
    pub fn absolutize(&self, target: &str) -> String {
        match &self.target_host {
            Some(host) => host.apply(target),
            None => target.to_string(),
        }
    }

    pub fn resolve(&self, path: &str) -> RoutingDecision {
        match self.rules.first_match(|rule| rule.matches(path)) {
            Some(rule) => RoutingDecision::Redirect {
                target: self.absolutize(rule.target()),
                status: rule.status(),
            },
            None => RoutingDecision::PassThrough,
        }
    }
}

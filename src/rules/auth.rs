//! Authorization gate: path-based HTTP Basic protection.

use serde::Deserialize;

use crate::config::AuthConfig;
use crate::routing::decision::RoutingDecision;
use crate::routing::matcher::PathPattern;
use crate::rules::table::{Keyed, RuleTable};
use crate::rules::RuleError;
use crate::security::basic::Credentials;

/// Value of one entry in `authorizations.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AuthEntry {
    /// `base64(username:password)`.
    Encoded(String),
    Explicit {
        username: String,
        password: String,
        #[serde(default)]
        realm: Option<String>,
    },
}

/// A protected pattern and the single principal allowed through it.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthRule {
    pattern: PathPattern,
    username: String,
    password: String,
    realm: String,
}

impl std::fmt::Debug for AuthRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRule")
            .field("pattern", &self.pattern.as_str())
            .field("username", &self.username)
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

impl AuthRule {
    pub fn new(
        pattern: &str,
        username: impl Into<String>,
        password: impl Into<String>,
        realm: impl Into<String>,
    ) -> Result<Self, RuleError> {
        Ok(Self {
            pattern: PathPattern::compile(pattern)?,
            username: username.into(),
            password: password.into(),
            realm: realm.into(),
        })
    }

    /// Normalize a control-document entry.
    pub fn from_entry(pattern: &str, entry: AuthEntry, default_realm: &str) -> Result<Self, RuleError> {
        match entry {
            AuthEntry::Encoded(encoded) => {
                let creds = Credentials::from_base64(&encoded)
                    .ok_or_else(|| RuleError::Credentials(pattern.to_string()))?;
                Self::new(pattern, creds.username, creds.password, default_realm)
            }
            AuthEntry::Explicit {
                username,
                password,
                realm,
            } => Self::new(
                pattern,
                username,
                password,
                realm.unwrap_or_else(|| default_realm.to_string()),
            ),
        }
    }

    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn realm(&self) -> &str {
        &self.realm
    }

    /// Whether this rule guards `path`. A literal pattern also guards its
    /// trailing-slash form.
    pub fn protects(&self, path: &str) -> bool {
        if self.pattern.matches(path) {
            return true;
        }
        match &self.pattern {
            PathPattern::Literal(p) if !p.ends_with('/') => path.strip_suffix('/') == Some(p),
            _ => false,
        }
    }

    pub fn accepts(&self, credentials: Option<&Credentials>) -> bool {
        credentials.is_some_and(|c| c.matches(&self.username, &self.password))
    }
}

impl Keyed for AuthRule {
    fn key(&self) -> &str {
        self.pattern.as_str()
    }
}

/// Consults the authorization table for each request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthGate {
    rules: RuleTable<AuthRule>,
    exempt_prefixes: Vec<String>,
}

impl AuthGate {
    pub fn new(rules: RuleTable<AuthRule>, config: &AuthConfig) -> Self {
        Self {
            rules,
            exempt_prefixes: config
                .exempt_prefixes
                .iter()
                .filter(|p| !p.is_empty())
                .cloned()
                .collect(),
        }
    }

    pub fn rules(&self) -> &RuleTable<AuthRule> {
        &self.rules
    }

    fn is_exempt(&self, path: &str) -> bool {
        self.exempt_prefixes.iter().any(|p| path.starts_with(p.as_str()))
    }

    /// First matching rule decides; no rule (or an exempt path) passes through.
    pub fn authorize(&self, path: &str, credentials: Option<&Credentials>) -> RoutingDecision {
        if self.rules.is_empty() || self.is_exempt(path) {
            return RoutingDecision::PassThrough;
        }

        match self.rules.first_match(|rule| rule.protects(path)) {
            Some(rule) if rule.accepts(credentials) => RoutingDecision::PassThrough,
            Some(rule) => {
                tracing::debug!(
                    path,
                    pattern = rule.pattern().as_str(),
                    credentials_present = credentials.is_some(),
                    "Authorization required"
                );
                RoutingDecision::Unauthorized {
                    realm: rule.realm().to_string(),
                }
            }
            None => RoutingDecision::PassThrough,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    fn gate(rules: Vec<AuthRule>) -> AuthGate {
        AuthGate::new(rules.into_iter().collect(), &AuthConfig::default())
    }

    fn unauthorized(realm: &str) -> RoutingDecision {
        RoutingDecision::Unauthorized {
            realm: realm.to_string(),
        }
    }

    #[test]
    fn test_regex_rule_gates_matching_paths() {
        let gate = gate(vec![AuthRule::new("/admin/.*", "a", "b", "Admin").unwrap()]);

        let good = Credentials::new("a", "b");
        let bad = Credentials::new("a", "wrong");

        assert_eq!(gate.authorize("/admin/x", Some(&good)), RoutingDecision::PassThrough);
        assert_eq!(gate.authorize("/admin/x", Some(&bad)), unauthorized("Admin"));
        assert_eq!(gate.authorize("/admin/x", None), unauthorized("Admin"));
        assert_eq!(gate.authorize("/public/x", None), RoutingDecision::PassThrough);
        assert_eq!(gate.authorize("/public/x", Some(&bad)), RoutingDecision::PassThrough);
    }

    #[test]
    fn test_literal_rule_also_guards_trailing_slash() {
        let gate = gate(vec![AuthRule::new("/drafts", "a", "b", "Drafts").unwrap()]);

        assert_eq!(gate.authorize("/drafts", None), unauthorized("Drafts"));
        assert_eq!(gate.authorize("/drafts/", None), unauthorized("Drafts"));
        assert_eq!(gate.authorize("/drafts/one", None), RoutingDecision::PassThrough);
    }

    #[test]
    fn test_first_match_wins() {
        let gate = gate(vec![
            AuthRule::new("/team/.*", "team", "t", "Team").unwrap(),
            AuthRule::new("/team/lead/.*", "lead", "l", "Lead").unwrap(),
        ]);

        let lead = Credentials::new("lead", "l");
        assert_eq!(gate.authorize("/team/lead/plan", Some(&lead)), unauthorized("Team"));
    }

    #[test]
    fn test_exempt_prefixes_pass_through() {
        let rules = vec![AuthRule::new(".*", "a", "b", "Site").unwrap()]
            .into_iter()
            .collect();
        let config = AuthConfig {
            exempt_prefixes: vec!["/.well-known/".into(), String::new()],
            ..AuthConfig::default()
        };
        let gate = AuthGate::new(rules, &config);

        assert_eq!(gate.authorize("/.well-known/acme", None), RoutingDecision::PassThrough);
        assert_eq!(gate.authorize("/index", None), unauthorized("Site"));
    }

    #[test]
    fn test_from_entry_forms() {
        let encoded = base64::engine::general_purpose::STANDARD.encode("user:pa:ss");
        let rule = AuthRule::from_entry("/a", AuthEntry::Encoded(encoded), "Default").unwrap();
        assert_eq!(rule.username(), "user");
        assert_eq!(rule.realm(), "Default");
        assert!(rule.accepts(Some(&Credentials::new("user", "pa:ss"))));

        let rule = AuthRule::from_entry(
            "/b",
            AuthEntry::Explicit {
                username: "u".into(),
                password: "p".into(),
                realm: Some("Custom".into()),
            },
            "Default",
        )
        .unwrap();
        assert_eq!(rule.realm(), "Custom");

        assert!(matches!(
            AuthRule::from_entry("/c", AuthEntry::Encoded("%%%".into()), "Default"),
            Err(RuleError::Credentials(_))
        ));
    }

    #[test]
    fn test_debug_hides_password() {
        let rule = AuthRule::new("/a", "u", "hunter2", "R").unwrap();
        assert!(!format!("{:?}", rule).contains("hunter2"));
    }
}

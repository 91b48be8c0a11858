//! Rule subsystem: the three control-document driven rule layers.
//!
//! # Data Flow
//! ```text
//! Object store (startup / reload)
//!     → loader.rs (fetch + parse control documents, per-feature)
//!     → auth.rs / redirect.rs / function.rs (normalize entries into rules)
//!     → table.rs (ordered RuleTable, duplicates replaced in place)
//!     → RuleSet (immutable, shared by every request)
//! ```
//!
//! # Design Decisions
//! - Tables keep control-document order; lookup is first-match-wins
//! - A bad rule is skipped and logged; the rest of its table survives
//! - A malformed document empties that feature only
//! - A missing document silently disables its feature

pub mod auth;
pub mod function;
pub mod loader;
pub mod redirect;
pub mod table;

use thiserror::Error;

use crate::routing::matcher::PatternError;

pub use auth::{AuthGate, AuthRule, AuthEntry};
pub use function::{FunctionDispatcher, FunctionRule, PathParams, RouteTemplate};
pub use loader::{load_rule_set, DocumentKind, LoadReport};
pub use redirect::{RedirectResolver, RedirectRule, RedirectEntry, TargetHost};
pub use table::{Keyed, RuleTable};

/// Why a single control-document entry was rejected.
#[derive(Debug, Error)]
pub enum RuleError {
    #[error(transparent)]
    Pattern(#[from] PatternError),

    #[error("entry '{pattern}' has an unexpected shape: {source}")]
    Shape {
        pattern: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("credentials for '{0}' are not base64 'username:password'")]
    Credentials(String),

    #[error("redirect '{pattern}' has an invalid status '{status}'")]
    Status { pattern: String, status: String },

    #[error("redirect '{0}' has an empty target")]
    EmptyTarget(String),

    #[error("route template '{template}': {reason}")]
    Template { template: String, reason: String },

    #[error("route '{0}' has an empty function id")]
    EmptyFunctionId(String),
}

/// Every rule table plus the locale list, as one consistent snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleSet {
    pub auth: AuthGate,
    pub redirects: RedirectResolver,
    pub functions: FunctionDispatcher,
    pub locales: Vec<String>,
}

impl RuleSet {
    /// A rule set that intercepts nothing.
    pub fn empty() -> Self {
        Self::default()
    }
}

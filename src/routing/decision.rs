//! The per-request routing outcome.

use axum::http::StatusCode;

use crate::rules::PathParams;

/// What the rule layers decided for one request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingDecision {
    /// Answer 401 with a Basic challenge for `realm`.
    Unauthorized { realm: String },
    /// Answer `status` with `Location: target`.
    Redirect { target: String, status: StatusCode },
    /// Forward the request to a remote function.
    Dispatch {
        function_id: String,
        params: PathParams,
    },
    /// No rule claimed the path; serve it from the object store.
    PassThrough,
}

impl RoutingDecision {
    /// Low-cardinality label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "unauthorized",
            Self::Redirect { .. } => "redirect",
            Self::Dispatch { .. } => "dispatch",
            Self::PassThrough => "static",
        }
    }

    pub fn is_pass_through(&self) -> bool {
        matches!(self, Self::PassThrough)
    }
}

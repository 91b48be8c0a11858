//! Remote function invocation.
//!
//! # Data Flow
//! ```text
//! RoutingDecision::Dispatch { function_id, params }
//!     → FunctionRequest (method, path, query, filtered headers, params, body)
//!     → FunctionInvoker::invoke (http.rs: JSON event over HTTP)
//!     → FunctionResponse (status, headers, body) relayed verbatim
//! ```
//!
//! # Design Decisions
//! - The invoker is a trait so the router can be driven without a network
//! - No retries: a failed invocation maps straight to 502 or 504
//! - Credential-bearing headers never leave the edge

pub mod http;

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;
use thiserror::Error;

use crate::rules::PathParams;

pub use self::http::HttpFunctionInvoker;

/// Why an invocation produced no relayable response.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("function invocation timed out after {0:?}")]
    Timeout(Duration),

    #[error("function transport error: {0}")]
    Transport(String),

    #[error("function endpoint answered {status}")]
    Remote { status: StatusCode },

    #[error("function returned an invalid payload: {0}")]
    InvalidResponse(String),
}

impl DispatchError {
    /// Status returned to the client.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    /// Label for `edge_function_invocations_total`.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport_error",
            Self::Remote { .. } => "remote_error",
            Self::InvalidResponse(_) => "invalid_response",
        }
    }
}

/// The original request, as handed to a function.
#[derive(Debug, Clone)]
pub struct FunctionRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub path_parameters: PathParams,
    pub body: Bytes,
}

/// What a function answered.
#[derive(Debug, Clone)]
pub struct FunctionResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[async_trait]
pub trait FunctionInvoker: Send + Sync + std::fmt::Debug {
    async fn invoke(
        &self,
        function_id: &str,
        request: FunctionRequest,
    ) -> Result<FunctionResponse, DispatchError>;
}

/// Header names that carry credentials (`Authorization`, `X-Auth-Token`, ...).
pub fn is_credential_header(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    name.contains("auth") || name.contains("token")
}

/// Remove every credential-bearing header in place.
pub fn strip_credential_headers(headers: &mut HeaderMap) {
    let doomed: Vec<_> = headers
        .keys()
        .filter(|name| is_credential_header(name.as_str()))
        .cloned()
        .collect();
    for name in doomed {
        headers.remove(&name);
    }
}

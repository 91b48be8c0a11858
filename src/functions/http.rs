//! HTTP function invoker.
//!
//! Each invocation is one `POST {base_url}/{function_id}` carrying a JSON
//! event; the function answers with a JSON result:
//!
//! ```text
//! → { "httpMethod", "path", "rawQueryString", "queryStringParameters",
//!     "headers", "pathParameters", "body", "isBase64Encoded" }
//! ← { "statusCode", "headers", "multiValueHeaders", "body", "isBase64Encoded" }
//! ```
//!
//! A function id that is itself an `http(s)://` URL is called directly.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use base64::Engine;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::FunctionConfig;
use crate::functions::{
    strip_credential_headers, DispatchError, FunctionInvoker, FunctionRequest, FunctionResponse,
};
use crate::resilience::{with_timeout, TimedOut};

/// Status assumed when a result omits `statusCode`.
const MISSING_STATUS: u16 = 500;

#[derive(Debug, Error)]
pub enum InvokerError {
    #[error("invalid function base URL: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error("function base URL cannot take path segments: {0}")]
    NotABase(String),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct HttpFunctionInvoker {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    strip_credentials: bool,
}

impl HttpFunctionInvoker {
    pub fn new(config: &FunctionConfig) -> Result<Self, InvokerError> {
        let base_url = Url::parse(&config.base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(InvokerError::NotABase(config.base_url.clone()));
        }

        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url,
            timeout: Duration::from_secs(config.timeout_secs),
            strip_credentials: config.strip_credential_headers,
        })
    }

    fn endpoint(&self, function_id: &str) -> Result<Url, DispatchError> {
        if function_id.starts_with("http://") || function_id.starts_with("https://") {
            return Url::parse(function_id)
                .map_err(|e| DispatchError::Transport(format!("invalid function URL: {}", e)));
        }

        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DispatchError::Transport("function base URL cannot be a base".into()))?
            .pop_if_empty()
            .push(function_id);
        Ok(url)
    }

    fn event<'a>(&self, request: &'a FunctionRequest) -> InvocationEvent<'a> {
        let mut headers = request.headers.clone();
        if self.strip_credentials {
            strip_credential_headers(&mut headers);
        }
        InvocationEvent::new(request, &headers)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvocationEvent<'a> {
    http_method: &'a str,
    path: &'a str,
    raw_query_string: &'a str,
    query_string_parameters: BTreeMap<String, String>,
    headers: BTreeMap<String, String>,
    path_parameters: BTreeMap<&'a str, &'a str>,
    body: Option<String>,
    is_base64_encoded: bool,
}

impl<'a> InvocationEvent<'a> {
    fn new(request: &'a FunctionRequest, headers: &HeaderMap) -> Self {
        let raw_query = request.query.as_deref().unwrap_or("");

        let mut flattened: BTreeMap<String, String> = BTreeMap::new();
        for (name, value) in headers {
            let Ok(value) = value.to_str() else { continue };
            flattened
                .entry(name.as_str().to_string())
                .and_modify(|existing| {
                    existing.push(',');
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let (body, is_base64_encoded) = if request.body.is_empty() {
            (None, false)
        } else {
            match std::str::from_utf8(&request.body) {
                Ok(text) => (Some(text.to_string()), false),
                Err(_) => (
                    Some(base64::engine::general_purpose::STANDARD.encode(&request.body)),
                    true,
                ),
            }
        };

        Self {
            http_method: request.method.as_str(),
            path: &request.path,
            raw_query_string: raw_query,
            query_string_parameters: url::form_urlencoded::parse(raw_query.as_bytes())
                .into_owned()
                .collect(),
            headers: flattened,
            path_parameters: request.path_parameters.iter().collect(),
            body,
            is_base64_encoded,
        }
    }
}

fn default_status() -> u16 {
    MISSING_STATUS
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InvocationResult {
    #[serde(default = "default_status")]
    status_code: u16,
    #[serde(default)]
    headers: BTreeMap<String, Value>,
    #[serde(default)]
    multi_value_headers: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    is_base64_encoded: bool,
}

fn header_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl InvocationResult {
    fn into_response(self) -> Result<FunctionResponse, DispatchError> {
        let status = StatusCode::from_u16(self.status_code).map_err(|_| {
            DispatchError::InvalidResponse(format!("status code {}", self.status_code))
        })?;

        let mut headers = HeaderMap::new();
        let single = self.headers.iter().map(|(n, v)| (n, header_text(v)));
        let multi = self
            .multi_value_headers
            .iter()
            .flat_map(|(n, values)| values.iter().map(move |v| (n, header_text(v))));

        for (name, value) in single.chain(multi) {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    headers.append(name, value);
                }
                _ => tracing::debug!(header = %name, "Dropping unrepresentable function header"),
            }
        }

        let body = match (self.body, self.is_base64_encoded) {
            (None, _) => Bytes::new(),
            (Some(text), false) => Bytes::from(text),
            (Some(encoded), true) => base64::engine::general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map(Bytes::from)
                .map_err(|e| DispatchError::InvalidResponse(format!("body is not base64: {}", e)))?,
        };

        Ok(FunctionResponse {
            status,
            headers,
            body,
        })
    }
}

#[async_trait]
impl FunctionInvoker for HttpFunctionInvoker {
    async fn invoke(
        &self,
        function_id: &str,
        request: FunctionRequest,
    ) -> Result<FunctionResponse, DispatchError> {
        let url = self.endpoint(function_id)?;
        let event = self.event(&request);

        tracing::debug!(function_id, url = %url, path = %request.path, "Invoking function");

        let exchange = async {
            let response = self
                .client
                .post(url)
                .json(&event)
                .send()
                .await
                .map_err(|e| DispatchError::Transport(e.to_string()))?;

            let status = response.status();
            if !status.is_success() {
                return Err(DispatchError::Remote { status });
            }

            response
                .bytes()
                .await
                .map_err(|e| DispatchError::Transport(e.to_string()))
        };

        let payload = with_timeout(self.timeout, exchange)
            .await
            .map_err(|TimedOut(elapsed)| DispatchError::Timeout(elapsed))??;

        serde_json::from_slice::<InvocationResult>(&payload)
            .map_err(|e| DispatchError::InvalidResponse(e.to_string()))?
            .into_response()
    }
}

//! The routing orchestrator.
//!
//! # Responsibilities
//! - Decode the request path once; every layer matches the decoded form
//! - Apply the rule layers in fixed order: auth, redirect, dispatch
//! - Fall back to the static site when no layer claims the path
//! - Decorate every response (CSP, cache advice) and record metrics
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - The first layer that claims a path ends the scan
//! - Request-time failures become status codes; nothing here panics
//! - CORS, including the OPTIONS short-circuit, is handled by the server's
//!   middleware before a request gets here

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    http::{request::Parts, Method, Request, StatusCode},
    response::Response,
};

use crate::config::EdgeConfig;
use crate::functions::{FunctionInvoker, FunctionRequest};
use crate::http::middleware::AllowedOrigins;
use crate::http::request::{decode_path, request_id};
use crate::http::response;
use crate::observability::metrics;
use crate::routing::decision::RoutingDecision;
use crate::routing::static_files::{
    subroutes_from_config, StaticOutcome, StaticRequest, StaticSite, Subroute,
};
use crate::rules::{load_rule_set, LoadReport, PathParams, RuleSet};
use crate::security::basic::Credentials;
use crate::security::headers::ResponseHeaderPolicy;
use crate::storage::ObjectStore;

/// One consistent routing snapshot: config, rules and collaborators.
#[derive(Debug)]
pub struct EdgeRouter {
    config: Arc<EdgeConfig>,
    rules: RuleSet,
    store: Arc<dyn ObjectStore>,
    invoker: Arc<dyn FunctionInvoker>,
    site: StaticSite,
    origins: AllowedOrigins,
    header_policy: ResponseHeaderPolicy,
}

impl EdgeRouter {
    pub fn new(
        config: Arc<EdgeConfig>,
        rules: RuleSet,
        store: Arc<dyn ObjectStore>,
        invoker: Arc<dyn FunctionInvoker>,
    ) -> Self {
        let subroutes = subroutes_from_config(&config).unwrap_or_else(|e| {
            tracing::error!(error = %e, "Sub-route stores unavailable, serving only the main site");
            Vec::new()
        });

        Self {
            site: StaticSite::new(store.clone(), subroutes, &config),
            origins: AllowedOrigins::from_config(&config.cors),
            header_policy: ResponseHeaderPolicy::from_config(&config.headers),
            config,
            rules,
            store,
            invoker,
        }
    }

    /// Fetch the control documents and build a router over them.
    pub async fn load(
        config: Arc<EdgeConfig>,
        store: Arc<dyn ObjectStore>,
        invoker: Arc<dyn FunctionInvoker>,
    ) -> (Self, LoadReport) {
        let (rules, report) = load_rule_set(store.as_ref(), &config, None).await;
        (Self::new(config, rules, store, invoker), report)
    }

    /// Like `load`, but documents that cannot be fetched keep the rules
    /// `previous` had for them.
    pub async fn load_after(
        previous: &EdgeRouter,
        config: Arc<EdgeConfig>,
        store: Arc<dyn ObjectStore>,
        invoker: Arc<dyn FunctionInvoker>,
    ) -> (Self, LoadReport) {
        let (rules, report) = load_rule_set(store.as_ref(), &config, Some(&previous.rules)).await;
        (Self::new(config, rules, store, invoker), report)
    }

    /// Serve sub-routes from these stores instead of the configured ones.
    pub fn with_subroutes(mut self, subroutes: Vec<Subroute>) -> Self {
        self.site = StaticSite::new(self.store.clone(), subroutes, &self.config);
        self
    }

    pub fn config(&self) -> &Arc<EdgeConfig> {
        &self.config
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    pub fn invoker(&self) -> Arc<dyn FunctionInvoker> {
        self.invoker.clone()
    }

    pub fn subroutes(&self) -> &[Subroute] {
        self.site.subroutes()
    }

    pub fn origins(&self) -> &AllowedOrigins {
        &self.origins
    }

    /// Run the rule layers for `path`; `PassThrough` means static fallback.
    pub fn decide(&self, path: &str, credentials: Option<&Credentials>) -> RoutingDecision {
        let decision = self.rules.auth.authorize(path, credentials);
        if !decision.is_pass_through() {
            return decision;
        }

        let decision = self.rules.redirects.resolve(path);
        if !decision.is_pass_through() {
            return decision;
        }

        self.rules.functions.dispatch(path)
    }

    /// Answer one request.
    pub async fn handle(&self, request: Request<Body>) -> Response {
        let start = Instant::now();
        let (parts, body) = request.into_parts();
        let request_id = request_id(&parts.headers);

        let decoded = decode_path(parts.uri.path());
        let path = decoded.as_deref().unwrap_or_else(|_| parts.uri.path());

        let (kind, mut response) = if let Err(e) = &decoded {
            tracing::debug!(request_id, path, error = %e, "Refusing undecodable path");
            ("rejected", response::bad_request())
        } else {
            let credentials = Credentials::from_headers(&parts.headers);
            let decision = self.decide(path, credentials.as_ref());
            let kind = decision.kind();

            tracing::debug!(
                request_id,
                method = %parts.method,
                path,
                decision = kind,
                "Routing decision"
            );

            let response = match decision {
                RoutingDecision::Unauthorized { realm } => response::unauthorized(&realm),
                RoutingDecision::Redirect { target, status } => response::redirect(&target, status),
                RoutingDecision::Dispatch {
                    function_id,
                    params,
                } => self.dispatch(&function_id, params, path, &parts, body).await,
                RoutingDecision::PassThrough => self.serve_static(path, &parts).await,
            };
            (kind, response)
        };

        self.header_policy
            .apply(response.status(), response.headers_mut());

        if parts.method == Method::HEAD {
            *response.body_mut() = Body::empty();
        }

        metrics::record_request(kind, response.status().as_u16(), start);
        tracing::debug!(
            request_id,
            path,
            decision = kind,
            status = response.status().as_u16(),
            latency_ms = start.elapsed().as_millis() as u64,
            "Request completed"
        );

        response
    }

    async fn dispatch(
        &self,
        function_id: &str,
        params: PathParams,
        path: &str,
        parts: &Parts,
        body: Body,
    ) -> Response {
        let body = match axum::body::to_bytes(body, self.config.functions.max_body_bytes).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(function_id, error = %e, "Request body rejected");
                return response::payload_too_large();
            }
        };

        let request = FunctionRequest {
            method: parts.method.clone(),
            path: path.to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers.clone(),
            path_parameters: params,
            body,
        };

        match self.invoker.invoke(function_id, request).await {
            Ok(relayed) => {
                metrics::record_function_invocation("ok");
                response::relay(relayed)
            }
            Err(e) => {
                metrics::record_function_invocation(e.outcome());
                tracing::error!(
                    request_id = request_id(&parts.headers),
                    function_id,
                    error = %e,
                    "Function invocation failed"
                );
                response::dispatch_error(&e)
            }
        }
    }

    async fn serve_static(&self, path: &str, parts: &Parts) -> Response {
        let method = &parts.method;
        if method == Method::OPTIONS {
            return response::options(StatusCode::OK);
        }
        if method != Method::GET && method != Method::HEAD && method != Method::POST {
            return response::method_not_allowed();
        }

        let request = StaticRequest {
            path,
            query: parts.uri.query(),
            headers: &parts.headers,
        };

        match self.site.lookup(request, &self.rules.locales).await {
            StaticOutcome::Object(object) => response::object(StatusCode::OK, object),
            StaticOutcome::Redirect { target, status } => {
                response::redirect(&self.rules.redirects.absolutize(&target), status)
            }
            StaticOutcome::NotFound(page) => response::not_found(page),
            StaticOutcome::Failed(page) => {
                tracing::error!(path, "Object store failed");
                response::server_error(page)
            }
            StaticOutcome::TimedOut { elapsed, page } => {
                tracing::warn!(path, ?elapsed, "Object store timed out");
                response::store_timeout(page)
            }
        }
    }
}

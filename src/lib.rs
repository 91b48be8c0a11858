//! Edge router library.
//!
//! Serves a static site out of an object store, guarded by Basic auth rules,
//! with redirect rules and remote function routes layered in front of it.
//! All rules come from JSON control documents stored next to the site.

pub mod config;
pub mod functions;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod routing;
pub mod rules;
pub mod security;
pub mod storage;

pub use config::schema::EdgeConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::{EdgeRouter, SharedRouter};

//! Request/response middleware applied around the routing engine.

pub mod cors;

pub use cors::{cors_layer, options_guard, AllowedOrigins};

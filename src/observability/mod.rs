//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Router, rule loader, static fallback, function invoker:
//!     → logging.rs (structured log events, request ID in every span)
//!     → metrics.rs (decision counters, latency histogram, load gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (when enabled)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows from the HTTP layer into every decision log
//! - Metric calls are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;

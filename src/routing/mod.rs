//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path, headers)
//!     → router.rs (orchestrator)
//!         → rules::AuthGate        → 401 challenge
//!         → rules::RedirectResolver → 3xx Location
//!         → rules::FunctionDispatcher → functions::FunctionInvoker
//!         → static_files.rs (locale.rs, trailing slash, object lookup)
//!     → Response (CORS, CSP, cache advice)
//!
//! Rule loading (startup / reload):
//!     rules::loader → RuleSet
//!     → new EdgeRouter
//!     → shared.rs (atomic swap)
//! ```
//!
//! # Design Decisions
//! - Routers are built whole and never mutated
//! - Deterministic: same rules and path always yield the same decision
//! - First match wins (control-document order)

pub mod decision;
pub mod locale;
pub mod matcher;
pub mod router;
pub mod shared;
pub mod static_files;

pub use decision::RoutingDecision;
pub use matcher::{matches, PathPattern, PatternError};
pub use router::EdgeRouter;
pub use shared::SharedRouter;
pub use static_files::Subroute;

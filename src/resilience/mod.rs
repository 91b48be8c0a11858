//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an external collaborator (object store, remote function):
//!     → timeouts.rs (enforce deadline)
//!     → On timeout: distinct error kind, mapped to 504 by the HTTP layer
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries here: retry policy belongs to the collaborator itself

pub mod timeouts;

pub use timeouts::{with_timeout, TimedOut};

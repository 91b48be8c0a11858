//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → basic.rs (extract HTTP Basic credentials for the auth gate)
//!     → Pass to routing
//!
//! Outgoing response:
//!     → headers.rs (CSP, cache advice)
//! ```
//!
//! # Design Decisions
//! - Credentials never appear in logs or Debug output
//! - Password comparison is constant time
//! - No trust in client input

pub mod basic;
pub mod headers;

//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EdgeConfig (validated, immutable)
//!     → shared via Arc with the routing snapshot
//!
//! On reload signal:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → control documents re-fetched, new EdgeRouter built
//!     → atomic swap of Arc<EdgeRouter>
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - The listener address is read once; it is not hot-reloaded

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, ConfigError};
pub use watcher::ConfigWatcher;
pub use schema::{
    AuthConfig, ControlDocumentConfig, CorsConfig, EdgeConfig, FunctionConfig, HeadersConfig,
    ListenerConfig, LogFormat, ObservabilityConfig, RedirectConfig, StaticSiteConfig,
    StorageBackend, StorageConfig, TimeoutConfig,
};

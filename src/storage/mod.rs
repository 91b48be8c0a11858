//! Object storage subsystem.
//!
//! # Data Flow
//! ```text
//! Control documents (startup / reload):
//!     rules::loader → ObjectStore::get(key) → JSON bytes
//!
//! Static fallback (per request):
//!     routing::static_files → ObjectStore::get(prefix/key)
//!         → StoredObject (body + metadata) or NotFound
//! ```
//!
//! # Design Decisions
//! - The store is a plain key → blob lookup; no listing, no writes
//! - A missing key is `StorageError::NotFound`, never a transport failure
//! - Deadlines are applied by callers (see `resilience::timeouts`)

pub mod fs;
pub mod http;
pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::config::{StorageBackend, StorageConfig};

pub use fs::FsObjectStore;
pub use http::HttpObjectStore;
pub use memory::MemoryObjectStore;

/// Errors returned by an object store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key does not exist in the bucket.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The fetch did not complete before its deadline.
    #[error("object fetch timed out after {0:?}")]
    Timeout(Duration),

    /// Any other failure talking to the store.
    #[error("object store error: {0}")]
    Backend(String),
}

/// An object and the metadata relayed to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    /// HTTP-date formatted.
    pub expires: Option<String>,
    /// HTTP-date formatted.
    pub last_modified: Option<String>,
}

impl StoredObject {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_cache_control(mut self, cache_control: impl Into<String>) -> Self {
        self.cache_control = Some(cache_control.into());
        self
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

/// A key/value blob store holding the site.
#[async_trait]
pub trait ObjectStore: Send + Sync + std::fmt::Debug {
    /// Fetch an object by key.
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError>;

    /// A URL clients can fetch the object from directly, if the store has one.
    fn public_url(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Build the configured object store.
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, StorageError> {
    match config.backend {
        StorageBackend::Fs => Ok(Arc::new(FsObjectStore::new(
            std::path::Path::new(&config.root).join(&config.bucket),
        ))),
        StorageBackend::Http => Ok(Arc::new(HttpObjectStore::new(
            &config.endpoint,
            &config.bucket,
            Duration::from_secs(config.fetch_timeout_secs),
        )?)),
    }
}

/// Join the configured prefix and a key, ignoring stray slashes on the prefix.
pub fn prefixed_key(prefix: &str, key: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}/{}", prefix, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixed_key() {
        assert_eq!(prefixed_key("", "index.html"), "index.html");
        assert_eq!(prefixed_key("/site/", "index.html"), "site/index.html");
        assert_eq!(prefixed_key("a/b", "c.css"), "a/b/c.css");
    }
}

//! In-memory object store.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::storage::{ObjectStore, StorageError, StoredObject};

/// A thread-safe in-memory bucket, used for embedding and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: Arc<DashMap<String, StoredObject>>,
    public_base: Option<String>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `{base}/{key}` as the public URL of every object.
    pub fn with_public_base(mut self, base: impl Into<String>) -> Self {
        self.public_base = Some(base.into());
        self
    }

    /// Insert or replace an object.
    pub fn put(&self, key: impl Into<String>, object: StoredObject) {
        self.objects.insert(key.into(), object);
    }

    /// Insert a text object with the given content type.
    pub fn put_text(&self, key: impl Into<String>, content_type: &str, body: impl Into<String>) {
        self.put(
            key,
            StoredObject::new(body.into()).with_content_type(content_type),
        );
    }

    pub fn remove(&self, key: &str) {
        self.objects.remove(key);
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        self.objects
            .get(key)
            .map(|r| r.value().clone())
            .ok_or_else(|| StorageError::NotFound(key.to_string()))
    }

    fn public_url(&self, key: &str) -> Option<String> {
        self.public_base
            .as_ref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_remove() {
        let store = MemoryObjectStore::new();
        store.put_text("index.html", "text/html", "<h1>hi</h1>");

        let object = store.get("index.html").await.unwrap();
        assert_eq!(object.content_type.as_deref(), Some("text/html"));
        assert_eq!(&object.body[..], b"<h1>hi</h1>");

        store.remove("index.html");
        assert!(matches!(
            store.get("index.html").await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn test_public_url() {
        let store = MemoryObjectStore::new();
        assert_eq!(store.public_url("a.bin"), None);

        let store = store.with_public_base("https://cdn.example.com/");
        assert_eq!(
            store.public_url("a.bin").as_deref(),
            Some("https://cdn.example.com/a.bin")
        );
    }
}

//! Filesystem-backed object store.
//!
//! # Design Decisions
//! - One directory is one bucket; keys are relative paths inside it
//! - Keys that would escape the directory are reported as not found
//! - Content type is guessed from the extension, Last-Modified from mtime

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::storage::{ObjectStore, StorageError, StoredObject};

pub const HTTP_DATE_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Option<PathBuf> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || key.is_empty() {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl ObjectStore for FsObjectStore {
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        let path = self
            .resolve(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(StorageError::NotFound(key.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => return Err(StorageError::Backend(e.to_string())),
        };

        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let last_modified = metadata
            .modified()
            .ok()
            .map(|t| DateTime::<Utc>::from(t).format(HTTP_DATE_FORMAT).to_string());

        Ok(StoredObject {
            body: body.into(),
            content_type: mime_guess::from_path(&path)
                .first_raw()
                .map(str::to_string),
            cache_control: None,
            expires: None,
            last_modified,
        })
    }
}

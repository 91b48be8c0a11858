//! S3-compatible object store reached over plain HTTP.
//!
//! Objects are fetched with `GET {endpoint}/{bucket}/{key}` (path-style
//! addressing). Missing keys come back as 404, or 403 when the caller may not
//! list the bucket; both are reported as `NotFound`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CACHE_CONTROL, CONTENT_TYPE, EXPIRES, LAST_MODIFIED};
use reqwest::StatusCode;
use url::Url;

use crate::storage::{ObjectStore, StorageError, StoredObject};

#[derive(Debug, Clone)]
pub struct HttpObjectStore {
    client: reqwest::Client,
    bucket_url: Url,
    timeout: Duration,
}

impl HttpObjectStore {
    pub fn new(endpoint: &str, bucket: &str, timeout: Duration) -> Result<Self, StorageError> {
        let mut bucket_url = Url::parse(endpoint)
            .map_err(|e| StorageError::Backend(format!("invalid endpoint '{}': {}", endpoint, e)))?;
        bucket_url
            .path_segments_mut()
            .map_err(|_| StorageError::Backend(format!("endpoint '{}' cannot be a base", endpoint)))?
            .pop_if_empty()
            .push(bucket)
            .push("");

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        Ok(Self {
            client,
            bucket_url,
            timeout,
        })
    }

    /// Keys are decoded paths; each segment is percent-encoded on the way out.
    fn object_url(&self, key: &str) -> Result<Url, StorageError> {
        let mut url = self.bucket_url.clone();
        url.path_segments_mut()
            .map_err(|_| StorageError::Backend(format!("invalid key '{}'", key)))?
            .pop_if_empty()
            .extend(key.trim_start_matches('/').split('/'));
        Ok(url)
    }
}

fn header_string(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        let url = self.object_url(key)?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                StorageError::Timeout(self.timeout)
            } else {
                StorageError::Backend(e.to_string())
            }
        })?;

        match response.status() {
            StatusCode::NOT_FOUND | StatusCode::FORBIDDEN => {
                return Err(StorageError::NotFound(key.to_string()))
            }
            status if !status.is_success() => {
                return Err(StorageError::Backend(format!(
                    "unexpected status {} for '{}'",
                    status, key
                )))
            }
            _ => {}
        }

        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                StorageError::Timeout(self.timeout)
            } else {
                StorageError::Backend(e.to_string())
            }
        })?;

        Ok(StoredObject {
            body,
            content_type: header_string(&headers, CONTENT_TYPE),
            cache_control: header_string(&headers, CACHE_CONTROL),
            expires: header_string(&headers, EXPIRES),
            last_modified: header_string(&headers, LAST_MODIFIED),
        })
    }

    fn public_url(&self, key: &str) -> Option<String> {
        self.object_url(key).ok().map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_urls() {
        let store =
            HttpObjectStore::new("http://127.0.0.1:9000", "www", Duration::from_secs(1)).unwrap();
        assert_eq!(
            store.public_url("fr/index.html").as_deref(),
            Some("http://127.0.0.1:9000/www/fr/index.html")
        );

        let store =
            HttpObjectStore::new("http://minio.local/s3/", "www", Duration::from_secs(1)).unwrap();
        assert_eq!(
            store.public_url("/a.css").as_deref(),
            Some("http://minio.local/s3/www/a.css")
        );
    }

    #[test]
    fn test_object_urls_encode_key_segments() {
        let store =
            HttpObjectStore::new("http://127.0.0.1:9000", "www", Duration::from_secs(1)).unwrap();
        assert_eq!(
            store.public_url("caf\u{e9} menu?.html").as_deref(),
            Some("http://127.0.0.1:9000/www/caf%C3%A9%20menu%3F.html")
        );
        assert_eq!(
            store.public_url("docs/100%/index.html").as_deref(),
            Some("http://127.0.0.1:9000/www/docs/100%25/index.html")
        );
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        assert!(HttpObjectStore::new("not a url", "www", Duration::from_secs(1)).is_err());
    }
}

//! Static fallback: serving site files from the object store.
//!
//! # Responsibilities
//! - Switch visitors to their preferred locale on configured paths
//! - Strip the locale prefix and apply the trailing-slash policy
//! - Serve sub-route prefixes from their own buckets
//! - Try candidate keys (`page`, `page/index.html`, `page.html`)
//! - Find a custom 404 or 500 page when nothing matches or the store fails
//!
//! # Design Decisions
//! - The locale is stripped before the trailing-slash policy runs; every
//!   redirect produced here is re-prefixed with it
//! - A sub-route keeps its prefix in object keys and is never localized
//! - Missing keys are misses; any other store failure ends the lookup with
//!   the 500 page (a timeout keeps its 504 status)
//! - Error pages are looked up in the request's own tree first, then in the
//!   main site
//! - Objects larger than the overflow size are handed off with a 303 to
//!   the store's public URL when it has one

use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use regex::Regex;

use crate::config::{EdgeConfig, StaticSiteConfig, StorageConfig};
use crate::resilience::{with_timeout, TimedOut};
use crate::routing::locale::{preferred_locale, LocalizedPath};
use crate::storage::{self, prefixed_key, ObjectStore, StorageError, StoredObject};

/// Zero-length objects under these keys are S3 API artifacts, not pages.
const SOAP_KEYS: &[&str] = &["soap", "soap/", "soap.html", "soap/index.html"];

const NOT_FOUND_PAGES: &[&str] = &["404/index.html", "404.html"];

const SERVER_ERROR_PAGES: &[&str] = &["500/index.html", "500.html"];

/// What the static fallback found for a request.
#[derive(Debug)]
pub enum StaticOutcome {
    /// Serve this object with 200.
    Object(StoredObject),
    /// Send the client elsewhere.
    Redirect { target: String, status: StatusCode },
    /// Nothing matched; the custom 404 page, if the site has one.
    NotFound(Option<StoredObject>),
    /// The store failed; the custom 500 page, if the site has one.
    Failed(Option<StoredObject>),
    /// The store did not answer in time; the custom 500 page, if any.
    TimedOut {
        elapsed: Duration,
        page: Option<StoredObject>,
    },
}

/// A request as seen by the static fallback.
#[derive(Debug, Clone, Copy)]
pub struct StaticRequest<'a> {
    /// Decoded request path.
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
}

impl StaticRequest<'_> {
    fn with_query(&self, target: String) -> String {
        match self.query {
            Some(query) if !query.is_empty() => format!("{}?{}", target, query),
            _ => target,
        }
    }
}

/// A route prefix served from its own bucket.
#[derive(Debug, Clone)]
pub struct Subroute {
    prefix: String,
    store: Arc<dyn ObjectStore>,
}

impl Subroute {
    /// `route` is the public prefix (`/docs`); keys keep it (`docs/...`).
    pub fn new(route: &str, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            prefix: route.trim_matches('/').to_string(),
            store,
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The part of `path` below this route, when `path` is under it.
    fn strip<'p>(&self, path: &'p str) -> Option<&'p str> {
        path.strip_prefix('/')?
            .strip_prefix(self.prefix.as_str())?
            .strip_prefix('/')
    }
}

/// One store per `static_site.subroutes` entry, on the main store's backend.
pub fn subroutes_from_config(config: &EdgeConfig) -> Result<Vec<Subroute>, StorageError> {
    config
        .static_site
        .subroutes
        .iter()
        .map(|(route, bucket)| {
            let storage = StorageConfig {
                bucket: bucket.clone(),
                ..config.storage.clone()
            };
            Ok(Subroute::new(route, storage::from_config(&storage)?))
        })
        .collect()
}

enum Candidate {
    Hit(StoredObject),
    Handoff(String),
    Miss,
}

enum Failure {
    TimedOut(Duration),
    Backend,
}

/// The store and key prefix a lookup reads from.
#[derive(Clone, Copy)]
struct Tree<'s> {
    store: &'s Arc<dyn ObjectStore>,
    key_prefix: &'s str,
}

#[derive(Debug)]
pub struct StaticSite {
    store: Arc<dyn ObjectStore>,
    prefix: String,
    subroutes: Vec<Subroute>,
    fetch_timeout: Duration,
    overflow_bytes: u64,
    config: StaticSiteConfig,
    leave_trailing_slash: Vec<Regex>,
}

impl StaticSite {
    pub fn new(store: Arc<dyn ObjectStore>, mut subroutes: Vec<Subroute>, config: &EdgeConfig) -> Self {
        let leave_trailing_slash = config
            .static_site
            .leave_trailing_slash
            .iter()
            .filter_map(|pattern| {
                Regex::new(pattern)
                    .map_err(|e| {
                        tracing::warn!(pattern = %pattern, error = %e, "Ignoring invalid leave-trailing-slash pattern")
                    })
                    .ok()
            })
            .collect();

        // Longest route wins when prefixes nest.
        subroutes.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        Self {
            store,
            prefix: config.storage.prefix.clone(),
            subroutes,
            fetch_timeout: Duration::from_secs(config.storage.fetch_timeout_secs),
            overflow_bytes: config.storage.overflow_bytes,
            config: config.static_site.clone(),
            leave_trailing_slash,
        }
    }

    pub fn subroutes(&self) -> &[Subroute] {
        &self.subroutes
    }

    fn main_tree(&self) -> Tree<'_> {
        Tree {
            store: &self.store,
            key_prefix: &self.prefix,
        }
    }

    fn keeps_trailing_slash(&self, path: &str) -> bool {
        !self.config.trailing_slash_redirection
            || self.leave_trailing_slash.iter().any(|re| re.is_match(path))
    }

    fn index_candidates(&self, page: &str) -> Vec<String> {
        vec![
            page.to_string(),
            format!("{}/{}", page, self.config.index_document),
            format!("{}.html", page),
        ]
    }

    /// Resolve `request` against the store.
    pub async fn lookup(&self, request: StaticRequest<'_>, locales: &[String]) -> StaticOutcome {
        let routed = self
            .subroutes
            .iter()
            .find_map(|sub| sub.strip(request.path).map(|rest| (sub, rest)));

        let (tree, path) = match routed {
            Some((sub, rest)) => {
                tracing::debug!(path = request.path, subroute = %sub.prefix, "Serving from sub-route bucket");
                let tree = Tree {
                    store: &sub.store,
                    key_prefix: "",
                };
                (tree, LocalizedPath::under(&sub.prefix, rest))
            }
            None => {
                if let Some(target) = self.locale_switch(request, locales) {
                    return StaticOutcome::Redirect {
                        target,
                        status: StatusCode::SEE_OTHER,
                    };
                }
                (self.main_tree(), LocalizedPath::split(request.path, locales))
            }
        };

        match self.find(tree, path, request).await {
            Ok(Some(outcome)) => outcome,
            Ok(None) => {
                StaticOutcome::NotFound(self.error_page(tree, path.base, NOT_FOUND_PAGES).await)
            }
            Err(Failure::Backend) => {
                StaticOutcome::Failed(self.error_page(tree, path.base, SERVER_ERROR_PAGES).await)
            }
            Err(Failure::TimedOut(elapsed)) => StaticOutcome::TimedOut {
                elapsed,
                page: self.error_page(tree, path.base, SERVER_ERROR_PAGES).await,
            },
        }
    }

    fn locale_switch(&self, request: StaticRequest<'_>, locales: &[String]) -> Option<String> {
        if !self
            .config
            .locale_switch_paths
            .iter()
            .any(|p| p == request.path)
        {
            return None;
        }

        let locale = preferred_locale(request.headers, locales, self.config.geo_locale_switch)?;
        tracing::debug!(path = request.path, locale, "Switching to preferred locale");
        Some(request.with_query(format!("/{}", locale)))
    }

    /// Object or redirect for `path`; `None` when every candidate misses.
    async fn find(
        &self,
        tree: Tree<'_>,
        path: LocalizedPath<'_>,
        request: StaticRequest<'_>,
    ) -> Result<Option<StaticOutcome>, Failure> {
        let rest = path.rest;

        let (candidates, slash_only_page) = if rest.is_empty() {
            (vec![self.config.index_document.clone()], None)
        } else if let Some(page) = rest.strip_suffix('/') {
            if !self.keeps_trailing_slash(request.path) {
                return Ok(Some(StaticOutcome::Redirect {
                    target: request.with_query(path.public_path(page)),
                    status: self.config.redirect_status_code(),
                }));
            }
            (self.index_candidates(page), None)
        } else if self.config.trailing_slash_only {
            (vec![rest.to_string(), format!("{}.html", rest)], Some(rest))
        } else {
            (self.index_candidates(rest), None)
        };

        for candidate in &candidates {
            match self.fetch_candidate(tree, &path.key(candidate)).await? {
                Candidate::Hit(object) => return Ok(Some(StaticOutcome::Object(object))),
                Candidate::Handoff(url) => {
                    return Ok(Some(StaticOutcome::Redirect {
                        target: url,
                        status: StatusCode::SEE_OTHER,
                    }))
                }
                Candidate::Miss => {}
            }
        }

        if let Some(page) = slash_only_page {
            let index = path.key(&format!("{}/{}", page, self.config.index_document));
            if !matches!(self.fetch_candidate(tree, &index).await?, Candidate::Miss) {
                return Ok(Some(StaticOutcome::Redirect {
                    target: request.with_query(path.public_path(&format!("{}/", page))),
                    status: self.config.redirect_status_code(),
                }));
            }
        }

        Ok(None)
    }

    /// The first of `pages` found below `base` in `tree`, then in the main site.
    async fn error_page(
        &self,
        tree: Tree<'_>,
        base: Option<&str>,
        pages: &[&str],
    ) -> Option<StoredObject> {
        let scoped: Vec<String> = match base {
            Some(base) => pages.iter().map(|p| format!("{}/{}", base, p)).collect(),
            None => Vec::new(),
        };

        for key in &scoped {
            if let Ok(Candidate::Hit(page)) = self.fetch_candidate(tree, key).await {
                return Some(page);
            }
        }
        for key in pages {
            if let Ok(Candidate::Hit(page)) = self.fetch_candidate(self.main_tree(), key).await {
                return Some(page);
            }
        }
        None
    }

    async fn fetch_candidate(&self, tree: Tree<'_>, key: &str) -> Result<Candidate, Failure> {
        let key = prefixed_key(tree.key_prefix, key);
        tracing::trace!(key = %key, "Checking object");

        let fetched = with_timeout(self.fetch_timeout, tree.store.get(&key))
            .await
            .map_err(|TimedOut(elapsed)| Failure::TimedOut(elapsed))?;

        let object = match fetched {
            Ok(object) => object,
            Err(StorageError::NotFound(_)) => return Ok(Candidate::Miss),
            Err(StorageError::Timeout(elapsed)) => return Err(Failure::TimedOut(elapsed)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Object fetch failed");
                return Err(Failure::Backend);
            }
        };

        if object.is_empty() && SOAP_KEYS.contains(&key.as_str()) {
            tracing::debug!(key = %key, "Ignoring empty SOAP endpoint object");
            return Ok(Candidate::Miss);
        }

        if object.len() as u64 > self.overflow_bytes {
            match tree.store.public_url(&key) {
                Some(url) => {
                    tracing::info!(key = %key, size = object.len(), "Object too large, handing off to store URL");
                    return Ok(Candidate::Handoff(url));
                }
                None => {
                    tracing::warn!(key = %key, size = object.len(), "Object too large and store has no public URL, serving inline");
                }
            }
        }

        Ok(Candidate::Hit(object))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::storage::MemoryObjectStore;

    /// Serves from a memory store but fails on one key.
    #[derive(Debug)]
    struct BrokenKey {
        inner: MemoryObjectStore,
        key: &'static str,
        error: fn() -> StorageError,
    }

    #[async_trait]
    impl ObjectStore for BrokenKey {
        async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
            if key == self.key {
                return Err((self.error)());
            }
            self.inner.get(key).await
        }
    }

    fn site(store: &MemoryObjectStore, tweak: impl FnOnce(&mut EdgeConfig)) -> StaticSite {
        let mut config = EdgeConfig::default();
        tweak(&mut config);
        StaticSite::new(Arc::new(store.clone()), Vec::new(), &config)
    }

    fn request<'a>(path: &'a str, headers: &'a HeaderMap) -> StaticRequest<'a> {
        StaticRequest {
            path,
            query: None,
            headers,
        }
    }

    fn body(outcome: StaticOutcome) -> String {
        match outcome {
            StaticOutcome::Object(object) => String::from_utf8(object.body.to_vec()).unwrap(),
            other => panic!("expected object, got {:?}", other),
        }
    }

    fn redirect(outcome: StaticOutcome) -> (String, StatusCode) {
        match outcome {
            StaticOutcome::Redirect { target, status } => (target, status),
            other => panic!("expected redirect, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_candidate_order() {
        let store = MemoryObjectStore::new();
        store.put_text("index.html", "text/html", "home");
        store.put_text("about/index.html", "text/html", "about-dir");
        store.put_text("about.html", "text/html", "about-file");
        store.put_text("contact.html", "text/html", "contact");
        let site = site(&store, |_| {});
        let headers = HeaderMap::new();

        assert_eq!(body(site.lookup(request("/", &headers), &[]).await), "home");
        assert_eq!(body(site.lookup(request("/about", &headers), &[]).await), "about-dir");
        assert_eq!(body(site.lookup(request("/contact", &headers), &[]).await), "contact");
        assert!(matches!(
            site.lookup(request("/missing", &headers), &[]).await,
            StaticOutcome::NotFound(None)
        ));
    }

    #[tokio::test]
    async fn test_trailing_slash_redirect_keeps_query_and_locale() {
        let store = MemoryObjectStore::new();
        let site = site(&store, |_| {});
        let headers = HeaderMap::new();
        let locales = vec!["fr".to_string()];

        let (target, status) = redirect(
            site.lookup(
                StaticRequest {
                    path: "/fr/about/",
                    query: Some("a=1"),
                    headers: &headers,
                },
                &locales,
            )
            .await,
        );
        assert_eq!(target, "/fr/about?a=1");
        assert_eq!(status, StatusCode::FOUND);
    }

    #[tokio::test]
    async fn test_locale_root_serves_locale_index() {
        let store = MemoryObjectStore::new();
        store.put_text("fr/index.html", "text/html", "accueil");
        let site = site(&store, |_| {});
        let headers = HeaderMap::new();
        let locales = vec!["fr".to_string()];

        assert_eq!(body(site.lookup(request("/fr", &headers), &locales).await), "accueil");
        assert_eq!(body(site.lookup(request("/fr/", &headers), &locales).await), "accueil");
    }

    #[tokio::test]
    async fn test_trailing_slash_kept_when_redirection_off_or_listed() {
        let store = MemoryObjectStore::new();
        store.put_text("docs/index.html", "text/html", "docs");
        store.put_text("api/index.html", "text/html", "api");
        let headers = HeaderMap::new();

        let site_off = site(&store, |c| c.static_site.trailing_slash_redirection = false);
        assert_eq!(body(site_off.lookup(request("/docs/", &headers), &[]).await), "docs");

        let site_listed = site(&store, |c| c.static_site.leave_trailing_slash = vec!["^/api/".into()]);
        assert_eq!(body(site_listed.lookup(request("/api/", &headers), &[]).await), "api");
        assert!(matches!(
            site_listed.lookup(request("/docs/", &headers), &[]).await,
            StaticOutcome::Redirect { .. }
        ));
    }

    #[tokio::test]
    async fn test_trailing_slash_only_redirects_to_directory() {
        let store = MemoryObjectStore::new();
        store.put_text("guide/index.html", "text/html", "guide");
        store.put_text("page.html", "text/html", "page");
        let site = site(&store, |c| {
            c.static_site.trailing_slash_only = true;
            c.static_site.trailing_slash_redirection = false;
        });
        let headers = HeaderMap::new();

        assert_eq!(
            redirect(site.lookup(request("/guide", &headers), &[]).await),
            ("/guide/".to_string(), StatusCode::FOUND)
        );
        assert_eq!(body(site.lookup(request("/guide/", &headers), &[]).await), "guide");
        assert_eq!(body(site.lookup(request("/page", &headers), &[]).await), "page");
    }

    #[tokio::test]
    async fn test_custom_not_found_pages() {
        let store = MemoryObjectStore::new();
        store.put_text("404.html", "text/html", "global 404");
        store.put_text("fr/404/index.html", "text/html", "introuvable");
        let site = site(&store, |_| {});
        let headers = HeaderMap::new();
        let locales = vec!["fr".to_string()];

        match site.lookup(request("/fr/nope", &headers), &locales).await {
            StaticOutcome::NotFound(Some(page)) => assert_eq!(page.body, "introuvable"),
            other => panic!("unexpected {:?}", other),
        }
        match site.lookup(request("/nope", &headers), &locales).await {
            StaticOutcome::NotFound(Some(page)) => assert_eq!(page.body, "global 404"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_soap_guard_and_prefix() {
        let store = MemoryObjectStore::new();
        store.put_text("soap", "text/plain", "");
        store.put_text("site/page.html", "text/html", "prefixed");
        let headers = HeaderMap::new();

        let plain = site(&store, |_| {});
        assert!(matches!(
            plain.lookup(request("/soap", &headers), &[]).await,
            StaticOutcome::NotFound(_)
        ));

        let prefixed = site(&store, |c| c.storage.prefix = "/site/".into());
        assert_eq!(body(prefixed.lookup(request("/page", &headers), &[]).await), "prefixed");
    }

    #[tokio::test]
    async fn test_oversize_handoff() {
        let store = MemoryObjectStore::new().with_public_base("https://bucket.example.com");
        store.put_text("big.bin", "application/octet-stream", "0123456789");
        let site = site(&store, |c| c.storage.overflow_bytes = 4);
        let headers = HeaderMap::new();

        assert_eq!(
            redirect(site.lookup(request("/big.bin", &headers), &[]).await),
            (
                "https://bucket.example.com/big.bin".to_string(),
                StatusCode::SEE_OTHER
            )
        );
    }

    #[tokio::test]
    async fn test_locale_switch() {
        use axum::http::{header::COOKIE, HeaderValue};

        let store = MemoryObjectStore::new();
        let site = site(&store, |_| {});
        let locales = vec!["en".to_string(), "fr".to_string()];

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("locale=fr"));

        assert_eq!(
            redirect(site.lookup(request("/", &headers), &locales).await),
            ("/fr".to_string(), StatusCode::SEE_OTHER)
        );
        assert!(matches!(
            site.lookup(request("/about", &headers), &locales).await,
            StaticOutcome::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_store_failure_serves_custom_500() {
        let inner = MemoryObjectStore::new();
        inner.put_text("500.html", "text/html", "we broke");
        let store = BrokenKey {
            inner,
            key: "page",
            error: || StorageError::Backend("access denied".into()),
        };
        let site = StaticSite::new(Arc::new(store), Vec::new(), &EdgeConfig::default());
        let headers = HeaderMap::new();

        match site.lookup(request("/page", &headers), &[]).await {
            StaticOutcome::Failed(Some(page)) => assert_eq!(page.body, "we broke"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_store_timeout_carries_500_page() {
        let inner = MemoryObjectStore::new();
        inner.put_text("500/index.html", "text/html", "slow down");
        let store = BrokenKey {
            inner,
            key: "page",
            error: || StorageError::Timeout(Duration::from_secs(10)),
        };
        let site = StaticSite::new(Arc::new(store), Vec::new(), &EdgeConfig::default());
        let headers = HeaderMap::new();

        match site.lookup(request("/page", &headers), &[]).await {
            StaticOutcome::TimedOut { elapsed, page } => {
                assert_eq!(elapsed, Duration::from_secs(10));
                assert_eq!(page.unwrap().body, "slow down");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_subroute_reads_its_own_bucket() {
        let main = MemoryObjectStore::new();
        main.put_text("site/404.html", "text/html", "main 404");
        main.put_text("site/docs/guide.html", "text/html", "main copy");
        let docs = MemoryObjectStore::new();
        docs.put_text("docs/guide.html", "text/html", "docs copy");
        docs.put_text("docs/index.html", "text/html", "docs home");

        let mut config = EdgeConfig::default();
        config.storage.prefix = "site".into();
        let site = StaticSite::new(
            Arc::new(main.clone()),
            vec![Subroute::new("/docs", Arc::new(docs.clone()))],
            &config,
        );
        let headers = HeaderMap::new();
        let locales = vec!["docs".to_string()];

        assert_eq!(body(site.lookup(request("/docs/guide", &headers), &locales).await), "docs copy");
        assert_eq!(body(site.lookup(request("/docs/", &headers), &locales).await), "docs home");

        // No sub-route page: the main site's 404 answers.
        match site.lookup(request("/docs/missing", &headers), &[]).await {
            StaticOutcome::NotFound(Some(page)) => assert_eq!(page.body, "main 404"),
            other => panic!("unexpected {:?}", other),
        }

        docs.put_text("docs/404.html", "text/html", "docs 404");
        match site.lookup(request("/docs/missing", &headers), &[]).await {
            StaticOutcome::NotFound(Some(page)) => assert_eq!(page.body, "docs 404"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_subroute_trailing_slash_redirect_keeps_prefix() {
        let store = MemoryObjectStore::new();
        let site = StaticSite::new(
            Arc::new(store.clone()),
            vec![Subroute::new("docs/", Arc::new(MemoryObjectStore::new()))],
            &EdgeConfig::default(),
        );
        let headers = HeaderMap::new();

        assert_eq!(
            redirect(site.lookup(request("/docs/guide/", &headers), &[]).await),
            ("/docs/guide".to_string(), StatusCode::FOUND)
        );
    }

    #[test]
    fn test_subroutes_from_config() {
        let mut config = EdgeConfig::default();
        config.static_site.subroutes.insert("/docs".into(), "docs-site".into());

        let subroutes = subroutes_from_config(&config).unwrap();
        assert_eq!(subroutes.len(), 1);
        assert_eq!(subroutes[0].prefix(), "docs");
    }
}

//! Atomically swappable routing snapshot.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::EdgeConfig;
use crate::routing::router::EdgeRouter;
use crate::rules::LoadReport;

/// Shared handle to the current `EdgeRouter`.
///
/// Requests take a snapshot and keep it for their whole lifetime; a reload
/// builds a complete new router and swaps it in with a single store.
#[derive(Debug, Clone)]
pub struct SharedRouter {
    current: Arc<ArcSwap<EdgeRouter>>,
}

impl SharedRouter {
    pub fn new(router: EdgeRouter) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(router)),
        }
    }

    pub fn snapshot(&self) -> Arc<EdgeRouter> {
        self.current.load_full()
    }

    /// Install a fully built router.
    pub fn replace(&self, router: EdgeRouter) {
        self.current.store(Arc::new(router));
    }

    /// Re-fetch the control documents under `config`, keeping the current
    /// store, invoker and sub-route stores. Documents that cannot be fetched
    /// keep their current rules.
    pub async fn reload(&self, config: Arc<EdgeConfig>) -> LoadReport {
        let current = self.snapshot();
        let (router, report) =
            EdgeRouter::load_after(&current, config, current.store(), current.invoker()).await;

        let router = if router.config().static_site.subroutes
            == current.config().static_site.subroutes
        {
            router.with_subroutes(current.subroutes().to_vec())
        } else {
            router
        };
        self.replace(router);

        tracing::info!(
            loaded = report.loaded.len(),
            missing = report.missing.len(),
            failed = report.failures.len(),
            rejected = report.rejected.len(),
            retained = report.retained.len(),
            "Routing rules reloaded"
        );
        report
    }

    /// Re-fetch the control documents under the current config.
    pub async fn refresh(&self) -> LoadReport {
        let config = self.snapshot().config().clone();
        self.reload(config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    use crate::functions::{DispatchError, FunctionInvoker, FunctionRequest, FunctionResponse};
    use crate::rules::{DocumentKind, RuleSet};
    use crate::storage::{MemoryObjectStore, ObjectStore, StorageError, StoredObject};

    #[derive(Debug)]
    struct NoFunctions;

    #[async_trait]
    impl FunctionInvoker for NoFunctions {
        async fn invoke(
            &self,
            _function_id: &str,
            _request: FunctionRequest,
        ) -> Result<FunctionResponse, DispatchError> {
            Err(DispatchError::Transport("unused".into()))
        }
    }

    #[tokio::test]
    async fn test_snapshot_survives_reload() {
        let store = MemoryObjectStore::new();
        let shared = SharedRouter::new(EdgeRouter::new(
            Arc::new(EdgeConfig::default()),
            RuleSet::empty(),
            Arc::new(store.clone()),
            Arc::new(NoFunctions),
        ));

        let before = shared.snapshot();
        store.put_text(
            "redirects.json",
            "application/json",
            r#"{"/old": {"status": 301, "target": "/new"}}"#,
        );

        let report = shared.refresh().await;
        assert!(report.is_clean());

        assert!(before.rules().redirects.rules().is_empty());
        assert_eq!(shared.snapshot().rules().redirects.rules().len(), 1);
    }

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl ObjectStore for Unreachable {
        async fn get(&self, _key: &str) -> Result<StoredObject, StorageError> {
            Err(StorageError::Backend("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_refresh_keeps_rules_of_unreachable_documents() {
        let store = MemoryObjectStore::new();
        store.put_text(
            "authorizations.json",
            "application/json",
            r#"{"/admin/.*": {"username": "a", "password": "b"}}"#,
        );
        let (router, _) = EdgeRouter::load(
            Arc::new(EdgeConfig::default()),
            Arc::new(store),
            Arc::new(NoFunctions),
        )
        .await;
        assert_eq!(router.rules().auth.rules().len(), 1);

        // Same config, but the store behind it is now down.
        let config = router.config().clone();
        let shared = SharedRouter::new(EdgeRouter::new(
            config,
            router.rules().clone(),
            Arc::new(Unreachable),
            Arc::new(NoFunctions),
        ));

        let report = shared.refresh().await;
        assert!(report.retained(DocumentKind::Authorizations));
        assert_eq!(shared.snapshot().rules().auth.rules().len(), 1);
    }
}

//! Deferred views resolved on first use.
//!
//! # Responsibilities
//! - Hold a fully qualified path until the view is first needed
//! - Import the module and look up the attribute exactly once
//! - Delegate calls (request views) or instantiation (admin views) to the export
//!
//! # Design Decisions
//! - First resolution is single-flight: a mutex serializes resolvers, the result lives in a
//!   `OnceLock` and later calls never take the lock
//! - A failed resolution is not cached; the next invocation tries again
//! - The cache is an explicit object owned by a registrar; sharing it is opt-in

use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use dashmap::DashMap;

use crate::admin::{AdminView, AdminViewArgs};
use crate::import::{Export, ModuleRegistry, ResolveError};
use crate::view::{View, ViewError, ViewRequest, ViewResult};

/// A view referenced by path, imported on first use.
pub struct DeferredView {
    path: String,
    modules: Arc<ModuleRegistry>,
    resolved: OnceLock<Export>,
    resolving: Mutex<()>,
}

impl DeferredView {
    /// Store the path. Nothing is imported yet.
    pub fn new(path: impl Into<String>, modules: Arc<ModuleRegistry>) -> Self {
        Self {
            path: path.into(),
            modules,
            resolved: OnceLock::new(),
            resolving: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Resolve the path to its export, importing the module if needed.
    pub fn resolve(&self) -> Result<&Export, ResolveError> {
        if let Some(export) = self.resolved.get() {
            return Ok(export);
        }

        let _guard = self.resolving.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(export) = self.resolved.get() {
            return Ok(export);
        }

        match self.lookup() {
            Ok(export) => {
                tracing::info!(
                    path = %self.path,
                    kind = export.kind_name(),
                    "Resolved deferred view"
                );
                Ok(self.resolved.get_or_init(|| export))
            }
            Err(e) => {
                tracing::error!(path = %self.path, error = %e, "Failed to resolve deferred view");
                Err(e)
            }
        }
    }

    fn lookup(&self) -> Result<Export, ResolveError> {
        let (module, attribute) = self
            .path
            .rsplit_once('.')
            .filter(|(module, attribute)| !module.is_empty() && !attribute.is_empty())
            .ok_or_else(|| ResolveError::InvalidPath {
                path: self.path.clone(),
            })?;

        let loaded = self.modules.import(module)?;
        loaded
            .get(attribute)
            .cloned()
            .ok_or_else(|| ResolveError::AttributeNotFound {
                module: module.to_string(),
                attribute: attribute.to_string(),
            })
    }

    /// Resolve and call as a request view.
    pub async fn call(&self, request: ViewRequest) -> ViewResult {
        let view = match self.resolve()? {
            Export::View(view) => view.clone(),
            other => return Err(self.wrong_kind("a view", other).into()),
        };
        view.call(request).await
    }

    /// Resolve and construct as an admin view.
    pub fn instantiate(&self, args: AdminViewArgs) -> Result<AdminView, ViewError> {
        match self.resolve()? {
            Export::AdminView(factory) => factory(args),
            other => Err(self.wrong_kind("an admin view", other).into()),
        }
    }

    fn wrong_kind(&self, expected: &'static str, found: &Export) -> ResolveError {
        ResolveError::WrongKind {
            path: self.path.clone(),
            expected,
            found: found.kind_name(),
        }
    }

    /// Adapt into a view the host can route to.
    pub fn into_view(self: Arc<Self>) -> View {
        let name = self.path.clone();
        View::new(name, move |request| {
            let deferred = self.clone();
            async move { deferred.call(request).await }
        })
    }
}

impl std::fmt::Debug for DeferredView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredView")
            .field("path", &self.path)
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

/// Deferred views keyed by fully qualified path.
///
/// Clones share the same map, so one cache can be handed to several registrars. A wrapper
/// keeps the module registry of the registrar that created it.
#[derive(Clone, Default)]
pub struct DeferredCache {
    inner: Arc<DashMap<String, Arc<DeferredView>>>,
}

impl DeferredCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the wrapper for `path`, creating it on first request.
    pub fn get_or_create(&self, path: &str, modules: &Arc<ModuleRegistry>) -> Arc<DeferredView> {
        if let Some(existing) = self.inner.get(path) {
            return existing.value().clone();
        }
        self.inner
            .entry(path.to_string())
            .or_insert_with(|| {
                tracing::debug!(path = %path, "Created deferred view");
                Arc::new(DeferredView::new(path, modules.clone()))
            })
            .value()
            .clone()
    }

    pub fn get(&self, path: &str) -> Option<Arc<DeferredView>> {
        self.inner.get(path).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// All cached wrappers, ordered by path.
    pub fn views(&self) -> Vec<Arc<DeferredView>> {
        let mut views: Vec<_> = self.inner.iter().map(|entry| entry.value().clone()).collect();
        views.sort_by(|a, b| a.path().cmp(b.path()));
        views
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::Module;
    use axum::http::{Method, StatusCode, Uri};
    use axum::response::IntoResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn registry_with_counter(counter: Arc<AtomicUsize>) -> Arc<ModuleRegistry> {
        let registry = ModuleRegistry::new();
        registry.register("app.views", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Module::new().with_view(
                "home",
                View::new("home", |_req| async { Ok((StatusCode::OK, "home").into_response()) }),
            ))
        });
        Arc::new(registry)
    }

    fn request() -> ViewRequest {
        ViewRequest::new(Method::GET, Uri::from_static("/"))
    }

    #[tokio::test]
    async fn test_resolves_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let deferred = DeferredView::new("app.views.home", registry_with_counter(counter.clone()));
        assert!(!deferred.is_resolved());
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        for _ in 0..5 {
            let response = deferred.call(request()).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert!(deferred.is_resolved());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_first_calls_import_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let deferred = Arc::new(DeferredView::new(
            "app.views.home",
            registry_with_counter(counter.clone()),
        ));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let deferred = deferred.clone();
            tasks.push(tokio::spawn(async move { deferred.call(request()).await.is_ok() }));
        }
        for task in tasks {
            assert!(task.await.unwrap());
        }
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_module() {
        let deferred = DeferredView::new("nowhere.home", Arc::new(ModuleRegistry::new()));
        let err = deferred.call(request()).await.unwrap_err();
        assert!(matches!(
            err,
            ViewError::Resolve(ResolveError::Import(
                crate::import::ImportError::ModuleNotFound { .. }
            ))
        ));
        assert!(!deferred.is_resolved());
    }

    #[tokio::test]
    async fn test_retries_after_module_is_registered() {
        let registry = Arc::new(ModuleRegistry::new());
        let deferred = DeferredView::new("app.views.home", registry.clone());
        assert!(deferred.call(request()).await.is_err());
        assert!(!deferred.is_resolved());

        let counter = Arc::new(AtomicUsize::new(0));
        let loads = counter.clone();
        registry.register("app.views", move || {
            loads.fetch_add(1, Ordering::SeqCst);
            Ok(Module::new().with_view(
                "home",
                View::new("home", |_req| async { Ok((StatusCode::OK, "home").into_response()) }),
            ))
        });

        let response = deferred.call(request()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(deferred.is_resolved());
        deferred.call(request()).await.unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retries_after_failed_load() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let registry = ModuleRegistry::new();
        let counter = attempts.clone();
        registry.register("app.views", move || {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err("database not ready".into());
            }
            Ok(Module::new().with_view(
                "home",
                View::new("home", |_req| async { Ok((StatusCode::OK, "home").into_response()) }),
            ))
        });
        let deferred = DeferredView::new("app.views.home", Arc::new(registry));

        let err = deferred.call(request()).await.unwrap_err();
        assert!(matches!(
            err,
            ViewError::Resolve(ResolveError::Import(
                crate::import::ImportError::Failed { .. }
            ))
        ));
        assert!(!deferred.is_resolved());

        assert!(deferred.call(request()).await.is_ok());
        assert!(deferred.is_resolved());
        assert!(deferred.call(request()).await.is_ok());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_missing_attribute() {
        let counter = Arc::new(AtomicUsize::new(0));
        let deferred = DeferredView::new("app.views.missing", registry_with_counter(counter));
        let err = deferred.call(request()).await.unwrap_err();
        match err {
            ViewError::Resolve(ResolveError::AttributeNotFound { module, attribute }) => {
                assert_eq!(module, "app.views");
                assert_eq!(attribute, "missing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_path_without_separator() {
        let deferred = DeferredView::new("home", Arc::new(ModuleRegistry::new()));
        assert!(matches!(deferred.resolve(), Err(ResolveError::InvalidPath { .. })));
    }

    #[test]
    fn test_request_view_is_not_an_admin_view() {
        let counter = Arc::new(AtomicUsize::new(0));
        let deferred = DeferredView::new("app.views.home", registry_with_counter(counter));
        let err = deferred.instantiate(AdminViewArgs::default()).unwrap_err();
        assert!(matches!(err, ViewError::Resolve(ResolveError::WrongKind { .. })));
    }

    #[test]
    fn test_cache_identity() {
        let modules = Arc::new(ModuleRegistry::new());
        let cache = DeferredCache::new();
        let a = cache.get_or_create("app.views.home", &modules);
        let b = cache.get_or_create("app.views.home", &modules);
        let c = cache.get_or_create("app.views.other", &modules);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
        assert_eq!(cache.len(), 2);

        let shared = cache.clone();
        assert!(Arc::ptr_eq(&shared.get("app.views.home").unwrap(), &a));
    }
}

//! The application host.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::http::Method;
use axum::Router;

use crate::admin::{self, Admin};
use crate::host::dispatch::static_file_view;
use crate::host::rules::{build_router, static_rule, ErrorHandlers, RouteEntry, RuleTable};
use crate::host::{Blueprint, ErrorKey, HostError, RouteOptions};
use crate::view::View;

type Extension = Arc<dyn Any + Send + Sync>;

struct AppState {
    import_name: String,
    static_folder: Option<PathBuf>,
    static_url_path: Option<String>,
    rules: RuleTable,
    error_handlers: ErrorHandlers,
    extensions: HashMap<String, Extension>,
    blueprints: Vec<Blueprint>,
}

/// A web application: owns the URL map, error handlers, extensions and blueprints.
///
/// Cloning yields another handle to the same application.
#[derive(Clone)]
pub struct Application {
    inner: Arc<Mutex<AppState>>,
}

impl Application {
    /// Create an application. Its static folder defaults to `static`.
    pub fn new(import_name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(AppState {
                import_name: import_name.into(),
                static_folder: Some(PathBuf::from("static")),
                static_url_path: None,
                rules: RuleTable::default(),
                error_handlers: ErrorHandlers::default(),
                extensions: HashMap::new(),
                blueprints: Vec::new(),
            })),
        }
    }

    pub fn with_static_folder(self, folder: impl Into<PathBuf>) -> Self {
        self.state().static_folder = Some(folder.into());
        self
    }

    /// Mount the static folder at `url_path` automatically.
    pub fn with_static_url_path(self, url_path: impl Into<String>) -> Self {
        self.state().static_url_path = Some(url_path.into());
        self
    }

    fn state(&self) -> MutexGuard<'_, AppState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn import_name(&self) -> String {
        self.state().import_name.clone()
    }

    pub fn static_folder(&self) -> Option<PathBuf> {
        self.state().static_folder.clone()
    }

    pub fn add_url_rule(
        &self,
        rule: &str,
        view: View,
        options: RouteOptions,
    ) -> Result<(), HostError> {
        self.state().rules.add(rule, view, options, None)
    }

    pub fn register_error_handler(&self, key: ErrorKey, view: View) {
        self.state().error_handlers.insert(key, view);
    }

    pub fn register_blueprint(&self, blueprint: Blueprint) {
        tracing::debug!(blueprint = %blueprint.name(), "Registered blueprint");
        self.state().blueprints.push(blueprint);
    }

    pub fn insert_extension<T>(&self, key: impl Into<String>, extension: T)
    where
        T: Any + Send + Sync,
    {
        self.state().extensions.insert(key.into(), Arc::new(extension));
    }

    pub fn has_extension(&self, key: &str) -> bool {
        self.state().extensions.contains_key(key)
    }

    /// The extension stored under `key`, if present and of type `T`.
    pub fn extension<T>(&self, key: &str) -> Option<T>
    where
        T: Any + Clone,
    {
        self.state()
            .extensions
            .get(key)
            .and_then(|ext| ext.downcast_ref::<T>())
            .cloned()
    }

    pub fn send_static_file(&self) -> View {
        static_file_view(self.static_folder())
    }

    /// Build the axum router for the application, its blueprints and its admin.
    pub fn into_router(&self) -> Result<Router, HostError> {
        let state = self.state();
        let handlers = Arc::new(state.error_handlers.clone());

        let mut entries = state.rules.entries(None, &handlers);

        if let Some(url_path) = &state.static_url_path {
            entries.push(RouteEntry {
                path: static_rule(url_path),
                endpoint: "static".to_string(),
                methods: vec![Method::GET],
                view: static_file_view(state.static_folder.clone()),
                handlers: handlers.clone(),
            });
        }

        for blueprint in &state.blueprints {
            entries.extend(blueprint.route_entries(&handlers));
        }

        let admin = state
            .extensions
            .get(admin::EXTENSION_KEY)
            .and_then(|ext| ext.downcast_ref::<Admin>());
        if let Some(admin) = admin {
            entries.extend(admin.route_entries(&handlers));
        }

        tracing::info!(
            app = %state.import_name,
            rules = state.rules.len(),
            routes = entries.len(),
            blueprints = state.blueprints.len(),
            error_handlers = handlers.len(),
            "Building router"
        );
        build_router(entries, handlers)
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("import_name", &self.state().import_name)
            .finish_non_exhaustive()
    }
}

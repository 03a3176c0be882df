//! Module registry used to resolve deferred views.
//!
//! # Data Flow
//! ```text
//! register_module!("app.views", loader)   (static, collected with inventory)
//! ModuleRegistry::register(path, loader)  (runtime)
//!     → loaders: path → loader
//!
//! import("app.views")
//!     → cached module? return it
//!     → run loader once → cache → return
//! ```
//!
//! # Design Decisions
//! - Modules are addressed by dotted paths; the final segment of a view path is the attribute
//! - Loaders run lazily so unused views cost nothing at startup
//! - Loader failures are reported as import errors, never panics

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::admin::{AdminView, AdminViewArgs};
use crate::view::{View, ViewError};

/// Error type returned by module loaders.
pub type LoadError = Box<dyn std::error::Error + Send + Sync>;

/// Constructs an admin view from its constructor arguments.
pub type AdminViewFactory =
    Arc<dyn Fn(AdminViewArgs) -> Result<AdminView, ViewError> + Send + Sync>;

type ModuleLoader = Arc<dyn Fn() -> Result<Module, LoadError> + Send + Sync>;

/// Errors raised while importing a module.
#[derive(Debug, Clone, Error)]
pub enum ImportError {
    #[error("no module named '{module}'")]
    ModuleNotFound { module: String },

    #[error("module '{module}' failed to load: {reason}")]
    Failed { module: String, reason: String },
}

/// Errors raised while resolving a deferred path.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    #[error("'{path}' is not a dotted path to a module attribute")]
    InvalidPath { path: String },

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error("module '{module}' has no attribute '{attribute}'")]
    AttributeNotFound { module: String, attribute: String },

    #[error("'{path}' is {found}, expected {expected}")]
    WrongKind {
        path: String,
        expected: &'static str,
        found: &'static str,
    },
}

/// An item a module exports.
#[derive(Clone)]
pub enum Export {
    View(View),
    AdminView(AdminViewFactory),
}

impl Export {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Export::View(_) => "a view",
            Export::AdminView(_) => "an admin view",
        }
    }
}

impl std::fmt::Debug for Export {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Export::View(view) => f.debug_tuple("View").field(view).finish(),
            Export::AdminView(_) => f.write_str("AdminView(..)"),
        }
    }
}

/// A loaded module: named exports.
#[derive(Debug, Clone, Default)]
pub struct Module {
    items: HashMap<String, Export>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_view(mut self, name: impl Into<String>, view: View) -> Self {
        self.items.insert(name.into(), Export::View(view));
        self
    }

    pub fn with_admin_view<F>(mut self, name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(AdminViewArgs) -> Result<AdminView, ViewError> + Send + Sync + 'static,
    {
        self.items.insert(name.into(), Export::AdminView(Arc::new(factory)));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Export> {
        self.items.get(name)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A module registered at compile time with [`register_module!`](crate::register_module).
pub struct ModuleDef {
    pub path: &'static str,
    pub load: fn() -> Result<Module, LoadError>,
}

inventory::collect!(ModuleDef);

/// Registers a module loader with the static module list.
///
/// ```rust,ignore
/// fn views() -> Result<lazy_views::Module, lazy_views::import::LoadError> {
///     Ok(lazy_views::Module::new().with_view("home", home()))
/// }
///
/// lazy_views::register_module!("myapp.views", views);
/// ```
#[macro_export]
macro_rules! register_module {
    ($path:expr, $load:path) => {
        $crate::inventory::submit! {
            $crate::import::ModuleDef { path: $path, load: $load }
        }
    };
}

/// Table of module loaders plus the modules already imported.
#[derive(Default)]
pub struct ModuleRegistry {
    loaders: DashMap<String, ModuleLoader>,
    modules: DashMap<String, Arc<Module>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from every module submitted with `register_module!`.
    pub fn from_inventory() -> Self {
        let registry = Self::new();
        for def in inventory::iter::<ModuleDef> {
            registry.register(def.path, def.load);
        }
        tracing::debug!(modules = registry.loaders.len(), "Collected static modules");
        registry
    }

    /// Add or replace the loader for `path`. A module already imported from an older loader is
    /// dropped.
    pub fn register<F>(&self, path: impl Into<String>, loader: F)
    where
        F: Fn() -> Result<Module, LoadError> + Send + Sync + 'static,
    {
        let path = path.into();
        self.modules.remove(&path);
        self.loaders.insert(path, Arc::new(loader));
    }

    pub fn contains(&self, path: &str) -> bool {
        self.loaders.contains_key(path)
    }

    pub fn is_imported(&self, path: &str) -> bool {
        self.modules.contains_key(path)
    }

    /// Registered module paths, sorted.
    pub fn module_paths(&self) -> Vec<String> {
        let mut paths: Vec<String> = self.loaders.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        paths
    }

    /// Import a module, running its loader on first use.
    pub fn import(&self, path: &str) -> Result<Arc<Module>, ImportError> {
        if let Some(module) = self.modules.get(path) {
            return Ok(module.value().clone());
        }

        // Clone the loader out so no map guard is held while it runs.
        let loader = self
            .loaders
            .get(path)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ImportError::ModuleNotFound {
                module: path.to_string(),
            })?;

        let module = loader().map_err(|e| ImportError::Failed {
            module: path.to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!(module = %path, exports = module.len(), "Imported module");
        let module = Arc::new(module);
        self.modules.insert(path.to_string(), module.clone());
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn home() -> View {
        View::new("home", |_req| async { Ok(StatusCode::OK.into_response()) })
    }

    fn static_views() -> Result<Module, LoadError> {
        Ok(Module::new().with_view("home", home()))
    }

    crate::register_module!("import_tests.static_views", static_views);

    #[test]
    fn test_import_caches_module() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = ModuleRegistry::new();
        let counter = loads.clone();
        registry.register("app.views", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Module::new().with_view("home", home()))
        });

        assert!(registry.contains("app.views"));
        assert!(!registry.is_imported("app.views"));

        let first = registry.import("app.views").unwrap();
        let second = registry.import("app.views").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.get("home").is_some());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_import_unknown_module() {
        let registry = ModuleRegistry::new();
        let err = registry.import("missing").unwrap_err();
        assert!(matches!(err, ImportError::ModuleNotFound { ref module } if module == "missing"));
    }

    #[test]
    fn test_loader_failure() {
        let registry = ModuleRegistry::new();
        registry.register("broken", || Err("syntax error".into()));
        let err = registry.import("broken").unwrap_err();
        assert_eq!(err.to_string(), "module 'broken' failed to load: syntax error");
        assert!(!registry.is_imported("broken"));
    }

    #[test]
    fn test_register_replaces_loaded_module() {
        let registry = ModuleRegistry::new();
        registry.register("app", || Ok(Module::new()));
        assert!(registry.import("app").unwrap().is_empty());

        registry.register("app", || Ok(Module::new().with_view("home", home())));
        assert_eq!(registry.import("app").unwrap().len(), 1);
    }

    #[test]
    fn test_inventory_modules() {
        let registry = ModuleRegistry::from_inventory();
        assert!(registry.contains("import_tests.static_views"));
        let module = registry.import("import_tests.static_views").unwrap();
        assert!(matches!(module.get("home"), Some(Export::View(_))));
    }
}

//! Blueprints: groups of routes mounted on an application under a URL prefix.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::host::dispatch::static_file_view;
use crate::host::rules::{ErrorHandlers, RouteEntry, RuleTable};
use crate::host::{ErrorKey, HostError, RouteOptions};
use crate::view::View;

struct BlueprintState {
    name: String,
    import_name: String,
    url_prefix: Option<String>,
    static_folder: Option<PathBuf>,
    rules: RuleTable,
    error_handlers: ErrorHandlers,
}

/// A blueprint. Endpoints are namespaced by the blueprint name.
#[derive(Clone)]
pub struct Blueprint {
    inner: Arc<Mutex<BlueprintState>>,
}

impl Blueprint {
    pub fn new(name: impl Into<String>, import_name: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BlueprintState {
                name: name.into(),
                import_name: import_name.into(),
                url_prefix: None,
                static_folder: None,
                rules: RuleTable::default(),
                error_handlers: ErrorHandlers::default(),
            })),
        }
    }

    pub fn with_url_prefix(self, prefix: impl Into<String>) -> Self {
        self.state().url_prefix = Some(prefix.into());
        self
    }

    pub fn with_static_folder(self, folder: impl Into<PathBuf>) -> Self {
        self.state().static_folder = Some(folder.into());
        self
    }

    fn state(&self) -> MutexGuard<'_, BlueprintState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn name(&self) -> String {
        self.state().name.clone()
    }

    pub fn import_name(&self) -> String {
        self.state().import_name.clone()
    }

    pub fn url_prefix(&self) -> Option<String> {
        self.state().url_prefix.clone()
    }

    pub fn add_url_rule(
        &self,
        rule: &str,
        view: View,
        options: RouteOptions,
    ) -> Result<(), HostError> {
        let mut state = self.state();
        let BlueprintState { name, rules, .. } = &mut *state;
        rules.add(rule, view, options, Some(name.as_str()))
    }

    pub fn register_error_handler(&self, key: ErrorKey, view: View) {
        self.state().error_handlers.insert(key, view);
    }

    /// Static view for this blueprint's folder; a 404 when it has none.
    pub fn send_static_file(&self) -> View {
        static_file_view(self.state().static_folder.clone())
    }

    pub(crate) fn route_entries(&self, app_handlers: &Arc<ErrorHandlers>) -> Vec<RouteEntry> {
        let state = self.state();
        let handlers = Arc::new(state.error_handlers.clone().with_parent(app_handlers.clone()));
        state.rules.entries(state.url_prefix.as_deref(), &handlers)
    }
}

impl fmt::Debug for Blueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("Blueprint")
            .field("name", &state.name)
            .field("import_name", &state.import_name)
            .field("url_prefix", &state.url_prefix)
            .finish_non_exhaustive()
    }
}

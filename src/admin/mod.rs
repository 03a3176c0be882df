//! Admin extension.
//!
//! An [`Admin`] attaches to an [`Application`] under the [`EXTENSION_KEY`] extension key and
//! collects [`AdminView`]s. When the application builds its router, the admin contributes an
//! index route listing its views plus one route per view.

pub mod handlers;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::http::Method;
use serde::Serialize;

use crate::host::rules::{ErrorHandlers, RouteEntry};
use crate::host::{Application, HostError};
use crate::view::View;

/// Key the admin extension is stored under in an application's extensions.
pub const EXTENSION_KEY: &str = "admin";

/// Constructor arguments for admin views.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminViewArgs {
    pub name: Option<String>,
    pub category: Option<String>,
    pub endpoint: Option<String>,
    pub url: Option<String>,
}

impl AdminViewArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

/// A view shown in the admin interface.
#[derive(Debug, Clone)]
pub struct AdminView {
    pub name: String,
    pub category: Option<String>,
    pub endpoint: String,
    pub url: String,
    pub view: View,
}

impl AdminView {
    pub fn new(name: impl Into<String>, view: View) -> Self {
        Self::from_args(name, view, AdminViewArgs::default())
    }

    /// Build from constructor arguments, falling back to `default_name`.
    ///
    /// The endpoint defaults to the lowercased name with spaces replaced by underscores, and
    /// the url defaults to the endpoint.
    pub fn from_args(default_name: impl Into<String>, view: View, args: AdminViewArgs) -> Self {
        let name = args.name.unwrap_or_else(|| default_name.into());
        let endpoint = args
            .endpoint
            .unwrap_or_else(|| name.to_lowercase().replace(' ', "_"));
        let url = args.url.unwrap_or_else(|| endpoint.clone());
        Self {
            name,
            category: args.category,
            endpoint,
            url,
            view,
        }
    }
}

/// Summary of an admin view as listed by the index route.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct AdminViewInfo {
    pub name: String,
    pub category: Option<String>,
    pub endpoint: String,
    pub url: String,
}

/// The admin extension.
#[derive(Clone)]
pub struct Admin {
    name: String,
    url: String,
    views: Arc<Mutex<Vec<AdminView>>>,
}

impl Admin {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: "/admin".to_string(),
            views: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        let url: String = url.into();
        self.url = format!("/{}", url.trim_matches('/'));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Register this admin with an application.
    pub fn init_app(&self, app: &Application) {
        app.insert_extension(EXTENSION_KEY, self.clone());
        tracing::debug!(admin = %self.name, app = %app.import_name(), "Admin extension attached");
    }

    fn lock(&self) -> MutexGuard<'_, Vec<AdminView>> {
        self.views.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a view. Endpoints and urls must be unique within the admin.
    pub fn add_view(&self, view: AdminView) -> Result<(), HostError> {
        let mut views = self.lock();
        if views
            .iter()
            .any(|v| v.endpoint == view.endpoint || v.url == view.url)
        {
            return Err(HostError::DuplicateAdminView {
                endpoint: view.endpoint,
            });
        }
        tracing::debug!(endpoint = %view.endpoint, url = %view.url, "Added admin view");
        views.push(view);
        Ok(())
    }

    pub fn views(&self) -> Vec<AdminView> {
        self.lock().clone()
    }

    pub fn view_infos(&self) -> Vec<AdminViewInfo> {
        self.lock()
            .iter()
            .map(|v| AdminViewInfo {
                name: v.name.clone(),
                category: v.category.clone(),
                endpoint: v.endpoint.clone(),
                url: self.view_path(v),
            })
            .collect()
    }

    fn view_path(&self, view: &AdminView) -> String {
        if view.url.starts_with('/') {
            view.url.clone()
        } else {
            format!("{}/{}", self.url.trim_end_matches('/'), view.url)
        }
    }

    pub(crate) fn route_entries(&self, handlers: &Arc<ErrorHandlers>) -> Vec<RouteEntry> {
        let mut entries = vec![RouteEntry {
            path: self.url.clone(),
            endpoint: "admin.index".to_string(),
            methods: vec![Method::GET],
            view: handlers::index_view(self.name.clone(), self.view_infos()),
            handlers: handlers.clone(),
        }];

        for view in self.lock().iter() {
            entries.push(RouteEntry {
                path: self.view_path(view),
                endpoint: format!("admin.{}", view.endpoint),
                methods: vec![Method::GET, Method::POST],
                view: view.view.clone(),
                handlers: handlers.clone(),
            });
        }
        entries
    }
}

impl std::fmt::Debug for Admin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Admin")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("views", &self.lock().len())
            .finish()
    }
}

//! The registrar: adds lazy views to an application or blueprint.
//!
//! # Responsibilities
//! - Normalize the import prefix against the host's import name
//! - Turn string targets into cached deferred views
//! - Forward routes, error handlers, static routes and admin views to the host
//!
//! # Design Decisions
//! - The deferred view cache belongs to the registrar; sharing is an explicit `DeferredCache`
//! - Application-only operations check the host kind before touching extensions
//! - Nothing is imported at registration time, except admin views, which are constructed
//!   immediately

use std::sync::Arc;

use thiserror::Error;

use crate::admin::{self, Admin, AdminViewArgs};
use crate::config::validation::{parse_error_status, parse_method};
use crate::config::LazyViewsConfig;
use crate::host::{ErrorKey, Host, HostError, RouteOptions};
use crate::import::{ModuleRegistry, ResolveError};
use crate::view::{AdminTarget, DeferredCache, Resolved, Target, ViewError, ViewTarget};

/// Import name of a program's entry point. It cannot anchor a relative import prefix.
pub const ENTRY_POINT_NAME: &str = "main";

/// Errors raised by registration calls.
#[derive(Debug, Error)]
pub enum LazyViewsError {
    #[error("LazyViews instance is not properly initialized")]
    NotConfigured,

    #[error(
        "{host} has no usable import name for relative import prefix '{prefix}'; \
         set an import name or use a prefix that does not start with '.'"
    )]
    MissingImportName { host: String, prefix: String },

    #[error("cannot attach admin view to a blueprint")]
    AdminOnBlueprint,

    #[error("admin extension is not registered on {host}")]
    MissingAdminExtension { host: String },

    #[error("extension '{key}' on {host} is not an Admin", key = admin::EXTENSION_KEY)]
    InvalidAdminExtension { host: String },

    #[error("admin view '{path}' failed to initialize: {source}")]
    AdminView {
        path: String,
        #[source]
        source: ViewError,
    },

    #[error("invalid {field} '{value}'")]
    InvalidConfig { field: &'static str, value: String },

    #[error(transparent)]
    Host(#[from] HostError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Adds lazy views to an [`Application`](crate::Application) or
/// [`Blueprint`](crate::Blueprint).
///
/// ```rust,ignore
/// let app = Application::new("myapp");
/// let mut views = LazyViews::new(Arc::new(ModuleRegistry::from_inventory()));
/// views.init_app(app.clone(), Some(".views"))?;
/// views.add("/", "home", RouteOptions::new())?;            // myapp.views.home
/// views.add("/about", about_view, RouteOptions::new())?;   // a View, used as-is
/// ```
pub struct LazyViews {
    host: Option<Host>,
    import_prefix: Option<String>,
    cache: DeferredCache,
    modules: Arc<ModuleRegistry>,
}

impl LazyViews {
    /// An unconfigured registrar with its own cache.
    pub fn new(modules: Arc<ModuleRegistry>) -> Self {
        Self::with_cache(modules, DeferredCache::new())
    }

    /// An unconfigured registrar sharing `cache` with other registrars.
    pub fn with_cache(modules: Arc<ModuleRegistry>, cache: DeferredCache) -> Self {
        Self {
            host: None,
            import_prefix: None,
            cache,
            modules,
        }
    }

    /// Store the host and import prefix.
    ///
    /// A prefix starting with `.` is appended to the host's import name, which must be
    /// set and must not be [`ENTRY_POINT_NAME`].
    pub fn init_app(
        &mut self,
        host: impl Into<Host>,
        import_prefix: Option<&str>,
    ) -> Result<(), LazyViewsError> {
        let host = host.into();
        let import_prefix = match import_prefix.filter(|prefix| !prefix.is_empty()) {
            Some(prefix) if prefix.starts_with('.') => {
                let import_name = host.import_name();
                if import_name.is_empty() || import_name == ENTRY_POINT_NAME {
                    return Err(LazyViewsError::MissingImportName {
                        host: host.to_string(),
                        prefix: prefix.to_string(),
                    });
                }
                Some(format!("{import_name}{prefix}"))
            }
            other => other.map(str::to_string),
        };

        tracing::debug!(host = %host, import_prefix = ?import_prefix, "LazyViews initialized");
        self.import_prefix = import_prefix;
        self.host = Some(host);
        Ok(())
    }

    /// Same as [`init_app`](Self::init_app); reads better for blueprints.
    pub fn init_blueprint(
        &mut self,
        blueprint: crate::host::Blueprint,
        import_prefix: Option<&str>,
    ) -> Result<(), LazyViewsError> {
        self.init_app(blueprint, import_prefix)
    }

    pub fn host(&self) -> Option<&Host> {
        self.host.as_ref()
    }

    pub fn import_prefix(&self) -> Option<&str> {
        self.import_prefix.as_deref()
    }

    pub fn cache(&self) -> &DeferredCache {
        &self.cache
    }

    fn configured_host(&self) -> Result<&Host, LazyViewsError> {
        self.host.as_ref().ok_or(LazyViewsError::NotConfigured)
    }

    /// Add a URL rule whose view is a [`View`](crate::View) or a path to one.
    pub fn add(
        &self,
        rule: &str,
        target: impl Into<ViewTarget>,
        options: RouteOptions,
    ) -> Result<(), LazyViewsError> {
        let host = self.configured_host()?;
        let view = self.get_view(target.into()).into_view();
        host.add_url_rule(rule, view, options)?;
        Ok(())
    }

    /// Register a view with the admin extension. Applications only.
    ///
    /// A path is resolved and constructed with `args` right away; an
    /// [`AdminView`](crate::AdminView) is registered unchanged.
    pub fn add_admin(
        &self,
        target: impl Into<AdminTarget>,
        args: AdminViewArgs,
    ) -> Result<(), LazyViewsError> {
        let host = self.configured_host()?;
        let app = host.as_application().ok_or(LazyViewsError::AdminOnBlueprint)?;
        let admin: Admin = match app.extension(admin::EXTENSION_KEY) {
            Some(admin) => admin,
            None if app.has_extension(admin::EXTENSION_KEY) => {
                return Err(LazyViewsError::InvalidAdminExtension {
                    host: host.to_string(),
                })
            }
            None => {
                return Err(LazyViewsError::MissingAdminExtension {
                    host: host.to_string(),
                })
            }
        };

        let view = match self.get_view(target.into()) {
            Resolved::Direct(view) => view,
            Resolved::Deferred(deferred) => {
                deferred
                    .instantiate(args)
                    .map_err(|source| LazyViewsError::AdminView {
                        path: deferred.path().to_string(),
                        source,
                    })?
            }
        };
        admin.add_view(view)?;
        Ok(())
    }

    /// Register an error handler for a status code or error kind.
    pub fn add_error(
        &self,
        key: impl Into<ErrorKey>,
        target: impl Into<ViewTarget>,
    ) -> Result<(), LazyViewsError> {
        let host = self.configured_host()?;
        let view = self.get_view(target.into()).into_view();
        host.register_error_handler(key.into(), view);
        Ok(())
    }

    /// Add a URL rule served by the host's static file view.
    pub fn add_static(&self, rule: &str, options: RouteOptions) -> Result<(), LazyViewsError> {
        let host = self.configured_host()?;
        self.add(rule, host.send_static_file(), options)
    }

    /// Join the import prefix and `name`, skipping empty parts.
    pub fn build_import_name(&self, name: &str) -> String {
        [self.import_prefix.as_deref(), Some(name)]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Pass direct targets through; map paths to their cached deferred view.
    pub fn get_view<T>(&self, target: Target<T>) -> Resolved<T> {
        match target {
            Target::Direct(value) => Resolved::Direct(value),
            Target::Deferred(path) => {
                let import_name = self.build_import_name(&path);
                Resolved::Deferred(self.cache.get_or_create(&import_name, &self.modules))
            }
        }
    }

    /// Register everything a configuration declares: routes, static routes, error handlers,
    /// then admin views. Stops at the first failure.
    pub fn apply_config(&self, config: &LazyViewsConfig) -> Result<(), LazyViewsError> {
        for route in &config.routes {
            let methods = route
                .methods
                .iter()
                .map(|name| {
                    parse_method(name).ok_or_else(|| LazyViewsError::InvalidConfig {
                        field: "method",
                        value: name.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let options = RouteOptions {
                endpoint: route.endpoint.clone(),
                methods,
            };
            self.add(&route.rule, route.view.as_str(), options)?;
        }

        for route in &config.static_routes {
            let options = RouteOptions {
                endpoint: route.endpoint.clone(),
                methods: Vec::new(),
            };
            self.add_static(&route.rule, options)?;
        }

        for handler in &config.error_handlers {
            let key = match (handler.status, handler.kind) {
                (Some(code), None) => parse_error_status(code)
                    .map(ErrorKey::Status)
                    .ok_or_else(|| LazyViewsError::InvalidConfig {
                        field: "status",
                        value: code.to_string(),
                    })?,
                (None, Some(kind)) => ErrorKey::Kind(kind),
                _ => {
                    return Err(LazyViewsError::InvalidConfig {
                        field: "error handler",
                        value: handler.view.clone(),
                    })
                }
            };
            self.add_error(key, handler.view.as_str())?;
        }

        for admin_view in &config.admin_views {
            let args = AdminViewArgs {
                name: admin_view.name.clone(),
                category: admin_view.category.clone(),
                endpoint: admin_view.endpoint.clone(),
                url: admin_view.url.clone(),
            };
            self.add_admin(admin_view.view.as_str(), args)?;
        }

        tracing::info!(
            routes = config.routes.len(),
            static_routes = config.static_routes.len(),
            error_handlers = config.error_handlers.len(),
            admin_views = config.admin_views.len(),
            deferred = self.cache.len(),
            "Applied view configuration"
        );
        Ok(())
    }
}

impl std::fmt::Debug for LazyViews {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyViews")
            .field("host", &self.host)
            .field("import_prefix", &self.import_prefix)
            .field("deferred", &self.cache.len())
            .finish()
    }
}

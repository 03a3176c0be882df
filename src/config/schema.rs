//! Configuration schema definitions.
//!
//! This module defines the declarative view configuration. All types derive Serde traits for
//! deserialization from TOML files.

use serde::{Deserialize, Serialize};

use crate::view::ErrorKind;

/// Root configuration: the application, its views and how to serve it.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LazyViewsConfig {
    /// Prefix prepended to every deferred view path. A leading `.` makes it relative to the
    /// application's import name.
    pub import_prefix: Option<String>,

    /// Application settings.
    pub app: AppConfig,

    /// Listener and middleware settings.
    pub server: ServerConfig,

    /// Log filter settings.
    pub logging: LoggingConfig,

    /// Admin extension settings.
    pub admin: AdminConfig,

    /// URL rules.
    pub routes: Vec<RouteConfig>,

    /// URL rules served by the built-in static view.
    pub static_routes: Vec<StaticRouteConfig>,

    /// Error handlers.
    pub error_handlers: Vec<ErrorHandlerConfig>,

    /// Views registered with the admin extension.
    pub admin_views: Vec<AdminViewConfig>,
}

/// Application settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Import name of the application, used for relative import prefixes.
    pub import_name: String,

    /// Folder served by static routes.
    pub static_folder: String,

    /// Mount the static folder here without an explicit static route (e.g., "/static").
    pub static_url_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            import_name: "main".to_string(),
            static_folder: "static".to_string(),
            static_url_path: None,
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "lazy_views=info,tower_http=info".to_string(),
        }
    }
}

/// Admin extension configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Attach the admin extension to the application.
    pub enabled: bool,

    /// Title of the admin.
    pub name: String,

    /// URL the admin index is mounted at.
    pub url: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "Admin".to_string(),
            url: "/admin".to_string(),
        }
    }
}

/// A URL rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// URL rule in axum syntax (e.g., "/users/{id}").
    pub rule: String,

    /// View path, relative to the import prefix.
    pub view: String,

    /// Allowed methods (default: GET).
    #[serde(default)]
    pub methods: Vec<String>,

    /// Endpoint name (default: the view path).
    #[serde(default)]
    pub endpoint: Option<String>,
}

/// A static-file URL rule. The rule must capture `filename`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticRouteConfig {
    pub rule: String,

    #[serde(default)]
    pub endpoint: Option<String>,
}

/// An error handler, keyed by exactly one of `status` or `kind`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorHandlerConfig {
    #[serde(default)]
    pub status: Option<u16>,

    #[serde(default)]
    pub kind: Option<ErrorKind>,

    /// View path, relative to the import prefix.
    pub view: String,
}

/// An admin view, constructed from its path with the given arguments.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AdminViewConfig {
    pub view: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config: LazyViewsConfig = toml::from_str("").unwrap();
        assert_eq!(config.app.import_name, "main");
        assert_eq!(config.server.request_timeout_secs, 30);
        assert!(config.routes.is_empty());
        assert!(!config.admin.enabled);
    }

    #[test]
    fn test_full_config() {
        let config: LazyViewsConfig = toml::from_str(
            r#"
            import_prefix = ".views"

            [app]
            import_name = "shop"

            [admin]
            enabled = true

            [[routes]]
            rule = "/"
            view = "home"

            [[routes]]
            rule = "/items"
            view = "items.create"
            methods = ["POST"]

            [[error_handlers]]
            status = 404
            view = "errors.not_found"

            [[error_handlers]]
            kind = "resolve"
            view = "errors.broken"

            [[admin_views]]
            view = "admin.users"
            category = "Accounts"
            "#,
        )
        .unwrap();

        assert_eq!(config.import_prefix.as_deref(), Some(".views"));
        assert_eq!(config.routes.len(), 2);
        assert_eq!(config.routes[1].methods, vec!["POST".to_string()]);
        assert_eq!(config.error_handlers[1].kind, Some(ErrorKind::Resolve));
        assert_eq!(config.admin_views[0].category.as_deref(), Some("Accounts"));
    }
}

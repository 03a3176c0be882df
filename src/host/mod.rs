//! Host applications and blueprints.
//!
//! # Data Flow
//! ```text
//! add_url_rule / register_error_handler
//!     → Application or Blueprint rule table
//!
//! Application::into_router (at startup)
//!     → app rules + blueprint rules (prefixed) + admin routes
//!     → rules.rs groups by path, rejects duplicate methods
//!     → axum::Router
//!
//! Incoming request
//!     → axum matches route
//!     → dispatch.rs builds ViewRequest, calls view
//!     → error? → most specific error handler (blueprint, then application)
//! ```
//!
//! # Design Decisions
//! - Application vs blueprint is an enum, not a probe for application-only attributes
//! - Handles are cheap clones over shared state, so a registrar can reference a host that
//!   the application code keeps using
//! - Route conflicts are reported as errors before axum sees them

pub mod application;
pub mod blueprint;
pub mod dispatch;
pub mod rules;

use std::fmt;

use axum::http::{Method, StatusCode};
use thiserror::Error;

use crate::view::{ErrorKind, View};

pub use application::Application;
pub use blueprint::Blueprint;

/// Errors raised while registering routes on a host.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HostError {
    #[error("URL rule '{rule}' must start with '/'")]
    InvalidRule { rule: String },

    #[error("method '{method}' is not supported")]
    UnsupportedMethod { method: String },

    #[error("URL rule '{rule}' is malformed: {reason}")]
    MalformedRule { rule: String, reason: String },

    #[error("URL rule '{rule}' overlaps '{with}'")]
    ConflictingRoute { rule: String, with: String },

    #[error("URL rule '{rule}' already handles {method}")]
    DuplicateRoute { rule: String, method: Method },

    #[error("admin view '{endpoint}' is already registered")]
    DuplicateAdminView { endpoint: String },
}

/// Options for a URL rule.
#[derive(Debug, Clone, Default)]
pub struct RouteOptions {
    pub endpoint: Option<String>,
    pub methods: Vec<Method>,
}

impl RouteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }
}

/// What an error handler is registered for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKey {
    Status(StatusCode),
    Kind(ErrorKind),
}

impl From<StatusCode> for ErrorKey {
    fn from(status: StatusCode) -> Self {
        ErrorKey::Status(status)
    }
}

impl From<ErrorKind> for ErrorKey {
    fn from(kind: ErrorKind) -> Self {
        ErrorKey::Kind(kind)
    }
}

/// The object routes are registered on.
#[derive(Debug, Clone)]
pub enum Host {
    Application(Application),
    Blueprint(Blueprint),
}

impl Host {
    /// Import name used to resolve relative import prefixes.
    pub fn import_name(&self) -> String {
        match self {
            Host::Application(app) => app.import_name(),
            Host::Blueprint(bp) => bp.import_name(),
        }
    }

    /// Application-only capabilities (extensions, blueprints).
    pub fn as_application(&self) -> Option<&Application> {
        match self {
            Host::Application(app) => Some(app),
            Host::Blueprint(_) => None,
        }
    }

    pub fn add_url_rule(
        &self,
        rule: &str,
        view: View,
        options: RouteOptions,
    ) -> Result<(), HostError> {
        match self {
            Host::Application(app) => app.add_url_rule(rule, view, options),
            Host::Blueprint(bp) => bp.add_url_rule(rule, view, options),
        }
    }

    pub fn register_error_handler(&self, key: ErrorKey, view: View) {
        match self {
            Host::Application(app) => app.register_error_handler(key, view),
            Host::Blueprint(bp) => bp.register_error_handler(key, view),
        }
    }

    /// Built-in view serving the `filename` path parameter from the static folder.
    pub fn send_static_file(&self) -> View {
        match self {
            Host::Application(app) => app.send_static_file(),
            Host::Blueprint(bp) => bp.send_static_file(),
        }
    }
}

impl From<Application> for Host {
    fn from(app: Application) -> Self {
        Host::Application(app)
    }
}

impl From<Blueprint> for Host {
    fn from(bp: Blueprint) -> Self {
        Host::Blueprint(bp)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Application(app) => write!(f, "<Application '{}'>", app.import_name()),
            Host::Blueprint(bp) => write!(f, "<Blueprint '{}'>", bp.name()),
        }
    }
}

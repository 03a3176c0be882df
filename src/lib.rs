//! Lazy views for axum applications.
//!
//! Register routes, error handlers and admin views by path (`"myapp.views.home"`) and have
//! them resolved through a module registry the first time they are needed.

pub mod admin;
pub mod config;
pub mod host;
pub mod http;
pub mod import;
pub mod observability;
pub mod registrar;
pub mod view;

#[doc(hidden)]
pub use inventory;

pub use admin::{Admin, AdminView, AdminViewArgs};
pub use config::LazyViewsConfig;
pub use host::{Application, Blueprint, ErrorKey, Host, HostError, RouteOptions};
pub use import::{Module, ModuleRegistry};
pub use registrar::{LazyViews, LazyViewsError};
pub use view::{ErrorKind, View, ViewError, ViewRequest, ViewResult};

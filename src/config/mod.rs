//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → LazyViewsConfig (validated, immutable)
//!     → LazyViews::apply_config registers routes, handlers, admin views
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - View paths stay strings until first request; only `check` resolves them eagerly

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::LazyViewsConfig;
pub use schema::{AdminViewConfig, ErrorHandlerConfig, RouteConfig, StaticRouteConfig};

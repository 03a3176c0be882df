//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Resolve the filter from `RUST_LOG`, falling back to configuration

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when neither `RUST_LOG` nor the configuration says otherwise.
pub const DEFAULT_FILTER: &str = "lazy_views=info,tower_http=info";

/// Build the filter: `RUST_LOG` if set and valid, else `fallback`, else [`DEFAULT_FILTER`].
pub fn filter(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber. Returns an error if one is already installed.
pub fn init(fallback: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(filter(fallback))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

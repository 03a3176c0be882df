//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! registrar, module registry, deferred views, dispatch
//!     → tracing events with structured fields
//!     → logging.rs (fmt subscriber + EnvFilter)
//!     → stdout
//! ```
//!
//! # Design Decisions
//! - Library code only emits events; the binary installs the subscriber
//! - Request spans come from tower-http's TraceLayer, tagged with the request id
//! - Log level configurable via config and environment (`RUST_LOG` wins)

pub mod logging;

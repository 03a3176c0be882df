//! HTTP serving subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum::serve, middleware)
//!     → request.rs (request id header)
//!     → Application router (host::rules)
//!     → host::dispatch → view
//! ```

pub mod request;
pub mod server;

pub use request::{request_id, X_REQUEST_ID};
pub use server::Server;

//! Request identification.
//!
//! # Responsibilities
//! - Name the request id header shared by the middleware and the dispatcher
//! - Read the id back for log events
//!
//! # Design Decisions
//! - Ids are UUID v4, set by tower-http before tracing sees the request
//! - An incoming `x-request-id` is kept, so ids survive across proxies

use axum::http::HeaderMap;

pub const X_REQUEST_ID: &str = "x-request-id";

/// The request id, or `"unknown"` when the middleware is not installed.
pub fn request_id(headers: &HeaderMap) -> &str {
    headers
        .get(X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown")
}

//! Request views and registration targets.
//!
//! # Data Flow
//! ```text
//! registration call
//!     → Target::Direct(View)       → host route table
//!     → Target::Deferred("a.b.c")  → registrar cache → DeferredView → host route table
//!
//! matched request
//!     → ViewRequest (method, uri, headers, path params, body)
//!     → View::call
//!     → Ok(Response) | Err(ViewError) → host error handlers
//! ```
//!
//! # Design Decisions
//! - A view is a type-erased async function, cheap to clone (Arc)
//! - Errors carry an HTTP status and an `ErrorKind` so hosts can route them to handlers
//! - "Callable or string" is an explicit enum, never inferred at runtime

pub mod deferred;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use axum::body::Bytes;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::admin::AdminView;
use crate::import::ResolveError;

pub use deferred::{DeferredCache, DeferredView};

/// Result returned by every view.
pub type ViewResult = Result<Response, ViewError>;

type ViewFn = dyn Fn(ViewRequest) -> BoxFuture<'static, ViewResult> + Send + Sync;

/// A named, clonable async request handler.
#[derive(Clone)]
pub struct View {
    name: Arc<str>,
    inner: Arc<ViewFn>,
}

impl View {
    /// Wrap an async function as a view.
    ///
    /// The name is used as the default endpoint and in log events.
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(ViewRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ViewResult> + Send + 'static,
    {
        let name: String = name.into();
        Self {
            name: name.into(),
            inner: Arc::new(move |request: ViewRequest| -> BoxFuture<'static, ViewResult> {
                Box::pin(f(request))
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the view.
    pub fn call(&self, request: ViewRequest) -> BoxFuture<'static, ViewResult> {
        (self.inner)(request)
    }

    /// True when both handles point at the same underlying function.
    pub fn ptr_eq(&self, other: &View) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("View").field(&self.name).finish()
    }
}

/// The request as seen by a view.
#[derive(Debug, Clone)]
pub struct ViewRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    params: Vec<(String, String)>,
    error: Option<Arc<ViewError>>,
}

impl ViewRequest {
    pub fn new(method: Method, uri: Uri) -> Self {
        Self {
            method,
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            params: Vec::new(),
            error: None,
        }
    }

    pub(crate) fn from_parts(parts: &Parts, params: Vec<(String, String)>, body: Bytes) -> Self {
        Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            body,
            params,
            error: None,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of a matched path parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// The error being handled, set only when the request reaches an error handler.
    pub fn error(&self) -> Option<&ViewError> {
        self.error.as_deref()
    }

    pub(crate) fn with_error(mut self, error: Arc<ViewError>) -> Self {
        self.error = Some(error);
        self
    }
}

/// Coarse classification of view errors, used to key error handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// An explicit HTTP error (not found, bad request, ...).
    Http,
    /// A deferred view could not be resolved.
    Resolve,
    /// The view itself failed.
    Handler,
}

/// Errors produced while serving a view.
#[derive(Debug, Error)]
pub enum ViewError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("view failed: {0}")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ViewError {
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::http(StatusCode::NOT_FOUND, "Not Found")
    }

    pub fn handler(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Handler(err.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http { status, .. } => *status,
            Self::Resolve(_) | Self::Handler(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Http { .. } => ErrorKind::Http,
            Self::Resolve(_) => ErrorKind::Resolve,
            Self::Handler(_) => ErrorKind::Handler,
        }
    }

    /// Response used when no error handler claims the error.
    ///
    /// Server errors never leak their message to the client.
    pub fn to_response(&self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            let reason = status.canonical_reason().unwrap_or("Internal Server Error");
            (status, reason.to_string()).into_response()
        } else {
            (status, self.to_string()).into_response()
        }
    }
}

/// A registration target: either the thing itself or a path to it.
#[derive(Debug, Clone)]
pub enum Target<T> {
    Direct(T),
    Deferred(String),
}

pub type ViewTarget = Target<View>;
pub type AdminTarget = Target<AdminView>;

impl<T> From<&str> for Target<T> {
    fn from(path: &str) -> Self {
        Target::Deferred(path.to_string())
    }
}

impl<T> From<String> for Target<T> {
    fn from(path: String) -> Self {
        Target::Deferred(path)
    }
}

impl From<View> for ViewTarget {
    fn from(view: View) -> Self {
        Target::Direct(view)
    }
}

impl From<AdminView> for AdminTarget {
    fn from(view: AdminView) -> Self {
        Target::Direct(view)
    }
}

/// Outcome of resolving a target against a registrar.
#[derive(Debug, Clone)]
pub enum Resolved<T> {
    Direct(T),
    Deferred(Arc<DeferredView>),
}

impl<T> Resolved<T> {
    pub fn as_deferred(&self) -> Option<&Arc<DeferredView>> {
        match self {
            Resolved::Deferred(deferred) => Some(deferred),
            Resolved::Direct(_) => None,
        }
    }
}

impl Resolved<View> {
    /// The handler to hand to the host.
    pub fn into_view(self) -> View {
        match self {
            Resolved::Direct(view) => view,
            Resolved::Deferred(deferred) => deferred.into_view(),
        }
    }
}

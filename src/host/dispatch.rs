//! Request dispatch into views and error handlers.
//!
//! # Responsibilities
//! - Convert the axum request into a `ViewRequest` (path params, buffered body)
//! - Call the view and route its error to the most specific error handler
//! - Serve static files for the built-in static view
//!
//! # Design Decisions
//! - Bodies are buffered up to `MAX_BODY_BYTES`; larger bodies are a 413
//! - A failing error handler produces a bare 500, never another handler call
//! - Static paths must be plain relative paths; anything else is a 404

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::{FromRequestParts, RawPathParams, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tower::ServiceExt;
use tower_http::services::ServeFile;

use crate::host::rules::ErrorHandlers;
use crate::http::request::request_id;
use crate::view::{View, ViewError, ViewRequest, ViewResult};

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Serve a matched request with `view`.
pub(crate) async fn handle(view: &View, handlers: &ErrorHandlers, request: Request) -> Response {
    let (mut parts, body) = request.into_parts();

    let params = RawPathParams::from_request_parts(&mut parts, &())
        .await
        .map(|params| {
            params
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect()
        })
        .unwrap_or_default();

    let body = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(e) => {
            let req = ViewRequest::from_parts(&parts, params, Bytes::new());
            let err = ViewError::http(StatusCode::PAYLOAD_TOO_LARGE, e.to_string());
            return handle_error(handlers, req, err).await;
        }
    };

    let req = ViewRequest::from_parts(&parts, params, body);
    match view.call(req.clone()).await {
        Ok(response) => response,
        Err(err) => {
            tracing::debug!(view = %view.name(), path = %req.uri.path(), "View returned an error");
            handle_error(handlers, req, err).await
        }
    }
}

/// Serve a request no route matched.
pub(crate) async fn not_found(handlers: &ErrorHandlers, request: Request) -> Response {
    let (parts, _) = request.into_parts();
    let req = ViewRequest::from_parts(&parts, Vec::new(), Bytes::new());
    handle_error(handlers, req, ViewError::not_found()).await
}

pub(crate) async fn handle_error(
    handlers: &ErrorHandlers,
    req: ViewRequest,
    err: ViewError,
) -> Response {
    let status = err.status();
    let request_id = request_id(&req.headers).to_string();
    if status.is_server_error() {
        tracing::error!(
            request_id = %request_id,
            path = %req.uri.path(),
            status = %status,
            error = %err,
            "Request failed"
        );
    } else {
        tracing::debug!(
            request_id = %request_id,
            path = %req.uri.path(),
            status = %status,
            error = %err,
            "Request rejected"
        );
    }

    let Some(handler) = handlers.find(&err) else {
        return err.to_response();
    };

    match handler.call(req.with_error(Arc::new(err))).await {
        Ok(response) => response,
        Err(handler_err) => {
            tracing::error!(
                request_id = %request_id,
                handler = %handler.name(),
                error = %handler_err,
                "Error handler failed"
            );
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

/// The built-in static file view for `folder`.
pub(crate) fn static_file_view(folder: Option<PathBuf>) -> View {
    View::new("static", move |req: ViewRequest| {
        let folder = folder.clone();
        async move {
            match folder {
                Some(folder) => serve_static(&folder, req).await,
                None => Err(ViewError::http(StatusCode::NOT_FOUND, "No static folder configured")),
            }
        }
    })
}

async fn serve_static(folder: &Path, req: ViewRequest) -> ViewResult {
    let filename = req.param("filename").ok_or_else(ViewError::not_found)?;
    let path = safe_join(folder, filename).ok_or_else(ViewError::not_found)?;

    let is_file = tokio::fs::metadata(&path)
        .await
        .map(|meta| meta.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(ViewError::not_found());
    }

    let mut request = Request::builder()
        .method(req.method.clone())
        .uri(req.uri.clone())
        .body(Body::empty())
        .map_err(ViewError::handler)?;
    *request.headers_mut() = req.headers.clone();

    let response = ServeFile::new(path)
        .oneshot(request)
        .await
        .map_err(ViewError::handler)?;
    Ok(response.map(Body::new))
}

/// Join `filename` onto `folder`, refusing anything but plain relative components.
fn safe_join(folder: &Path, filename: &str) -> Option<PathBuf> {
    let relative = Path::new(filename);
    let plain = relative
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if filename.is_empty() || !plain {
        return None;
    }
    Some(folder.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, Uri};

    #[test]
    fn test_safe_join() {
        let root = Path::new("/srv/static");
        assert_eq!(safe_join(root, "css/site.css"), Some(root.join("css/site.css")));
        assert_eq!(safe_join(root, "../secret"), None);
        assert_eq!(safe_join(root, "/etc/passwd"), None);
        assert_eq!(safe_join(root, "a/./b"), Some(root.join("a/b")));
        assert_eq!(safe_join(root, ""), None);
    }

    #[tokio::test]
    async fn test_error_handler_receives_error() {
        let mut handlers = ErrorHandlers::default();
        handlers.insert(
            crate::host::ErrorKey::Status(StatusCode::NOT_FOUND),
            View::new("not_found", |req: ViewRequest| async move {
                let message = req.error().map(|e| e.to_string()).unwrap_or_default();
                Ok((StatusCode::NOT_FOUND, format!("custom: {message}")).into_response())
            }),
        );

        let req = ViewRequest::new(Method::GET, Uri::from_static("/missing"));
        let response = handle_error(&handlers, req, ViewError::not_found()).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"custom: Not Found");
    }

    #[tokio::test]
    async fn test_failing_error_handler() {
        let mut handlers = ErrorHandlers::default();
        handlers.insert(
            crate::host::ErrorKey::Status(StatusCode::BAD_REQUEST),
            View::new("broken", |_req| async { Err(ViewError::handler("handler broke")) }),
        );

        let req = ViewRequest::new(Method::GET, Uri::from_static("/"));
        let err = ViewError::http(StatusCode::BAD_REQUEST, "bad input");
        let response = handle_error(&handlers, req, err).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_static_view_serves_file() {
        let dir = std::env::temp_dir().join(format!("lazy-views-static-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("hello.txt"), "hello static").unwrap();

        let view = static_file_view(Some(dir.clone()));
        let req = ViewRequest::new(Method::GET, Uri::from_static("/static/hello.txt"))
            .with_param("filename", "hello.txt");
        let response = view.call(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"hello static");

        let req = ViewRequest::new(Method::GET, Uri::from_static("/static/x"))
            .with_param("filename", "../hello.txt");
        let err = view.call(req).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_static_view_without_folder() {
        let view = static_file_view(None);
        let req = ViewRequest::new(Method::GET, Uri::from_static("/static/a.css"))
            .with_param("filename", "a.css");
        assert_eq!(view.call(req).await.unwrap_err().status(), StatusCode::NOT_FOUND);
    }
}

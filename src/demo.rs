//! Views bundled with the binary. Nothing here is loaded until a route needs it.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use axum::Json;
use serde_json::json;

use lazy_views::import::LoadError;
use lazy_views::{AdminView, Module, View, ViewError, ViewRequest};

lazy_views::register_module!("demo.views", views);
lazy_views::register_module!("demo.views.errors", errors);
lazy_views::register_module!("demo.views.admin", admin);

fn views() -> Result<Module, LoadError> {
    tracing::info!(module = "demo.views", "Loading module");
    Ok(Module::new()
        .with_view(
            "home",
            View::new("home", |_req| async {
                Ok(Html("<h1>lazy-views demo</h1>").into_response())
            }),
        )
        .with_view(
            "hello",
            View::new("hello", |req: ViewRequest| async move {
                let name = req.param("name").unwrap_or("world").to_string();
                Ok(Html(format!("<p>Hello, {name}!</p>")).into_response())
            }),
        )
        .with_view(
            "echo",
            View::new("echo", |req: ViewRequest| async move {
                match String::from_utf8(req.body.to_vec()) {
                    Ok(body) => Ok(Json(json!({ "method": req.method.as_str(), "body": body }))
                        .into_response()),
                    Err(_) => Err(ViewError::http(StatusCode::BAD_REQUEST, "body is not UTF-8")),
                }
            }),
        ))
}

fn errors() -> Result<Module, LoadError> {
    tracing::info!(module = "demo.views.errors", "Loading module");
    Ok(Module::new()
        .with_view(
            "not_found",
            View::new("not_found", |req: ViewRequest| async move {
                let path = req.uri.path().to_string();
                let body = Html(format!("<p>Nothing at {path}</p>"));
                Ok((StatusCode::NOT_FOUND, body).into_response())
            }),
        )
        .with_view(
            "server_error",
            View::new("server_error", |req: ViewRequest| async move {
                let kind = req.error().map(|e| format!("{:?}", e.kind())).unwrap_or_default();
                Ok((
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "internal", "kind": kind })),
                )
                    .into_response())
            }),
        ))
}

fn admin() -> Result<Module, LoadError> {
    tracing::info!(module = "demo.views.admin", "Loading module");
    Ok(Module::new().with_admin_view("users", |args| {
        let view = View::new("users", |_req| async {
            Ok(Json(json!({ "users": ["ada", "grace", "barbara"] })).into_response())
        });
        Ok(AdminView::from_args("Users", view, args))
    }))
}

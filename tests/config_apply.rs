//! Applications assembled from TOML with statically registered modules.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use lazy_views::config::parse_config;
use lazy_views::import::LoadError;
use lazy_views::{
    Admin, AdminView, Application, LazyViews, LazyViewsError, Module, ModuleRegistry, View,
    ViewRequest,
};

mod common;

lazy_views::register_module!("shop.views", shop_views);
lazy_views::register_module!("shop.views.admin", shop_admin);

fn shop_views() -> Result<Module, LoadError> {
    Ok(Module::new()
        .with_view("home", common::text_view("home", "welcome to the shop"))
        .with_view(
            "create",
            View::new("create", |req: ViewRequest| async move {
                let body = String::from_utf8_lossy(&req.body).to_string();
                Ok((StatusCode::CREATED, format!("created {body}")).into_response())
            }),
        )
        .with_view(
            "not_found",
            View::new("not_found", |_req| async {
                Ok((StatusCode::NOT_FOUND, "shop: not found").into_response())
            }),
        ))
}

fn shop_admin() -> Result<Module, LoadError> {
    Ok(Module::new().with_admin_view("orders", |args| {
        Ok(AdminView::from_args(
            "Orders",
            common::text_view("orders", "order list"),
            args,
        ))
    }))
}

const CONFIG: &str = r#"
import_prefix = ".views"

[app]
import_name = "shop"

[admin]
enabled = true
name = "Shop Admin"

[[routes]]
rule = "/"
view = "home"

[[routes]]
rule = "/items"
view = "create"
methods = ["post"]
endpoint = "items.create"

[[error_handlers]]
status = 404
view = "not_found"

[[admin_views]]
view = "admin.orders"
category = "Sales"
"#;

fn build(config: &lazy_views::LazyViewsConfig) -> Result<(Application, LazyViews), LazyViewsError> {
    let app = Application::new(&config.app.import_name);
    if config.admin.enabled {
        Admin::new(&config.admin.name).init_app(&app);
    }
    let mut views = LazyViews::new(Arc::new(ModuleRegistry::from_inventory()));
    views.init_app(app.clone(), config.import_prefix.as_deref())?;
    views.apply_config(config)?;
    Ok((app, views))
}

#[tokio::test]
async fn test_config_builds_working_application() {
    let config = parse_config(CONFIG).unwrap();
    let (app, views) = build(&config).unwrap();

    // Routes and the error handler are deferred; the admin view was built right away.
    assert_eq!(views.cache().len(), 4);
    let paths: Vec<String> = views
        .cache()
        .views()
        .iter()
        .map(|d| d.path().to_string())
        .collect();
    assert_eq!(
        paths,
        vec![
            "shop.views.admin.orders",
            "shop.views.create",
            "shop.views.home",
            "shop.views.not_found",
        ]
    );
    assert!(!views.cache().get("shop.views.home").unwrap().is_resolved());

    let server = common::spawn(&app).await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "welcome to the shop");

    let res = client
        .post(server.url("/items"))
        .body("socks")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    assert_eq!(res.text().await.unwrap(), "created socks");

    // POST-only rule.
    let res = client.get(server.url("/items")).send().await.unwrap();
    assert!(res.status().is_client_error());

    let res = client.get(server.url("/missing")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "shop: not found");

    let res = client.get(server.url("/admin/orders")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "order list");
}

#[tokio::test]
async fn test_missing_admin_module_fails_at_registration() {
    let mut config = parse_config(CONFIG).unwrap();
    config.admin_views[0].view = "admin.refunds".into();

    let err = build(&config).unwrap_err();
    match err {
        LazyViewsError::AdminView { path, .. } => assert_eq!(path, "shop.views.admin.refunds"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_admin_views_need_the_extension() {
    let mut config = parse_config(CONFIG).unwrap();
    config.admin.enabled = false;

    let err = build(&config).unwrap_err();
    assert!(matches!(err, LazyViewsError::MissingAdminExtension { .. }));
}

#[test]
fn test_relative_prefix_needs_import_name() {
    let mut config = parse_config(CONFIG).unwrap();
    config.app.import_name = "main".into();

    let err = build(&config).unwrap_err();
    assert!(matches!(err, LazyViewsError::MissingImportName { .. }));
}

use axum::Json;
use axum::response::IntoResponse;
use serde::Serialize;

use crate::admin::AdminViewInfo;
use crate::view::{View, ViewRequest};

#[derive(Serialize)]
pub struct AdminIndex {
    pub name: String,
    pub views: Vec<AdminViewInfo>,
}

/// Index view listing the admin's views, captured when the router is built.
pub fn index_view(name: String, views: Vec<AdminViewInfo>) -> View {
    View::new("admin.index", move |_req: ViewRequest| {
        let index = AdminIndex {
            name: name.clone(),
            views: views.clone(),
        };
        async move { Ok(Json(index).into_response()) }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode, Uri};

    #[tokio::test]
    async fn test_index_lists_views() {
        let view = index_view(
            "Backoffice".into(),
            vec![AdminViewInfo {
                name: "Users".into(),
                category: None,
                endpoint: "users".into(),
                url: "/admin/users".into(),
            }],
        );

        let response = view
            .call(ViewRequest::new(Method::GET, Uri::from_static("/admin")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["name"], "Backoffice");
        assert_eq!(json["views"][0]["url"], "/admin/users");
    }
}

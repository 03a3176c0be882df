//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Serve until a shutdown signal arrives
//!
//! # Design Decisions
//! - The application router is built once at startup; deferred views resolve inside it
//! - Middleware order: request id outermost so trace spans and handlers can see it

use std::future::Future;
use std::time::Duration;

use axum::http::HeaderName;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::schema::ServerConfig;
use crate::http::request::X_REQUEST_ID;

/// HTTP server for an application router.
pub struct Server {
    config: ServerConfig,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Wrap the router with the server middleware stack.
    #[allow(deprecated)]
    pub fn layer(&self, router: Router) -> Router {
        let header = HeaderName::from_static(X_REQUEST_ID);
        router
            .layer(TimeoutLayer::new(Duration::from_secs(
                self.config.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::new(header.clone()))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(header, MakeRequestUuid))
    }

    /// Serve until Ctrl+C.
    pub async fn run(self, listener: TcpListener, router: Router) -> Result<(), std::io::Error> {
        self.run_until(listener, router, shutdown_signal()).await
    }

    /// Serve until `shutdown` completes.
    pub async fn run_until<F>(
        self,
        listener: TcpListener,
        router: Router,
        shutdown: F,
    ) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.request_timeout_secs,
            "HTTP server starting"
        );

        let app = self.layer(router);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_request_id_is_set_and_propagated() {
        let server = Server::new(ServerConfig::default());
        let router = server.layer(Router::new().route("/", get(|| async { "ok" })));

        let response = router
            .clone()
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));

        let response = router
            .oneshot(
                Request::builder()
                    .uri("/")
                    .header(X_REQUEST_ID, "given-id")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[X_REQUEST_ID], "given-id");
    }
}

//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use axum::response::IntoResponse;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use lazy_views::config::schema::ServerConfig;
use lazy_views::http::Server;
use lazy_views::{Application, Module, View, ViewRequest};

/// A running test server. Dropping it shuts the server down.
pub struct TestServer {
    pub addr: SocketAddr,
    _shutdown: oneshot::Sender<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Serve `app` on an ephemeral port.
pub async fn spawn(app: &Application) -> TestServer {
    let router = app.into_router().unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let shutdown = async {
            let _ = rx.await;
        };
        let _ = Server::new(ServerConfig::default())
            .run_until(listener, router, shutdown)
            .await;
    });

    TestServer {
        addr,
        _shutdown: tx,
    }
}

/// A view answering with a fixed body.
pub fn text_view(name: &str, body: &'static str) -> View {
    View::new(name, move |_req| async move { Ok(body.into_response()) })
}

/// A view echoing its `name` path parameter.
#[allow(dead_code)]
pub fn param_view(name: &str) -> View {
    View::new(name, |req: ViewRequest| async move {
        let value = req.param("name").unwrap_or("none").to_string();
        Ok(value.into_response())
    })
}

/// A module loader that counts how often it runs.
#[allow(dead_code)]
pub fn counting_loader(
    build: fn() -> Module,
) -> (
    Arc<AtomicU32>,
    impl Fn() -> Result<Module, lazy_views::import::LoadError> + Send + Sync + 'static,
) {
    let count = Arc::new(AtomicU32::new(0));
    let c = count.clone();
    let loader = move || {
        c.fetch_add(1, Ordering::SeqCst);
        Ok(build())
    };
    (count, loader)
}

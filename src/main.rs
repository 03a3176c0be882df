//! lazy-views server.
//!
//! Serves an application described by a TOML file whose views are resolved lazily from the
//! modules bundled in this binary (see `demo.rs`).
//!
//! ```text
//! lazy-views --config config/demo.toml serve [--bind 127.0.0.1:8080]
//! lazy-views --config config/demo.toml check
//! ```

mod demo;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use lazy_views::config::{load_config, LazyViewsConfig};
use lazy_views::http::Server;
use lazy_views::observability::logging;
use lazy_views::{Admin, Application, LazyViews, ModuleRegistry};

#[derive(Parser)]
#[command(name = "lazy-views")]
#[command(
    about = "Serve or check an application built from lazily resolved views",
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration.
    #[arg(short, long, default_value = "config/demo.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the application
    Serve {
        /// Override the configured bind address
        #[arg(long)]
        bind: Option<String>,
    },
    /// Resolve every configured view and report failures
    Check,
}

/// Build the application and register every configured view on it.
fn build(config: &LazyViewsConfig) -> Result<(Application, LazyViews), Box<dyn Error>> {
    let mut app =
        Application::new(&config.app.import_name).with_static_folder(&config.app.static_folder);
    if let Some(url_path) = &config.app.static_url_path {
        app = app.with_static_url_path(url_path);
    }

    if config.admin.enabled {
        Admin::new(&config.admin.name)
            .with_url(&config.admin.url)
            .init_app(&app);
    }

    let modules = Arc::new(ModuleRegistry::from_inventory());
    let mut views = LazyViews::new(modules);
    views.init_app(app.clone(), config.import_prefix.as_deref())?;
    views.apply_config(config)?;
    Ok((app, views))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    logging::init(&config.logging.filter)?;

    tracing::info!(
        config = %cli.config.display(),
        app = %config.app.import_name,
        import_prefix = ?config.import_prefix,
        "lazy-views v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    match cli.command {
        Commands::Serve { bind } => {
            let (app, _views) = build(&config)?;
            let router = app.into_router()?;

            let bind_address = bind.unwrap_or_else(|| config.server.bind_address.clone());
            let listener = TcpListener::bind(&bind_address).await?;
            Server::new(config.server.clone()).run(listener, router).await?;

            tracing::info!("Shutdown complete");
        }
        Commands::Check => {
            let (_, views) = build(&config)?;
            let mut failures = 0;
            for deferred in views.cache().views() {
                match deferred.resolve() {
                    Ok(export) => println!("ok      {} ({})", deferred.path(), export.kind_name()),
                    Err(e) => {
                        failures += 1;
                        println!("failed  {}: {}", deferred.path(), e);
                    }
                }
            }
            if failures > 0 {
                return Err(format!("{failures} view(s) failed to resolve").into());
            }
            println!("all {} deferred views resolved", views.cache().len());
        }
    }

    Ok(())
}

//! # georoll-server
//!
//! HTTP server for the georoll GPS class check-in system.
//!
//! This binary provides:
//! - REST API for class sessions, check-in and attendance reports
//! - OpenAPI documentation via Swagger UI at `/docs`
//! - Structured logging to file and stdout
//!
//! ## Running
//!
//! ```bash
//! # Development
//! GEOROLL__STORAGE__PERSIST=false cargo run --package georoll-server
//!
//! # Production
//! GEOROLL_CONFIG=/etc/georoll/config.toml ./georoll-server
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use georoll_core::GeoRollConfig;
use georoll_server::{api, logging, state::AppState, sweep};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::var_os("GEOROLL_CONFIG")
        .map_or_else(GeoRollConfig::default_path, PathBuf::from);
    let config = GeoRollConfig::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    logging::init(&config.server)?;
    info!(config = %config_path.display(), "Starting georoll-server");

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server.host or server.port")?;
    let sweep_interval = Duration::from_secs(config.server.sweep_interval_secs);

    let state = AppState::new(config)?.into_shared();
    let sweeper = sweep::spawn(state.clone(), sweep_interval);
    let app = api::create_router(state);

    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

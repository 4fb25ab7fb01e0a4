//! Tunepool Server - standalone headless server for shared room queues.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tunepool_core::{
    bind_listener, bootstrap_services, serve, FileRoomStore, MemoryRoomStore, RoomStore,
};

use crate::config::ServerConfig;

/// Tunepool Server - collaborative room music queues.
#[derive(Parser, Debug)]
#[command(name = "tunepool-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "TUNEPOOL_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// Bind port (overrides config file).
    #[arg(short = 'p', long, env = "TUNEPOOL_BIND_PORT")]
    port: Option<u16>,

    /// Data directory for the room snapshot.
    #[arg(short = 'd', long, env = "TUNEPOOL_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("Tunepool Server v{}", env!("CARGO_PKG_VERSION"));

    let mut config =
        ServerConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(port) = args.port {
        config.bind_port = port;
    }
    if let Some(data_dir) = args.data_dir {
        config.data_dir = Some(data_dir);
    }

    let credentials = config.credentials()?;
    let core_config = config.to_core_config();
    log::info!(
        "Configuration: bind_port={}, redirect_uri={}",
        core_config.preferred_port,
        core_config.redirect_uri
    );

    let store: Arc<dyn RoomStore> = match config.data_dir {
        Some(ref data_dir) => {
            log::info!("Using data directory: {}", data_dir.display());
            Arc::new(
                FileRoomStore::open(data_dir)
                    .with_context(|| format!("Failed to open room store in {}", data_dir.display()))?,
            )
        }
        None => {
            log::info!("No data directory configured - rooms will not persist");
            Arc::new(MemoryRoomStore::new())
        }
    };

    let services = bootstrap_services(&core_config, credentials, store)
        .context("Failed to bootstrap services")?;
    log::info!("Services bootstrapped successfully");

    let resumed = services
        .resume()
        .await
        .context("Failed to resume scheduled advances")?;
    if resumed > 0 {
        log::info!("Resumed {} room queue(s)", resumed);
    }

    let app_state = services.app_state().context("Failed to build app state")?;
    let (port, listener) = bind_listener(core_config.preferred_port)
        .await
        .context("Failed to bind HTTP listener")?;
    log::info!("HTTP server listening on http://0.0.0.0:{}", port);

    let shutdown = services.cancel_token.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, app_state, shutdown).await {
            log::error!("Server error: {}", e);
        }
    });

    shutdown_signal().await;
    log::info!("Shutdown signal received, cleaning up...");

    // Cancelling the token also starts the HTTP server's graceful drain.
    services.shutdown().await;

    if let Err(e) = server_handle.await {
        log::warn!("Server task ended abnormally: {}", e);
    }

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

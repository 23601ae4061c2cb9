//! rollcall-server - school attendance service
//!
//! Serves the attendance REST API, including facial-recognition intake
//! backed by an external recognizer process.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rollcall_server::config::{Cli, ServerConfig};
use rollcall_server::services::recognizer::SubprocessRecognizer;
use rollcall_server::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let toml_config = rollcall_common::config::load_toml_config(cli.config.as_deref())
        .context("Failed to load configuration file")?;
    let config = ServerConfig::resolve(&cli, &toml_config).context("Invalid configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("rollcall_server={0},rollcall_common={0},tower_http=info", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting rollcall-server");
    info!(
        "Version: {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Root folder: {}", config.root_folder.display());
    info!("Database: {}", config.database_path.display());

    let db = rollcall_server::db::init_database(&config.database_path)
        .await
        .context("Failed to open database")?;

    tokio::fs::create_dir_all(&config.service.upload_dir)
        .await
        .with_context(|| format!("Failed to create upload dir {}", config.service.upload_dir.display()))?;

    let recognizer = SubprocessRecognizer::from_config(&config.recognizer);
    info!(
        program = %config.recognizer.program,
        args = ?config.recognizer.args,
        timeout = ?config.recognizer_timeout(),
        "Recognizer configured"
    );
    info!(
        duplicate_policy = ?config.service.duplicate_policy,
        min_confidence = ?config.service.min_confidence,
        max_upload_bytes = config.service.max_upload_bytes,
        "Attendance policy"
    );

    let state = AppState::new(db, Arc::new(recognizer), config.service.clone());
    let app = rollcall_server::build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;
    info!("Listening on http://{}", config.bind);
    info!("Health check: http://{}/health", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}

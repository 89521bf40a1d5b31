//! journeyd: serves student journeys over HTTP backed by SQLite.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};

use app::config::{Args, prepare_sqlite_file};
use app::{AppState, build_router};
use services::{AppServices, Clock};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    info!("Starting journeyd v{}", env!("CARGO_PKG_VERSION"));

    let db_url = args.database_url();
    prepare_sqlite_file(&db_url)?;
    info!("Database: {db_url}");

    let services = match AppServices::new_sqlite(&db_url, Clock::default()).await {
        Ok(services) => services,
        Err(e) => {
            error!("Failed to open database: {e}");
            return Err(e).context("opening database");
        }
    };

    let app = build_router(AppState::new(&services));
    let listener = tokio::net::TcpListener::bind(args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    info!("journeyd listening on http://{}", args.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("journeyd stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {e}");
    }
}

//! Quill bridge service
//!
//! Hosts the Graph webhook ingress and the background relay workers.

use std::sync::Arc;

use deadpool_postgres::{Config as PgConfig, Runtime};
use quill_bridge::settings::{self, PgSettingsStore};
use quill_bridge::{ingress, relay, AppState, BridgeConfig};
use tokio_postgres::NoTls;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,quill_bridge=debug")),
        )
        .init();

    dotenvy::dotenv().ok();

    // Missing feature-critical configuration disables the bridge instead
    // of crashing the process.
    let config = match BridgeConfig::from_env() {
        Ok(config) => config,
        Err(missing) => {
            warn!("{}, Teams bridge disabled", missing);
            return Ok(());
        }
    };
    info!(
        "Starting quill bridge on {}:{}",
        config.host, config.port
    );

    let mut pg_config = PgConfig::new();
    pg_config.url = Some(config.database_url.clone());
    let pool = pg_config.create_pool(Some(Runtime::Tokio1), NoTls)?;
    settings::run_migrations(&pool).await?;
    let store = Arc::new(PgSettingsStore::new(pool));

    let (state, receivers) = AppState::new(config.clone(), store);

    let chat_worker = tokio::spawn(relay::run_chat_relay(state.clone(), receivers.chat));
    let lifecycle_worker = tokio::spawn(relay::run_lifecycle_relay(
        state.clone(),
        receivers.lifecycle,
    ));

    let app = ingress::router(state);
    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;
    info!("Teams connect server started!");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down, canceling relay workers...");
    chat_worker.abort();
    lifecycle_worker.abort();

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

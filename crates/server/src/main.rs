mod bootstrap;
mod clientify;
mod errors;
mod health;
mod inventory;
mod webhook;
mod woocommerce;

use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use aquabot_agent::IdleScheduler;
use aquabot_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use aquabot_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging settings come from the config, so it loads first.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    app.spawn_catalog_warmup();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let idle = IdleScheduler::spawn(
        &app.config.idle,
        app.store.clone(),
        app.sender.clone(),
        shutdown_rx,
    );

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "aquabot-server listening"
    );

    axum::serve(listener, app.http_router()).with_graceful_shutdown(wait_for_shutdown()).await?;

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "aquabot-server stopping"
    );
    // A closed receiver means the scheduler already exited.
    let _ = shutdown_tx.send(true);
    if let Some(handle) = idle {
        let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
        if tokio::time::timeout(grace, handle).await.is_err() {
            warn!(
                event_name = "system.server.idle_shutdown_timeout",
                correlation_id = "shutdown",
                "idle scheduler did not stop within the grace period"
            );
        }
    }

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(source) = tokio::signal::ctrl_c().await {
        error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %source,
            "could not listen for ctrl-c; shutting down"
        );
    }
}

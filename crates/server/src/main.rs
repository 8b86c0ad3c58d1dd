mod auth;
mod bootstrap;
mod dto;
mod error;
mod fanout;
mod health;
mod notifications;
mod quotes;
mod sweep;
mod transporter;
#[cfg(test)]
mod test_support;

use anyhow::Result;
use lanehaul_core::config::{AppConfig, LoadOptions};
use tracing::info;

fn init_logging(config: &AppConfig) {
    use lanehaul_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Load config and initialize logging before any other operations.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    if app.config.consent.sweep_enabled {
        sweep::spawn(
            app.state.lifecycle.clone(),
            app.state.dispatcher.clone(),
            app.config.consent.sweep_interval_secs,
        );
        info!(
            event_name = "system.server.sweep_started",
            correlation_id = "bootstrap",
            interval_secs = app.config.consent.sweep_interval_secs,
            "consent-expiry sweep started"
        );
    }

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "lanehaul-server started"
    );

    axum::serve(listener, bootstrap::router(app.state.clone()))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "lanehaul-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    let _ = tokio::signal::ctrl_c().await;
}

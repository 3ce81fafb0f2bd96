//! WeChat Token Service - Main Entry Point
//!
//! Serves `GetToken` over HTTP and gRPC, exposes metrics on the debug
//! listener and shuts everything down on SIGINT/SIGTERM.

use tracing::info;

use wechat_token::config::Config;
use wechat_token::observability::{TelemetryConfig, init_telemetry, shutdown_telemetry};
use wechat_token::provider::build_provider;
use wechat_token::{Application, Listeners, SignalWatcher};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging and span export
    init_telemetry(&TelemetryConfig::from_config(&config))?;

    info!("Starting WeChat Token Service");

    let provider = build_provider(&config).await?;
    let app = Application::new(&config, provider)?;

    // Handlers go in before binding so an early SIGTERM still drains
    let watcher = SignalWatcher::new()?;

    // Bind failures are fatal before anything is served
    let listeners = Listeners::from_config(&config).await?;

    let outcome = app.into_group(listeners, watcher).run().await;
    match &outcome {
        Ok(()) => info!(exit = "ok", "WeChat Token Service stopped"),
        Err(e) => info!(exit = %e, "WeChat Token Service stopped"),
    }

    shutdown_telemetry();

    Ok(())
}

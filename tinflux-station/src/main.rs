//! tinflux-station binary
//!
//! ```bash
//! # Settings on the command line
//! tinflux-station garden brickd.local 4223 http://influx:8086 weather station secret 10 412
//!
//! # Settings from TINFLUXWS_* and /run/secrets
//! RUST_LOG=debug tinflux-station
//! ```

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use tinflux_connectors::{InfluxConfig, InfluxConnector, TinkerforgeHub};
use tinflux_station::{Cli, SecretFiles, Station, StationConfig};

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    info!(
        "Starting tinflux-station {} with {}...",
        tinflux_core::VERSION,
        if cli.settings.is_empty() { "ENV" } else { "CLI args" }
    );

    let config = StationConfig::load(&cli.settings, |name| std::env::var(name).ok(), &SecretFiles::default())?;
    for line in config.to_string().lines() {
        info!("{}", line);
    }

    let mut influx = InfluxConfig::new(config.influx_uri.clone(), config.influx_database.clone());
    if let Some(credentials) = &config.credentials {
        influx = influx.basic_auth(credentials.username.clone(), credentials.password.clone());
    }
    let sink = Arc::new(InfluxConnector::new(influx).context("Invalid InfluxDB settings")?);
    let hub = Arc::new(TinkerforgeHub::new());

    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    let summary = Station::new(config, hub, sink).run(shutdown).await?;
    info!(
        "Station stopped: {} sensors, {} readings forwarded, {} derived sets",
        summary.sensors.len(),
        summary.forwarded,
        summary.computed
    );
    Ok(())
}

/// Cancel `shutdown` on Ctrl+C or SIGTERM
async fn watch_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("Shutdown requested");
    shutdown.cancel();
}

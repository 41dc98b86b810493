//! Tinflux Weather Station
//!
//! ## Overview
//!
//! Long-running agent that turns hub sensor callbacks into telemetry points
//! and periodically derives psychrometric metrics from the latest readings.
//!
//! ```text
//!                 ┌──────────────────────────── Station ────────────────────────────┐
//!   hub read task │ SensorRegistry handler ─▶ MeasurementStore (atomic slots)       │
//!   ─────────────▶│        │                          │                             │
//!                 │        ▼                          ▼                             │
//!                 │  TelemetryQueue ─▶ forwarder   DerivedMetricsWorker (period+5s) │
//!                 │                        │          │                             │
//!                 │                        ▼          ▼                             │
//!                 │                     Telemetry ─▶ TelemetrySink ─────────────────┼─▶ InfluxDB
//!                 └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! 1. Load [`StationConfig`] from arguments or environment
//! 2. Connect to the hub, three attempts at most
//! 3. Enumerate devices for one second and register the known ones
//! 4. Run the worker until the shutdown token fires
//!
//! Telemetry write failures are logged and never stop the station.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tinflux_connectors::{InfluxConfig, InfluxConnector, TinkerforgeHub};
//! use tinflux_station::{Station, StationConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example(config: StationConfig) -> anyhow::Result<()> {
//! let sink = Arc::new(InfluxConnector::new(InfluxConfig::new(
//!     config.influx_uri.clone(),
//!     config.influx_database.clone(),
//! ))?);
//! let station = Station::new(config, Arc::new(TinkerforgeHub::new()), sink);
//!
//! let shutdown = CancellationToken::new();
//! station.run(shutdown).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod registry;
pub mod station;
pub mod telemetry;
pub mod worker;

pub use config::{Cli, ConfigError, Credentials, SecretFiles, StationConfig};
pub use connection::ConnectionManager;
pub use error::{StationError, StationResult};
pub use registry::{ActiveSensor, SensorRegistry};
pub use station::{RunSummary, Station};
pub use telemetry::{Telemetry, TelemetryForwarder, TelemetryQueue};
pub use worker::{DerivedMetricsWorker, TickOutcome};

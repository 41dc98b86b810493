//! Connectors Between the Station and the Outside World
//!
//! ## Overview
//!
//! The station talks to exactly two external systems:
//!
//! ```text
//! ┌──────────────┐  raw readings  ┌──────────────┐  points  ┌──────────────┐
//! │  Sensor hub  │───────────────▶│   Station    │─────────▶│  Telemetry   │
//! │ (HubClient)  │◀───────────────│              │          │    sink      │
//! └──────────────┘ enumerate/subs └──────────────┘          └──────────────┘
//! ```
//!
//! Both sides are traits so the station can be driven by fakes in tests:
//! - [`HubClient`]: connection, device enumeration, raw-value callbacks
//! - [`TelemetrySink`]: one tagged numeric point per call
//!
//! ## Implementations
//!
//! ### Tinkerforge hub (`tinkerforge` feature)
//!
//! Speaks the brick daemon's binary TCP framing, just far enough to enumerate
//! bricklets, set their callback periods and receive value callbacks. The
//! daemon only pushes a value when it changed, at most once per period.
//!
//! ### InfluxDB (`influx` feature)
//!
//! InfluxDB 1.x HTTP write endpoint, one line-protocol line per request:
//! ```text
//! garden,type=TEMPERATURE,unit=°C,unitName=DEGREE\ CELSIUS value=20.5 1700000000000
//! ```
//! Writes never batch: a failed write loses exactly one sample.
//!
//! ## Error Handling
//!
//! Every connector reports [`ConnectorError`]. Callers decide severity: the
//! station retries hub connects and only logs telemetry failures.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tinflux_connectors::{InfluxConfig, InfluxConnector, TelemetryPoint, TelemetrySink};
//!
//! # async fn example() -> Result<(), tinflux_connectors::ConnectorError> {
//! let config = InfluxConfig::new("http://influx.local:8086", "weather")
//!     .basic_auth("station", "secret");
//! let influx = InfluxConnector::new(config)?;
//!
//! let point = TelemetryPoint::now("garden", "TEMPERATURE", "°C", "DEGREE CELSIUS", 20.5);
//! influx.write(&point).await?;
//! # Ok(())
//! # }
//! ```

pub mod hub;
pub mod point;

#[cfg(feature = "influx")]
pub mod influx;

#[cfg(feature = "tinkerforge")]
pub mod tinkerforge;

// Re-export common types
pub use hub::{Announcement, EnumerateHandler, EnumerationType, HubClient, ReadingHandler};
pub use point::TelemetryPoint;

#[cfg(feature = "influx")]
pub use influx::{InfluxConfig, InfluxConnector};

#[cfg(feature = "tinkerforge")]
pub use tinkerforge::TinkerforgeHub;

use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("Not connected")]
    NotConnected,

    #[error("Connection lost")]
    ConnectionLost,

    #[error("Timeout")]
    Timeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unsupported device identifier {0}")]
    UnsupportedDevice(u16),

    #[error("Write rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Destination for telemetry points
///
/// Implementations must be callable concurrently; the station shares one
/// sink between the sensor forwarder and the derived-metrics worker.
#[async_trait::async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Write a single point
    async fn write(&self, point: &TelemetryPoint) -> Result<(), ConnectorError>;

    /// Get write statistics
    fn stats(&self) -> ConnectionStats;
}

/// Write statistics common to all sinks
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Total points written successfully
    pub messages_sent: u64,
    /// Total points that failed to write
    pub messages_failed: u64,
    /// Total payload bytes sent
    pub bytes_sent: u64,
    /// Last error message
    pub last_error: Option<String>,
}

//! Station errors

use thiserror::Error;
use tinflux_connectors::ConnectorError;

use crate::config::ConfigError;

/// Result type for station operations
pub type StationResult<T> = Result<T, StationError>;

/// Errors that stop the station
///
/// Telemetry write failures never show up here; they are logged and counted
/// by the sink.
#[derive(Debug, Error)]
pub enum StationError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Not able to connect to hub! Check your connectivity! ({host}:{port}, {attempts} attempts)")]
    Connectivity {
        host: String,
        port: u16,
        attempts: u32,
    },

    #[error("Hub error: {0}")]
    Hub(#[from] ConnectorError),
}

//! Core data model for the Tinflux weather station
//!
//! Holds everything that does not touch the network:
//! - [`SensorKind`]: the five supported bricklet kinds and their raw→physical scaling
//! - [`MeasurementStore`]: lock-free "last known value" slots, one per kind
//! - [`psychrometrics`]: derived humidity, dew point and altitude metrics
//!
//! Key constraints:
//! - Usable without std (math goes through `libm`)
//! - No heap allocation in the callback path
//! - Store writes never block readers of unrelated kinds
//!
//! ```no_run
//! use tinflux_core::{MeasurementStore, SensorKind};
//!
//! let store = MeasurementStore::new();
//! let celsius = SensorKind::Temperature.convert(2050);
//! store.set(SensorKind::Temperature, celsius);
//!
//! assert!(store.is_measured(SensorKind::Temperature));
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod errors;
pub mod psychrometrics;
pub mod sensors;
pub mod store;
pub mod time;

// Public API
pub use errors::{CoreError, CoreResult};
pub use psychrometrics::{round3, DerivedMetric, DerivedMetricSet, PsychrometricInputs, Psychrometrics};
pub use sensors::{Measurement, SensorKind};
pub use store::MeasurementStore;

/// Crate version, reported in the station's startup banner
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Constants for Tinflux Core
//!
//! Centralized numeric values used by the station. Grouped by domain:
//! - **Physics**: Magnus coefficients, gas constants, standard atmosphere
//! - **Sensors**: raw scaling divisors and the measurement store sentinel
//! - **Time**: retry backoff, enumeration grace and worker cadence
//!
//! Names carry their unit suffix (`_PA`, `_MS`, `_M`) wherever one applies.

/// Physical constants for psychrometric and barometric formulas.
pub mod physics;

/// Sensor scaling and measurement store parameters.
pub mod sensors;

/// Intervals, timeouts and retry counts.
pub mod time;

// Re-export commonly used constants for convenience
pub use physics::{ABSOLUTE_ZERO_OFFSET_K, SEA_LEVEL_PRESSURE_PA};

pub use sensors::{MEASURED_GUARD, SENTINEL};

pub use time::{
    CONNECT_ATTEMPTS, CONNECT_BACKOFF_MS, DEFAULT_CALLBACK_PERIOD_S, ENUMERATION_GRACE_MS,
    WORKER_EXTRA_DELAY_MS,
};

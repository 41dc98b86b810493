//! Sensor Scaling and Store Parameters
//!
//! Bricklets report fixed-point integers. The divisors below turn those raw
//! values into physical units; they come from the bricklet datasheets.

// ===== RAW SCALING =====

/// Temperature bricklet reports 1/100 °C.
pub const TEMPERATURE_DIVISOR: f64 = 100.0;

/// Humidity bricklet reports 1/10 %RH.
pub const HUMIDITY_DIVISOR: f64 = 10.0;

/// Barometer bricklet reports 1/1000 hPa.
pub const BAROMETER_DIVISOR: f64 = 1000.0;

/// Moisture bricklet reports a dimensionless index, passed through as is.
pub const MOISTURE_DIVISOR: f64 = 1.0;

/// UV light bricklet reports µW/cm², passed through as is.
pub const UV_LIGHT_DIVISOR: f64 = 1.0;

// ===== MEASUREMENT STORE =====

/// Placeholder held by a store slot that has never been written.
///
/// Far outside every physical range the station handles, so a real reading
/// can be told apart from it with [`MEASURED_GUARD`].
pub const SENTINEL: f64 = -1000.0;

/// Minimum distance from [`SENTINEL`] for a slot to count as measured.
///
/// A "has been written" heuristic rather than a precision bound: a genuine
/// reading within this distance of the sentinel is treated as missing.
pub const MEASURED_GUARD: f64 = 10.0;

/// Number of sensor kinds, and therefore store slots.
pub const SENSOR_KIND_COUNT: usize = 5;

/// Number of metrics the derived-metrics worker emits per computation.
pub const DERIVED_METRIC_COUNT: usize = 11;

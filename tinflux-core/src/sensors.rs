//! Sensor Kinds and Raw Value Conversion
//!
//! ## Overview
//!
//! The station understands five bricklet kinds. Each kind is pure data: a
//! type name, a unit symbol, a human-readable unit name and the divisor that
//! scales the bricklet's fixed-point integer into a physical value.
//!
//! ```text
//! Kind          Raw unit          Divisor   Physical unit
//! ---------------------------------------------------------
//! Temperature   1/100 °C          100       °C
//! Humidity      1/10 %RH          10        %RH
//! Barometer     1/1000 hPa        1000      hPa
//! Moisture      index             1         index
//! UV light      µW/cm²            1         µW/cm²
//! ```
//!
//! The labels end up verbatim in the telemetry tags (`type`, `unit`,
//! `unitName`), so changing one changes the series it is written to.
//!
//! ## Usage
//!
//! ```rust
//! use tinflux_core::SensorKind;
//!
//! assert_eq!(SensorKind::Temperature.convert(2050), 20.5);
//! assert_eq!(SensorKind::Barometer.unit(), "hPa");
//! ```

use core::fmt;

use crate::constants::sensors::{
    BAROMETER_DIVISOR, HUMIDITY_DIVISOR, MOISTURE_DIVISOR, SENSOR_KIND_COUNT, TEMPERATURE_DIVISOR,
    UV_LIGHT_DIVISOR,
};
use crate::time::Timestamp;

/// Supported sensor kinds
///
/// Discriminants double as measurement store slot indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SensorKind {
    /// Air temperature
    Temperature = 0,
    /// Relative humidity
    Humidity = 1,
    /// Air pressure
    Barometer = 2,
    /// Soil moisture index
    Moisture = 3,
    /// UV light intensity
    UvLight = 4,
}

impl SensorKind {
    /// Every kind, in slot order
    pub const ALL: [SensorKind; SENSOR_KIND_COUNT] = [
        SensorKind::Temperature,
        SensorKind::Humidity,
        SensorKind::Barometer,
        SensorKind::Moisture,
        SensorKind::UvLight,
    ];

    /// Value of the `type` tag
    pub const fn type_name(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "TEMPERATURE",
            SensorKind::Humidity => "HUMIDITY",
            SensorKind::Barometer => "BAROMETER",
            SensorKind::Moisture => "MOISTURE",
            SensorKind::UvLight => "UV",
        }
    }

    /// Value of the `unit` tag
    pub const fn unit(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "°C",
            SensorKind::Humidity => "%RH",
            SensorKind::Barometer => "hPa",
            SensorKind::Moisture => "MOISTURE",
            SensorKind::UvLight => "μW/cm²",
        }
    }

    /// Value of the `unitName` tag
    pub const fn unit_name(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "DEGREE CELSIUS",
            SensorKind::Humidity => "RELATIVE HUMIDITY",
            SensorKind::Barometer => "Air Pressure",
            SensorKind::Moisture => "MOISTURE",
            SensorKind::UvLight => "MICROWATTS PER SQUARE CENTIMETER",
        }
    }

    /// Fixed-point divisor of the bricklet's raw value
    pub const fn divisor(&self) -> f64 {
        match self {
            SensorKind::Temperature => TEMPERATURE_DIVISOR,
            SensorKind::Humidity => HUMIDITY_DIVISOR,
            SensorKind::Barometer => BAROMETER_DIVISOR,
            SensorKind::Moisture => MOISTURE_DIVISOR,
            SensorKind::UvLight => UV_LIGHT_DIVISOR,
        }
    }

    /// Store slot index
    pub const fn index(&self) -> usize {
        *self as usize
    }

    /// Scale a raw bricklet value into physical units
    pub fn convert(&self, raw: i64) -> f64 {
        raw as f64 / self.divisor()
    }

    /// Convert a raw value and stamp it
    pub fn measure(&self, raw: i64, timestamp: Timestamp) -> Measurement {
        Measurement {
            kind: *self,
            value: self.convert(raw),
            timestamp,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// One converted reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// Kind that produced the reading
    pub kind: SensorKind,
    /// Value in the kind's physical unit
    pub value: f64,
    /// Milliseconds since the Unix epoch
    pub timestamp: Timestamp,
}

//! Telemetry point and its line-protocol rendering
//!
//! A point is the wire unit of the station: measurement name = station name,
//! a single float field `value`, three string tags and a UTC timestamp.
//!
//! ```text
//! <station>,type=<type>,unit=<unit>,unitName=<unit name> value=<f64> <unix ms>
//! ```
//!
//! Escaping follows the InfluxDB line protocol: measurement names escape
//! commas and spaces, tag values additionally escape equals signs. Field
//! values are rendered with Rust's shortest round-trip float formatting, so
//! NaN and infinities come out as `NaN`/`inf` and the server rejects them.

use chrono::{DateTime, Utc};
use tinflux_core::Measurement;

/// One timestamped, tagged numeric sample
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryPoint {
    /// Measurement name (the station name)
    pub measurement: String,
    /// `type` tag
    pub sensor_type: String,
    /// `unit` tag
    pub unit: String,
    /// `unitName` tag
    pub unit_name: String,
    /// `value` field
    pub value: f64,
    /// Sample time
    pub timestamp: DateTime<Utc>,
}

impl TelemetryPoint {
    /// Build a point stamped with an explicit time
    pub fn at(
        measurement: impl Into<String>,
        sensor_type: impl Into<String>,
        unit: impl Into<String>,
        unit_name: impl Into<String>,
        value: f64,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            measurement: measurement.into(),
            sensor_type: sensor_type.into(),
            unit: unit.into(),
            unit_name: unit_name.into(),
            value,
            timestamp,
        }
    }

    /// Build a point stamped with the current UTC time
    pub fn now(
        measurement: impl Into<String>,
        sensor_type: impl Into<String>,
        unit: impl Into<String>,
        unit_name: impl Into<String>,
        value: f64,
    ) -> Self {
        Self::at(measurement, sensor_type, unit, unit_name, value, Utc::now())
    }

    /// Build a point from a converted sensor reading
    pub fn from_measurement(measurement: impl Into<String>, reading: &Measurement) -> Self {
        let timestamp = i64::try_from(reading.timestamp)
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        Self::at(
            measurement,
            reading.kind.type_name(),
            reading.kind.unit(),
            reading.kind.unit_name(),
            reading.value,
            timestamp,
        )
    }

    /// Render as one line-protocol line with millisecond precision
    pub fn to_line_protocol(&self) -> String {
        format!(
            "{},type={},unit={},unitName={} value={} {}",
            escape_measurement(&self.measurement),
            escape_tag(&self.sensor_type),
            escape_tag(&self.unit),
            escape_tag(&self.unit_name),
            self.value,
            self.timestamp.timestamp_millis(),
        )
    }
}

fn escape_measurement(name: &str) -> String {
    escape(name, &[',', ' '])
}

fn escape_tag(value: &str) -> String {
    escape(value, &[',', '=', ' '])
}

fn escape(input: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

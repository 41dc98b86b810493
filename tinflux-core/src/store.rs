//! Last-Known Measurement Store
//!
//! ## Overview
//!
//! One slot per [`SensorKind`] holding the most recent converted value. Sensor
//! callbacks write, the derived-metrics worker reads. No history is kept.
//!
//! ## Concurrency
//!
//! Each slot is an `AtomicU64` carrying the bits of an `f64`:
//! - A write to one kind never waits on a write to another
//! - Reads can't observe a half-written value
//! - No global lock, so the store is safe to share through an `Arc`
//!
//! The slots are independent, so a reader may see temperature from one
//! callback round and pressure from the next. The worker tolerates that.
//!
//! ## Sentinel
//!
//! Slots start at [`SENTINEL`] (−1000). A slot is considered measured once it
//! differs from the sentinel by more than [`MEASURED_GUARD`].
//!
//! ```rust
//! use tinflux_core::{MeasurementStore, SensorKind};
//!
//! let store = MeasurementStore::new();
//! assert_eq!(store.get(SensorKind::Humidity), -1000.0);
//!
//! store.set(SensorKind::Humidity, 48.2);
//! assert_eq!(store.get(SensorKind::Humidity), 48.2);
//! ```

use core::sync::atomic::{AtomicU64, Ordering};

use crate::constants::sensors::{MEASURED_GUARD, SENSOR_KIND_COUNT, SENTINEL};
use crate::sensors::SensorKind;

/// Most recent value per sensor kind
#[derive(Debug)]
pub struct MeasurementStore {
    slots: [AtomicU64; SENSOR_KIND_COUNT],
}

impl Default for MeasurementStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MeasurementStore {
    /// Create a store with every slot at the sentinel
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| AtomicU64::new(SENTINEL.to_bits())),
        }
    }

    /// Overwrite the slot for `kind`
    pub fn set(&self, kind: SensorKind, value: f64) {
        self.slots[kind.index()].store(value.to_bits(), Ordering::Release);
    }

    /// Latest value for `kind`, or [`SENTINEL`] if never set
    pub fn get(&self, kind: SensorKind) -> f64 {
        f64::from_bits(self.slots[kind.index()].load(Ordering::Acquire))
    }

    /// Whether `kind` has reported since startup
    pub fn is_measured(&self, kind: SensorKind) -> bool {
        is_measured_value(self.get(kind))
    }

    /// Put every slot back to the sentinel
    pub fn reset(&self) {
        for slot in &self.slots {
            slot.store(SENTINEL.to_bits(), Ordering::Release);
        }
    }
}

/// Has-been-measured heuristic applied to a raw slot value
///
/// NaN compares false, so a NaN slot counts as not measured.
pub fn is_measured_value(value: f64) -> bool {
    libm::fabs(value - SENTINEL) > MEASURED_GUARD
}

//! Error types for the station data model
//!
//! Kept `Copy` and allocation-free like the rest of the crate. The only
//! failure the core can report is a derived-metric computation that was
//! asked for before all of its inputs have been measured; degenerate
//! numeric inputs are not an error (they surface as NaN/Inf).

use thiserror_no_std::Error;

use crate::sensors::SensorKind;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Core errors
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum CoreError {
    /// A required input still holds the "never measured" sentinel
    #[error("{kind} has not been measured yet (slot value {value})")]
    MissingInput {
        /// Sensor kind whose slot failed the has-been-measured check
        kind: SensorKind,
        /// Value found in the slot
        value: f64,
    },
}

//! Physical Constants for Tinflux
//!
//! Coefficients behind the derived-metrics worker. All formulas use SI units
//! internally (K, Pa, kg/m³); conversion to display units happens only when
//! the metric set is assembled.

// ===== TEMPERATURE =====

/// Offset between Celsius and Kelvin (K).
///
/// Source: NIST Special Publication 330 (2019)
pub const ABSOLUTE_ZERO_OFFSET_K: f64 = 273.15;

// ===== MAGNUS FORMULA =====

/// Saturation vapor pressure at 0°C (Pa).
///
/// Leading factor of the Magnus formula over liquid water:
/// `e_sat = 611.2 · exp(17.62·T / (243.12 + T))`.
///
/// Source: WMO Guide to Meteorological Instruments (WMO-No. 8), Annex 4.B
pub const MAGNUS_BASE_PRESSURE_PA: f64 = 611.2;

/// Magnus formula coefficient (dimensionless).
///
/// Source: WMO-No. 8, Annex 4.B
pub const MAGNUS_COEFFICIENT: f64 = 17.62;

/// Magnus formula temperature offset (°C).
///
/// Source: WMO-No. 8, Annex 4.B
pub const MAGNUS_TEMPERATURE_OFFSET_C: f64 = 243.12;

// ===== GAS CONSTANTS =====

/// Specific gas constant of water vapor (J/(kg·K)).
///
/// Source: Wagner & Pruß, IAPWS-95
pub const GAS_CONSTANT_WATER_VAPOR: f64 = 461.51;

/// Specific gas constant of dry air (J/(kg·K)).
///
/// Source: International Standard Atmosphere (ISO 2533:1975)
pub const GAS_CONSTANT_DRY_AIR: f64 = 287.058;

// ===== STANDARD ATMOSPHERE =====

/// Standard atmospheric pressure at sea level (Pa).
///
/// Source: International Standard Atmosphere (ISA)
pub const SEA_LEVEL_PRESSURE_PA: f64 = 101_325.0;

/// Exponent of the international barometric formula (dimensionless).
///
/// `g·M / (R·L)` for the ISA troposphere, rounded as in the standard
/// hypsometric approximation.
pub const BAROMETRIC_EXPONENT: f64 = 5.255;

/// Tropospheric temperature lapse rate (K/m).
///
/// Source: International Standard Atmosphere (ISA)
pub const TEMPERATURE_LAPSE_RATE_K_PER_M: f64 = 0.0065;

// ===== UNIT CONVERSION =====

/// Pascal per hectopascal.
pub const PA_PER_HPA: f64 = 100.0;

/// Grams per kilogram, used for densities (g/m³) and ratios (g/kg).
pub const G_PER_KG: f64 = 1000.0;

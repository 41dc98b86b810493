//! Derived Atmospheric Metrics from Temperature, Humidity and Pressure
//!
//! ## Physics Background
//!
//! ### Saturation Vapor Pressure
//!
//! Warm air can hold more water vapor than cold air. The Magnus formula
//! approximates the partial pressure at which vapor condenses:
//!
//! ```text
//! e_sat = 611.2 × exp(17.62·T / (243.12 + T))      [Pa, T in °C]
//! e     = RH × e_sat                               actual vapor pressure
//! ```
//!
//! ### Densities
//!
//! Moist air is treated as an ideal mixture of dry air and water vapor:
//!
//! ```text
//! ρ_wv = e / (R_v · T)                 R_v = 461.51 J/(kg·K)
//! ρ_da = (p − e) / (R_d · T)           R_d = 287.058 J/(kg·K)
//! ρ_ha = ρ_wv + ρ_da
//! ```
//!
//! Specific humidity is the vapor share of the humid air mass (ρ_wv/ρ_ha),
//! the mixing ratio compares vapor to dry air (ρ_wv/ρ_da). Repeating the
//! density step with e_sat gives the specific humidity the air could hold.
//!
//! ### Dew Point
//!
//! Inverting Magnus for the actual vapor pressure:
//!
//! ```text
//! t_d = 243.12 × ln(e/611.2) / (17.62 − ln(e/611.2))
//! ```
//!
//! ### Altitude
//!
//! Hypsometric form of the international barometric formula, shifted by the
//! station's configured offset:
//!
//! ```text
//! h = ((101325 / p)^(1/5.255) − 1) × T / 0.0065 + h₀
//! ```
//!
//! ## Degenerate Inputs
//!
//! No range checks happen here. Zero humidity turns the dew point into NaN
//! (−∞/∞), non-positive pressure yields a NaN or infinite altitude, and those
//! values are written to telemetry unchanged.
//!
//! ## Example
//!
//! ```rust
//! use tinflux_core::{PsychrometricInputs, Psychrometrics};
//!
//! let inputs = PsychrometricInputs {
//!     temperature_c: 20.0,
//!     relative_humidity_pct: 50.0,
//!     pressure_hpa: 1013.25,
//!     altitude_offset_m: 0.0,
//! };
//! let metrics = Psychrometrics::compute(&inputs);
//! assert!((metrics.dew_point_c - 9.26).abs() < 0.05);
//! ```

use crate::{
    constants::physics::{
        ABSOLUTE_ZERO_OFFSET_K, BAROMETRIC_EXPONENT, GAS_CONSTANT_DRY_AIR,
        GAS_CONSTANT_WATER_VAPOR, G_PER_KG, MAGNUS_BASE_PRESSURE_PA, MAGNUS_COEFFICIENT,
        MAGNUS_TEMPERATURE_OFFSET_C, PA_PER_HPA, SEA_LEVEL_PRESSURE_PA,
        TEMPERATURE_LAPSE_RATE_K_PER_M,
    },
    constants::sensors::DERIVED_METRIC_COUNT,
    errors::{CoreError, CoreResult},
    sensors::SensorKind,
    store::{is_measured_value, MeasurementStore},
};

#[cfg(feature = "log")]
macro_rules! log_warn {
    ($($arg:tt)*) => { log::warn!($($arg)*) };
}

#[cfg(not(feature = "log"))]
macro_rules! log_warn {
    ($($arg:tt)*) => {};
}

/// Value of the `type` tag on every derived metric
pub const CALCULATOR_TYPE: &str = "CALCULATOR";

/// Kinds the computation needs, in the order they are checked
pub const REQUIRED_INPUTS: [SensorKind; 3] = [
    SensorKind::Temperature,
    SensorKind::Humidity,
    SensorKind::Barometer,
];

/// Inputs to one computation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PsychrometricInputs {
    /// Air temperature (°C)
    pub temperature_c: f64,
    /// Relative humidity (%, 0-100)
    pub relative_humidity_pct: f64,
    /// Air pressure (hPa)
    pub pressure_hpa: f64,
    /// Station altitude offset added to the barometric altitude (m)
    pub altitude_offset_m: f64,
}

impl PsychrometricInputs {
    /// Snapshot the store, failing on the first required kind that has not
    /// been measured yet
    pub fn from_store(store: &MeasurementStore, altitude_offset_m: f64) -> CoreResult<Self> {
        let mut values = [0.0; REQUIRED_INPUTS.len()];
        for (slot, kind) in values.iter_mut().zip(REQUIRED_INPUTS) {
            let value = store.get(kind);
            if !is_measured_value(value) {
                return Err(CoreError::MissingInput { kind, value });
            }
            *slot = value;
        }

        Ok(Self {
            temperature_c: values[0],
            relative_humidity_pct: values[1],
            pressure_hpa: values[2],
            altitude_offset_m,
        })
    }
}

/// Result of one computation, every field rounded with [`round3`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Psychrometrics {
    /// Saturation vapor pressure (hPa)
    pub saturation_vapor_pressure_hpa: f64,
    /// Actual vapor partial pressure (hPa)
    pub vapor_pressure_hpa: f64,
    /// Specific humidity (g/kg)
    pub specific_humidity_g_per_kg: f64,
    /// Specific humidity at saturation (g/kg)
    pub max_specific_humidity_g_per_kg: f64,
    /// Mixing ratio (g/kg)
    pub mixing_ratio_g_per_kg: f64,
    /// Water vapor density (g/m³)
    pub water_vapor_density_g_per_m3: f64,
    /// Dry air density (g/m³)
    pub dry_air_density_g_per_m3: f64,
    /// Humid air density (g/m³)
    pub humid_air_density_g_per_m3: f64,
    /// Dew point (°C)
    pub dew_point_c: f64,
    /// Absolute humidity (g/m³), equal to the water vapor density
    pub absolute_humidity_g_per_m3: f64,
    /// Barometric altitude plus offset (m)
    pub altitude_m: f64,
}

/// One labelled metric ready for telemetry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedMetric {
    /// Written as the `unitName` tag
    pub label: &'static str,
    /// Written as the `unit` tag
    pub unit: &'static str,
    /// Rounded value
    pub value: f64,
}

/// All metrics of one computation, in emission order
pub type DerivedMetricSet = [DerivedMetric; DERIVED_METRIC_COUNT];

/// Densities of the vapor/dry-air mixture at vapor pressure `e`
#[derive(Debug, Clone, Copy)]
struct AirDensities {
    water_vapor: f64,
    dry_air: f64,
}

impl AirDensities {
    fn at(vapor_pressure_pa: f64, pressure_pa: f64, temperature_k: f64) -> Self {
        Self {
            water_vapor: vapor_pressure_pa / (GAS_CONSTANT_WATER_VAPOR * temperature_k),
            dry_air: (pressure_pa - vapor_pressure_pa) / (GAS_CONSTANT_DRY_AIR * temperature_k),
        }
    }

    fn humid_air(&self) -> f64 {
        self.water_vapor + self.dry_air
    }

    fn specific_humidity(&self) -> f64 {
        self.water_vapor / self.humid_air()
    }
}

/// Magnus saturation vapor pressure over water (Pa)
pub fn saturation_vapor_pressure_pa(temperature_c: f64) -> f64 {
    MAGNUS_BASE_PRESSURE_PA
        * libm::exp(MAGNUS_COEFFICIENT * temperature_c / (MAGNUS_TEMPERATURE_OFFSET_C + temperature_c))
}

/// Dew point for a given vapor pressure (°C)
pub fn dew_point_c(vapor_pressure_pa: f64) -> f64 {
    let ln_ratio = libm::log(vapor_pressure_pa / MAGNUS_BASE_PRESSURE_PA);
    MAGNUS_TEMPERATURE_OFFSET_C * ln_ratio / (MAGNUS_COEFFICIENT - ln_ratio)
}

/// Barometric altitude above the standard sea-level pressure (m)
pub fn barometric_altitude_m(pressure_pa: f64, temperature_k: f64) -> f64 {
    (libm::pow(SEA_LEVEL_PRESSURE_PA / pressure_pa, 1.0 / BAROMETRIC_EXPONENT) - 1.0)
        * (temperature_k / TEMPERATURE_LAPSE_RATE_K_PER_M)
}

/// Round to three decimal digits, halves away from zero
///
/// `libm::round` rounds halves away from zero, unlike banker's rounding.
pub fn round3(value: f64) -> f64 {
    libm::round(value * 1000.0) / 1000.0
}

impl Psychrometrics {
    /// Run the full computation
    pub fn compute(inputs: &PsychrometricInputs) -> Self {
        let temperature_k = inputs.temperature_c + ABSOLUTE_ZERO_OFFSET_K;
        let pressure_pa = inputs.pressure_hpa * PA_PER_HPA;
        let humidity_fraction = inputs.relative_humidity_pct / 100.0;

        let saturation_pa = saturation_vapor_pressure_pa(inputs.temperature_c);
        let vapor_pa = humidity_fraction * saturation_pa;
        let max_vapor_pa = 1.0 * saturation_pa;

        let actual = AirDensities::at(vapor_pa, pressure_pa, temperature_k);
        let saturated = AirDensities::at(max_vapor_pa, pressure_pa, temperature_k);

        let mixing_ratio = actual.water_vapor / actual.dry_air;
        let altitude = barometric_altitude_m(pressure_pa, temperature_k) + inputs.altitude_offset_m;

        let result = Self {
            saturation_vapor_pressure_hpa: round3(saturation_pa / PA_PER_HPA),
            vapor_pressure_hpa: round3(vapor_pa / PA_PER_HPA),
            specific_humidity_g_per_kg: round3(actual.specific_humidity() * G_PER_KG),
            max_specific_humidity_g_per_kg: round3(saturated.specific_humidity() * G_PER_KG),
            mixing_ratio_g_per_kg: round3(mixing_ratio * G_PER_KG),
            water_vapor_density_g_per_m3: round3(actual.water_vapor * G_PER_KG),
            dry_air_density_g_per_m3: round3(actual.dry_air * G_PER_KG),
            humid_air_density_g_per_m3: round3(actual.humid_air() * G_PER_KG),
            dew_point_c: round3(dew_point_c(vapor_pa)),
            absolute_humidity_g_per_m3: round3(actual.water_vapor * G_PER_KG),
            altitude_m: round3(altitude),
        };

        if result.metrics().iter().any(|m| !m.value.is_finite()) {
            log_warn!(
                "Non-finite derived metrics for T={} RH={} p={}",
                inputs.temperature_c,
                inputs.relative_humidity_pct,
                inputs.pressure_hpa
            );
        }

        result
    }

    /// Labelled metrics in emission order
    pub fn metrics(&self) -> DerivedMetricSet {
        let metric = |label, unit, value| DerivedMetric { label, unit, value };
        [
            metric("SATURATION VAPOR PRESSURE", "hPa", self.saturation_vapor_pressure_hpa),
            metric("VAPOR PARTIAL PRESSURE", "hPa", self.vapor_pressure_hpa),
            metric("SPECIFIC HUMIDITY", "g/kg", self.specific_humidity_g_per_kg),
            metric("MAX SPECIFIC HUMIDITY", "g/kg", self.max_specific_humidity_g_per_kg),
            metric("MIXING RATIO", "g/kg", self.mixing_ratio_g_per_kg),
            metric("WATER VAPOR DENSITY", "g/m³", self.water_vapor_density_g_per_m3),
            metric("DRY AIR DENSITY", "g/m³", self.dry_air_density_g_per_m3),
            metric("HUMID AIR DENSITY", "g/m³", self.humid_air_density_g_per_m3),
            metric("DEW POINT", "°C", self.dew_point_c),
            metric("ABSOLUTE HUMIDITY", "g/m³", self.absolute_humidity_g_per_m3),
            metric("ALTITUDE", "m", self.altitude_m),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::sensors::SENTINEL;
    use proptest::prelude::*;

    fn reference_inputs() -> PsychrometricInputs {
        PsychrometricInputs {
            temperature_c: 20.0,
            relative_humidity_pct: 50.0,
            pressure_hpa: 1013.25,
            altitude_offset_m: 0.0,
        }
    }

    #[test]
    fn reference_scenario() {
        let m = Psychrometrics::compute(&reference_inputs());

        assert!((m.saturation_vapor_pressure_hpa - 23.326).abs() < 0.01);
        assert!((m.vapor_pressure_hpa - 11.663).abs() < 0.01);
        assert!((m.dew_point_c - 9.26).abs() < 0.05);
        assert!(m.altitude_m.abs() < 1.0);
        assert!((m.specific_humidity_g_per_kg - 7.191).abs() < 0.01);
        assert!((m.max_specific_humidity_g_per_kg - 14.445).abs() < 0.01);
        assert!((m.mixing_ratio_g_per_kg - 7.243).abs() < 0.01);
        assert!((m.water_vapor_density_g_per_m3 - 8.621).abs() < 0.01);
        assert!((m.dry_air_density_g_per_m3 - 1190.225).abs() < 0.01);
        assert!((m.humid_air_density_g_per_m3 - 1198.846).abs() < 0.01);
    }

    #[test]
    fn absolute_humidity_equals_vapor_density() {
        let m = Psychrometrics::compute(&reference_inputs());
        assert_eq!(m.absolute_humidity_g_per_m3, m.water_vapor_density_g_per_m3);
    }

    #[test]
    fn altitude_offset_is_added() {
        let mut inputs = reference_inputs();
        inputs.altitude_offset_m = 250.0;
        let m = Psychrometrics::compute(&inputs);
        assert!((m.altitude_m - 250.0).abs() < 1.0);
    }

    #[test]
    fn lower_pressure_means_higher_altitude() {
        let mut inputs = reference_inputs();
        inputs.pressure_hpa = 950.0;
        let m = Psychrometrics::compute(&inputs);
        assert!((m.altitude_m - 556.59).abs() < 0.5);
    }

    #[test]
    fn metrics_are_labelled_in_order() {
        let metrics = Psychrometrics::compute(&reference_inputs()).metrics();
        assert_eq!(metrics.len(), 11);
        assert_eq!(metrics[0].label, "SATURATION VAPOR PRESSURE");
        assert_eq!(metrics[0].unit, "hPa");
        assert_eq!(metrics[8].label, "DEW POINT");
        assert_eq!(metrics[8].unit, "°C");
        assert_eq!(metrics[10].label, "ALTITUDE");
        assert_eq!(metrics[10].unit, "m");
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        assert_eq!(round3(1.23456), 1.235);
        assert_eq!(round3(-1.23456), -1.235);
        assert_eq!(round3(0.0005), 0.001);
        assert_eq!(round3(-0.0005), -0.001);
        assert_eq!(round3(2.0), 2.0);
    }

    #[test]
    fn degenerate_inputs_propagate() {
        let mut inputs = reference_inputs();
        inputs.relative_humidity_pct = 0.0;
        inputs.pressure_hpa = 0.0;
        let m = Psychrometrics::compute(&inputs);

        assert!(m.dew_point_c.is_nan());
        assert!(!m.altitude_m.is_finite());
        assert!(m.mixing_ratio_g_per_kg.is_nan());
    }

    #[test]
    fn from_store_requires_all_three_inputs() {
        let store = MeasurementStore::new();
        store.set(SensorKind::Temperature, 20.0);
        store.set(SensorKind::Humidity, 50.0);

        let err = PsychrometricInputs::from_store(&store, 0.0).unwrap_err();
        assert_eq!(
            err,
            CoreError::MissingInput {
                kind: SensorKind::Barometer,
                value: SENTINEL
            }
        );

        store.set(SensorKind::Barometer, 1013.25);
        let inputs = PsychrometricInputs::from_store(&store, 12.0).unwrap();
        assert_eq!(inputs.pressure_hpa, 1013.25);
        assert_eq!(inputs.altitude_offset_m, 12.0);
    }

    #[test]
    fn from_store_uses_guard_heuristic() {
        let store = MeasurementStore::new();
        store.set(SensorKind::Temperature, -995.0);
        store.set(SensorKind::Humidity, 50.0);
        store.set(SensorKind::Barometer, 1013.25);

        assert!(matches!(
            PsychrometricInputs::from_store(&store, 0.0),
            Err(CoreError::MissingInput { kind: SensorKind::Temperature, .. })
        ));
    }

    proptest! {
        #[test]
        fn round3_is_odd(x in -1.0e6f64..1.0e6) {
            prop_assert_eq!(round3(-x), -round3(x));
        }

        #[test]
        fn dew_point_never_exceeds_temperature(t in -30.0f64..45.0, rh in 1.0f64..100.0) {
            let inputs = PsychrometricInputs {
                temperature_c: t,
                relative_humidity_pct: rh,
                pressure_hpa: 1000.0,
                altitude_offset_m: 0.0,
            };
            let m = Psychrometrics::compute(&inputs);
            prop_assert!(m.dew_point_c <= round3(t) + 0.002);
        }
    }
}

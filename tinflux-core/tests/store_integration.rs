//! Integration tests for the callback → store → derived metrics path
//!
//! Several threads play the hub's sensor callbacks while the main thread
//! plays the derived-metrics worker.

use std::sync::Arc;
use std::thread;

use proptest::prelude::*;
use tinflux_core::constants::sensors::SENTINEL;
use tinflux_core::{CoreError, MeasurementStore, PsychrometricInputs, Psychrometrics, SensorKind};

#[test]
fn concurrent_callbacks_feed_the_computation() {
    let store = Arc::new(MeasurementStore::new());

    let raw_streams: [(SensorKind, Vec<i64>); 3] = [
        (SensorKind::Temperature, (1900..=2000).collect()),
        (SensorKind::Humidity, (400..=500).collect()),
        (SensorKind::Barometer, (1_012_250..=1_013_250).step_by(10).collect()),
    ];

    let handles: Vec<_> = raw_streams
        .into_iter()
        .map(|(kind, raws)| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                for raw in raws {
                    store.set(kind, kind.convert(raw));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    // Last value per kind wins
    assert_eq!(store.get(SensorKind::Temperature), 20.0);
    assert_eq!(store.get(SensorKind::Humidity), 50.0);
    assert_eq!(store.get(SensorKind::Barometer), 1013.25);
    assert_eq!(store.get(SensorKind::Moisture), SENTINEL);

    let inputs = PsychrometricInputs::from_store(&store, 0.0).unwrap();
    let metrics = Psychrometrics::compute(&inputs);
    assert!((metrics.dew_point_c - 9.26).abs() < 0.05);
    assert!((metrics.saturation_vapor_pressure_hpa - 23.33).abs() < 0.01);
}

#[test]
fn unrelated_kinds_do_not_unlock_the_computation() {
    let store = MeasurementStore::new();
    store.set(SensorKind::Moisture, 77.0);
    store.set(SensorKind::UvLight, 42.0);
    store.set(SensorKind::Temperature, 20.0);

    assert!(matches!(
        PsychrometricInputs::from_store(&store, 0.0),
        Err(CoreError::MissingInput {
            kind: SensorKind::Humidity,
            ..
        })
    ));
}

proptest! {
    /// Any realistic reading set produces a humid air density between the
    /// dry air density and dry air + vapor
    #[test]
    fn densities_are_consistent(
        t_raw in -3000i64..4500,
        rh_raw in 10i64..1000,
        p_raw in 800_000i64..1_100_000,
    ) {
        let store = MeasurementStore::new();
        store.set(SensorKind::Temperature, SensorKind::Temperature.convert(t_raw));
        store.set(SensorKind::Humidity, SensorKind::Humidity.convert(rh_raw));
        store.set(SensorKind::Barometer, SensorKind::Barometer.convert(p_raw));

        let inputs = PsychrometricInputs::from_store(&store, 0.0).unwrap();
        let m = Psychrometrics::compute(&inputs);

        // Each side is rounded separately
        let sum = m.dry_air_density_g_per_m3 + m.water_vapor_density_g_per_m3;
        prop_assert!((m.humid_air_density_g_per_m3 - sum).abs() <= 0.002);
        prop_assert!(m.specific_humidity_g_per_kg <= m.max_specific_humidity_g_per_kg);
        prop_assert!(m.dew_point_c <= inputs.temperature_c + 0.001);
    }
}

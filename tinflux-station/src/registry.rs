//! Sensor discovery and registration
//!
//! Maps hub device identifiers to [`SensorKind`]s and wires each recognised
//! device to the measurement store and the telemetry queue.
//!
//! The hub only pushes a device's value when it changed, and at most once
//! per callback period (deduplicated periodic push). Nothing here rate
//! limits on its own.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use tinflux_connectors::tinkerforge::device;
use tinflux_connectors::{Announcement, EnumerationType, HubClient, ReadingHandler};
use tinflux_core::time::{SystemTime, TimeSource};
use tinflux_core::{MeasurementStore, SensorKind};

use crate::error::StationResult;
use crate::telemetry::TelemetryQueue;

/// Where the hub's enumerate handler sends announcements; `None` outside an
/// enumeration window
type AnnouncementSlot = Arc<Mutex<Option<mpsc::UnboundedSender<Announcement>>>>;

/// Device identifier → sensor kind
pub const SENSOR_TABLE: [(u16, SensorKind); 5] = [
    (device::TEMPERATURE, SensorKind::Temperature),
    (device::HUMIDITY, SensorKind::Humidity),
    (device::BAROMETER, SensorKind::Barometer),
    (device::MOISTURE, SensorKind::Moisture),
    (device::UV_LIGHT, SensorKind::UvLight),
];

/// Look up the kind of a device, `None` for devices the station ignores
pub fn kind_for_device(device_identifier: u16) -> Option<SensorKind> {
    SENSOR_TABLE
        .iter()
        .find(|(id, _)| *id == device_identifier)
        .map(|(_, kind)| *kind)
}

/// A registered device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSensor {
    pub uid: String,
    pub device_identifier: u16,
    pub kind: SensorKind,
}

impl fmt::Display for ActiveSensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} Sensor measures {} ({})",
            self.kind.type_name(),
            self.kind.unit_name(),
            self.kind.unit()
        )
    }
}

/// Registered sensors in enumeration order
pub struct SensorRegistry {
    hub: Arc<dyn HubClient>,
    store: Arc<MeasurementStore>,
    queue: TelemetryQueue,
    clock: Arc<dyn TimeSource>,
    period: Duration,
    active: Vec<ActiveSensor>,
    announcements: AnnouncementSlot,
    listening: bool,
}

impl SensorRegistry {
    pub fn new(
        hub: Arc<dyn HubClient>,
        store: Arc<MeasurementStore>,
        queue: TelemetryQueue,
        period: Duration,
    ) -> Self {
        Self {
            hub,
            store,
            queue,
            clock: Arc::new(SystemTime),
            period,
            active: Vec::new(),
            announcements: Arc::new(Mutex::new(None)),
            listening: false,
        }
    }

    /// Stamp readings from `clock` instead of the system clock
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = clock;
        self
    }

    pub fn active(&self) -> &[ActiveSensor] {
        &self.active
    }

    /// Subscribe to `uid` if its device type is known
    ///
    /// Unknown devices are skipped with a debug log. Every raw value pushed
    /// afterwards is converted, stored and queued for telemetry.
    pub async fn register_if_known(
        &mut self,
        device_identifier: u16,
        uid: &str,
    ) -> StationResult<Option<ActiveSensor>> {
        let Some(kind) = kind_for_device(device_identifier) else {
            debug!("Ignoring device {} with identifier {}", uid, device_identifier);
            return Ok(None);
        };

        let store = Arc::clone(&self.store);
        let queue = self.queue.clone();
        let clock = Arc::clone(&self.clock);
        let handler: ReadingHandler = Arc::new(move |raw| {
            let reading = kind.measure(raw, clock.now());
            store.set(kind, reading.value);
            queue.submit(reading);
        });

        self.hub
            .subscribe(uid, device_identifier, self.period, handler)
            .await?;

        let sensor = ActiveSensor {
            uid: uid.to_string(),
            device_identifier,
            kind,
        };
        debug!("Registered {} bricklet {}", kind, uid);
        self.active.push(sensor.clone());
        Ok(Some(sensor))
    }

    /// Enumerate and register what answers within `grace`
    ///
    /// Announcements that arrive after the grace period are dropped. Devices
    /// already registered are not subscribed again. The hub gets a single
    /// enumerate handler however often this is called.
    pub async fn enumerate(&mut self, grace: Duration) -> StationResult<&[ActiveSensor]> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Announcement>();
        *lock(&self.announcements) = Some(tx);
        if !self.listening {
            let slot = Arc::clone(&self.announcements);
            self.hub.on_enumerate(Arc::new(move |announcement: Announcement| {
                if let Some(tx) = lock(&slot).as_ref() {
                    let _ = tx.send(announcement);
                }
            }));
            self.listening = true;
        }

        let requested = self.hub.enumerate().await;
        if requested.is_ok() {
            tokio::time::sleep(grace).await;
        }
        lock(&self.announcements).take();
        requested?;

        while let Ok(announcement) = rx.try_recv() {
            if announcement.enumeration_type == EnumerationType::Disconnected {
                warn!("No IP connection! Device {} disconnected", announcement.uid);
                continue;
            }
            if self.active.iter().any(|s| s.uid == announcement.uid) {
                continue;
            }
            if let Err(e) = self
                .register_if_known(announcement.device_identifier, &announcement.uid)
                .await
            {
                warn!("Could not register device {}: {}", announcement.uid, e);
            }
        }

        info!("Enumeration found {} supported sensors", self.active.len());
        Ok(&self.active)
    }
}

fn lock(slot: &AnnouncementSlot) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<Announcement>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_every_kind_once() {
        for kind in SensorKind::ALL {
            let count = SENSOR_TABLE.iter().filter(|(_, k)| *k == kind).count();
            assert_eq!(count, 1, "{} appears {} times", kind, count);
        }
    }

    #[test]
    fn known_and_unknown_devices() {
        assert_eq!(kind_for_device(216), Some(SensorKind::Temperature));
        assert_eq!(kind_for_device(27), Some(SensorKind::Humidity));
        assert_eq!(kind_for_device(221), Some(SensorKind::Barometer));
        assert_eq!(kind_for_device(232), Some(SensorKind::Moisture));
        assert_eq!(kind_for_device(265), Some(SensorKind::UvLight));
        assert_eq!(kind_for_device(13), None);
    }

    #[test]
    fn summary_line() {
        let sensor = ActiveSensor {
            uid: "qNH".into(),
            device_identifier: 27,
            kind: SensorKind::Humidity,
        };
        assert_eq!(
            sensor.to_string(),
            "HUMIDITY Sensor measures RELATIVE HUMIDITY (%RH)"
        );
    }
}

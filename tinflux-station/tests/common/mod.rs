//! Shared fakes for the station integration tests
//!
//! - [`MockHub`]: scripted connect failures, canned announcements, manual
//!   value pushes
//! - [`MockSink`]: records points, fails on demand

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tinflux_connectors::{
    Announcement, ConnectionStats, ConnectorError, EnumerateHandler, EnumerationType, HubClient,
    ReadingHandler, TelemetryPoint, TelemetrySink,
};
use tinflux_station::StationConfig;
use tokio::sync::watch;
use tokio::time::Instant;

pub const TEMPERATURE: u16 = 216;
pub const HUMIDITY: u16 = 27;
pub const BAROMETER: u16 = 221;
pub const MOISTURE: u16 = 232;
pub const UV_LIGHT: u16 = 265;

/// Device type the station does not know
pub const DUAL_BUTTON: u16 = 230;

pub fn announcement(uid: &str, device_identifier: u16, enumeration_type: EnumerationType) -> Announcement {
    Announcement {
        uid: uid.to_string(),
        connected_uid: "6Dd".to_string(),
        position: 'a',
        device_identifier,
        enumeration_type,
    }
}

pub fn available(uid: &str, device_identifier: u16) -> Announcement {
    announcement(uid, device_identifier, EnumerationType::Available)
}

/// Seven-argument configuration: 5 s period, 10 s worker interval
pub fn test_config() -> StationConfig {
    let args: Vec<String> = [
        "garden",
        "brickd.local",
        "4223",
        "http://influx:8086",
        "weather",
        "station",
        "secret",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();
    StationConfig::from_args(&args).unwrap()
}

#[derive(Clone)]
pub struct Subscription {
    pub device_identifier: u16,
    pub period: Duration,
    handler: ReadingHandler,
}

/// In-memory hub
pub struct MockHub {
    connected: watch::Sender<bool>,
    failures_left: AtomicU32,
    connect_attempts: Mutex<Vec<Instant>>,
    disconnects: AtomicU32,
    devices: Mutex<Vec<Announcement>>,
    enumerate_handlers: Mutex<Vec<EnumerateHandler>>,
    subscriptions: Mutex<Vec<(String, Subscription)>>,
}

impl Default for MockHub {
    fn default() -> Self {
        Self {
            connected: watch::channel(false).0,
            failures_left: AtomicU32::default(),
            connect_attempts: Mutex::default(),
            disconnects: AtomicU32::default(),
            devices: Mutex::default(),
            enumerate_handlers: Mutex::default(),
            subscriptions: Mutex::default(),
        }
    }
}

impl MockHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `times` connects
    pub fn failing(times: u32) -> Self {
        let hub = Self::new();
        hub.failures_left.store(times, Ordering::SeqCst);
        hub
    }

    pub fn connected() -> Self {
        let hub = Self::new();
        hub.connected.send_replace(true);
        hub
    }

    /// Devices announced in reply to `enumerate`
    pub fn with_devices(self, devices: Vec<Announcement>) -> Self {
        *self.devices.lock().unwrap() = devices;
        self
    }

    /// Attach another device, announced from the next `enumerate` on
    pub fn plug(&self, device: Announcement) {
        self.devices.lock().unwrap().push(device);
    }

    pub fn enumerate_handler_count(&self) -> usize {
        self.enumerate_handlers.lock().unwrap().len()
    }

    pub fn connect_attempts(&self) -> Vec<Instant> {
        self.connect_attempts.lock().unwrap().clone()
    }

    pub fn disconnects(&self) -> u32 {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Drop the link as a restarting daemon would
    pub fn lose_connection(&self) {
        self.connected.send_replace(false);
    }

    /// Deliver an announcement outside of an enumerate request
    pub fn announce(&self, announcement: Announcement) {
        let handlers = self.enumerate_handlers.lock().unwrap().clone();
        for handler in handlers {
            handler(announcement.clone());
        }
    }

    pub fn subscriptions(&self) -> HashMap<String, Subscription> {
        self.subscriptions.lock().unwrap().iter().cloned().collect()
    }

    pub fn subscribed_uids(&self) -> Vec<String> {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .map(|(uid, _)| uid.clone())
            .collect()
    }

    /// Push a raw value as the hub's read task would. Returns `false` if
    /// nothing is subscribed to `uid`.
    pub fn push(&self, uid: &str, raw: i64) -> bool {
        let handler = self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u == uid)
            .map(|(_, sub)| Arc::clone(&sub.handler));
        match handler {
            Some(handler) => {
                handler(raw);
                true
            }
            None => false,
        }
    }
}

#[async_trait::async_trait]
impl HubClient for MockHub {
    async fn connect(&self, _host: &str, _port: u16) -> Result<(), ConnectorError> {
        self.connect_attempts.lock().unwrap().push(Instant::now());

        let failing = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ConnectorError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused",
            )));
        }

        self.connected.send_replace(true);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    async fn connection_lost(&self) {
        let mut connected = self.connected.subscribe();
        let _ = connected.wait_for(|up| !*up).await;
    }

    fn on_enumerate(&self, handler: EnumerateHandler) {
        self.enumerate_handlers.lock().unwrap().push(handler);
    }

    async fn enumerate(&self) -> Result<(), ConnectorError> {
        if !self.is_connected() {
            return Err(ConnectorError::NotConnected);
        }
        let devices = self.devices.lock().unwrap().clone();
        for device in devices {
            self.announce(device);
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        uid: &str,
        device_identifier: u16,
        period: Duration,
        handler: ReadingHandler,
    ) -> Result<(), ConnectorError> {
        self.subscriptions.lock().unwrap().push((
            uid.to_string(),
            Subscription {
                device_identifier,
                period,
                handler,
            },
        ));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ConnectorError> {
        self.connected.send_replace(false);
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Recording telemetry sink
#[derive(Default)]
pub struct MockSink {
    points: Mutex<Vec<TelemetryPoint>>,
    failing: AtomicBool,
    stats: Mutex<ConnectionStats>,
}

impl MockSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write fail until switched back
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn points(&self) -> Vec<TelemetryPoint> {
        self.points.lock().unwrap().clone()
    }

    /// Writes that returned an error
    pub fn failed(&self) -> u64 {
        self.stats.lock().unwrap().messages_failed
    }

    pub fn points_of_type(&self, sensor_type: &str) -> Vec<TelemetryPoint> {
        self.points()
            .into_iter()
            .filter(|p| p.sensor_type == sensor_type)
            .collect()
    }
}

#[async_trait::async_trait]
impl TelemetrySink for MockSink {
    async fn write(&self, point: &TelemetryPoint) -> Result<(), ConnectorError> {
        let mut stats = self.stats.lock().unwrap();
        if self.failing.load(Ordering::SeqCst) {
            stats.messages_failed += 1;
            stats.last_error = Some("influx down".into());
            return Err(ConnectorError::Transport("influx down".into()));
        }
        stats.messages_sent += 1;
        self.points.lock().unwrap().push(point.clone());
        Ok(())
    }

    fn stats(&self) -> ConnectionStats {
        self.stats.lock().unwrap().clone()
    }
}

//! Sensor hub abstraction
//!
//! The hub owns the physical bricklets. The station needs a connection it
//! can watch, an enumeration of attached devices, a way to subscribe to a
//! device's raw values, and a disconnect.
//!
//! Handlers run on the hub client's delivery context (for the Tinkerforge
//! client, its socket read task) and must return quickly. Handlers for
//! different devices may run concurrently.

use std::sync::Arc;
use std::time::Duration;

use crate::ConnectorError;

/// Called with each raw integer value a subscribed device pushes
pub type ReadingHandler = Arc<dyn Fn(i64) + Send + Sync>;

/// Called with each device announcement
pub type EnumerateHandler = Arc<dyn Fn(Announcement) + Send + Sync>;

/// Why a device was announced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumerationType {
    /// Reply to an explicit enumerate request
    Available,
    /// Device was plugged in or the hub restarted
    Connected,
    /// Device went away
    Disconnected,
}

impl EnumerationType {
    /// Decode the wire value
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            0 => Some(EnumerationType::Available),
            1 => Some(EnumerationType::Connected),
            2 => Some(EnumerationType::Disconnected),
            _ => None,
        }
    }
}

/// A device reported during enumeration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Device uid (base58)
    pub uid: String,
    /// Uid of the brick the device hangs off
    pub connected_uid: String,
    /// Port letter on the parent brick
    pub position: char,
    /// Device type constant
    pub device_identifier: u16,
    /// Why the device was announced
    pub enumeration_type: EnumerationType,
}

/// Client side of a sensor hub connection
#[async_trait::async_trait]
pub trait HubClient: Send + Sync {
    /// Open the connection. Succeeds immediately when already connected.
    async fn connect(&self, host: &str, port: u16) -> Result<(), ConnectorError>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Resolve once the connection is down
    ///
    /// Returns immediately when not connected.
    async fn connection_lost(&self);

    /// Register a handler for device announcements
    fn on_enumerate(&self, handler: EnumerateHandler);

    /// Ask every device to announce itself
    async fn enumerate(&self) -> Result<(), ConnectorError>;

    /// Route raw values of `uid` to `handler` and ask the hub to push them
    /// when they change, at most once per `period`
    async fn subscribe(
        &self,
        uid: &str,
        device_identifier: u16,
        period: Duration,
        handler: ReadingHandler,
    ) -> Result<(), ConnectorError>;

    /// Close the connection
    async fn disconnect(&self) -> Result<(), ConnectorError>;
}

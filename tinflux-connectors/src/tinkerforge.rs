//! Tinkerforge Hub Client - Brick Daemon TCP Framing
//!
//! ## Overview
//!
//! Bricklets hang off a master brick, which is reached through a brick
//! daemon (or an Ethernet/WIFI extension) on TCP port 4223. This module
//! implements just enough of that binary protocol for the station:
//!
//! - broadcast an enumerate request and decode the announcements
//! - set a bricklet's value callback period
//! - decode value callbacks and route them to the subscribed handler
//!
//! Getters, authentication and firmware handling are out of scope.
//!
//! ## Framing
//!
//! Every packet starts with an 8-byte header, all integers little-endian:
//!
//! ```text
//! ┌─────────────┬────────┬─────────────┬──────────────────────┬───────────┐
//! │ uid (u32)   │ length │ function id │ seq<<4 | resp_exp<<3 │ err << 6  │
//! └─────────────┴────────┴─────────────┴──────────────────────┴───────────┘
//!     4 bytes     1 byte     1 byte            1 byte             1 byte
//! ```
//!
//! `length` covers header and payload. Packets with sequence number 0 are
//! callbacks pushed by the daemon; everything else answers a request.
//!
//! ## Device Table
//!
//! ```text
//! Device        Id    Set period fn   Callback fn   Raw type
//! ------------------------------------------------------------
//! Temperature   216   2               8             i16
//! Humidity      27    3               13            u16
//! Barometer     221   3               15            i32
//! Moisture      232   2               8             u16
//! UV light      265   2               8             u32
//! ```
//!
//! The daemon only fires a value callback when the value changed since the
//! last one, and at most once per configured period.
//!
//! ## Concurrency
//!
//! A single read task owns the socket's read half and invokes handlers
//! inline, one packet at a time. Requests share the write half behind an
//! async mutex.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use log::{debug, trace, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use tinflux_core::constants::time::HUB_CONNECT_TIMEOUT_MS;

use crate::hub::{Announcement, EnumerateHandler, EnumerationType, HubClient, ReadingHandler};
use crate::ConnectorError;

/// Size of the packet header
pub const HEADER_LEN: usize = 8;

/// Default brick daemon port
pub const DEFAULT_PORT: u16 = 4223;

const FUNCTION_ENUMERATE: u8 = 254;
const CALLBACK_ENUMERATE: u8 = 253;
const BROADCAST_UID: u32 = 0;
const UID_FIELD_LEN: usize = 8;
const ENUMERATE_PAYLOAD_LEN: usize = 26;

const BASE58_ALPHABET: &[u8] = b"123456789abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

/// Device identifiers of the supported bricklets
pub mod device {
    /// Temperature bricklet
    pub const TEMPERATURE: u16 = 216;
    /// Humidity bricklet
    pub const HUMIDITY: u16 = 27;
    /// Barometer bricklet
    pub const BAROMETER: u16 = 221;
    /// Moisture bricklet
    pub const MOISTURE: u16 = 232;
    /// UV light bricklet
    pub const UV_LIGHT: u16 = 265;
}

/// Wire type of a bricklet's value callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RawFormat {
    I16,
    U16,
    I32,
    U32,
}

impl RawFormat {
    fn decode(self, payload: &[u8]) -> Option<i64> {
        Some(match self {
            RawFormat::I16 => i16::from_le_bytes(payload.get(..2)?.try_into().ok()?) as i64,
            RawFormat::U16 => u16::from_le_bytes(payload.get(..2)?.try_into().ok()?) as i64,
            RawFormat::I32 => i32::from_le_bytes(payload.get(..4)?.try_into().ok()?) as i64,
            RawFormat::U32 => u32::from_le_bytes(payload.get(..4)?.try_into().ok()?) as i64,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct DeviceProfile {
    set_period_function: u8,
    callback_function: u8,
    format: RawFormat,
}

fn profile(device_identifier: u16) -> Option<DeviceProfile> {
    let (set_period_function, callback_function, format) = match device_identifier {
        device::TEMPERATURE => (2, 8, RawFormat::I16),
        device::HUMIDITY => (3, 13, RawFormat::U16),
        device::BAROMETER => (3, 15, RawFormat::I32),
        device::MOISTURE => (2, 8, RawFormat::U16),
        device::UV_LIGHT => (2, 8, RawFormat::U32),
        _ => return None,
    };
    Some(DeviceProfile {
        set_period_function,
        callback_function,
        format,
    })
}

/// Packet header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    /// Addressed or sending device, 0 for broadcast
    pub uid: u32,
    /// Header plus payload length
    pub length: u8,
    /// Function or callback id
    pub function_id: u8,
    /// 1-15 for requests, 0 for callbacks
    pub sequence: u8,
    /// Whether the daemon should answer
    pub response_expected: bool,
    /// Error code of a response
    pub error_code: u8,
}

impl PacketHeader {
    /// Encode to wire bytes
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let uid = self.uid.to_le_bytes();
        [
            uid[0],
            uid[1],
            uid[2],
            uid[3],
            self.length,
            self.function_id,
            (self.sequence << 4) | (u8::from(self.response_expected) << 3),
            self.error_code << 6,
        ]
    }

    /// Decode from wire bytes
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Self {
        Self {
            uid: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            length: bytes[4],
            function_id: bytes[5],
            sequence: bytes[6] >> 4,
            response_expected: bytes[6] & 0x08 != 0,
            error_code: bytes[7] >> 6,
        }
    }

    /// Whether the daemon pushed this packet on its own
    pub fn is_callback(&self) -> bool {
        self.sequence == 0
    }
}

/// Decode a base58 uid into its 32-bit wire form
///
/// Uids above 32 bits are folded the way the daemon does it.
pub fn base58_decode(encoded: &str) -> Result<u32, ConnectorError> {
    if encoded.is_empty() {
        return Err(ConnectorError::Protocol("empty uid".into()));
    }

    let mut value: u64 = 0;
    for c in encoded.bytes() {
        let digit = BASE58_ALPHABET
            .iter()
            .position(|&a| a == c)
            .ok_or_else(|| ConnectorError::Protocol(format!("invalid character {:?} in uid {}", c as char, encoded)))?;
        value = value
            .checked_mul(58)
            .and_then(|v| v.checked_add(digit as u64))
            .ok_or_else(|| ConnectorError::Protocol(format!("uid {} out of range", encoded)))?;
    }

    if value <= u64::from(u32::MAX) {
        return Ok(value as u32);
    }

    let low = value & 0xFFFF_FFFF;
    let high = (value >> 32) & 0xFFFF_FFFF;
    let folded = (low & 0x0000_0FFF)
        | ((low & 0x0F00_0000) >> 12)
        | ((high & 0x0000_003F) << 16)
        | ((high & 0x000F_0000) << 6)
        | ((high & 0x3F00_0000) << 2);
    Ok(folded as u32)
}

/// Encode a 32-bit uid as base58
pub fn base58_encode(mut value: u32) -> String {
    if value == 0 {
        return "1".into();
    }
    let mut digits = Vec::new();
    while value > 0 {
        digits.push(BASE58_ALPHABET[(value % 58) as usize] as char);
        value /= 58;
    }
    digits.iter().rev().collect()
}

fn read_uid_field(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

fn parse_announcement(payload: &[u8]) -> Option<Announcement> {
    if payload.len() < ENUMERATE_PAYLOAD_LEN {
        return None;
    }
    // uid[8] connected_uid[8] position hw[3] fw[3] device_identifier(u16) enumeration_type
    Some(Announcement {
        uid: read_uid_field(&payload[..UID_FIELD_LEN]),
        connected_uid: read_uid_field(&payload[UID_FIELD_LEN..2 * UID_FIELD_LEN]),
        position: payload[2 * UID_FIELD_LEN] as char,
        device_identifier: u16::from_le_bytes([payload[23], payload[24]]),
        enumeration_type: EnumerationType::from_wire(payload[25])?,
    })
}

#[derive(Clone)]
struct Subscription {
    format: RawFormat,
    handler: ReadingHandler,
}

/// State shared with the read task
struct Shared {
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    connected: watch::Sender<bool>,
    sequence: AtomicU8,
    enumerate_handlers: RwLock<Vec<EnumerateHandler>>,
    subscriptions: RwLock<HashMap<(u32, u8), Subscription>>,
}

impl Shared {
    fn next_sequence(&self) -> u8 {
        self.sequence.fetch_add(1, Ordering::Relaxed) % 15 + 1
    }

    fn dispatch(&self, header: &PacketHeader, payload: &[u8]) {
        if !header.is_callback() {
            trace!(
                "response for function {} seq {} (error {})",
                header.function_id,
                header.sequence,
                header.error_code
            );
            return;
        }

        if header.function_id == CALLBACK_ENUMERATE {
            let Some(announcement) = parse_announcement(payload) else {
                warn!("Malformed enumerate callback ({} bytes)", payload.len());
                return;
            };
            let handlers = self
                .enumerate_handlers
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            for handler in handlers {
                handler(announcement.clone());
            }
            return;
        }

        let subscription = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(header.uid, header.function_id))
            .cloned();

        match subscription {
            Some(sub) => match sub.format.decode(payload) {
                Some(raw) => (sub.handler)(raw),
                None => warn!(
                    "Short value callback from {} ({} bytes)",
                    base58_encode(header.uid),
                    payload.len()
                ),
            },
            None => trace!(
                "no subscriber for callback {} from {}",
                header.function_id,
                base58_encode(header.uid)
            ),
        }
    }
}

async fn read_loop(shared: Arc<Shared>, mut reader: OwnedReadHalf) {
    let mut header_buf = [0u8; HEADER_LEN];
    loop {
        if let Err(e) = reader.read_exact(&mut header_buf).await {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                debug!("Hub closed the connection");
            } else {
                warn!("Hub connection lost: {}", e);
            }
            break;
        }

        let header = PacketHeader::decode(&header_buf);
        let Some(payload_len) = (header.length as usize).checked_sub(HEADER_LEN) else {
            warn!("Malformed packet length {} from hub, dropping connection", header.length);
            break;
        };

        let mut payload = vec![0u8; payload_len];
        if let Err(e) = reader.read_exact(&mut payload).await {
            warn!("Hub connection lost mid-packet: {}", e);
            break;
        }

        shared.dispatch(&header, &payload);
    }
    shared.connected.send_replace(false);
}

/// Hub client for a Tinkerforge brick daemon
pub struct TinkerforgeHub {
    shared: Arc<Shared>,
    reader: Mutex<Option<JoinHandle<()>>>,
    connect_timeout: Duration,
}

impl Default for TinkerforgeHub {
    fn default() -> Self {
        Self::new()
    }
}

impl TinkerforgeHub {
    /// Create a disconnected client
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                writer: tokio::sync::Mutex::new(None),
                connected: watch::channel(false).0,
                sequence: AtomicU8::new(0),
                enumerate_handlers: RwLock::new(Vec::new()),
                subscriptions: RwLock::new(HashMap::new()),
            }),
            reader: Mutex::new(None),
            connect_timeout: Duration::from_millis(HUB_CONNECT_TIMEOUT_MS),
        }
    }

    /// Override the TCP connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    async fn send(&self, uid: u32, function_id: u8, payload: &[u8]) -> Result<(), ConnectorError> {
        let header = PacketHeader {
            uid,
            length: (HEADER_LEN + payload.len()) as u8,
            function_id,
            sequence: self.shared.next_sequence(),
            response_expected: false,
            error_code: 0,
        };

        let mut packet = Vec::with_capacity(HEADER_LEN + payload.len());
        packet.extend_from_slice(&header.encode());
        packet.extend_from_slice(payload);

        let mut writer = self.shared.writer.lock().await;
        let writer = writer.as_mut().ok_or(ConnectorError::NotConnected)?;
        writer.write_all(&packet).await?;
        Ok(())
    }

    fn stop_reader(&self) {
        if let Some(task) = self.reader.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}

#[async_trait::async_trait]
impl HubClient for TinkerforgeHub {
    async fn connect(&self, host: &str, port: u16) -> Result<(), ConnectorError> {
        if self.is_connected() {
            return Ok(());
        }

        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ConnectorError::Timeout)??;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        *self.shared.writer.lock().await = Some(writer);
        self.shared.connected.send_replace(true);

        let task = tokio::spawn(read_loop(Arc::clone(&self.shared), reader));
        if let Some(stale) = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(task)
        {
            stale.abort();
        }

        debug!("Connected to hub at {}:{}", host, port);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        *self.shared.connected.borrow()
    }

    async fn connection_lost(&self) {
        let mut connected = self.shared.connected.subscribe();
        // The sender lives as long as `self`
        let _ = connected.wait_for(|up| !*up).await;
    }

    fn on_enumerate(&self, handler: EnumerateHandler) {
        self.shared
            .enumerate_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    async fn enumerate(&self) -> Result<(), ConnectorError> {
        self.send(BROADCAST_UID, FUNCTION_ENUMERATE, &[]).await
    }

    async fn subscribe(
        &self,
        uid: &str,
        device_identifier: u16,
        period: Duration,
        handler: ReadingHandler,
    ) -> Result<(), ConnectorError> {
        let profile = profile(device_identifier).ok_or(ConnectorError::UnsupportedDevice(device_identifier))?;
        let uid_value = base58_decode(uid)?;
        let period_ms = u32::try_from(period.as_millis()).unwrap_or(u32::MAX);

        // Route before enabling so the first push is not lost
        self.shared
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                (uid_value, profile.callback_function),
                Subscription {
                    format: profile.format,
                    handler,
                },
            );

        self.send(uid_value, profile.set_period_function, &period_ms.to_le_bytes())
            .await
    }

    async fn disconnect(&self) -> Result<(), ConnectorError> {
        self.stop_reader();
        self.shared.connected.send_replace(false);
        if let Some(mut writer) = self.shared.writer.lock().await.take() {
            writer.shutdown().await?;
        }
        Ok(())
    }
}

impl Drop for TinkerforgeHub {
    fn drop(&mut self) {
        self.stop_reader();
    }
}

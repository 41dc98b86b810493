//! Time Constants for Tinflux
//!
//! Intervals used by the station runtime. Everything is in milliseconds
//! unless the name says otherwise.

/// Milliseconds per second.
pub const MS_PER_SECOND: u64 = 1000;

/// Callback period used when none is configured (seconds).
pub const DEFAULT_CALLBACK_PERIOD_S: u64 = 5;

/// Longest callback period the hub accepts: its period field is u32 milliseconds.
pub const MAX_CALLBACK_PERIOD_S: u64 = u32::MAX as u64 / MS_PER_SECOND;

/// Configuration value meaning "use [`DEFAULT_CALLBACK_PERIOD_S`]".
pub const CALLBACK_PERIOD_UNSET: i64 = -1;

/// Added on top of the callback period between derived-metric ticks (ms).
pub const WORKER_EXTRA_DELAY_MS: u64 = 5000;

/// Hub connection attempts before giving up.
pub const CONNECT_ATTEMPTS: u32 = 3;

/// Wait before the third and later connection attempts (ms).
pub const CONNECT_BACKOFF_MS: u64 = 1500;

/// Time the hub gets to answer an enumerate request (ms).
pub const ENUMERATION_GRACE_MS: u64 = 1000;

/// TCP connect timeout towards the hub (ms).
pub const HUB_CONNECT_TIMEOUT_MS: u64 = 5000;

/// HTTP timeout for a single telemetry write (ms).
pub const TELEMETRY_WRITE_TIMEOUT_MS: u64 = 10_000;

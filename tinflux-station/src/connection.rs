//! Hub connection with a short retry budget
//!
//! ```text
//! attempt 1 ──fail──▶ attempt 2 ──fail──▶ wait 1.5 s ──▶ attempt 3 ──fail──▶ Connectivity
//! ```
//!
//! Hub errors are logged with the attempt number and swallowed; the caller
//! only learns whether a connection exists in the end.

use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tinflux_connectors::HubClient;
use tinflux_core::constants::time::{CONNECT_ATTEMPTS, CONNECT_BACKOFF_MS};

use crate::error::{StationError, StationResult};

/// Establishes the hub connection
pub struct ConnectionManager {
    hub: Arc<dyn HubClient>,
    attempts: u32,
    backoff: Duration,
}

impl ConnectionManager {
    pub fn new(hub: Arc<dyn HubClient>) -> Self {
        Self {
            hub,
            attempts: CONNECT_ATTEMPTS,
            backoff: Duration::from_millis(CONNECT_BACKOFF_MS),
        }
    }

    /// Override the retry policy
    pub fn with_policy(mut self, attempts: u32, backoff: Duration) -> Self {
        self.attempts = attempts.max(1);
        self.backoff = backoff;
        self
    }

    /// Connect, returning the number of dials it took (0 if the hub was
    /// already connected)
    pub async fn connect(&self, host: &str, port: u16) -> StationResult<u32> {
        if self.hub.is_connected() {
            return Ok(0);
        }

        for attempt in 1..=self.attempts {
            // No wait between the first two dials
            if attempt > 2 {
                tokio::time::sleep(self.backoff).await;
            }

            match self.hub.connect(host, port).await {
                Ok(()) => {
                    info!("Connected to hub {}:{} (attempt {}/{})", host, port, attempt, self.attempts);
                    return Ok(attempt);
                }
                Err(e) => warn!(
                    "Hub connection to {}:{} failed ({}). Try number {}/{}",
                    host, port, e, attempt, self.attempts
                ),
            }
        }

        Err(StationError::Connectivity {
            host: host.to_string(),
            port,
            attempts: self.attempts,
        })
    }
}

//! InfluxDB Connector - Line Protocol over HTTP
//!
//! ## Overview
//!
//! Writes each [`TelemetryPoint`] to the InfluxDB 1.x `/write` endpoint as a
//! single line-protocol line. There is no batching and no retry: a reading
//! that fails to write is logged by the caller and the next one is attempted
//! as usual.
//!
//! ## Implementation Choices
//!
//! - `ureq` keeps the HTTP client small; its calls block, so every write is
//!   moved onto tokio's blocking pool and the async caller only awaits it
//! - Credentials travel as HTTP Basic auth, the server decides what to do
//!   with them
//! - Timestamps are sent with millisecond precision (`precision=ms`)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use tinflux_connectors::influx::{InfluxConfig, InfluxConnector};
//!
//! let config = InfluxConfig::new("http://localhost:8086", "weather")
//!     .basic_auth("station", "secret")
//!     .timeout_secs(5);
//!
//! let influx = InfluxConnector::new(config)?;
//! # Ok::<(), tinflux_connectors::ConnectorError>(())
//! ```

use crate::{ConnectionStats, ConnectorError, TelemetryPoint, TelemetrySink};
use base64::Engine;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tinflux_core::constants::time::TELEMETRY_WRITE_TIMEOUT_MS;

/// InfluxDB configuration
#[derive(Clone)]
pub struct InfluxConfig {
    /// Base URL of the server, e.g. `http://influx:8086`
    pub base_url: String,
    /// Target database
    pub database: String,
    /// Request timeout
    pub timeout: Duration,
    /// Authentication method
    pub auth: AuthMethod,
    /// User agent string
    pub user_agent: String,
}

/// Authentication methods
#[derive(Clone)]
pub enum AuthMethod {
    /// No authentication
    None,
    /// Basic authentication
    Basic { username: String, password: String },
}

impl InfluxConfig {
    /// Create new configuration for `database` on `base_url`
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            timeout: Duration::from_millis(TELEMETRY_WRITE_TIMEOUT_MS),
            auth: AuthMethod::None,
            user_agent: format!("tinflux-station/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set basic authentication
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

/// Telemetry sink backed by the InfluxDB HTTP API
pub struct InfluxConnector {
    config: InfluxConfig,
    agent: ureq::Agent,
    write_url: String,
    stats: Arc<Mutex<ConnectionStats>>,
}

impl InfluxConnector {
    /// Create new InfluxDB connector
    pub fn new(config: InfluxConfig) -> Result<Self, ConnectorError> {
        if !config.base_url.starts_with("http://") && !config.base_url.starts_with("https://") {
            return Err(ConnectorError::Config(
                "InfluxDB URI must start with http:// or https://".into(),
            ));
        }
        if config.database.is_empty() {
            return Err(ConnectorError::Config("InfluxDB database name is empty".into()));
        }

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();
        let write_url = format!("{}/write", config.base_url.trim_end_matches('/'));

        Ok(Self {
            config,
            agent,
            write_url,
            stats: Arc::new(Mutex::new(ConnectionStats::default())),
        })
    }

    /// Endpoint every point is posted to
    pub fn write_url(&self) -> &str {
        &self.write_url
    }

    /// Build the write request with query and authentication
    fn build_request(&self) -> ureq::Request {
        let mut request = self
            .agent
            .post(&self.write_url)
            .query("db", &self.config.database)
            .query("precision", "ms")
            .set("Content-Type", "text/plain; charset=utf-8");

        if let AuthMethod::Basic { username, password } = &self.config.auth {
            let credentials = base64::engine::general_purpose::STANDARD
                .encode(format!("{}:{}", username, password));
            request = request.set("Authorization", &format!("Basic {}", credentials));
        }

        request
    }

    fn record(&self, update: impl FnOnce(&mut ConnectionStats)) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        update(&mut stats);
    }
}

/// Blocking half of a write, runs on the blocking pool
fn send_line(request: ureq::Request, line: &str) -> Result<(), ConnectorError> {
    match request.send_string(line) {
        Ok(_) => Ok(()),
        Err(ureq::Error::Status(status, response)) => Err(ConnectorError::Rejected {
            status,
            message: response.into_string().unwrap_or_default().trim().to_string(),
        }),
        Err(ureq::Error::Transport(e)) => Err(ConnectorError::Transport(e.to_string())),
    }
}

#[async_trait::async_trait]
impl TelemetrySink for InfluxConnector {
    async fn write(&self, point: &TelemetryPoint) -> Result<(), ConnectorError> {
        let line = point.to_line_protocol();
        let bytes = line.len() as u64;
        let request = self.build_request();

        let result = tokio::task::spawn_blocking(move || send_line(request, &line))
            .await
            .map_err(|e| ConnectorError::Transport(format!("write task failed: {}", e)))
            .and_then(|sent| sent);

        match &result {
            Ok(()) => self.record(|stats| {
                stats.messages_sent += 1;
                stats.bytes_sent += bytes;
            }),
            Err(e) => {
                let message = e.to_string();
                self.record(|stats| {
                    stats.messages_failed += 1;
                    stats.last_error = Some(message);
                });
            }
        }

        result
    }

    fn stats(&self) -> ConnectionStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Serve exactly one HTTP request, answer with `status_line`, hand back
    /// the raw request head and body
    fn one_shot_server(status_line: &'static str) -> (String, thread::JoinHandle<(String, String)>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());

            let mut head = String::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some(value) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = value.trim().parse().unwrap();
                }
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                head.push_str(&line);
            }

            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();

            let mut stream = stream;
            write!(stream, "{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status_line).unwrap();
            stream.flush().unwrap();

            (head, String::from_utf8(body).unwrap())
        });

        (url, handle)
    }

    fn sample_point() -> TelemetryPoint {
        TelemetryPoint::at(
            "garden",
            "HUMIDITY",
            "%RH",
            "RELATIVE HUMIDITY",
            50.3,
            DateTime::from_timestamp_millis(1_700_000_000_000).unwrap(),
        )
    }

    #[test]
    fn test_url_validation() {
        let result = InfluxConnector::new(InfluxConfig::new("not-a-url", "weather"));
        assert!(result.is_err());

        let result = InfluxConnector::new(InfluxConfig::new("https://valid.url", ""));
        assert!(result.is_err());

        let connector = InfluxConnector::new(InfluxConfig::new("https://valid.url/", "weather")).unwrap();
        assert_eq!(connector.write_url(), "https://valid.url/write");
    }

    #[test]
    fn test_config_builder() {
        let config = InfluxConfig::new("http://influx:8086", "weather")
            .basic_auth("station", "secret")
            .timeout_secs(3);

        assert_eq!(config.timeout, Duration::from_secs(3));
        match config.auth {
            AuthMethod::Basic { username, password } => {
                assert_eq!(username, "station");
                assert_eq!(password, "secret");
            }
            AuthMethod::None => panic!("Wrong auth method"),
        }
    }

    #[tokio::test]
    async fn writes_one_line_per_point() {
        let (url, server) = one_shot_server("HTTP/1.1 204 No Content");
        let connector =
            InfluxConnector::new(InfluxConfig::new(url, "weather").basic_auth("station", "secret")).unwrap();

        connector.write(&sample_point()).await.unwrap();

        let (head, body) = server.join().unwrap();
        assert!(head.starts_with("POST /write?db=weather&precision=ms "));
        // "station:secret" in base64
        assert!(head.contains("c3RhdGlvbjpzZWNyZXQ="));
        assert_eq!(
            body,
            "garden,type=HUMIDITY,unit=%RH,unitName=RELATIVE\\ HUMIDITY value=50.3 1700000000000"
        );

        let stats = connector.stats();
        assert_eq!(stats.messages_sent, 1);
        assert_eq!(stats.bytes_sent, body.len() as u64);
    }

    #[tokio::test]
    async fn server_errors_are_reported_and_counted() {
        let (url, server) = one_shot_server("HTTP/1.1 400 Bad Request");
        let connector = InfluxConnector::new(InfluxConfig::new(url, "weather")).unwrap();

        let result = connector.write(&sample_point()).await;
        server.join().unwrap();

        assert!(matches!(result, Err(ConnectorError::Rejected { status: 400, .. })));
        let stats = connector.stats();
        assert_eq!(stats.messages_failed, 1);
        assert!(stats.last_error.is_some());
    }

    #[tokio::test]
    async fn unreachable_server_is_a_transport_error() {
        let url = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            format!("http://{}", listener.local_addr().unwrap())
        };
        let connector = InfluxConnector::new(InfluxConfig::new(url, "weather").timeout_secs(2)).unwrap();

        let result = connector.write(&sample_point()).await;
        assert!(matches!(result, Err(ConnectorError::Transport(_))));
    }
}

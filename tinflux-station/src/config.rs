//! Station configuration
//!
//! Settings come from exactly one of two places:
//!
//! ```text
//! tinflux-station STATION HOST PORT URI DATABASE USER PASSWORD [PERIOD_S [ALTITUDE_M]]
//! tinflux-station                 # TINFLUXWS_* variables + /run/secrets/influx*
//! ```
//!
//! In environment mode the InfluxDB credentials are read from the first line
//! of the secret files; a missing or empty file falls back to the matching
//! variable. Loaders take the environment as a lookup function and the
//! secret files as paths, so they never depend on process state.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use thiserror::Error;

use tinflux_core::constants::time::{
    CALLBACK_PERIOD_UNSET, DEFAULT_CALLBACK_PERIOD_S, MAX_CALLBACK_PERIOD_S, MS_PER_SECOND,
    WORKER_EXTRA_DELAY_MS,
};

/// Environment variable names
pub mod env {
    /// Station name, used as the measurement name
    pub const STATION_NAME: &str = "TINFLUXWS_STATIONNAME";
    /// Hub host
    pub const HUB_HOST: &str = "TINFLUXWS_MASTERBRICK_HOST";
    /// Hub port
    pub const HUB_PORT: &str = "TINFLUXWS_MASTERBRICK_PORT";
    /// Callback period in seconds, -1 for the default
    pub const CALLBACK_PERIOD: &str = "TINFLUXWS_CALLBACKPERIOD";
    /// Altitude offset in meters
    pub const ALTITUDE_OFFSET: &str = "TINFLUXWS_ALTITUDEOFFSET";
    /// InfluxDB base URI
    pub const INFLUX_URI: &str = "TINFLUXWS_INFLUXDB_HOST_URI";
    /// InfluxDB database
    pub const INFLUX_DATABASE: &str = "TINFLUXWS_INFLUXDB_NAME";
    /// Fallback InfluxDB user
    pub const INFLUX_USER: &str = "TINFLUXWS_INFLUXDB_USER";
    /// Fallback InfluxDB password
    pub const INFLUX_PASSWORD: &str = "TINFLUXWS_INFLUXDB_PASSWD";
}

/// Default secret file holding the InfluxDB user
pub const USER_SECRET_FILE: &str = "/run/secrets/influxuser";

/// Default secret file holding the InfluxDB password
pub const PASSWORD_SECRET_FILE: &str = "/run/secrets/influxpassword";

const MIN_ARGS: usize = 7;
const MAX_ARGS: usize = 9;

/// Configuration errors. All of them stop the station before it starts.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Arguments not OK! Expected no arguments or 7 to 9 settings, got {0}")]
    ArgumentCount(usize),

    #[error("Not all ENV are set! {0} is missing")]
    Missing(&'static str),

    #[error("Invalid {name} {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Not all secrets or ENV are set! {0}")]
    Credentials(&'static str),
}

/// Command line
#[derive(Debug, Parser)]
#[command(name = "tinflux-station", version)]
#[command(about = "Forward Tinkerforge weather bricklets to InfluxDB")]
#[command(long_about = None)]
#[command(after_help = "Without settings the station reads the TINFLUXWS_* environment \
variables and the secret files /run/secrets/influxuser and /run/secrets/influxpassword.")]
pub struct Cli {
    /// STATION HOST PORT INFLUX_URI DATABASE USER PASSWORD [PERIOD_S [ALTITUDE_OFFSET_M]]
    #[arg(value_name = "SETTING", allow_negative_numbers = true)]
    pub settings: Vec<String>,
}

/// Locations of the credential secret files
#[derive(Debug, Clone)]
pub struct SecretFiles {
    /// File whose first line is the user
    pub username: PathBuf,
    /// File whose first line is the password
    pub password: PathBuf,
}

impl Default for SecretFiles {
    fn default() -> Self {
        Self {
            username: PathBuf::from(USER_SECRET_FILE),
            password: PathBuf::from(PASSWORD_SECRET_FILE),
        }
    }
}

/// InfluxDB credentials
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &mask(&self.password))
            .finish()
    }
}

/// Effective station settings, fixed for the lifetime of the process
#[derive(Debug, Clone, PartialEq)]
pub struct StationConfig {
    pub station_name: String,
    pub hub_host: String,
    pub hub_port: u16,
    pub influx_uri: String,
    pub influx_database: String,
    /// `None` writes without authentication
    pub credentials: Option<Credentials>,
    pub callback_period_s: u64,
    pub altitude_offset_m: f64,
}

impl StationConfig {
    /// Pick the source by argument count: none reads the environment
    pub fn load<F>(args: &[String], lookup: F, secrets: &SecretFiles) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if args.is_empty() {
            Self::from_env(lookup, secrets)
        } else {
            Self::from_args(args)
        }
    }

    /// Positional settings
    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        if !(MIN_ARGS..=MAX_ARGS).contains(&args.len()) {
            return Err(ConfigError::ArgumentCount(args.len()));
        }

        let config = Self {
            station_name: args[0].clone(),
            hub_host: args[1].clone(),
            hub_port: parse_port(&args[2])?,
            influx_uri: args[3].clone(),
            influx_database: args[4].clone(),
            credentials: credentials(Some(args[5].clone()), Some(args[6].clone()))?,
            callback_period_s: args
                .get(7)
                .map(|raw| parse_callback_period(raw))
                .transpose()?
                .unwrap_or(DEFAULT_CALLBACK_PERIOD_S),
            altitude_offset_m: args
                .get(8)
                .map(|raw| parse_altitude_offset(raw))
                .transpose()?
                .unwrap_or(0.0),
        };
        config.validate()
    }

    /// Environment variables and secret files. Empty variables count as unset.
    pub fn from_env<F>(lookup: F, secrets: &SecretFiles) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &'static str| lookup(name).filter(|value| !value.is_empty());
        let required = |name: &'static str| var(name).ok_or(ConfigError::Missing(name));

        let station_name = required(env::STATION_NAME)?;
        let hub_host = required(env::HUB_HOST)?;
        let hub_port = parse_port(&required(env::HUB_PORT)?)?;
        let influx_uri = required(env::INFLUX_URI)?;
        let influx_database = required(env::INFLUX_DATABASE)?;

        let callback_period_s = var(env::CALLBACK_PERIOD)
            .map(|raw| parse_callback_period(&raw))
            .transpose()?
            .unwrap_or(DEFAULT_CALLBACK_PERIOD_S);
        let altitude_offset_m = var(env::ALTITUDE_OFFSET)
            .map(|raw| parse_altitude_offset(&raw))
            .transpose()?
            .unwrap_or(0.0);

        let username = read_secret_file(&secrets.username).or_else(|| var(env::INFLUX_USER));
        let password = read_secret_file(&secrets.password).or_else(|| var(env::INFLUX_PASSWORD));

        Self {
            station_name,
            hub_host,
            hub_port,
            influx_uri,
            influx_database,
            credentials: credentials(username, password)?,
            callback_period_s,
            altitude_offset_m,
        }
        .validate()
    }

    /// Period the hub pushes changed values at
    pub fn callback_period(&self) -> Duration {
        Duration::from_millis(self.callback_period_s * MS_PER_SECOND)
    }

    /// Sleep between derived-metric ticks
    pub fn worker_interval(&self) -> Duration {
        self.callback_period() + Duration::from_millis(WORKER_EXTRA_DELAY_MS)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        for (name, value) in [
            ("station name", &self.station_name),
            ("hub host", &self.hub_host),
            ("InfluxDB URI", &self.influx_uri),
            ("InfluxDB database", &self.influx_database),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    name,
                    value: value.clone(),
                    reason: "must not be empty".into(),
                });
            }
        }
        Ok(self)
    }
}

impl fmt::Display for StationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Station name:      {}", self.station_name)?;
        writeln!(f, "Hub:               {}:{}", self.hub_host, self.hub_port)?;
        writeln!(f, "InfluxDB server:   {}", self.influx_uri)?;
        writeln!(f, "InfluxDB database: {}", self.influx_database)?;
        match &self.credentials {
            Some(credentials) => {
                writeln!(f, "InfluxDB user:     {}", credentials.username)?;
                writeln!(f, "InfluxDB password: {}", mask(&credentials.password))?;
            }
            None => writeln!(f, "InfluxDB user:     (none)")?,
        }
        writeln!(f, "Callback period:   {}s", self.callback_period_s)?;
        write!(f, "Altitude offset:   {}m", self.altitude_offset_m)
    }
}

fn mask(secret: &str) -> String {
    "*".repeat(secret.chars().count())
}

fn invalid(name: &'static str, value: &str, reason: impl fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
    match raw.trim().parse::<u16>() {
        Ok(0) => Err(invalid("hub port", raw, "must not be 0")),
        Ok(port) => Ok(port),
        Err(e) => Err(invalid("hub port", raw, e)),
    }
}

/// `-1` selects the default period; anything else must be positive seconds
/// no longer than [`MAX_CALLBACK_PERIOD_S`]
fn parse_callback_period(raw: &str) -> Result<u64, ConfigError> {
    let seconds: i64 = raw
        .trim()
        .parse()
        .map_err(|e| invalid("callback period", raw, e))?;
    if seconds == CALLBACK_PERIOD_UNSET {
        return Ok(DEFAULT_CALLBACK_PERIOD_S);
    }
    let seconds = u64::try_from(seconds)
        .ok()
        .filter(|s| *s > 0)
        .ok_or_else(|| invalid("callback period", raw, "must be a positive number of seconds or -1"))?;
    if seconds > MAX_CALLBACK_PERIOD_S {
        return Err(invalid(
            "callback period",
            raw,
            format!("must not exceed {} seconds", MAX_CALLBACK_PERIOD_S),
        ));
    }
    Ok(seconds)
}

fn parse_altitude_offset(raw: &str) -> Result<f64, ConfigError> {
    let meters: f64 = raw
        .trim()
        .parse()
        .map_err(|e| invalid("altitude offset", raw, e))?;
    if !meters.is_finite() {
        return Err(invalid("altitude offset", raw, "must be a finite number of meters"));
    }
    Ok(meters)
}

fn credentials(
    username: Option<String>,
    password: Option<String>,
) -> Result<Option<Credentials>, ConfigError> {
    match (username, password) {
        (None, None) => Ok(None),
        (Some(username), Some(password)) => {
            if username.is_empty() || password.is_empty() {
                return Err(ConfigError::Credentials("InfluxDB user and password must not be empty"));
            }
            Ok(Some(Credentials { username, password }))
        }
        _ => Err(ConfigError::Credentials("InfluxDB user and password must be set together")),
    }
}

/// First line of a secret file; `None` when the file is missing or empty
fn read_secret_file(path: &Path) -> Option<String> {
    let contents = fs::read_to_string(path).ok()?;
    if contents.is_empty() {
        return None;
    }
    Some(contents.lines().next().unwrap_or_default().to_string())
}

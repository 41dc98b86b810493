//! Station orchestrator
//!
//! ```text
//! connect ─▶ start forwarder ─▶ enumerate (1 s) ─▶ summary ─▶ start worker ─▶ wait
//!    │                                                                          │
//!    └─ fail: Connectivity, nothing started           shutdown: stop tasks, disconnect
//! ```
//!
//! Losing the hub while waiting stops the tasks the same way and ends the run
//! with [`ConnectorError::ConnectionLost`], so a supervisor can restart it.

use std::sync::Arc;
use std::time::Duration;

use log::{error, info, warn};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tinflux_connectors::{ConnectorError, HubClient, TelemetrySink};
use tinflux_core::constants::time::ENUMERATION_GRACE_MS;
use tinflux_core::time::TimeSource;
use tinflux_core::MeasurementStore;

use crate::config::StationConfig;
use crate::connection::ConnectionManager;
use crate::error::{StationError, StationResult};
use crate::registry::{ActiveSensor, SensorRegistry};
use crate::telemetry::{self, Telemetry, QUEUE_CAPACITY};
use crate::worker::DerivedMetricsWorker;

/// What a finished run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Sensors registered at start-up
    pub sensors: Vec<ActiveSensor>,
    /// Sensor readings handed to telemetry
    pub forwarded: u64,
    /// Derived metric sets computed
    pub computed: u64,
}

pub struct Station {
    config: StationConfig,
    hub: Arc<dyn HubClient>,
    telemetry: Arc<Telemetry>,
    store: Arc<MeasurementStore>,
    enumeration_grace: Duration,
    clock: Option<Arc<dyn TimeSource>>,
}

impl Station {
    pub fn new(config: StationConfig, hub: Arc<dyn HubClient>, sink: Arc<dyn TelemetrySink>) -> Self {
        let telemetry = Arc::new(Telemetry::new(sink, config.station_name.clone()));
        Self {
            config,
            hub,
            telemetry,
            store: Arc::new(MeasurementStore::new()),
            enumeration_grace: Duration::from_millis(ENUMERATION_GRACE_MS),
            clock: None,
        }
    }

    /// Override how long enumeration waits for announcements
    pub fn with_enumeration_grace(mut self, grace: Duration) -> Self {
        self.enumeration_grace = grace;
        self
    }

    /// Stamp readings from `clock` instead of the system clock
    pub fn with_clock(mut self, clock: Arc<dyn TimeSource>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn config(&self) -> &StationConfig {
        &self.config
    }

    /// Last known value per sensor kind
    pub fn store(&self) -> Arc<MeasurementStore> {
        Arc::clone(&self.store)
    }

    pub fn telemetry(&self) -> Arc<Telemetry> {
        Arc::clone(&self.telemetry)
    }

    /// Run until `shutdown` fires
    ///
    /// Fails without starting anything when the hub cannot be reached, and
    /// with [`StationError::Hub`] when the hub connection drops mid-run.
    pub async fn run(&self, shutdown: CancellationToken) -> StationResult<RunSummary> {
        ConnectionManager::new(Arc::clone(&self.hub))
            .connect(&self.config.hub_host, self.config.hub_port)
            .await?;

        let tasks = shutdown.child_token();
        let (queue, forwarder) = telemetry::channel(Arc::clone(&self.telemetry), QUEUE_CAPACITY);
        let forwarder = forwarder.spawn(tasks.clone());

        let mut registry = SensorRegistry::new(
            Arc::clone(&self.hub),
            Arc::clone(&self.store),
            queue,
            self.config.callback_period(),
        );
        if let Some(clock) = &self.clock {
            registry = registry.with_clock(Arc::clone(clock));
        }

        let sensors = match registry.enumerate(self.enumeration_grace).await {
            Ok(sensors) => sensors.to_vec(),
            Err(e) => {
                tasks.cancel();
                join_task("telemetry forwarder", forwarder).await;
                self.disconnect().await;
                return Err(e);
            }
        };

        for sensor in &sensors {
            info!("{}", sensor);
        }
        info!("Application with Station \"{}\" is started...", self.config.station_name);

        let worker = DerivedMetricsWorker::new(
            Arc::clone(&self.store),
            Arc::clone(&self.telemetry),
            self.config.altitude_offset_m,
            self.config.worker_interval(),
        )
        .spawn(tasks.clone());

        let hub_lost = tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = self.hub.connection_lost() => true,
        };
        if hub_lost {
            error!("Lost connection to hub {}:{}", self.config.hub_host, self.config.hub_port);
        }
        info!("Stopping station \"{}\"", self.config.station_name);

        tasks.cancel();
        let computed = join_task("derived metrics worker", worker).await;
        let forwarded = join_task("telemetry forwarder", forwarder).await;
        self.disconnect().await;

        let stats = self.telemetry.stats();
        info!(
            "Telemetry: {} points written, {} failed",
            stats.messages_sent, stats.messages_failed
        );

        if hub_lost {
            return Err(StationError::Hub(ConnectorError::ConnectionLost));
        }

        Ok(RunSummary {
            sensors,
            forwarded,
            computed,
        })
    }

    async fn disconnect(&self) {
        if let Err(e) = self.hub.disconnect().await {
            warn!("Hub disconnect failed: {}", e);
        }
    }
}

async fn join_task(name: &str, task: JoinHandle<u64>) -> u64 {
    task.await.unwrap_or_else(|e| {
        warn!("{} ended abnormally: {}", name, e);
        0
    })
}

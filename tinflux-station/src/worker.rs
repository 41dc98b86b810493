//! Derived metrics worker
//!
//! Ticks once at start-up and then every `callback period + 5 s`. A tick
//! computes only when temperature, humidity and air pressure have all been
//! measured; otherwise it stays waiting and writes nothing.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tinflux_core::{CoreError, MeasurementStore, PsychrometricInputs, Psychrometrics, SensorKind};

use crate::telemetry::Telemetry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerState {
    /// Not every input has been measured
    Waiting,
    /// Computing and writing one metric set
    Computing,
}

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// First input still at the sentinel
    Waiting { missing: SensorKind },
    /// Metrics computed and handed to telemetry
    Computed(Psychrometrics),
}

pub struct DerivedMetricsWorker {
    store: Arc<MeasurementStore>,
    telemetry: Arc<Telemetry>,
    altitude_offset_m: f64,
    interval: Duration,
    state: WorkerState,
}

impl DerivedMetricsWorker {
    pub fn new(
        store: Arc<MeasurementStore>,
        telemetry: Arc<Telemetry>,
        altitude_offset_m: f64,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            telemetry,
            altitude_offset_m,
            interval,
            state: WorkerState::Waiting,
        }
    }

    fn transition(&mut self, next: WorkerState) {
        debug!("Derived metrics worker {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Run one tick. Always ends back in the waiting state.
    pub async fn tick(&mut self) -> TickOutcome {
        let inputs = match PsychrometricInputs::from_store(&self.store, self.altitude_offset_m) {
            Ok(inputs) => inputs,
            Err(CoreError::MissingInput { kind, value }) => {
                debug!("Derived metrics waiting for {} (currently {})", kind, value);
                return TickOutcome::Waiting { missing: kind };
            }
        };

        self.transition(WorkerState::Computing);
        let metrics = Psychrometrics::compute(&inputs);
        for metric in metrics.metrics() {
            self.telemetry.write_derived(&metric).await;
        }
        self.transition(WorkerState::Waiting);

        TickOutcome::Computed(metrics)
    }

    /// Tick until `shutdown` fires. Returns the number of computed sets.
    pub async fn run(mut self, shutdown: CancellationToken) -> u64 {
        let mut computed = 0;
        while !shutdown.is_cancelled() {
            if let TickOutcome::Computed(_) = self.tick().await {
                computed += 1;
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("Derived metrics worker stopped after {} computations", computed);
        computed
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<u64> {
        tokio::spawn(self.run(shutdown))
    }
}

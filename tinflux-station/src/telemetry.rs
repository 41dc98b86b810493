//! Telemetry adapter and the bounded forwarding queue
//!
//! Sensor callbacks run on the hub's read task and must not do I/O. They
//! hand readings to a [`TelemetryQueue`]; one [`TelemetryForwarder`] task
//! drains it and performs the writes.
//!
//! ```text
//! callback ─try_send─▶ [ bounded queue ] ─recv─▶ forwarder ─▶ Telemetry ─▶ sink
//!                      full: drop + warn
//! ```

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use tinflux_connectors::{ConnectionStats, TelemetryPoint, TelemetrySink};
use tinflux_core::psychrometrics::CALCULATOR_TYPE;
use tinflux_core::{DerivedMetric, Measurement};

/// Queue capacity between sensor callbacks and the forwarder
pub const QUEUE_CAPACITY: usize = 256;

/// Writes station points to the sink, never failing the caller
pub struct Telemetry {
    sink: Arc<dyn TelemetrySink>,
    station_name: String,
}

impl Telemetry {
    pub fn new(sink: Arc<dyn TelemetrySink>, station_name: impl Into<String>) -> Self {
        Self {
            sink,
            station_name: station_name.into(),
        }
    }

    /// Measurement name of every point
    pub fn station_name(&self) -> &str {
        &self.station_name
    }

    /// Write one point. Failures are logged and reported as `false`.
    pub async fn write(&self, point: &TelemetryPoint) -> bool {
        let label = if point.sensor_type == CALCULATOR_TYPE {
            &point.unit_name
        } else {
            &point.sensor_type
        };
        info!("{}: {} {}", label, point.value, point.unit);

        match self.sink.write(point).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Problem while writing {} to InfluxDB: {}", label, e);
                false
            }
        }
    }

    /// Write a converted sensor reading
    pub async fn write_measurement(&self, reading: &Measurement) -> bool {
        self.write(&TelemetryPoint::from_measurement(self.station_name.as_str(), reading))
            .await
    }

    /// Write a derived metric stamped now
    pub async fn write_derived(&self, metric: &DerivedMetric) -> bool {
        let point = TelemetryPoint::now(
            self.station_name.as_str(),
            CALCULATOR_TYPE,
            metric.unit,
            metric.label,
            metric.value,
        );
        self.write(&point).await
    }

    /// Sink statistics
    pub fn stats(&self) -> ConnectionStats {
        self.sink.stats()
    }
}

/// Producer side, cloned into every sensor callback
#[derive(Clone)]
pub struct TelemetryQueue {
    tx: mpsc::Sender<Measurement>,
}

impl TelemetryQueue {
    /// Enqueue a reading without blocking. Returns `false` if it was dropped.
    pub fn submit(&self, reading: Measurement) -> bool {
        match self.tx.try_send(reading) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                warn!("Telemetry queue full, dropping {} reading", dropped.kind);
                false
            }
            Err(TrySendError::Closed(dropped)) => {
                debug!("Telemetry forwarder stopped, dropping {} reading", dropped.kind);
                false
            }
        }
    }
}

/// Consumer side, owns the writes
pub struct TelemetryForwarder {
    rx: mpsc::Receiver<Measurement>,
    telemetry: Arc<Telemetry>,
}

/// Create a queue/forwarder pair
pub fn channel(telemetry: Arc<Telemetry>, capacity: usize) -> (TelemetryQueue, TelemetryForwarder) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (TelemetryQueue { tx }, TelemetryForwarder { rx, telemetry })
}

impl TelemetryForwarder {
    /// Drain until shutdown or until every queue handle is gone.
    /// Returns the number of readings handed to the sink.
    pub async fn run(mut self, shutdown: CancellationToken) -> u64 {
        let mut forwarded = 0;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                next = self.rx.recv() => match next {
                    Some(reading) => {
                        self.telemetry.write_measurement(&reading).await;
                        forwarded += 1;
                    }
                    None => break,
                },
            }
        }
        debug!("Telemetry forwarder stopped after {} readings", forwarded);
        forwarded
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<u64> {
        tokio::spawn(self.run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tinflux_connectors::ConnectorError;
    use tinflux_core::SensorKind;

    #[derive(Default)]
    struct RecordingSink {
        points: Mutex<Vec<TelemetryPoint>>,
        fail_first: Mutex<usize>,
    }

    #[async_trait::async_trait]
    impl TelemetrySink for RecordingSink {
        async fn write(&self, point: &TelemetryPoint) -> Result<(), ConnectorError> {
            let mut fail = self.fail_first.lock().unwrap();
            if *fail > 0 {
                *fail -= 1;
                return Err(ConnectorError::Transport("influx down".into()));
            }
            self.points.lock().unwrap().push(point.clone());
            Ok(())
        }

        fn stats(&self) -> ConnectionStats {
            ConnectionStats::default()
        }
    }

    fn telemetry(sink: Arc<RecordingSink>) -> Arc<Telemetry> {
        Arc::new(Telemetry::new(sink, "garden"))
    }

    #[tokio::test]
    async fn failed_write_does_not_block_the_next() {
        let sink = Arc::new(RecordingSink::default());
        *sink.fail_first.lock().unwrap() = 1;
        let telemetry = telemetry(Arc::clone(&sink));

        let reading = SensorKind::Temperature.measure(2050, 1_700_000_000_000);
        assert!(!telemetry.write_measurement(&reading).await);
        assert!(telemetry.write_measurement(&reading).await);

        let points = sink.points.lock().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].measurement, "garden");
        assert_eq!(points[0].value, 20.5);
    }

    #[tokio::test]
    async fn derived_metrics_are_tagged_as_calculator() {
        let sink = Arc::new(RecordingSink::default());
        let telemetry = telemetry(Arc::clone(&sink));

        let metric = DerivedMetric {
            label: "DEW POINT",
            unit: "°C",
            value: 9.255,
        };
        assert!(telemetry.write_derived(&metric).await);

        let points = sink.points.lock().unwrap();
        assert_eq!(points[0].sensor_type, "CALCULATOR");
        assert_eq!(points[0].unit, "°C");
        assert_eq!(points[0].unit_name, "DEW POINT");
    }

    #[tokio::test]
    async fn full_queue_drops_readings() {
        let sink = Arc::new(RecordingSink::default());
        let (queue, forwarder) = channel(telemetry(Arc::clone(&sink)), 2);

        let reading = SensorKind::Humidity.measure(503, 0);
        assert!(queue.submit(reading));
        assert!(queue.submit(reading));
        assert!(!queue.submit(reading));

        drop(queue);
        let forwarded = forwarder.run(CancellationToken::new()).await;
        assert_eq!(forwarded, 2);
        assert_eq!(sink.points.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn forwarder_stops_on_shutdown() {
        let sink = Arc::new(RecordingSink::default());
        let (queue, forwarder) = channel(telemetry(sink), QUEUE_CAPACITY);
        let shutdown = CancellationToken::new();

        let task = forwarder.spawn(shutdown.clone());
        shutdown.cancel();
        assert_eq!(task.await.unwrap(), 0);

        assert!(!queue.submit(SensorKind::UvLight.measure(42, 0)));
    }
}

//! Safety side of the pipeline: fused snapshots in, alerts out.
//!
//! The fusion loop hands each published snapshot to a bounded channel with
//! `try_send`. A full channel drops the snapshot (counted and logged) rather
//! than stall fusion; the next snapshot supersedes it anyway.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::observers::ObserverHandle;
use crate::safety::{SafetyMetrics, SafetyMonitor};
use crate::sensors::FusionEngine;
use crate::types::{AlertLevel, FusedSensorData};

/// Totals for one safety loop run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopStats {
    pub snapshots_checked: u64,
    pub alerts_raised: u64,
    pub emergency_alerts: u64,
    /// Snapshots discarded because the loop was behind
    pub snapshots_dropped: u64,
}

/// Runs `check_all` for every snapshot it receives.
///
/// Built with [`new()`](SafetyLoop::new) or [`attach()`](SafetyLoop::attach),
/// then consumed by [`run()`](SafetyLoop::run).
pub struct SafetyLoop {
    monitor: Arc<Mutex<SafetyMonitor>>,
    rx: mpsc::Receiver<FusedSensorData>,
    operator_id: Option<String>,
    cancel_token: CancellationToken,
    dropped: Arc<AtomicU64>,
}

impl SafetyLoop {
    pub fn new(
        monitor: Arc<Mutex<SafetyMonitor>>,
        rx: mpsc::Receiver<FusedSensorData>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            monitor,
            rx,
            operator_id: None,
            cancel_token,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subscribe to `engine`'s published snapshots through a channel of
    /// `capacity` and return the loop plus the observer handle.
    pub fn attach(
        engine: &FusionEngine,
        monitor: Arc<Mutex<SafetyMonitor>>,
        cancel_token: CancellationToken,
        capacity: usize,
    ) -> (Self, ObserverHandle) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let safety_loop = Self::new(monitor, rx, cancel_token);
        let dropped = Arc::clone(&safety_loop.dropped);

        let handle = engine.register_data_callback(move |data: &FusedSensorData| {
            match tx.try_send(data.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
                    warn!(dropped = total, "Safety loop behind, snapshot dropped");
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Safety loop gone, snapshot discarded");
                }
            }
            Ok(())
        });

        (safety_loop, handle)
    }

    /// Include fatigue checks for this operator on every snapshot.
    #[must_use]
    pub fn with_operator(mut self, operator_id: impl Into<String>) -> Self {
        self.operator_id = Some(operator_id.into());
        self
    }

    /// Run until cancellation or until every sender is gone.
    pub async fn run(mut self) -> LoopStats {
        let mut stats = LoopStats::default();
        info!(operator = ?self.operator_id, "Safety loop started");

        loop {
            let data = tokio::select! {
                biased;
                () = self.cancel_token.cancelled() => {
                    info!("Safety loop shutdown signal received");
                    break;
                }
                next = self.rx.recv() => match next {
                    Some(data) => data,
                    None => {
                        info!("Snapshot channel closed");
                        break;
                    }
                },
            };

            let metrics = SafetyMetrics::from_fused(&data);
            let alerts = {
                let mut monitor = self.monitor.lock().await;
                monitor.check_all(&metrics, self.operator_id.as_deref())
            };

            stats.snapshots_checked += 1;
            stats.alerts_raised += alerts.len() as u64;
            stats.emergency_alerts += alerts
                .iter()
                .filter(|a| a.level == AlertLevel::Emergency)
                .count() as u64;
        }

        stats.snapshots_dropped = self.dropped.load(Ordering::Relaxed);
        info!(
            checked = stats.snapshots_checked,
            alerts = stats.alerts_raised,
            emergencies = stats.emergency_alerts,
            dropped = stats.snapshots_dropped,
            "Safety loop stopped"
        );
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PreprocessConfig, SafetyConfig, SensorsConfig};
    use crate::safety::EmergencyController;
    use chrono::Utc;

    fn monitor() -> Arc<Mutex<SafetyMonitor>> {
        Arc::new(Mutex::new(SafetyMonitor::new(
            SafetyConfig::default(),
            Arc::new(EmergencyController::new()),
        )))
    }

    fn snapshot(vibration_g: f64) -> FusedSensorData {
        FusedSensorData {
            vibration_g,
            pressure_bar: 200.0,
            temperature_hydraulic_c: 45.0,
            temperature_motor_c: 50.0,
            current_a: 100.0,
            ..FusedSensorData::empty(Utc::now())
        }
    }

    #[tokio::test]
    async fn test_loop_checks_until_channel_closes() {
        let monitor = monitor();
        let (tx, rx) = mpsc::channel(8);
        let safety_loop = SafetyLoop::new(Arc::clone(&monitor), rx, CancellationToken::new());

        tx.send(snapshot(1.0)).await.unwrap();
        tx.send(snapshot(3.0)).await.unwrap();
        tx.send(snapshot(7.0)).await.unwrap();
        drop(tx);

        let stats = safety_loop.run().await;
        assert_eq!(stats.snapshots_checked, 3);
        assert_eq!(stats.alerts_raised, 2);
        assert_eq!(stats.emergency_alerts, 1);
        assert!(monitor.lock().await.emergency().is_active());
    }

    #[tokio::test]
    async fn test_loop_stops_on_cancel() {
        let (_tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let safety_loop = SafetyLoop::new(monitor(), rx, cancel.clone());
        let task = tokio::spawn(safety_loop.run());
        cancel.cancel();
        let stats = task.await.unwrap();
        assert_eq!(stats.snapshots_checked, 0);
    }

    #[tokio::test]
    async fn test_attach_forwards_and_counts_drops() {
        let engine = FusionEngine::new(SensorsConfig::default(), PreprocessConfig::default());
        let (safety_loop, _handle) =
            SafetyLoop::attach(&engine, monitor(), CancellationToken::new(), 1);

        let now = Utc::now();
        for (id, t, v) in [
            ("rpm", crate::types::SensorType::Rpm, 100.0),
            ("cur", crate::types::SensorType::Current, 90.0),
            ("vib", crate::types::SensorType::Vibration, 1.0),
            ("dep", crate::types::SensorType::Depth, 5.0),
        ] {
            engine
                .submit_reading(crate::types::SensorReading::new(id, t, v, "").at(now))
                .unwrap();
        }
        // Capacity 1: the second published snapshot is dropped
        assert!(engine.run_cycle().is_some());
        assert!(engine.run_cycle().is_some());
        drop(engine);

        let stats = safety_loop.run().await;
        assert_eq!(stats.snapshots_checked, 1);
        assert_eq!(stats.snapshots_dropped, 1);
    }
}

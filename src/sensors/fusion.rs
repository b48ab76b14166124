//! Sensor Fusion Engine - periodic reduction of per-sensor buffers into one snapshot
//!
//! Ingestion is lock-light: the buffer map is write-locked only to create the
//! buffer for a never-seen sensor id, after which each reading only locks its
//! own buffer. The fusion loop reads the freshest sample per channel and
//! publishes the result through an `ArcSwapOption`, so snapshot readers never
//! contend with the loop.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::buffer::SensorBuffer;
use super::preprocess;
use super::{validate_reading, BatchOutcome, IngestError, ProcessingError};
use crate::config::{PreprocessConfig, SensorsConfig};
use crate::observers::{ObserverHandle, ObserverRegistry, OnFusedData, OnPrediction};
use crate::types::{
    BufferStatistics, Channel, FusedSensorData, PredictionResult, SensorHealthReport,
    SensorInput, SensorReading,
};

/// Material classifier consumed by the fusion loop.
///
/// Training happens elsewhere; the engine only asks whether the model is
/// ready and, if so, classifies each published snapshot.
pub trait MaterialPredictor: Send + Sync {
    fn is_ready(&self) -> bool;
    fn predict(&self, input: &SensorInput) -> anyhow::Result<PredictionResult>;
}

/// Lifetime counters for one engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FusionStats {
    pub cycles_run: u64,
    pub snapshots_published: u64,
    /// Cycles that found too little fresh data to publish
    pub cycles_skipped: u64,
    pub readings_accepted: u64,
    pub readings_rejected: u64,
    pub observer_failures: u64,
    pub prediction_failures: u64,
}

#[derive(Default)]
struct Counters {
    cycles_run: AtomicU64,
    snapshots_published: AtomicU64,
    cycles_skipped: AtomicU64,
    readings_accepted: AtomicU64,
    readings_rejected: AtomicU64,
    observer_failures: AtomicU64,
    prediction_failures: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> FusionStats {
        FusionStats {
            cycles_run: self.cycles_run.load(Ordering::Relaxed),
            snapshots_published: self.snapshots_published.load(Ordering::Relaxed),
            cycles_skipped: self.cycles_skipped.load(Ordering::Relaxed),
            readings_accepted: self.readings_accepted.load(Ordering::Relaxed),
            readings_rejected: self.readings_rejected.load(Ordering::Relaxed),
            observer_failures: self.observer_failures.load(Ordering::Relaxed),
            prediction_failures: self.prediction_failures.load(Ordering::Relaxed),
        }
    }
}

type SharedBuffer = Arc<Mutex<SensorBuffer>>;

/// Owns one buffer per sensor id and the latest fused snapshot.
///
/// Construct once, wrap in `Arc`, and share: producers call
/// [`submit_reading`](Self::submit_reading) concurrently while
/// [`start`](Self::start) drives the fusion cycle.
pub struct FusionEngine {
    config: SensorsConfig,
    preprocess: PreprocessConfig,
    buffers: RwLock<HashMap<String, SharedBuffer>>,
    /// Sensor id feeding each channel: the first one seen, until it goes
    /// stale while another sensor of the same type is live
    bindings: RwLock<HashMap<Channel, String>>,
    snapshot: ArcSwapOption<FusedSensorData>,
    data_observers: ObserverRegistry<dyn OnFusedData>,
    prediction_observers: ObserverRegistry<dyn OnPrediction>,
    predictor: RwLock<Option<Arc<dyn MaterialPredictor>>>,
    counters: Counters,
    running: AtomicBool,
}

impl FusionEngine {
    pub fn new(config: SensorsConfig, preprocess: PreprocessConfig) -> Self {
        Self {
            config,
            preprocess,
            buffers: RwLock::new(HashMap::new()),
            bindings: RwLock::new(HashMap::new()),
            snapshot: ArcSwapOption::empty(),
            data_observers: ObserverRegistry::new(),
            prediction_observers: ObserverRegistry::new(),
            predictor: RwLock::new(None),
            counters: Counters::default(),
            running: AtomicBool::new(false),
        }
    }

    pub fn config(&self) -> &SensorsConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Ingestion
    // ========================================================================

    /// Validate and buffer one reading.
    ///
    /// Readings for a sensor id are stored in call order. A reading rejected
    /// here leaves every buffer untouched.
    pub fn submit_reading(&self, reading: SensorReading) -> Result<(), IngestError> {
        if let Err(e) = validate_reading(&reading) {
            self.counters.readings_rejected.fetch_add(1, Ordering::Relaxed);
            warn!(error = %e, "Rejected sensor reading");
            return Err(e);
        }

        let buffer = self.buffer_for(&reading);
        buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .add(reading);
        self.counters.readings_accepted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Submit readings in order, continuing past rejected ones.
    pub fn submit_batch(&self, readings: impl IntoIterator<Item = SensorReading>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for reading in readings {
            match self.submit_reading(reading) {
                Ok(()) => outcome.accepted += 1,
                Err(_) => outcome.rejected += 1,
            }
        }
        outcome
    }

    fn buffer_for(&self, reading: &SensorReading) -> SharedBuffer {
        if let Some(existing) = self
            .buffers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&reading.sensor_id)
        {
            return Arc::clone(existing);
        }

        let mut buffers = self.buffers.write().unwrap_or_else(|e| e.into_inner());
        // Another producer may have created it between the two locks
        if let Some(existing) = buffers.get(&reading.sensor_id) {
            return Arc::clone(existing);
        }

        let sensor_type = reading.sensor_type;
        let capacity = self.config.buffer_capacity(sensor_type);
        let expected_rate = self.config.profile(sensor_type).expected_rate_hz;
        let buffer = Arc::new(Mutex::new(
            SensorBuffer::new(reading.sensor_id.clone(), sensor_type, capacity, expected_rate)
                .with_rate_window(self.config.rate_window),
        ));
        buffers.insert(reading.sensor_id.clone(), Arc::clone(&buffer));
        info!(
            sensor_id = %reading.sensor_id,
            sensor_type = %sensor_type,
            capacity,
            "Created sensor buffer"
        );

        if let Some(channel) = sensor_type.channel() {
            let mut bindings = self.bindings.write().unwrap_or_else(|e| e.into_inner());
            if !bindings.contains_key(&channel) {
                bindings.insert(channel, reading.sensor_id.clone());
                info!(channel = %channel, sensor_id = %reading.sensor_id, "Bound sensor to channel");
            }
        }

        buffer
    }

    fn buffer(&self, sensor_id: &str) -> Option<SharedBuffer> {
        self.buffers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(sensor_id)
            .cloned()
    }

    fn all_buffers(&self) -> Vec<(String, SharedBuffer)> {
        self.buffers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(id, b)| (id.clone(), Arc::clone(b)))
            .collect()
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Most recently published snapshot, if any cycle has succeeded.
    pub fn current_snapshot(&self) -> Option<Arc<FusedSensorData>> {
        self.snapshot.load_full()
    }

    pub fn channel_bindings(&self) -> HashMap<Channel, String> {
        self.bindings
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn sensor_health(&self) -> HashMap<String, SensorHealthReport> {
        self.sensor_health_at(Utc::now())
    }

    pub fn sensor_health_at(&self, now: DateTime<Utc>) -> HashMap<String, SensorHealthReport> {
        let max_age = self.config.max_data_age();
        self.all_buffers()
            .into_iter()
            .map(|(id, buffer)| {
                let mut buffer = buffer.lock().unwrap_or_else(|e| e.into_inner());
                let range = self.config.profile(buffer.sensor_type()).valid_range();
                (id, buffer.assess_health(range, max_age, now))
            })
            .collect()
    }

    pub fn buffer_statistics(&self) -> HashMap<String, BufferStatistics> {
        self.all_buffers()
            .into_iter()
            .map(|(id, buffer)| {
                let stats = buffer.lock().unwrap_or_else(|e| e.into_inner()).statistics();
                (id, stats)
            })
            .collect()
    }

    /// Last `n` buffered values of a sensor with its type's conditioning applied.
    pub fn conditioned_values(&self, sensor_id: &str, n: usize) -> Result<Vec<f64>, ProcessingError> {
        let buffer = self
            .buffer(sensor_id)
            .ok_or_else(|| ProcessingError::UnknownSensor(sensor_id.to_string()))?;
        let (values, sensor_type) = {
            let guard = buffer.lock().unwrap_or_else(|e| e.into_inner());
            (guard.last_values(n), guard.sensor_type())
        };
        preprocess::preprocess(&values, sensor_type, &self.preprocess)
    }

    pub fn outliers(&self, sensor_id: &str, z_threshold: f64) -> Result<Vec<SensorReading>, ProcessingError> {
        let buffer = self
            .buffer(sensor_id)
            .ok_or_else(|| ProcessingError::UnknownSensor(sensor_id.to_string()))?;
        let outliers = buffer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .detect_outliers(z_threshold);
        Ok(outliers)
    }

    pub fn stats(&self) -> FusionStats {
        self.counters.snapshot()
    }

    // ========================================================================
    // Observers
    // ========================================================================

    pub fn register_data_observer(&self, observer: Arc<dyn OnFusedData>) -> ObserverHandle {
        self.data_observers.register(observer)
    }

    pub fn register_data_callback<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&FusedSensorData) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.data_observers.register(Arc::new(callback))
    }

    pub fn unregister_data_observer(&self, handle: ObserverHandle) -> bool {
        self.data_observers.unregister(handle)
    }

    pub fn register_prediction_observer(&self, observer: Arc<dyn OnPrediction>) -> ObserverHandle {
        self.prediction_observers.register(observer)
    }

    pub fn register_prediction_callback<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&PredictionResult) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.prediction_observers.register(Arc::new(callback))
    }

    pub fn unregister_prediction_observer(&self, handle: ObserverHandle) -> bool {
        self.prediction_observers.unregister(handle)
    }

    pub fn set_predictor(&self, predictor: Arc<dyn MaterialPredictor>) {
        *self.predictor.write().unwrap_or_else(|e| e.into_inner()) = Some(predictor);
    }

    pub fn clear_predictor(&self) {
        *self.predictor.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    // ========================================================================
    // Fusion cycle
    // ========================================================================

    /// Build a snapshot from the buffers as of `now` without publishing it.
    ///
    /// Returns `None` unless every essential channel is fresh or at least
    /// `min_active_channels` channels are.
    pub fn fuse_at(&self, now: DateTime<Utc>) -> Option<FusedSensorData> {
        let mut bindings = self.channel_bindings();
        let max_age = self.config.max_data_age();

        let mut values: HashMap<Channel, f64> = HashMap::with_capacity(Channel::ALL.len());
        let mut raw_readings = HashMap::new();

        for channel in Channel::ALL {
            let bound = bindings.get(&channel).cloned();
            let mut fresh = bound
                .as_deref()
                .and_then(|id| self.buffer(id))
                .and_then(|buffer| {
                    let guard = buffer.lock().unwrap_or_else(|e| e.into_inner());
                    guard.latest().cloned()
                })
                .filter(|latest| now - latest.timestamp <= max_age);

            if fresh.is_none() {
                if let Some(standby) = self.live_standby(channel, bound.as_deref(), now) {
                    self.rebind(channel, bound.as_deref(), &standby.sensor_id);
                    bindings.insert(channel, standby.sensor_id.clone());
                    fresh = Some(standby);
                }
            }

            match fresh {
                Some(reading) => {
                    values.insert(channel, reading.value);
                    raw_readings.insert(channel, reading);
                }
                None => {
                    values.insert(channel, self.config.fallbacks.get(channel));
                }
            }
        }

        let sensors_active = raw_readings.len();
        let sensors_total = Channel::ALL.len();
        let has_essentials = Channel::ESSENTIAL
            .iter()
            .all(|c| raw_readings.contains_key(c));
        if !has_essentials && sensors_active < self.config.min_active_channels {
            return None;
        }

        let value = |c: Channel| values.get(&c).copied().unwrap_or_else(|| self.config.fallbacks.get(c));
        Some(FusedSensorData {
            timestamp: now,
            rpm: value(Channel::Rpm),
            current_a: value(Channel::Current),
            vibration_g: value(Channel::Vibration),
            depth_m: value(Channel::Depth),
            pressure_bar: value(Channel::Pressure),
            temperature_hydraulic_c: value(Channel::TemperatureHydraulic),
            temperature_motor_c: value(Channel::TemperatureMotor),
            acoustic_db: value(Channel::Acoustic),
            power_kw: value(Channel::Power),
            feed_rate_m_min: self.feed_rate(bindings.get(&Channel::Depth)),
            overall_quality: sensors_active as f64 / sensors_total as f64,
            sensors_active,
            sensors_total,
            raw_readings,
        })
    }

    /// Freshest in-date reading from any other sensor feeding `channel`.
    fn live_standby(
        &self,
        channel: Channel,
        bound: Option<&str>,
        now: DateTime<Utc>,
    ) -> Option<SensorReading> {
        let max_age = self.config.max_data_age();
        self.all_buffers()
            .into_iter()
            .filter(|(id, _)| Some(id.as_str()) != bound)
            .filter_map(|(_, buffer)| {
                let guard = buffer.lock().unwrap_or_else(|e| e.into_inner());
                if guard.sensor_type().channel() != Some(channel) {
                    return None;
                }
                guard.latest().cloned()
            })
            .filter(|latest| now - latest.timestamp <= max_age)
            .max_by(|a, b| {
                a.timestamp
                    .cmp(&b.timestamp)
                    .then_with(|| b.sensor_id.cmp(&a.sensor_id))
            })
    }

    fn rebind(&self, channel: Channel, from: Option<&str>, to: &str) {
        self.bindings
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(channel, to.to_string());
        warn!(channel = %channel, from = from.unwrap_or("-"), to, "Bound sensor stale, channel rebound");
    }

    /// Penetration rate from the first and last of the latest depth samples (m/min).
    fn feed_rate(&self, depth_sensor: Option<&String>) -> f64 {
        let window = self.config.feed_rate_window;
        let Some(buffer) = depth_sensor.and_then(|id| self.buffer(id)) else {
            return 0.0;
        };
        let buffer = buffer.lock().unwrap_or_else(|e| e.into_inner());
        if buffer.count() < window {
            return 0.0;
        }
        let mut recent = buffer.recent(window);
        let (Some(first), Some(last)) = (recent.next(), recent.last()) else {
            return 0.0;
        };
        let elapsed = (last.timestamp - first.timestamp)
            .num_microseconds()
            .map_or(0.0, |us| us as f64 / 1e6);
        if elapsed <= 0.0 {
            return 0.0;
        }
        (last.value - first.value).abs() / elapsed * 60.0
    }

    /// Run one fusion cycle: fuse, publish, notify observers, classify.
    ///
    /// Observer and predictor failures are logged and counted; they never
    /// prevent the snapshot from being published.
    pub fn run_cycle(&self) -> Option<Arc<FusedSensorData>> {
        self.counters.cycles_run.fetch_add(1, Ordering::Relaxed);

        let Some(fused) = self.fuse_at(Utc::now()) else {
            self.counters.cycles_skipped.fetch_add(1, Ordering::Relaxed);
            debug!("Insufficient fresh sensor data, fusion cycle skipped");
            return None;
        };

        let fused = Arc::new(fused);
        self.snapshot.store(Some(Arc::clone(&fused)));
        self.counters.snapshots_published.fetch_add(1, Ordering::Relaxed);

        let failures = self
            .data_observers
            .dispatch("fused_data", |o| o.on_fused_data(&fused));
        self.counters
            .observer_failures
            .fetch_add(failures as u64, Ordering::Relaxed);

        self.classify(&fused);
        Some(fused)
    }

    fn classify(&self, fused: &FusedSensorData) {
        let predictor = self
            .predictor
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let Some(predictor) = predictor else {
            return;
        };
        if !predictor.is_ready() {
            return;
        }

        let input = fused.to_sensor_input();
        let prediction = match catch_unwind(AssertUnwindSafe(|| predictor.predict(&input))) {
            Ok(Ok(prediction)) => prediction,
            Ok(Err(e)) => {
                self.counters.prediction_failures.fetch_add(1, Ordering::Relaxed);
                error!(error = %e, "Material prediction failed");
                return;
            }
            Err(_) => {
                self.counters.prediction_failures.fetch_add(1, Ordering::Relaxed);
                error!("Material predictor panicked");
                return;
            }
        };

        let failures = self
            .prediction_observers
            .dispatch("prediction", |o| o.on_prediction(&prediction));
        self.counters
            .observer_failures
            .fetch_add(failures as u64, Ordering::Relaxed);
    }

    /// Spawn the periodic fusion loop on the current tokio runtime.
    ///
    /// Returns `None` if a loop for this engine is already running.
    pub fn start(self: &Arc<Self>) -> Option<FusionHandle> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            warn!("Fusion loop already running, start ignored");
            return None;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let engine = Arc::clone(self);
        let period = Duration::from_millis(self.config.fusion_interval_ms.max(1));

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            info!(period_ms = period.as_millis() as u64, "Fusion loop started");

            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => {
                        info!("Fusion loop shutdown signal received");
                        break;
                    }
                    _ = ticker.tick() => {
                        engine.run_cycle();
                    }
                }
            }

            engine.running.store(false, Ordering::SeqCst);
            let stats = engine.stats();
            info!(
                cycles = stats.cycles_run,
                published = stats.snapshots_published,
                skipped = stats.cycles_skipped,
                "Fusion loop stopped"
            );
        });

        Some(FusionHandle { cancel, task })
    }
}

/// Control handle for a running fusion loop.
pub struct FusionHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl FusionHandle {
    /// Token that stops the loop when cancelled; may be shared with other tasks.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop the loop and wait for it to exit. A cycle already in progress
    /// completes; no further cycle starts.
    pub async fn stop(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            error!(error = %e, "Fusion loop task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SensorType;
    use chrono::Duration as ChronoDuration;
    use std::sync::atomic::AtomicUsize;

    fn engine() -> FusionEngine {
        FusionEngine::new(SensorsConfig::default(), PreprocessConfig::default())
    }

    fn reading(id: &str, t: SensorType, v: f64, at: DateTime<Utc>) -> SensorReading {
        SensorReading::new(id, t, v, "").at(at)
    }

    fn submit_essentials(engine: &FusionEngine, at: DateTime<Utc>) {
        engine.submit_reading(reading("rpm-1", SensorType::Rpm, 120.0, at)).unwrap();
        engine.submit_reading(reading("cur-1", SensorType::Current, 80.0, at)).unwrap();
        engine.submit_reading(reading("vib-1", SensorType::Vibration, 1.2, at)).unwrap();
        engine.submit_reading(reading("dep-1", SensorType::Depth, 12.5, at)).unwrap();
    }

    struct FixedPredictor {
        ready: bool,
        calls: AtomicUsize,
    }

    impl MaterialPredictor for FixedPredictor {
        fn is_ready(&self) -> bool {
            self.ready
        }

        fn predict(&self, input: &SensorInput) -> anyhow::Result<PredictionResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(PredictionResult {
                material: "granite".to_string(),
                confidence: 0.9,
                probabilities: HashMap::new(),
                timestamp: input.timestamp,
            })
        }
    }

    #[test]
    fn test_essentials_produce_snapshot_with_exact_quality() {
        let e = engine();
        let now = Utc::now();
        submit_essentials(&e, now);
        let fused = e.fuse_at(now).expect("essentials present");
        assert_eq!(fused.sensors_active, 4);
        assert_eq!(fused.sensors_total, 9);
        assert!((fused.overall_quality - 4.0 / 9.0).abs() < 1e-12);
        assert_eq!(fused.rpm, 120.0);
        assert_eq!(fused.depth_m, 12.5);
        // Inactive channels carry their fallbacks
        assert_eq!(fused.pressure_bar, 200.0);
        assert_eq!(fused.temperature_hydraulic_c, 45.0);
        assert_eq!(fused.temperature_motor_c, 50.0);
        assert_eq!(fused.acoustic_db, 70.0);
        assert!(!fused.is_active(Channel::Pressure));
    }

    #[test]
    fn test_single_channel_is_not_enough() {
        let e = engine();
        let now = Utc::now();
        e.submit_reading(reading("rpm-1", SensorType::Rpm, 120.0, now)).unwrap();
        assert!(e.fuse_at(now).is_none());

        e.submit_reading(reading("p-1", SensorType::Pressure, 250.0, now)).unwrap();
        let fused = e.fuse_at(now).expect("two active channels suffice");
        assert_eq!(fused.sensors_active, 2);
        assert_eq!(fused.pressure_bar, 250.0);
    }

    #[test]
    fn test_stale_channel_falls_back() {
        let e = engine();
        let now = Utc::now();
        submit_essentials(&e, now);
        e.submit_reading(reading("p-1", SensorType::Pressure, 300.0, now - ChronoDuration::seconds(6)))
            .unwrap();
        let fused = e.fuse_at(now).unwrap();
        assert_eq!(fused.pressure_bar, 200.0);
        assert_eq!(fused.sensors_active, 4);

        // Everything stale: nothing to publish
        assert!(e.fuse_at(now + ChronoDuration::seconds(30)).is_none());
    }

    #[test]
    fn test_first_sensor_binds_channel() {
        let e = engine();
        let now = Utc::now();
        e.submit_reading(reading("depth-a", SensorType::Depth, 1.0, now)).unwrap();
        e.submit_reading(reading("depth-b", SensorType::Depth, 99.0, now)).unwrap();
        e.submit_reading(reading("t-1", SensorType::Temperature, 61.0, now)).unwrap();
        let bindings = e.channel_bindings();
        assert_eq!(bindings.get(&Channel::Depth).map(String::as_str), Some("depth-a"));
        assert_eq!(
            bindings.get(&Channel::TemperatureHydraulic).map(String::as_str),
            Some("t-1")
        );
        let fused = e.fuse_at(now).unwrap();
        assert_eq!(fused.depth_m, 1.0);
        assert_eq!(fused.temperature_hydraulic_c, 61.0);
    }

    #[test]
    fn test_feed_rate_from_depth_window() {
        let e = engine();
        let now = Utc::now();
        submit_essentials(&e, now);
        // 10 depth samples over 0.9 s advancing 0.01 m each
        for i in 0..10 {
            let at = now - ChronoDuration::milliseconds(900 - i * 100);
            e.submit_reading(reading("dep-1", SensorType::Depth, 20.0 + 0.01 * i as f64, at))
                .unwrap();
        }
        let fused = e.fuse_at(now).unwrap();
        assert!((fused.feed_rate_m_min - 6.0).abs() < 1e-6, "{}", fused.feed_rate_m_min);
    }

    #[test]
    fn test_feed_rate_zero_with_few_samples() {
        let e = engine();
        let now = Utc::now();
        submit_essentials(&e, now);
        assert_eq!(e.fuse_at(now).unwrap().feed_rate_m_min, 0.0);
    }

    #[test]
    fn test_rejected_readings_leave_buffers_untouched() {
        let e = engine();
        let now = Utc::now();
        let outcome = e.submit_batch(vec![
            reading("rpm-1", SensorType::Rpm, 100.0, now),
            reading("", SensorType::Rpm, 100.0, now),
            reading("cur-1", SensorType::Current, f64::INFINITY, now),
        ]);
        assert_eq!(outcome, BatchOutcome { accepted: 1, rejected: 2 });
        let stats = e.buffer_statistics();
        assert_eq!(stats.len(), 1);
        assert!(stats.contains_key("rpm-1"));
        assert_eq!(e.stats().readings_rejected, 2);
    }

    #[test]
    fn test_run_cycle_publishes_and_isolates_observer_failures() {
        let e = engine();
        submit_essentials(&e, Utc::now());

        let seen = Arc::new(AtomicUsize::new(0));
        e.register_data_callback(|_| anyhow::bail!("dashboard disconnected"));
        let counter = Arc::clone(&seen);
        let handle = e.register_data_callback(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(e.run_cycle().is_some());
        assert!(e.current_snapshot().is_some());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert_eq!(e.stats().observer_failures, 1);

        assert!(e.unregister_data_observer(handle));
        e.run_cycle();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_skipped_cycle_keeps_previous_snapshot() {
        let e = engine();
        assert!(e.run_cycle().is_none());
        assert!(e.current_snapshot().is_none());
        assert_eq!(e.stats().cycles_skipped, 1);
    }

    #[test]
    fn test_predictor_only_runs_when_ready() {
        let e = engine();
        submit_essentials(&e, Utc::now());
        let predictions = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&predictions);
        e.register_prediction_callback(move |p| {
            if p.material == "granite" {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        });

        let idle = Arc::new(FixedPredictor { ready: false, calls: AtomicUsize::new(0) });
        e.set_predictor(idle.clone());
        e.run_cycle();
        assert_eq!(idle.calls.load(Ordering::SeqCst), 0);
        assert_eq!(predictions.load(Ordering::SeqCst), 0);

        let ready = Arc::new(FixedPredictor { ready: true, calls: AtomicUsize::new(0) });
        e.set_predictor(ready.clone());
        e.run_cycle();
        assert_eq!(ready.calls.load(Ordering::SeqCst), 1);
        assert_eq!(predictions.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_conditioned_values_unknown_sensor() {
        let e = engine();
        assert!(matches!(
            e.conditioned_values("nope", 10),
            Err(ProcessingError::UnknownSensor(_))
        ));
    }

    #[tokio::test]
    async fn test_loop_publishes_until_stopped() {
        let e = Arc::new(engine());
        submit_essentials(&e, Utc::now());

        let handle = e.start().expect("first start");
        assert!(e.start().is_none(), "second start is refused");
        tokio::time::sleep(Duration::from_millis(350)).await;
        handle.stop().await;

        assert!(!e.is_running());
        assert!(e.current_snapshot().is_some());
        let published = e.stats().snapshots_published;
        assert!(published >= 2, "published {published}");

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(e.stats().snapshots_published, published);
    }
}

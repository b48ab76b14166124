//! Per-sensor ring buffer with O(1) running statistics and health assessment

use std::collections::VecDeque;

use chrono::{DateTime, Utc};

use crate::config::defaults::{
    CALIBRATION_DRIFT, DEGRADED_DRIFT, DEGRADED_NOISE_CV, DEGRADED_OUT_OF_RANGE_PERCENT,
    FAULTY_OUT_OF_RANGE_PERCENT, FAULTY_RATE_FRACTION, MIN_DRIFT_SAMPLES, MIN_OUTLIER_SAMPLES,
    RATE_ESTIMATION_WINDOW,
};
use crate::types::{BufferStatistics, SensorHealthReport, SensorReading, SensorStatus, SensorType};

/// Capacity-bounded history for one sensor id, oldest evicted first.
///
/// `sum` and `sum_sq` always describe exactly the buffered values. They are
/// rebuilt from the contents once per full turn of the ring so floating-point
/// error from repeated add/subtract cannot accumulate without bound.
#[derive(Debug, Clone)]
pub struct SensorBuffer {
    sensor_id: String,
    sensor_type: SensorType,
    capacity: usize,
    expected_rate_hz: f64,
    rate_window: usize,
    readings: VecDeque<SensorReading>,
    sum: f64,
    sum_sq: f64,
    evictions_since_rebuild: usize,
    total_readings: u64,
    status: SensorStatus,
}

impl SensorBuffer {
    pub fn new(
        sensor_id: impl Into<String>,
        sensor_type: SensorType,
        capacity: usize,
        expected_rate_hz: f64,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            sensor_id: sensor_id.into(),
            sensor_type,
            capacity,
            expected_rate_hz,
            rate_window: RATE_ESTIMATION_WINDOW,
            readings: VecDeque::with_capacity(capacity.min(4096)),
            sum: 0.0,
            sum_sq: 0.0,
            evictions_since_rebuild: 0,
            total_readings: 0,
            status: SensorStatus::Offline,
        }
    }

    /// Number of most recent readings used by [`rate_hz`](Self::rate_hz).
    #[must_use]
    pub fn with_rate_window(mut self, window: usize) -> Self {
        self.rate_window = window.max(2);
        self
    }

    pub fn sensor_id(&self) -> &str {
        &self.sensor_id
    }

    pub fn sensor_type(&self) -> SensorType {
        self.sensor_type
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn count(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Readings accepted over the buffer's lifetime, including evicted ones.
    pub fn total_readings(&self) -> u64 {
        self.total_readings
    }

    /// Status from the most recent health assessment.
    pub fn status(&self) -> SensorStatus {
        self.status
    }

    pub fn latest(&self) -> Option<&SensorReading> {
        self.readings.back()
    }

    pub fn add(&mut self, reading: SensorReading) {
        if self.readings.len() >= self.capacity {
            if let Some(old) = self.readings.pop_front() {
                self.sum -= old.value;
                self.sum_sq -= old.value * old.value;
                self.evictions_since_rebuild += 1;
            }
        }
        self.sum += reading.value;
        self.sum_sq += reading.value * reading.value;
        self.readings.push_back(reading);
        self.total_readings += 1;

        if self.evictions_since_rebuild >= self.capacity {
            self.rebuild_aggregates();
        }
    }

    fn rebuild_aggregates(&mut self) {
        self.sum = self.readings.iter().map(|r| r.value).sum();
        self.sum_sq = self.readings.iter().map(|r| r.value * r.value).sum();
        self.evictions_since_rebuild = 0;
    }

    /// The `n` most recent readings, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &SensorReading> {
        self.readings.iter().skip(self.readings.len().saturating_sub(n))
    }

    /// All buffered values, oldest first.
    pub fn values(&self) -> Vec<f64> {
        self.readings.iter().map(|r| r.value).collect()
    }

    /// The `n` most recent values, oldest first.
    pub fn last_values(&self, n: usize) -> Vec<f64> {
        self.recent(n).map(|r| r.value).collect()
    }

    pub fn statistics(&self) -> BufferStatistics {
        let count = self.readings.len();
        if count == 0 {
            return BufferStatistics::default();
        }
        let n = count as f64;
        let mean = self.sum / n;
        let variance = (self.sum_sq / n - mean * mean).max(0.0);
        let (min, max) = self
            .readings
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                (lo.min(r.value), hi.max(r.value))
            });
        BufferStatistics {
            mean,
            std: variance.sqrt(),
            min,
            max,
            count,
        }
    }

    /// Realised sampling rate over the most recent readings (Hz).
    ///
    /// Zero with fewer than two readings or a non-positive time span.
    pub fn rate_hz(&self) -> f64 {
        let window = self.rate_window.min(self.readings.len());
        if window < 2 {
            return 0.0;
        }
        let mut recent = self.recent(window);
        let (Some(first), Some(last)) = (recent.next(), recent.last()) else {
            return 0.0;
        };
        let span = (last.timestamp - first.timestamp)
            .num_microseconds()
            .map_or(0.0, |us| us as f64 / 1e6);
        if span <= 0.0 {
            return 0.0;
        }
        window as f64 / span
    }

    /// Readings whose z-score exceeds `z_threshold`.
    ///
    /// Empty with fewer than ten samples or zero spread.
    pub fn detect_outliers(&self, z_threshold: f64) -> Vec<SensorReading> {
        if self.readings.len() < MIN_OUTLIER_SAMPLES {
            return Vec::new();
        }
        let stats = self.statistics();
        if stats.std <= 0.0 {
            return Vec::new();
        }
        self.readings
            .iter()
            .filter(|r| ((r.value - stats.mean) / stats.std).abs() > z_threshold)
            .cloned()
            .collect()
    }

    /// Classify the sensor and record the result as its current status.
    pub fn assess_health(
        &mut self,
        valid_range: (f64, f64),
        max_age: chrono::Duration,
        now: DateTime<Utc>,
    ) -> SensorHealthReport {
        let report = self.build_health_report(valid_range, max_age, now);
        self.status = report.status;
        report
    }

    fn build_health_report(
        &self,
        (valid_min, valid_max): (f64, f64),
        max_age: chrono::Duration,
        now: DateTime<Utc>,
    ) -> SensorHealthReport {
        let offline = |last_reading_time, requires_calibration, message: String| SensorHealthReport {
            sensor_id: self.sensor_id.clone(),
            sensor_type: self.sensor_type,
            status: SensorStatus::Offline,
            last_reading_time,
            readings_per_second: 0.0,
            noise_level: 0.0,
            drift: 0.0,
            out_of_range_percent: 0.0,
            requires_calibration,
            message,
        };

        let Some(latest) = self.latest() else {
            return offline(None, true, "Sensor offline - no readings received".to_string());
        };
        let age = now - latest.timestamp;
        if age > max_age {
            return offline(
                Some(latest.timestamp),
                false,
                format!(
                    "Sensor offline - last reading {:.1}s ago",
                    latest.age_secs(now)
                ),
            );
        }

        let rate = self.rate_hz();
        let stats = self.statistics();
        let values = self.values();

        let out_of_range = values
            .iter()
            .filter(|v| **v < valid_min || **v > valid_max)
            .count();
        let out_of_range_percent = out_of_range as f64 / values.len() as f64 * 100.0;

        let noise_level = if stats.mean == 0.0 {
            0.0
        } else {
            stats.std / stats.mean.abs()
        };

        let drift = if values.len() >= MIN_DRIFT_SAMPLES {
            let half = values.len() / 2;
            let first = mean(&values[..half]);
            let second = mean(&values[half..]);
            (second - first) / (first.abs() + 1e-10)
        } else {
            0.0
        };

        let (status, requires_calibration, message) = if out_of_range_percent
            > FAULTY_OUT_OF_RANGE_PERCENT
            || rate < self.expected_rate_hz * FAULTY_RATE_FRACTION
        {
            (
                SensorStatus::Faulty,
                false,
                format!(
                    "Sensor faulty - {out_of_range_percent:.1}% out of range, {rate:.1} Hz of {:.1} Hz expected",
                    self.expected_rate_hz
                ),
            )
        } else if out_of_range_percent > DEGRADED_OUT_OF_RANGE_PERCENT
            || noise_level > DEGRADED_NOISE_CV
            || drift.abs() > DEGRADED_DRIFT
        {
            (
                SensorStatus::Degraded,
                drift.abs() > CALIBRATION_DRIFT,
                "Sensor degraded - elevated noise or drift".to_string(),
            )
        } else {
            (
                SensorStatus::Healthy,
                false,
                "Sensor operating normally".to_string(),
            )
        };

        SensorHealthReport {
            sensor_id: self.sensor_id.clone(),
            sensor_type: self.sensor_type,
            status,
            last_reading_time: Some(latest.timestamp),
            readings_per_second: rate,
            noise_level,
            drift,
            out_of_range_percent,
            requires_calibration,
            message,
        }
    }

    /// Drop all readings. Lifetime counters are kept.
    pub fn clear(&mut self) {
        self.readings.clear();
        self.sum = 0.0;
        self.sum_sq = 0.0;
        self.evictions_since_rebuild = 0;
        self.status = SensorStatus::Offline;
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

//! Per-sensor health and buffer statistics

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SensorType;

/// Health classification of one physical sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    Healthy,
    Degraded,
    Faulty,
    Offline,
    /// Set externally while a calibration routine owns the sensor
    Calibrating,
}

impl std::fmt::Display for SensorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorStatus::Healthy => write!(f, "healthy"),
            SensorStatus::Degraded => write!(f, "degraded"),
            SensorStatus::Faulty => write!(f, "faulty"),
            SensorStatus::Offline => write!(f, "offline"),
            SensorStatus::Calibrating => write!(f, "calibrating"),
        }
    }
}

/// Result of [`SensorBuffer::assess_health`](crate::sensors::SensorBuffer::assess_health).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorHealthReport {
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub status: SensorStatus,
    pub last_reading_time: Option<DateTime<Utc>>,
    pub readings_per_second: f64,
    /// Coefficient of variation of the buffered values
    pub noise_level: f64,
    /// Relative change between first-half and second-half means
    pub drift: f64,
    pub out_of_range_percent: f64,
    pub requires_calibration: bool,
    pub message: String,
}

/// Summary statistics over a buffer's current contents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BufferStatistics {
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

//! Sensor ingestion, buffering, conditioning, and fusion
//!
//! Readings enter through [`FusionEngine::submit_reading`], land in a per-sensor
//! [`SensorBuffer`], and are reduced to one [`FusedSensorData`](crate::types::FusedSensorData)
//! snapshot per fusion cycle.

mod buffer;
mod fusion;
pub mod preprocess;

pub use buffer::SensorBuffer;
pub use fusion::{FusionEngine, FusionHandle, FusionStats, MaterialPredictor};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SensorReading;

/// Why a reading was refused at ingestion. Rejected readings never reach a buffer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IngestError {
    #[error("reading has an empty sensor_id")]
    EmptySensorId,

    #[error("sensor {sensor_id}: value {value} is not finite")]
    NonFiniteValue { sensor_id: String, value: f64 },

    #[error("sensor {sensor_id}: quality {quality} outside [0, 1]")]
    QualityOutOfRange { sensor_id: String, quality: f64 },
}

/// Misuse of a conditioning operation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessingError {
    #[error("sampling rate must be positive and finite, got {0}")]
    InvalidSamplingRate(f64),

    #[error("cutoff frequency must be positive and finite, got {0}")]
    InvalidCutoff(f64),

    #[error("filter order must be at least 1, got {0}")]
    InvalidFilterOrder(usize),

    #[error("no buffer for sensor {0}")]
    UnknownSensor(String),
}

/// Result of [`FusionEngine::submit_batch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub accepted: usize,
    pub rejected: usize,
}

/// Contract checks applied to every incoming reading.
pub fn validate_reading(reading: &SensorReading) -> Result<(), IngestError> {
    if reading.sensor_id.trim().is_empty() {
        return Err(IngestError::EmptySensorId);
    }
    if !reading.value.is_finite() {
        return Err(IngestError::NonFiniteValue {
            sensor_id: reading.sensor_id.clone(),
            value: reading.value,
        });
    }
    if !(0.0..=1.0).contains(&reading.quality) {
        return Err(IngestError::QualityOutOfRange {
            sensor_id: reading.sensor_id.clone(),
            quality: reading.quality,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SensorType;

    #[test]
    fn test_validate_reading() {
        let ok = SensorReading::new("rpm-1", SensorType::Rpm, 120.0, "rpm");
        assert!(validate_reading(&ok).is_ok());

        let empty = SensorReading::new("  ", SensorType::Rpm, 120.0, "rpm");
        assert_eq!(validate_reading(&empty), Err(IngestError::EmptySensorId));

        let nan = SensorReading::new("rpm-1", SensorType::Rpm, f64::NAN, "rpm");
        assert!(matches!(
            validate_reading(&nan),
            Err(IngestError::NonFiniteValue { .. })
        ));

        let bad_quality = ok.clone().with_quality(1.5);
        assert!(matches!(
            validate_reading(&bad_quality),
            Err(IngestError::QualityOutOfRange { .. })
        ));
        let nan_quality = ok.with_quality(f64::NAN);
        assert!(validate_reading(&nan_quality).is_err());
    }
}

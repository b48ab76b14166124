//! Fused snapshot produced once per fusion cycle

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Channel, SensorReading};

/// One reconciled value per logical channel at a point in time.
///
/// Each channel value is either the freshest reading from the bound sensor or,
/// when that sensor is stale or missing, the configured fallback. Fields do not
/// share an exact timestamp; each contributing reading is only guaranteed to be
/// within the freshness window at `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedSensorData {
    pub timestamp: DateTime<Utc>,
    pub rpm: f64,
    pub current_a: f64,
    pub vibration_g: f64,
    pub depth_m: f64,
    pub pressure_bar: f64,
    pub temperature_hydraulic_c: f64,
    pub temperature_motor_c: f64,
    pub acoustic_db: f64,
    pub power_kw: f64,
    /// Derived from the depth channel, not a dedicated sensor
    pub feed_rate_m_min: f64,
    /// `sensors_active / sensors_total`
    pub overall_quality: f64,
    pub sensors_active: usize,
    pub sensors_total: usize,
    /// Readings that were fresh enough to contribute, keyed by channel
    #[serde(skip)]
    pub raw_readings: HashMap<Channel, SensorReading>,
}

impl FusedSensorData {
    /// Snapshot with every channel at zero and inactive.
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            rpm: 0.0,
            current_a: 0.0,
            vibration_g: 0.0,
            depth_m: 0.0,
            pressure_bar: 0.0,
            temperature_hydraulic_c: 0.0,
            temperature_motor_c: 0.0,
            acoustic_db: 0.0,
            power_kw: 0.0,
            feed_rate_m_min: 0.0,
            overall_quality: 0.0,
            sensors_active: 0,
            sensors_total: Channel::ALL.len(),
            raw_readings: HashMap::new(),
        }
    }

    pub fn value(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Rpm => self.rpm,
            Channel::Current => self.current_a,
            Channel::Vibration => self.vibration_g,
            Channel::Depth => self.depth_m,
            Channel::Pressure => self.pressure_bar,
            Channel::TemperatureHydraulic => self.temperature_hydraulic_c,
            Channel::TemperatureMotor => self.temperature_motor_c,
            Channel::Acoustic => self.acoustic_db,
            Channel::Power => self.power_kw,
        }
    }

    pub fn is_active(&self, channel: Channel) -> bool {
        self.raw_readings.contains_key(&channel)
    }

    /// Feature vector for the material classifier.
    ///
    /// The classifier sees a single temperature: the hotter of the two circuits.
    pub fn to_sensor_input(&self) -> SensorInput {
        SensorInput {
            rpm: self.rpm,
            current_a: self.current_a,
            vibration_g: self.vibration_g,
            depth_m: self.depth_m,
            pressure_bar: self.pressure_bar,
            temperature_c: self.temperature_hydraulic_c.max(self.temperature_motor_c),
            acoustic_db: self.acoustic_db,
            timestamp: self.timestamp,
        }
    }
}

/// Classifier input derived from a fused snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorInput {
    pub rpm: f64,
    pub current_a: f64,
    pub vibration_g: f64,
    pub depth_m: f64,
    pub pressure_bar: f64,
    pub temperature_c: f64,
    pub acoustic_db: f64,
    pub timestamp: DateTime<Utc>,
}

/// Material classification returned by an attached predictor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub material: String,
    pub confidence: f64,
    #[serde(default)]
    pub probabilities: HashMap<String, f64>,
    pub timestamp: DateTime<Utc>,
}

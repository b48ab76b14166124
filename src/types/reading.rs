//! Raw sensor readings and the sensor/channel taxonomy

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Physical sensor class reported by a feed.
///
/// Unknown tags from a feed deserialize to [`SensorType::Other`] rather than
/// failing the whole reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorType {
    Rpm,
    Current,
    Vibration,
    Depth,
    Pressure,
    TemperatureHydraulic,
    TemperatureMotor,
    /// Generic temperature probe, fused into the hydraulic channel
    Temperature,
    Acoustic,
    Power,
    #[serde(other)]
    Other,
}

impl SensorType {
    /// Logical channel this sensor class feeds, if any.
    pub fn channel(self) -> Option<Channel> {
        match self {
            SensorType::Rpm => Some(Channel::Rpm),
            SensorType::Current => Some(Channel::Current),
            SensorType::Vibration => Some(Channel::Vibration),
            SensorType::Depth => Some(Channel::Depth),
            SensorType::Pressure => Some(Channel::Pressure),
            SensorType::TemperatureHydraulic | SensorType::Temperature => {
                Some(Channel::TemperatureHydraulic)
            }
            SensorType::TemperatureMotor => Some(Channel::TemperatureMotor),
            SensorType::Acoustic => Some(Channel::Acoustic),
            SensorType::Power => Some(Channel::Power),
            SensorType::Other => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SensorType::Rpm => "rpm",
            SensorType::Current => "current",
            SensorType::Vibration => "vibration",
            SensorType::Depth => "depth",
            SensorType::Pressure => "pressure",
            SensorType::TemperatureHydraulic => "temperature_hydraulic",
            SensorType::TemperatureMotor => "temperature_motor",
            SensorType::Temperature => "temperature",
            SensorType::Acoustic => "acoustic",
            SensorType::Power => "power",
            SensorType::Other => "other",
        }
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical value slot in a fused snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Rpm,
    Current,
    Vibration,
    Depth,
    Pressure,
    TemperatureHydraulic,
    TemperatureMotor,
    Acoustic,
    Power,
}

impl Channel {
    /// Every channel the fusion cycle expects, in snapshot order.
    pub const ALL: [Channel; 9] = [
        Channel::Rpm,
        Channel::Current,
        Channel::Vibration,
        Channel::Depth,
        Channel::Pressure,
        Channel::TemperatureHydraulic,
        Channel::TemperatureMotor,
        Channel::Acoustic,
        Channel::Power,
    ];

    /// Channels that, when all fresh, allow a snapshot regardless of the
    /// active-channel minimum.
    pub const ESSENTIAL: [Channel; 4] = [
        Channel::Rpm,
        Channel::Current,
        Channel::Vibration,
        Channel::Depth,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Rpm => "rpm",
            Channel::Current => "current",
            Channel::Vibration => "vibration",
            Channel::Depth => "depth",
            Channel::Pressure => "pressure",
            Channel::TemperatureHydraulic => "temperature_hydraulic",
            Channel::TemperatureMotor => "temperature_motor",
            Channel::Acoustic => "acoustic",
            Channel::Power => "power",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse quality band derived from a reading's 0..=1 quality score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Good,
    Acceptable,
    Poor,
    Invalid,
}

impl DataQuality {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            DataQuality::Good
        } else if score >= 0.7 {
            DataQuality::Acceptable
        } else if score >= 0.4 {
            DataQuality::Poor
        } else {
            DataQuality::Invalid
        }
    }
}

fn default_quality() -> f64 {
    1.0
}

/// A single timestamped measurement from one physical sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub sensor_id: String,
    pub sensor_type: SensorType,
    pub value: f64,
    #[serde(default)]
    pub unit: String,
    pub timestamp: DateTime<Utc>,
    /// Feed-reported confidence in [0, 1]
    #[serde(default = "default_quality")]
    pub quality: f64,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl SensorReading {
    /// Reading stamped with the current wall-clock time and full quality.
    pub fn new(
        sensor_id: impl Into<String>,
        sensor_type: SensorType,
        value: f64,
        unit: impl Into<String>,
    ) -> Self {
        Self {
            sensor_id: sensor_id.into(),
            sensor_type,
            value,
            unit: unit.into(),
            timestamp: Utc::now(),
            quality: default_quality(),
            metadata: HashMap::new(),
        }
    }

    #[must_use]
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality = quality;
        self
    }

    pub fn data_quality(&self) -> DataQuality {
        DataQuality::from_score(self.quality)
    }

    /// Seconds between this reading and `now`; negative for future stamps.
    pub fn age_secs(&self, now: DateTime<Utc>) -> f64 {
        (now - self.timestamp).num_microseconds().unwrap_or(i64::MAX) as f64 / 1e6
    }
}

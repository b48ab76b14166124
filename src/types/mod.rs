//! Shared data model for readings, fused snapshots, health, and alerts

mod alert;
mod fused;
mod health;
mod operator;
mod reading;

pub use alert::{AlertLevel, HazardType, SafetyAction, SafetyAlert, SafetyStatus};
pub use fused::{FusedSensorData, PredictionResult, SensorInput};
pub use health::{BufferStatistics, SensorHealthReport, SensorStatus};
pub use operator::OperatorSession;
pub use reading::{Channel, DataQuality, SensorReading, SensorType};

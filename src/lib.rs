//! SIMBA Guardian: sensor fusion and safety monitoring for drilling machines
//!
//! ## Architecture
//!
//! - **Sensors**: per-sensor ring buffers, signal conditioning, and the fusion
//!   engine that reduces them to one snapshot per cycle
//! - **Safety**: five hazard detectors, the safety monitor that books their
//!   alerts, and the latched emergency stop
//! - **Pipeline**: JSON-line ingestion and the task that feeds snapshots into
//!   the safety monitor
//! - **Observers**: narrow callback traits for dashboards, sinks, and actuator
//!   bridges

pub mod config;
pub mod observers;
pub mod pipeline;
pub mod safety;
pub mod sensors;
pub mod types;

pub use config::GuardianConfig;
pub use observers::{ObserverHandle, OnAlert, OnFusedData, OnPrediction, ShutdownHook};
pub use safety::{EmergencyController, SafetyMetrics, SafetyMonitor};
pub use sensors::{FusionEngine, FusionHandle, MaterialPredictor};
pub use types::{
    AlertLevel, FusedSensorData, HazardType, SafetyAction, SafetyAlert, SafetyStatus,
    SensorReading, SensorType,
};

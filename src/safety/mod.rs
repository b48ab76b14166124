//! Hazard detection, alert bookkeeping, and the emergency stop
//!
//! Five detectors each turn one metric (plus their own short history) into at
//! most one alert per check, walking a severity ladder from the top down. The
//! [`SafetyMonitor`] runs them all against a snapshot, tracks active alerts and
//! history, and latches the [`EmergencyController`] on EMERGENCY alerts.

mod emergency;
mod fatigue;
mod ground;
mod history;
mod ladder;
mod monitor;
mod pressure;
mod temperature;
mod vibration;

pub use emergency::{EmergencyController, EmergencyState, EmergencyStatus};
pub use fatigue::FatigueDetector;
pub use ground::GroundStabilityDetector;
pub use history::{History, Sample};
pub use monitor::{SafetyMetrics, SafetyMonitor, SafetyStatistics};
pub use pressure::PressureDetector;
pub use temperature::{TemperatureDetector, TemperatureTrend, ThermalStatus};
pub use vibration::VibrationDetector;

#[cfg(test)]
pub(crate) fn test_alert() -> crate::types::SafetyAlert {
    use crate::types::{AlertLevel, HazardType, SafetyAction, SafetyAlert};

    SafetyAlert::new(
        "TEST-20240101000000-0001",
        HazardType::ExcessiveVibration,
        AlertLevel::Warning,
        SafetyAction::ReduceSpeed,
        chrono::Utc::now(),
    )
    .with_message("test alert")
    .with_reading(3.0, 2.5)
}

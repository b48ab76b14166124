//! Hydraulic and motor temperature ladders plus thermal trend reporting

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::history::{mean, History, Sample};
use super::ladder::{first_at_or_above, AlertIds, Tier};
use crate::config::{defaults, TemperatureThresholds};
use crate::types::{AlertLevel, HazardType, SafetyAction, SafetyAlert};

/// Direction of the recent temperature movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureTrend {
    Rising,
    Falling,
    Stable,
}

/// Latest temperature and trend for both circuits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThermalStatus {
    pub hydraulic_temp_c: Option<f64>,
    pub motor_temp_c: Option<f64>,
    pub hydraulic_trend: TemperatureTrend,
    pub motor_trend: TemperatureTrend,
}

#[derive(Debug, Clone, Copy)]
enum Circuit {
    Hydraulic,
    Motor,
}

impl Circuit {
    fn prefix(self) -> &'static str {
        match self {
            Circuit::Hydraulic => "TEMP-HYD",
            Circuit::Motor => "TEMP-MOT",
        }
    }

    fn hazard(self) -> HazardType {
        match self {
            Circuit::Hydraulic => HazardType::OverheatHydraulic,
            Circuit::Motor => HazardType::OverheatMotor,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Circuit::Hydraulic => "Hydraulic",
            Circuit::Motor => "Motor",
        }
    }
}

pub struct TemperatureDetector {
    config: TemperatureThresholds,
    hydraulic: History<Sample>,
    motor: History<Sample>,
    ids: AlertIds,
}

impl TemperatureDetector {
    pub fn new(config: TemperatureThresholds) -> Self {
        Self {
            hydraulic: History::new(config.history_capacity),
            motor: History::new(config.history_capacity),
            config,
            ids: AlertIds::default(),
        }
    }

    pub fn check_hydraulic(&mut self, temp_c: f64, now: DateTime<Utc>) -> Option<SafetyAlert> {
        self.hydraulic.record(temp_c, now);
        let ladder = [
            Tier::new(AlertLevel::Emergency, self.config.emergency_c, SafetyAction::EmergencyStop),
            Tier::new(
                AlertLevel::Critical,
                self.config.hydraulic_critical_c,
                SafetyAction::PauseDrilling,
            ),
            Tier::new(
                AlertLevel::Warning,
                self.config.hydraulic_warning_c,
                SafetyAction::ReduceSpeed,
            ),
        ];
        self.evaluate(Circuit::Hydraulic, temp_c, &ladder, now)
    }

    pub fn check_motor(&mut self, temp_c: f64, now: DateTime<Utc>) -> Option<SafetyAlert> {
        self.motor.record(temp_c, now);
        let ladder = [
            Tier::new(AlertLevel::Emergency, self.config.emergency_c, SafetyAction::EmergencyStop),
            Tier::new(AlertLevel::Critical, self.config.motor_critical_c, SafetyAction::PauseDrilling),
            Tier::new(AlertLevel::Warning, self.config.motor_warning_c, SafetyAction::ReduceSpeed),
        ];
        self.evaluate(Circuit::Motor, temp_c, &ladder, now)
    }

    fn evaluate(
        &mut self,
        circuit: Circuit,
        temp_c: f64,
        ladder: &[Tier],
        now: DateTime<Utc>,
    ) -> Option<SafetyAlert> {
        let tier = first_at_or_above(temp_c, ladder)?;
        let label = circuit.label();
        let message = match tier.level {
            AlertLevel::Emergency => {
                format!("EMERGENCY: {label} overheat {temp_c:.1}°C, automatic stop requested")
            }
            AlertLevel::Critical => {
                format!("CRITICAL: {label} temperature {temp_c:.1}°C, stop and let it cool")
            }
            _ => format!("WARNING: {label} temperature elevated at {temp_c:.1}°C"),
        };
        let id = self.ids.next(circuit.prefix(), now);
        Some(tier.raise(id, circuit.hazard(), temp_c, message, now))
    }

    pub fn thermal_status(&self) -> ThermalStatus {
        ThermalStatus {
            hydraulic_temp_c: self.hydraulic.latest_value(),
            motor_temp_c: self.motor.latest_value(),
            hydraulic_trend: trend(&self.hydraulic),
            motor_trend: trend(&self.motor),
        }
    }
}

/// Half-window mean change over the most recent samples, as a percentage of
/// the earlier half (floored at 1 to keep near-zero readings sane).
fn trend(history: &History<Sample>) -> TemperatureTrend {
    if history.len() < defaults::THERMAL_TREND_MIN_SAMPLES {
        return TemperatureTrend::Stable;
    }
    let recent = history.last_values(defaults::THERMAL_TREND_WINDOW);
    let (first, second) = recent.split_at(recent.len() / 2);
    let first_mean = mean(first);
    let change = (mean(second) - first_mean) / first_mean.max(1.0) * 100.0;

    if change > defaults::THERMAL_TREND_PERCENT {
        TemperatureTrend::Rising
    } else if change < -defaults::THERMAL_TREND_PERCENT {
        TemperatureTrend::Falling
    } else {
        TemperatureTrend::Stable
    }
}

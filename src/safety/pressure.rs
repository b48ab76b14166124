//! Hydraulic pressure over- and under-pressure ladders

use chrono::{DateTime, Utc};

use super::history::{History, Sample};
use super::ladder::{first_at_or_above, first_below, AlertIds, Tier};
use crate::config::PressureThresholds;
use crate::types::{AlertLevel, HazardType, SafetyAction, SafetyAlert};

pub struct PressureDetector {
    config: PressureThresholds,
    history: History<Sample>,
    ids: AlertIds,
}

impl PressureDetector {
    pub fn new(config: PressureThresholds) -> Self {
        Self {
            history: History::new(config.history_capacity),
            config,
            ids: AlertIds::default(),
        }
    }

    pub fn latest(&self) -> Option<f64> {
        self.history.latest_value()
    }

    /// Over-pressure is checked before under-pressure; a validated
    /// configuration keeps the two ladders disjoint.
    pub fn check(&mut self, pressure_bar: f64, now: DateTime<Utc>) -> Option<SafetyAlert> {
        self.history.record(pressure_bar, now);

        let high = [
            Tier::new(AlertLevel::Emergency, self.config.emergency_bar, SafetyAction::EmergencyStop),
            Tier::new(
                AlertLevel::Critical,
                self.config.critical_high_bar,
                SafetyAction::PauseDrilling,
            ),
            Tier::new(AlertLevel::Warning, self.config.warning_high_bar, SafetyAction::ReduceSpeed),
        ];
        if let Some(tier) = first_at_or_above(pressure_bar, &high) {
            let message = match tier.level {
                AlertLevel::Emergency => format!(
                    "EMERGENCY: hydraulic overpressure {pressure_bar:.0} bar, automatic stop requested"
                ),
                AlertLevel::Critical => format!("CRITICAL: pressure high at {pressure_bar:.0} bar"),
                _ => format!("WARNING: pressure elevated at {pressure_bar:.0} bar"),
            };
            let id = self.ids.next("PRES", now);
            return Some(tier.raise(id, HazardType::Overpressure, pressure_bar, message, now));
        }

        let low = [
            Tier::new(AlertLevel::Critical, self.config.min_bar, SafetyAction::PauseDrilling),
            Tier::new(AlertLevel::Warning, self.config.warning_low_bar, SafetyAction::AlertOperator),
        ];
        let tier = first_below(pressure_bar, &low)?;
        let message = match tier.level {
            AlertLevel::Critical => {
                format!("CRITICAL: pressure down to {pressure_bar:.0} bar, inspect for leaks")
            }
            _ => format!("WARNING: pressure low at {pressure_bar:.0} bar"),
        };
        let id = self.ids.next("PRES-LOW", now);
        Some(tier.raise(id, HazardType::Underpressure, pressure_bar, message, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pressure_ladders() {
        let now = Utc::now();
        let mut d = PressureDetector::new(PressureThresholds::default());

        assert!(d.check(250.0, now).is_none());

        let alert = d.check(325.0, now).unwrap();
        assert_eq!(alert.level, AlertLevel::Warning);
        assert_eq!(alert.hazard_type, HazardType::Overpressure);

        let alert = d.check(345.0, now).unwrap();
        assert_eq!(alert.level, AlertLevel::Critical);

        let alert = d.check(380.0, now).unwrap();
        assert_eq!(alert.level, AlertLevel::Emergency);
        assert!(alert.triggered_emergency_stop());

        let alert = d.check(155.0, now).unwrap();
        assert_eq!(alert.level, AlertLevel::Warning);
        assert_eq!(alert.hazard_type, HazardType::Underpressure);
        assert_eq!(alert.recommended_action, SafetyAction::AlertOperator);
        assert!(alert.alert_id.starts_with("PRES-LOW-"));

        let alert = d.check(140.0, now).unwrap();
        assert_eq!(alert.level, AlertLevel::Critical);
        assert_eq!(alert.hazard_type, HazardType::Underpressure);
        assert_eq!(alert.threshold, 150.0);

        assert_eq!(d.latest(), Some(140.0));
    }
}

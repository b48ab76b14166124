//! Ground stability from drilling resistance: voids and fractured zones

use chrono::{DateTime, Utc};

use super::history::{History, Sample};
use super::ladder::AlertIds;
use crate::config::GroundThresholds;
use crate::types::{AlertLevel, HazardType, SafetyAction, SafetyAlert};

pub struct GroundStabilityDetector {
    config: GroundThresholds,
    resistance: History<Sample>,
    ids: AlertIds,
}

impl GroundStabilityDetector {
    pub fn new(config: GroundThresholds) -> Self {
        Self {
            resistance: History::new(config.history_capacity),
            config,
            ids: AlertIds::default(),
        }
    }

    /// Rolling baseline: mean of an earlier window that excludes the most
    /// recent samples (including the one just recorded).
    pub fn baseline(&self) -> Option<f64> {
        self.resistance
            .window_mean(self.config.baseline_lookback, self.config.baseline_exclude_recent)
    }

    /// Compare `resistance` against the rolling baseline.
    ///
    /// A sharp drop is a void. A sharp rise while vibration is elevated is a
    /// fractured zone.
    pub fn check(
        &mut self,
        resistance: f64,
        depth_m: f64,
        vibration_g: f64,
        now: DateTime<Utc>,
    ) -> Option<SafetyAlert> {
        self.resistance.record(resistance, now);
        if self.resistance.len() < self.config.min_samples {
            return None;
        }
        let baseline = self.baseline()?;
        if baseline <= 0.0 {
            return None;
        }

        if self.config.void_detection_enabled {
            let drop = (baseline - resistance) / baseline;
            if drop > self.config.void_critical_drop {
                let id = self.ids.next("VOID", now);
                return Some(
                    SafetyAlert::new(
                        id,
                        HazardType::VoidDetected,
                        AlertLevel::Critical,
                        SafetyAction::PauseDrilling,
                        now,
                    )
                    .with_message(format!(
                        "CRITICAL: likely void at {depth_m:.1}m, resistance down {:.0}%",
                        drop * 100.0
                    ))
                    .with_reading(resistance, baseline * (1.0 - self.config.void_critical_drop)),
                );
            }
            if drop > self.config.void_warning_drop {
                let id = self.ids.next("VOID", now);
                return Some(
                    SafetyAlert::new(
                        id,
                        HazardType::VoidDetected,
                        AlertLevel::Warning,
                        SafetyAction::ReduceSpeed,
                        now,
                    )
                    .with_message(format!("WARNING: possible cavity at {depth_m:.1}m"))
                    .with_reading(resistance, baseline * (1.0 - self.config.void_warning_drop)),
                );
            }
        }

        let spike_fraction = self.config.resistance_spike_percent / 100.0;
        let rise = (resistance - baseline) / baseline;
        if rise > spike_fraction && vibration_g > self.config.fracture_vibration_g {
            let id = self.ids.next("FRACTURE", now);
            return Some(
                SafetyAlert::new(
                    id,
                    HazardType::GroundInstability,
                    AlertLevel::Warning,
                    SafetyAction::ReduceSpeed,
                    now,
                )
                .with_message(format!(
                    "Fractured zone at {depth_m:.1}m: resistance up {:.0}% with {vibration_g:.1}g vibration",
                    rise * 100.0
                ))
                .with_reading(resistance, baseline * (1.0 + spike_fraction)),
            );
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> GroundStabilityDetector {
        GroundStabilityDetector::new(GroundThresholds::default())
    }

    #[test]
    fn test_stable_ground_is_quiet() {
        let now = Utc::now();
        let mut d = detector();
        for i in 0..30 {
            let r = 150.0 + f64::from(i % 3);
            assert!(d.check(r, 10.0, 1.0, now).is_none());
        }
    }

    #[test]
    fn test_void_on_sharp_drop() {
        let now = Utc::now();
        let mut d = detector();
        for _ in 0..30 {
            d.check(150.0, 10.0, 1.0, now);
        }
        let alert = d.check(30.0, 12.5, 1.0, now).unwrap();
        assert_eq!(alert.hazard_type, HazardType::VoidDetected);
        assert_eq!(alert.level, AlertLevel::Critical);
        assert!((alert.threshold - 45.0).abs() < 1e-9);
        assert!(alert.message.contains("12.5m"));
    }

    #[test]
    fn test_moderate_drop_is_warning() {
        let now = Utc::now();
        let mut d = detector();
        for _ in 0..30 {
            d.check(100.0, 10.0, 1.0, now);
        }
        let alert = d.check(40.0, 10.0, 1.0, now).unwrap();
        assert_eq!(alert.level, AlertLevel::Warning);
        assert_eq!(alert.recommended_action, SafetyAction::ReduceSpeed);
    }

    #[test]
    fn test_void_detection_can_be_disabled() {
        let now = Utc::now();
        let mut d = GroundStabilityDetector::new(GroundThresholds {
            void_detection_enabled: false,
            ..GroundThresholds::default()
        });
        for _ in 0..30 {
            d.check(150.0, 10.0, 1.0, now);
        }
        assert!(d.check(30.0, 10.0, 1.0, now).is_none());
    }

    #[test]
    fn test_fracture_needs_vibration() {
        let now = Utc::now();
        let mut d = detector();
        for _ in 0..30 {
            d.check(100.0, 10.0, 1.0, now);
        }
        assert!(d.check(200.0, 10.0, 2.0, now).is_none());
        let alert = d.check(200.0, 10.0, 3.5, now).unwrap();
        assert_eq!(alert.hazard_type, HazardType::GroundInstability);
        assert!(alert.alert_id.starts_with("FRACTURE-"));
        assert!((alert.threshold - 150.0).abs() < 1e-9);
    }

    #[test]
    fn test_no_check_before_min_samples() {
        let now = Utc::now();
        let mut d = detector();
        for _ in 0..10 {
            d.check(150.0, 10.0, 1.0, now);
        }
        assert!(d.check(10.0, 10.0, 1.0, now).is_none());
    }
}

//! Drill-string vibration ladder with spike and trend pattern checks

use chrono::{DateTime, Utc};

use super::history::{mean, History, Sample};
use super::ladder::{first_at_or_above, AlertIds, Tier};
use crate::config::VibrationThresholds;
use crate::types::{AlertLevel, HazardType, SafetyAction, SafetyAlert};

pub struct VibrationDetector {
    config: VibrationThresholds,
    history: History<Sample>,
    ids: AlertIds,
}

impl VibrationDetector {
    pub fn new(config: VibrationThresholds) -> Self {
        Self {
            history: History::new(config.history_capacity),
            config,
            ids: AlertIds::default(),
        }
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    fn ladder(&self) -> [Tier; 3] {
        [
            Tier::new(AlertLevel::Emergency, self.config.emergency_g, SafetyAction::EmergencyStop),
            Tier::new(AlertLevel::Critical, self.config.critical_g, SafetyAction::PauseDrilling),
            Tier::new(AlertLevel::Warning, self.config.warning_g, SafetyAction::ReduceSpeed),
        ]
    }

    /// Record `vibration_g` and evaluate it.
    ///
    /// The pattern checks only run when no ladder tier was breached.
    pub fn check(&mut self, vibration_g: f64, now: DateTime<Utc>) -> Option<SafetyAlert> {
        self.history.record(vibration_g, now);

        if let Some(tier) = first_at_or_above(vibration_g, &self.ladder()) {
            let message = match tier.level {
                AlertLevel::Emergency => {
                    format!("EMERGENCY: vibration {vibration_g:.1}g, automatic stop requested")
                }
                AlertLevel::Critical => {
                    format!("CRITICAL: vibration {vibration_g:.1}g, stop drilling now")
                }
                _ => format!("WARNING: vibration {vibration_g:.1}g above normal, monitor closely"),
            };
            let id = self.ids.next("VIB", now);
            return Some(tier.raise(id, HazardType::ExcessiveVibration, vibration_g, message, now));
        }

        self.check_patterns(vibration_g, now)
    }

    fn baseline(&self) -> f64 {
        if self.history.len() > self.config.baseline_window {
            self.history
                .window_mean(self.config.baseline_window, self.config.pattern_window)
                .unwrap_or(self.config.default_baseline_g)
        } else {
            self.config.default_baseline_g
        }
    }

    fn check_patterns(&mut self, current: f64, now: DateTime<Utc>) -> Option<SafetyAlert> {
        let window = self.config.pattern_window;
        if window < 2 || self.history.len() < window {
            return None;
        }

        let baseline = self.baseline();
        let spike_threshold = baseline * self.config.spike_multiplier;
        if current > spike_threshold {
            let id = self.ids.next("VIB-SPIKE", now);
            return Some(
                SafetyAlert::new(
                    id,
                    HazardType::GroundInstability,
                    AlertLevel::Warning,
                    SafetyAction::AlertOperator,
                    now,
                )
                .with_message(format!(
                    "Vibration spike {current:.1}g against a {baseline:.1}g baseline"
                ))
                .with_reading(current, spike_threshold),
            );
        }

        let recent = self.history.last_values(window);
        let (first, second) = recent.split_at(window / 2);
        let first_mean = mean(first);
        let second_mean = mean(second);
        let trend_threshold = first_mean * self.config.trend_ratio;
        if second_mean > trend_threshold
            && second_mean > self.config.warning_g * self.config.trend_warning_fraction
        {
            let id = self.ids.next("VIB-TREND", now);
            return Some(
                SafetyAlert::new(
                    id,
                    HazardType::GroundInstability,
                    AlertLevel::Warning,
                    SafetyAction::ReduceSpeed,
                    now,
                )
                .with_message("Vibration rising steadily, ground may be unstable")
                .with_reading(second_mean, trend_threshold),
            );
        }

        None
    }
}

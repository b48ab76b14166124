//! Severity ladders and alert id sequencing shared by the detectors

use chrono::{DateTime, Utc};

use crate::types::{AlertLevel, HazardType, SafetyAction, SafetyAlert};

/// One rung of a severity ladder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Tier {
    pub level: AlertLevel,
    pub threshold: f64,
    pub action: SafetyAction,
}

impl Tier {
    pub const fn new(level: AlertLevel, threshold: f64, action: SafetyAction) -> Self {
        Self {
            level,
            threshold,
            action,
        }
    }

    /// Alert for `value` breaching this tier. EMERGENCY tiers record the
    /// automatic stop they request.
    pub fn raise(
        &self,
        alert_id: String,
        hazard: HazardType,
        value: f64,
        message: String,
        now: DateTime<Utc>,
    ) -> SafetyAlert {
        let alert = SafetyAlert::new(alert_id, hazard, self.level, self.action, now)
            .with_message(message)
            .with_reading(value, self.threshold);
        if self.level == AlertLevel::Emergency {
            alert.with_auto_action(SafetyAction::EmergencyStop)
        } else {
            alert
        }
    }
}

/// First tier (highest severity first) with `value >= threshold`.
pub(crate) fn first_at_or_above(value: f64, tiers: &[Tier]) -> Option<Tier> {
    tiers.iter().copied().find(|t| value >= t.threshold)
}

/// First tier (highest severity first) with `value < threshold`.
pub(crate) fn first_below(value: f64, tiers: &[Tier]) -> Option<Tier> {
    tiers.iter().copied().find(|t| value < t.threshold)
}

/// Per-detector alert id sequence: `<PREFIX>-<yyyymmddHHMMSS>-<seq>`.
#[derive(Debug, Default)]
pub(crate) struct AlertIds {
    seq: u64,
}

impl AlertIds {
    pub fn next(&mut self, prefix: &str, now: DateTime<Utc>) -> String {
        self.seq += 1;
        format!("{prefix}-{}-{:04}", now.format("%Y%m%d%H%M%S"), self.seq)
    }
}

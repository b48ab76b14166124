//! Operator fatigue from continuous operating time

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::ladder::AlertIds;
use crate::config::FatigueThresholds;
use crate::types::{AlertLevel, HazardType, OperatorSession, SafetyAction, SafetyAlert};

/// Tracks one live session per operator and raises fatigue alerts.
pub struct FatigueDetector {
    config: FatigueThresholds,
    sessions: HashMap<String, OperatorSession>,
    ids: AlertIds,
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds().max(0) as f64 / 3_600_000.0
}

impl FatigueDetector {
    pub fn new(config: FatigueThresholds) -> Self {
        Self {
            config,
            sessions: HashMap::new(),
            ids: AlertIds::default(),
        }
    }

    /// Start (or restart) the session for `operator_id`.
    pub fn start_session(&mut self, operator_id: &str, now: DateTime<Utc>) -> OperatorSession {
        let session = OperatorSession::new(operator_id, now);
        if self
            .sessions
            .insert(operator_id.to_string(), session.clone())
            .is_some()
        {
            debug!(operator_id, "Replaced existing operator session");
        }
        info!(operator_id, "Operator session started");
        session
    }

    pub fn end_session(&mut self, operator_id: &str) -> Option<OperatorSession> {
        let ended = self.sessions.remove(operator_id);
        if let Some(session) = &ended {
            info!(
                operator_id,
                operating_min = session.total_operating_time_min,
                fatigue = session.fatigue_score,
                "Operator session ended"
            );
        }
        ended
    }

    pub fn session(&self, operator_id: &str) -> Option<&OperatorSession> {
        self.sessions.get(operator_id)
    }

    pub(crate) fn note_acknowledgement(&mut self, operator_id: &str) {
        if let Some(session) = self.sessions.get_mut(operator_id) {
            session.alerts_acknowledged += 1;
        }
    }

    fn score(&self, session: &OperatorSession, now: DateTime<Utc>) -> f64 {
        let since_break = hours_between(session.stretch_start(), now);
        (session.residual_fatigue + since_break / self.config.max_continuous_hours * 100.0)
            .min(100.0)
    }

    /// A break lowers the current fatigue score by the configured recovery
    /// and restarts the continuous-operation clock. Returns false when the
    /// operator has no session.
    pub fn record_break(&mut self, operator_id: &str, now: DateTime<Utc>) -> bool {
        let Some(current) = self.sessions.get(operator_id).map(|s| self.score(s, now)) else {
            return false;
        };
        let Some(session) = self.sessions.get_mut(operator_id) else {
            return false;
        };
        let residual = (current - self.config.break_recovery_points).max(0.0);
        session.residual_fatigue = residual;
        session.fatigue_score = residual;
        session.last_break_time = Some(now);
        info!(operator_id, fatigue = residual, "Operator break recorded");
        true
    }

    /// Refresh the operator's session figures and evaluate them.
    pub fn check(&mut self, operator_id: &str, now: DateTime<Utc>) -> Option<SafetyAlert> {
        let score = self.sessions.get(operator_id).map(|s| self.score(s, now))?;
        let session = self.sessions.get_mut(operator_id)?;
        session.fatigue_score = score;
        session.total_operating_time_min = hours_between(session.session_start, now) * 60.0;
        let since_break = hours_between(session.stretch_start(), now);

        let max_hours = self.config.max_continuous_hours;
        let (level, action, threshold, message) = if since_break >= max_hours {
            (
                AlertLevel::Critical,
                SafetyAction::PauseDrilling,
                max_hours,
                format!(
                    "CRITICAL: operator {operator_id} over the continuous operation limit ({since_break:.1}h), take a {} min break",
                    self.config.mandatory_break_minutes
                ),
            )
        } else if since_break >= max_hours * self.config.warning_fraction {
            (
                AlertLevel::Warning,
                SafetyAction::AlertOperator,
                max_hours * self.config.warning_fraction,
                format!("WARNING: operator {operator_id} nearing the fatigue limit, schedule a break"),
            )
        } else {
            return None;
        };

        let id = self.ids.next("FATIGUE", now);
        Some(
            SafetyAlert::new(id, HazardType::OperatorFatigue, level, action, now)
                .with_message(message)
                .with_reading(since_break, threshold),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn detector() -> FatigueDetector {
        FatigueDetector::new(FatigueThresholds::default())
    }

    #[test]
    fn test_unknown_operator_is_quiet() {
        let mut d = detector();
        assert!(d.check("nobody", Utc::now()).is_none());
        assert!(!d.record_break("nobody", Utc::now()));
    }

    #[test]
    fn test_warning_and_critical() {
        let now = Utc::now();
        let mut d = detector();

        d.start_session("op-1", now - Duration::hours(2));
        assert!(d.check("op-1", now).is_none());
        let session = d.session("op-1").unwrap();
        assert!((session.fatigue_score - 20.0).abs() < 1e-6);
        assert!((session.total_operating_time_min - 120.0).abs() < 1e-6);

        d.start_session("op-1", now - Duration::hours(8));
        let alert = d.check("op-1", now).unwrap();
        assert_eq!(alert.level, AlertLevel::Warning);
        assert_eq!(alert.recommended_action, SafetyAction::AlertOperator);

        d.start_session("op-1", now - Duration::hours(11));
        let alert = d.check("op-1", now).unwrap();
        assert_eq!(alert.level, AlertLevel::Critical);
        assert_eq!(alert.hazard_type, HazardType::OperatorFatigue);
        assert!(alert.alert_id.starts_with("FATIGUE-"));
        assert!((d.session("op-1").unwrap().fatigue_score - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_break_decays_score_without_resetting() {
        let now = Utc::now();
        let mut d = detector();
        d.start_session("op-1", now - Duration::hours(5));

        assert!(d.record_break("op-1", now));
        let session = d.session("op-1").unwrap();
        assert!((session.fatigue_score - 30.0).abs() < 1e-6);
        assert_eq!(session.last_break_time, Some(now));

        // One more hour after the break: residual 30 + 10
        d.check("op-1", now + Duration::hours(1));
        let session = d.session("op-1").unwrap();
        assert!((session.fatigue_score - 40.0).abs() < 1e-6);
        // Operating time still counts from the session start
        assert!((session.total_operating_time_min - 360.0).abs() < 1e-6);
    }

    #[test]
    fn test_break_resets_continuous_clock() {
        let now = Utc::now();
        let mut d = detector();
        d.start_session("op-1", now - Duration::hours(9));
        assert!(d.check("op-1", now).is_some());
        d.record_break("op-1", now);
        assert!(d.check("op-1", now + Duration::minutes(30)).is_none());
    }

    #[test]
    fn test_end_session() {
        let now = Utc::now();
        let mut d = detector();
        d.start_session("op-1", now);
        d.note_acknowledgement("op-1");
        let ended = d.end_session("op-1").unwrap();
        assert_eq!(ended.alerts_acknowledged, 1);
        assert!(d.session("op-1").is_none());
        assert!(d.end_session("op-1").is_none());
    }
}

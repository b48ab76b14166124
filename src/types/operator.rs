//! Operator work-session tracking

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One live work session per operator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorSession {
    pub operator_id: String,
    pub session_start: DateTime<Utc>,
    pub total_operating_time_min: f64,
    pub last_break_time: Option<DateTime<Utc>>,
    /// 0 (rested) to 100 (limit reached)
    pub fatigue_score: f64,
    pub alerts_acknowledged: u32,
    /// Fatigue carried over from before the last break
    #[serde(skip)]
    pub(crate) residual_fatigue: f64,
}

impl OperatorSession {
    pub fn new(operator_id: impl Into<String>, session_start: DateTime<Utc>) -> Self {
        Self {
            operator_id: operator_id.into(),
            session_start,
            total_operating_time_min: 0.0,
            last_break_time: None,
            fatigue_score: 0.0,
            alerts_acknowledged: 0,
            residual_fatigue: 0.0,
        }
    }

    /// Start of the current continuous-operation stretch.
    pub fn stretch_start(&self) -> DateTime<Utc> {
        self.last_break_time.unwrap_or(self.session_start)
    }
}

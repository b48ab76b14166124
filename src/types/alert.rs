//! Safety alert records and the derived status view

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hazard category an alert reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HazardType {
    ExcessiveVibration,
    OverheatHydraulic,
    OverheatMotor,
    Overpressure,
    Underpressure,
    GroundInstability,
    VoidDetected,
    EquipmentFault,
    OperatorFatigue,
    CollisionRisk,
}

impl HazardType {
    pub fn as_str(self) -> &'static str {
        match self {
            HazardType::ExcessiveVibration => "excessive_vibration",
            HazardType::OverheatHydraulic => "overheat_hydraulic",
            HazardType::OverheatMotor => "overheat_motor",
            HazardType::Overpressure => "overpressure",
            HazardType::Underpressure => "underpressure",
            HazardType::GroundInstability => "ground_instability",
            HazardType::VoidDetected => "void_detected",
            HazardType::EquipmentFault => "equipment_fault",
            HazardType::OperatorFatigue => "operator_fatigue",
            HazardType::CollisionRisk => "collision_risk",
        }
    }
}

impl std::fmt::Display for HazardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Alert severity. Variant order is severity order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    Critical,
    Emergency,
}

impl AlertLevel {
    /// Points deducted from system health per active alert at this level.
    pub fn health_deduction(self) -> f64 {
        match self {
            AlertLevel::Emergency => 50.0,
            AlertLevel::Critical => 25.0,
            AlertLevel::Warning => 10.0,
            AlertLevel::Info => 5.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AlertLevel::Info => "info",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
            AlertLevel::Emergency => "emergency",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action recommended to (or taken on behalf of) the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyAction {
    None,
    AlertOperator,
    ReduceSpeed,
    PauseDrilling,
    EmergencyStop,
    Evacuate,
}

impl std::fmt::Display for SafetyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SafetyAction::None => write!(f, "none"),
            SafetyAction::AlertOperator => write!(f, "alert_operator"),
            SafetyAction::ReduceSpeed => write!(f, "reduce_speed"),
            SafetyAction::PauseDrilling => write!(f, "pause_drilling"),
            SafetyAction::EmergencyStop => write!(f, "emergency_stop"),
            SafetyAction::Evacuate => write!(f, "evacuate"),
        }
    }
}

/// One hazard occurrence raised by a detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyAlert {
    pub alert_id: String,
    pub hazard_type: HazardType,
    pub level: AlertLevel,
    pub message: String,
    /// Metric value that triggered the alert
    pub value: f64,
    /// Threshold the value was compared against
    pub threshold: f64,
    pub recommended_action: SafetyAction,
    pub auto_action_taken: Option<SafetyAction>,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_by: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl SafetyAlert {
    /// Unacknowledged alert with an empty message and zero value/threshold.
    pub fn new(
        alert_id: impl Into<String>,
        hazard_type: HazardType,
        level: AlertLevel,
        recommended_action: SafetyAction,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            alert_id: alert_id.into(),
            hazard_type,
            level,
            message: String::new(),
            value: 0.0,
            threshold: 0.0,
            recommended_action,
            auto_action_taken: None,
            timestamp,
            acknowledged: false,
            acknowledged_by: None,
            acknowledged_at: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    #[must_use]
    pub fn with_reading(mut self, value: f64, threshold: f64) -> Self {
        self.value = value;
        self.threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_auto_action(mut self, action: SafetyAction) -> Self {
        self.auto_action_taken = Some(action);
        self
    }

    pub fn is_emergency(&self) -> bool {
        self.level == AlertLevel::Emergency
    }

    pub fn triggered_emergency_stop(&self) -> bool {
        self.auto_action_taken == Some(SafetyAction::EmergencyStop)
    }

    /// Id prefix naming the check that raised the alert, e.g. `VIB-SPIKE`.
    pub fn source(&self) -> &str {
        self.alert_id.rsplitn(3, '-').nth(2).unwrap_or(&self.alert_id)
    }

    /// True when `incoming` may replace this alert in the active set: same
    /// check, same hazard, and no less severe.
    pub fn is_superseded_by(&self, incoming: &Self) -> bool {
        self.level != AlertLevel::Emergency
            && self.hazard_type == incoming.hazard_type
            && self.source() == incoming.source()
            && incoming.level >= self.level
    }
}

/// Aggregate safety view, recomputed from the active-alert set on every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyStatus {
    /// No active alert at CRITICAL or above
    pub is_safe: bool,
    pub active_alerts: usize,
    pub highest_alert_level: Option<AlertLevel>,
    pub emergency_stop_active: bool,
    pub last_check_time: DateTime<Utc>,
    /// 0..=100
    pub system_health: f64,
}

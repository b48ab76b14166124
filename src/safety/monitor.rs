//! Safety monitor: runs every detector per snapshot and owns the alert book

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::emergency::{EmergencyController, EmergencyStatus};
use super::fatigue::FatigueDetector;
use super::ground::GroundStabilityDetector;
use super::history::History;
use super::pressure::PressureDetector;
use super::temperature::{TemperatureDetector, ThermalStatus};
use super::vibration::VibrationDetector;
use crate::config::SafetyConfig;
use crate::observers::{ObserverHandle, ObserverRegistry, OnAlert};
use crate::types::{
    AlertLevel, FusedSensorData, HazardType, OperatorSession, SafetyAlert, SafetyStatus,
};

/// Inputs for one round of safety checks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SafetyMetrics {
    pub vibration_g: f64,
    pub hydraulic_temp_c: f64,
    pub motor_temp_c: f64,
    pub pressure_bar: f64,
    /// Drilling resistance proxy
    pub resistance: f64,
    pub depth_m: f64,
}

impl SafetyMetrics {
    /// Motor current stands in for drilling resistance.
    pub fn from_fused(data: &FusedSensorData) -> Self {
        Self {
            vibration_g: data.vibration_g,
            hydraulic_temp_c: data.temperature_hydraulic_c,
            motor_temp_c: data.temperature_motor_c,
            pressure_bar: data.pressure_bar,
            resistance: data.current_a,
            depth_m: data.depth_m,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyStatistics {
    pub total_checks: u64,
    pub total_alerts_generated: u64,
    pub active_alerts: usize,
    pub alerts_by_type: BTreeMap<HazardType, u64>,
    pub alerts_by_level: BTreeMap<AlertLevel, u64>,
    /// Alerts whose automatic action was an emergency stop
    pub emergency_stops: u64,
}

pub struct SafetyMonitor {
    config: SafetyConfig,
    vibration: VibrationDetector,
    temperature: TemperatureDetector,
    pressure: PressureDetector,
    ground: GroundStabilityDetector,
    fatigue: FatigueDetector,
    emergency: Arc<EmergencyController>,
    active: HashMap<String, SafetyAlert>,
    history: History<SafetyAlert>,
    observers: ObserverRegistry<dyn OnAlert>,
    last_check_time: DateTime<Utc>,
    total_checks: u64,
    total_alerts: u64,
    by_type: BTreeMap<HazardType, u64>,
    by_level: BTreeMap<AlertLevel, u64>,
    emergency_stops: u64,
}

impl SafetyMonitor {
    pub fn new(config: SafetyConfig, emergency: Arc<EmergencyController>) -> Self {
        Self {
            vibration: VibrationDetector::new(config.vibration.clone()),
            temperature: TemperatureDetector::new(config.temperature.clone()),
            pressure: PressureDetector::new(config.pressure.clone()),
            ground: GroundStabilityDetector::new(config.ground.clone()),
            fatigue: FatigueDetector::new(config.fatigue.clone()),
            history: History::new(config.alert_history_capacity),
            config,
            emergency,
            active: HashMap::new(),
            observers: ObserverRegistry::new(),
            last_check_time: Utc::now(),
            total_checks: 0,
            total_alerts: 0,
            by_type: BTreeMap::new(),
            by_level: BTreeMap::new(),
            emergency_stops: 0,
        }
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    pub fn emergency(&self) -> &Arc<EmergencyController> {
        &self.emergency
    }

    // ------------------------------------------------------------------------
    // Observers
    // ------------------------------------------------------------------------

    pub fn register_alert_observer(&self, observer: Arc<dyn OnAlert>) -> ObserverHandle {
        self.observers.register(observer)
    }

    pub fn register_alert_callback<F>(&self, f: F) -> ObserverHandle
    where
        F: Fn(&SafetyAlert) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.observers.register(Arc::new(f))
    }

    pub fn unregister_alert_observer(&self, handle: ObserverHandle) -> bool {
        self.observers.unregister(handle)
    }

    // ------------------------------------------------------------------------
    // Checks
    // ------------------------------------------------------------------------

    pub fn check_all(&mut self, metrics: &SafetyMetrics, operator_id: Option<&str>) -> Vec<SafetyAlert> {
        self.check_all_at(metrics, operator_id, Utc::now())
    }

    /// Run every detector once and book the alerts they raise.
    pub fn check_all_at(
        &mut self,
        metrics: &SafetyMetrics,
        operator_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Vec<SafetyAlert> {
        self.total_checks += 1;
        self.last_check_time = now;

        let raised = [
            self.vibration.check(metrics.vibration_g, now),
            self.temperature.check_hydraulic(metrics.hydraulic_temp_c, now),
            self.temperature.check_motor(metrics.motor_temp_c, now),
            self.pressure.check(metrics.pressure_bar, now),
            self.ground
                .check(metrics.resistance, metrics.depth_m, metrics.vibration_g, now),
            operator_id.and_then(|id| self.fatigue.check(id, now)),
        ];

        let mut alerts = Vec::new();
        for alert in raised.into_iter().flatten() {
            alerts.push(self.process_alert(alert));
        }
        if !alerts.is_empty() {
            debug!(count = alerts.len(), "Safety check raised alerts");
        }
        alerts
    }

    fn process_alert(&mut self, mut alert: SafetyAlert) -> SafetyAlert {
        if !self.config.auto_shutdown_enabled && alert.triggered_emergency_stop() {
            alert.auto_action_taken = None;
        }

        if self.config.supersede_repeated_alerts {
            self.active.retain(|_, a| !a.is_superseded_by(&alert));
        }
        self.active.insert(alert.alert_id.clone(), alert.clone());
        self.history.push(alert.clone());

        self.total_alerts += 1;
        *self.by_type.entry(alert.hazard_type).or_default() += 1;
        *self.by_level.entry(alert.level).or_default() += 1;
        if alert.triggered_emergency_stop() {
            self.emergency_stops += 1;
        }

        match alert.level {
            AlertLevel::Info => info!(
                alert_id = %alert.alert_id,
                hazard = %alert.hazard_type,
                value = alert.value,
                "SAFETY ALERT: {}", alert.message
            ),
            AlertLevel::Warning => warn!(
                alert_id = %alert.alert_id,
                hazard = %alert.hazard_type,
                value = alert.value,
                "SAFETY ALERT: {}", alert.message
            ),
            AlertLevel::Critical | AlertLevel::Emergency => error!(
                alert_id = %alert.alert_id,
                hazard = %alert.hazard_type,
                level = %alert.level,
                value = alert.value,
                "SAFETY ALERT: {}", alert.message
            ),
        }

        if alert.is_emergency() && self.config.auto_shutdown_enabled {
            self.emergency.trigger(&alert.message);
        }

        self.observers.dispatch("alert", |o| o.on_alert(&alert));
        alert
    }

    // ------------------------------------------------------------------------
    // Alert book
    // ------------------------------------------------------------------------

    /// Mark an active alert acknowledged. Non-emergency alerts leave the
    /// active set; emergency alerts stay until the emergency is reset.
    pub fn acknowledge(&mut self, alert_id: &str, acknowledged_by: &str) -> bool {
        let now = Utc::now();
        let Some(alert) = self.active.get_mut(alert_id) else {
            debug!(alert_id, "Acknowledge for unknown or inactive alert");
            return false;
        };
        alert.acknowledged = true;
        alert.acknowledged_by = Some(acknowledged_by.to_string());
        alert.acknowledged_at = Some(now);
        let keep_active = alert.is_emergency();

        if let Some(past) = self.history.iter_mut().rev().find(|a| a.alert_id == alert_id) {
            past.acknowledged = true;
            past.acknowledged_by = Some(acknowledged_by.to_string());
            past.acknowledged_at = Some(now);
        }
        if !keep_active {
            self.active.remove(alert_id);
        }
        self.fatigue.note_acknowledgement(acknowledged_by);

        info!(alert_id, acknowledged_by, "Alert acknowledged");
        true
    }

    /// Reset the emergency controller and drop emergency alerts from the
    /// active set.
    pub fn reset_emergency(&mut self, authorized_by: &str) -> bool {
        let reset = self.emergency.reset(authorized_by);
        if reset {
            let before = self.active.len();
            self.active.retain(|_, a| !a.is_emergency());
            debug!(cleared = before - self.active.len(), "Emergency alerts cleared");
        }
        reset
    }

    /// Recomputed from the active set on every call.
    pub fn status(&self) -> SafetyStatus {
        let highest_alert_level = self.active.values().map(|a| a.level).max();
        let is_safe = self.active.values().all(|a| a.level < AlertLevel::Critical);
        let deductions: f64 = self.active.values().map(|a| a.level.health_deduction()).sum();

        SafetyStatus {
            is_safe,
            active_alerts: self.active.len(),
            highest_alert_level,
            emergency_stop_active: self.emergency.is_active(),
            last_check_time: self.last_check_time,
            system_health: (100.0 - deductions).max(0.0),
        }
    }

    /// Active alerts, oldest first.
    pub fn active_alerts(&self) -> Vec<SafetyAlert> {
        let mut alerts: Vec<SafetyAlert> = self.active.values().cloned().collect();
        alerts.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.alert_id.cmp(&b.alert_id))
        });
        alerts
    }

    pub fn alert_history(&self, hours: f64, level: Option<AlertLevel>) -> Vec<SafetyAlert> {
        self.alert_history_at(Utc::now(), hours, level)
    }

    /// Alerts raised within `hours` of `now`, optionally of one level only.
    pub fn alert_history_at(
        &self,
        now: DateTime<Utc>,
        hours: f64,
        level: Option<AlertLevel>,
    ) -> Vec<SafetyAlert> {
        let window = Duration::milliseconds((hours.max(0.0) * 3_600_000.0) as i64);
        let cutoff = now - window;
        self.history
            .iter()
            .filter(|a| a.timestamp >= cutoff)
            .filter(|a| level.map_or(true, |l| a.level == l))
            .cloned()
            .collect()
    }

    pub fn statistics(&self) -> SafetyStatistics {
        SafetyStatistics {
            total_checks: self.total_checks,
            total_alerts_generated: self.total_alerts,
            active_alerts: self.active.len(),
            alerts_by_type: self.by_type.clone(),
            alerts_by_level: self.by_level.clone(),
            emergency_stops: self.emergency_stops,
        }
    }

    pub fn emergency_status(&self) -> EmergencyStatus {
        self.emergency.status()
    }

    pub fn thermal_status(&self) -> ThermalStatus {
        self.temperature.thermal_status()
    }

    // ------------------------------------------------------------------------
    // Operator sessions
    // ------------------------------------------------------------------------

    pub fn start_operator_session(&mut self, operator_id: &str) -> OperatorSession {
        self.fatigue.start_session(operator_id, Utc::now())
    }

    pub fn start_operator_session_at(
        &mut self,
        operator_id: &str,
        start: DateTime<Utc>,
    ) -> OperatorSession {
        self.fatigue.start_session(operator_id, start)
    }

    pub fn record_operator_break(&mut self, operator_id: &str) -> bool {
        self.fatigue.record_break(operator_id, Utc::now())
    }

    pub fn end_operator_session(&mut self, operator_id: &str) -> Option<OperatorSession> {
        self.fatigue.end_session(operator_id)
    }

    pub fn operator_session(&self, operator_id: &str) -> Option<OperatorSession> {
        self.fatigue.session(operator_id).cloned()
    }
}

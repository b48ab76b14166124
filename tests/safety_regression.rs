//! Safety Regression Tests
//!
//! Drives each hazard detector, the emergency latch, and the safety monitor
//! through the public API with the reference readings the rig was commissioned
//! against. Every detector runs on stock thresholds.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{Duration, Utc};

use simba_guardian::config::{
    FatigueThresholds, GroundThresholds, PressureThresholds, SafetyConfig, TemperatureThresholds,
    VibrationThresholds,
};
use simba_guardian::safety::{
    EmergencyController, FatigueDetector, GroundStabilityDetector, PressureDetector,
    SafetyMetrics, SafetyMonitor, TemperatureDetector, TemperatureTrend, VibrationDetector,
};
use simba_guardian::types::{AlertLevel, HazardType, SafetyAction, SafetyAlert};

fn nominal() -> SafetyMetrics {
    SafetyMetrics {
        vibration_g: 1.5,
        hydraulic_temp_c: 50.0,
        motor_temp_c: 60.0,
        pressure_bar: 220.0,
        resistance: 100.0,
        depth_m: 10.0,
    }
}

fn monitor() -> SafetyMonitor {
    SafetyMonitor::new(SafetyConfig::default(), Arc::new(EmergencyController::new()))
}

// ============================================================================
// Vibration
// ============================================================================

#[test]
fn vibration_ladder_escalates_with_amplitude() {
    let now = Utc::now();
    let mut detector = VibrationDetector::new(VibrationThresholds::default());

    assert!(detector.check(1.5, now).is_none(), "1.5 g is normal drilling");

    let warning = detector.check(3.0, now).expect("3.0 g should warn");
    assert_eq!(warning.hazard_type, HazardType::ExcessiveVibration);
    assert_eq!(warning.level, AlertLevel::Warning);
    assert_eq!(warning.recommended_action, SafetyAction::ReduceSpeed);

    let critical = detector.check(4.5, now).expect("4.5 g should be critical");
    assert_eq!(critical.level, AlertLevel::Critical);
    assert_eq!(critical.recommended_action, SafetyAction::PauseDrilling);

    let emergency = detector.check(7.0, now).expect("7.0 g is an emergency");
    assert_eq!(emergency.level, AlertLevel::Emergency);
    assert_eq!(emergency.auto_action_taken, Some(SafetyAction::EmergencyStop));
    assert_eq!(emergency.threshold, 6.0);
    assert!(emergency.alert_id.starts_with("VIB-"));
}

#[test]
fn vibration_alert_ids_are_unique() {
    let now = Utc::now();
    let mut detector = VibrationDetector::new(VibrationThresholds::default());
    let a = detector.check(3.0, now).expect("warning");
    let b = detector.check(3.0, now).expect("warning");
    assert_ne!(a.alert_id, b.alert_id);
}

// ============================================================================
// Temperature
// ============================================================================

#[test]
fn hydraulic_temperature_ladder() {
    let now = Utc::now();
    let mut detector = TemperatureDetector::new(TemperatureThresholds::default());

    assert!(detector.check_hydraulic(55.0, now).is_none());

    let warning = detector.check_hydraulic(70.0, now).expect("70 °C should warn");
    assert_eq!(warning.hazard_type, HazardType::OverheatHydraulic);
    assert_eq!(warning.level, AlertLevel::Warning);

    let emergency = detector.check_hydraulic(115.0, now).expect("115 °C is an emergency");
    assert_eq!(emergency.level, AlertLevel::Emergency);
    assert!(emergency.triggered_emergency_stop());
}

#[test]
fn motor_temperature_critical() {
    let now = Utc::now();
    let mut detector = TemperatureDetector::new(TemperatureThresholds::default());

    assert!(detector.check_motor(80.0, now).is_none());
    let alert = detector.check_motor(106.0, now).expect("106 °C should be critical");
    assert_eq!(alert.hazard_type, HazardType::OverheatMotor);
    assert_eq!(alert.level, AlertLevel::Critical);
    assert_eq!(alert.threshold, 105.0);
}

#[test]
fn thermal_status_reports_latest_and_trend() {
    let now = Utc::now();
    let mut detector = TemperatureDetector::new(TemperatureThresholds::default());

    let empty = detector.thermal_status();
    assert_eq!(empty.hydraulic_temp_c, None);
    assert_eq!(empty.hydraulic_trend, TemperatureTrend::Stable);

    for i in 0..20 {
        detector.check_hydraulic(40.0 + f64::from(i), now);
        detector.check_motor(60.0, now);
    }
    let status = detector.thermal_status();
    assert_eq!(status.hydraulic_temp_c, Some(59.0));
    assert_eq!(status.motor_temp_c, Some(60.0));
    assert_eq!(status.hydraulic_trend, TemperatureTrend::Rising);
    assert_eq!(status.motor_trend, TemperatureTrend::Stable);
}

// ============================================================================
// Pressure
// ============================================================================

#[test]
fn pressure_high_and_low_ladders() {
    let now = Utc::now();
    let mut detector = PressureDetector::new(PressureThresholds::default());

    assert!(detector.check(250.0, now).is_none());

    let high = detector.check(325.0, now).expect("325 bar should warn");
    assert_eq!(high.hazard_type, HazardType::Overpressure);
    assert_eq!(high.level, AlertLevel::Warning);

    let low = detector.check(155.0, now).expect("155 bar is low");
    assert_eq!(low.hazard_type, HazardType::Underpressure);
    assert_eq!(low.level, AlertLevel::Warning);

    let very_low = detector.check(140.0, now).expect("140 bar is below minimum");
    assert_eq!(very_low.hazard_type, HazardType::Underpressure);
    assert_eq!(very_low.level, AlertLevel::Critical);
    assert_eq!(very_low.recommended_action, SafetyAction::PauseDrilling);
}

// ============================================================================
// Ground stability
// ============================================================================

#[test]
fn stable_ground_raises_nothing() {
    let now = Utc::now();
    let mut detector = GroundStabilityDetector::new(GroundThresholds::default());
    for i in 0..30 {
        let alert = detector.check(150.0, f64::from(i) * 0.5, 1.5, now);
        assert!(alert.is_none(), "sample {i} raised {alert:?}");
    }
    assert_eq!(detector.baseline(), Some(150.0));
}

#[test]
fn sudden_resistance_drop_is_a_void() {
    let now = Utc::now();
    let mut detector = GroundStabilityDetector::new(GroundThresholds::default());
    for i in 0..30 {
        detector.check(150.0, f64::from(i) * 0.5, 1.5, now);
    }

    let alert = detector
        .check(30.0, 16.0, 0.5, now)
        .expect("an 80% drop is a void");
    assert_eq!(alert.hazard_type, HazardType::VoidDetected);
    assert_eq!(alert.level, AlertLevel::Critical);
    assert!(alert.message.contains("16.0m"));
}

#[test]
fn resistance_spike_with_vibration_is_a_fracture() {
    let now = Utc::now();
    let mut detector = GroundStabilityDetector::new(GroundThresholds::default());
    for i in 0..30 {
        detector.check(150.0, f64::from(i) * 0.5, 1.5, now);
    }

    // Rise without vibration is just harder rock
    assert!(detector.check(240.0, 15.5, 1.0, now).is_none());

    let alert = detector
        .check(240.0, 16.0, 3.5, now)
        .expect("rise with vibration is a fracture");
    assert_eq!(alert.hazard_type, HazardType::GroundInstability);
    assert_eq!(alert.level, AlertLevel::Warning);
}

// ============================================================================
// Fatigue
// ============================================================================

#[test]
fn fresh_session_starts_rested() {
    let mut detector = FatigueDetector::new(FatigueThresholds::default());
    let now = Utc::now();
    let session = detector.start_session("op-1", now);
    assert_eq!(session.operator_id, "op-1");
    assert_eq!(session.fatigue_score, 0.0);
    assert_eq!(session.total_operating_time_min, 0.0);
    assert!(detector.check("op-1", now).is_none());
}

#[test]
fn long_shift_raises_fatigue_and_break_recovers() {
    let mut detector = FatigueDetector::new(FatigueThresholds::default());
    let now = Utc::now();
    detector.start_session("op-1", now - Duration::hours(8) - Duration::minutes(30));

    let alert = detector.check("op-1", now).expect("8.5h without a break should warn");
    assert_eq!(alert.hazard_type, HazardType::OperatorFatigue);
    assert_eq!(alert.level, AlertLevel::Warning);

    let tired = detector.session("op-1").expect("session").fatigue_score;
    assert!((tired - 85.0).abs() < 0.1, "score was {tired}");

    assert!(detector.record_break("op-1", now));
    let rested = detector.session("op-1").expect("session").fatigue_score;
    assert!(rested < tired);
    assert!((rested - 65.0).abs() < 0.1, "score was {rested}");
    assert!(detector.check("op-1", now).is_none());
}

#[test]
fn past_the_limit_is_critical() {
    let mut detector = FatigueDetector::new(FatigueThresholds::default());
    let now = Utc::now();
    detector.start_session("op-2", now - Duration::hours(11));

    let alert = detector.check("op-2", now).expect("11h is over the limit");
    assert_eq!(alert.level, AlertLevel::Critical);
    assert_eq!(alert.recommended_action, SafetyAction::PauseDrilling);
    assert_eq!(detector.session("op-2").map(|s| s.fatigue_score), Some(100.0));
}

#[test]
fn unknown_operator_is_ignored() {
    let mut detector = FatigueDetector::new(FatigueThresholds::default());
    assert!(detector.check("nobody", Utc::now()).is_none());
    assert!(!detector.record_break("nobody", Utc::now()));
}

// ============================================================================
// Emergency controller
// ============================================================================

#[test]
fn emergency_trigger_reset_and_status() {
    let controller = EmergencyController::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    controller.register_shutdown_callback(move |_reason: &str| -> anyhow::Result<()> {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert!(!controller.is_active());
    assert!(controller.trigger("Test emergency"));
    assert!(controller.is_active());
    assert!(!controller.trigger("Second emergency"), "latch is first-wins");
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let status = controller.status();
    assert!(status.state.active);
    assert_eq!(status.state.reason.as_deref(), Some("Test emergency"));
    assert!(status.duration_seconds.is_some());

    assert!(controller.reset("supervisor"));
    assert!(!controller.is_active());
    let status = controller.status();
    assert_eq!(status.state.last_reset_by.as_deref(), Some("supervisor"));
    assert_eq!(status.duration_seconds, None);
    assert_eq!(status.state.trigger_count, 1);
}

#[test]
fn failing_shutdown_hook_does_not_block_others() {
    let controller = EmergencyController::new();
    let reached = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&reached);

    controller.register_shutdown_callback(|_reason: &str| -> anyhow::Result<()> {
        anyhow::bail!("actuator bridge offline")
    });
    controller.register_shutdown_callback(move |_reason: &str| -> anyhow::Result<()> {
        seen.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });

    assert!(controller.trigger("overpressure"));
    assert!(controller.is_active());
    assert_eq!(reached.load(Ordering::SeqCst), 1);
}

// ============================================================================
// Safety monitor
// ============================================================================

#[test]
fn nominal_readings_are_safe() {
    let mut m = monitor();
    let alerts = m.check_all(&nominal(), None);
    assert!(alerts.is_empty());

    let status = m.status();
    assert!(status.is_safe);
    assert_eq!(status.active_alerts, 0);
    assert_eq!(status.highest_alert_level, None);
    assert_eq!(status.system_health, 100.0);
}

#[test]
fn hazardous_readings_raise_alerts() {
    let mut m = monitor();
    let hazard = SafetyMetrics {
        vibration_g: 5.0,
        hydraulic_temp_c: 85.0,
        ..nominal()
    };
    let alerts = m.check_all(&hazard, None);
    assert_eq!(alerts.len(), 2);
    assert!(alerts
        .iter()
        .any(|a| a.hazard_type == HazardType::ExcessiveVibration && a.level == AlertLevel::Critical));
    assert!(alerts
        .iter()
        .any(|a| a.hazard_type == HazardType::OverheatHydraulic && a.level == AlertLevel::Critical));

    let status = m.status();
    assert!(!status.is_safe);
    assert_eq!(status.highest_alert_level, Some(AlertLevel::Critical));
    assert_eq!(status.system_health, 50.0);
    assert!(!status.emergency_stop_active);
}

#[test]
fn emergency_reading_latches_the_stop() {
    let mut m = monitor();
    let alerts = m.check_all(
        &SafetyMetrics {
            pressure_bar: 390.0,
            ..nominal()
        },
        None,
    );
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].auto_action_taken, Some(SafetyAction::EmergencyStop));
    assert!(m.status().emergency_stop_active);
    assert_eq!(m.statistics().emergency_stops, 1);

    // Emergencies survive acknowledgement until reset
    assert!(m.acknowledge(&alerts[0].alert_id, "op-1"));
    assert_eq!(m.status().active_alerts, 1);

    assert!(m.reset_emergency("supervisor"));
    let status = m.status();
    assert!(!status.emergency_stop_active);
    assert_eq!(status.active_alerts, 0);
    assert_eq!(m.emergency_status().state.last_reset_by.as_deref(), Some("supervisor"));
}

#[test]
fn disabled_auto_shutdown_only_reports() {
    let config = SafetyConfig {
        auto_shutdown_enabled: false,
        ..SafetyConfig::default()
    };
    let mut m = SafetyMonitor::new(config, Arc::new(EmergencyController::new()));
    let alerts = m.check_all(
        &SafetyMetrics {
            vibration_g: 7.0,
            ..nominal()
        },
        None,
    );
    assert_eq!(alerts[0].level, AlertLevel::Emergency);
    assert_eq!(alerts[0].auto_action_taken, None);
    assert!(!m.status().emergency_stop_active);
}

#[test]
fn acknowledge_clears_warning() {
    let mut m = monitor();
    m.start_operator_session("op-1");
    let alerts = m.check_all(
        &SafetyMetrics {
            vibration_g: 3.0,
            ..nominal()
        },
        None,
    );
    let alert_id = alerts[0].alert_id.clone();

    assert!(m.acknowledge(&alert_id, "op-1"));
    assert!(m.status().is_safe);
    assert_eq!(m.status().active_alerts, 0);
    assert!(!m.acknowledge(&alert_id, "op-1"), "already acknowledged");
    assert!(!m.acknowledge("VIB-00000000000000-9999", "op-1"));

    let history = m.alert_history(1.0, None);
    assert_eq!(history.len(), 1);
    assert!(history[0].acknowledged);
    assert_eq!(history[0].acknowledged_by.as_deref(), Some("op-1"));
    assert_eq!(m.operator_session("op-1").map(|s| s.alerts_acknowledged), Some(1));
}

#[test]
fn unacknowledged_critical_survives_a_milder_reading() {
    let mut m = monitor();
    m.check_all(&SafetyMetrics { pressure_bar: 345.0, ..nominal() }, None);
    m.check_all(&SafetyMetrics { pressure_bar: 325.0, ..nominal() }, None);

    let status = m.status();
    assert!(!status.is_safe, "critical must stay until acknowledged");
    assert_eq!(status.highest_alert_level, Some(AlertLevel::Critical));
    let levels: Vec<AlertLevel> = m.active_alerts().iter().map(|a| a.level).collect();
    assert!(levels.contains(&AlertLevel::Critical));
    assert!(levels.contains(&AlertLevel::Warning));

    // A persistent warning does not pile up beside itself
    m.check_all(&SafetyMetrics { pressure_bar: 326.0, ..nominal() }, None);
    assert_eq!(m.active_alerts().len(), 2);
}

#[test]
fn alert_observers_see_every_alert() {
    let mut m = monitor();
    let received: Arc<Mutex<Vec<SafetyAlert>>> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&received);
    let handle = m.register_alert_callback(move |alert: &SafetyAlert| -> anyhow::Result<()> {
        sink.lock().unwrap().push(alert.clone());
        Ok(())
    });
    m.register_alert_callback(|_alert: &SafetyAlert| -> anyhow::Result<()> {
        anyhow::bail!("dashboard unreachable")
    });

    let hot = SafetyMetrics {
        motor_temp_c: 90.0,
        ..nominal()
    };
    let alerts = m.check_all(&hot, None);
    assert_eq!(alerts.len(), 1);
    assert_eq!(received.lock().unwrap().len(), 1);
    assert_eq!(received.lock().unwrap()[0].alert_id, alerts[0].alert_id);

    assert!(m.unregister_alert_observer(handle));
    m.check_all(&hot, None);
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[test]
fn operator_fatigue_checked_through_monitor() {
    let mut m = monitor();
    let now = Utc::now();
    m.start_operator_session_at("op-7", now - Duration::hours(9));

    let alerts = m.check_all_at(&nominal(), Some("op-7"), now);
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].hazard_type, HazardType::OperatorFatigue);

    assert!(m.record_operator_break("op-7"));
    let ended = m.end_operator_session("op-7").expect("session existed");
    assert!(ended.last_break_time.is_some());
    assert!(m.operator_session("op-7").is_none());
}

#[test]
fn statistics_count_by_type_and_level() {
    let mut m = monitor();
    for _ in 0..3 {
        m.check_all(&nominal(), None);
    }
    m.check_all(
        &SafetyMetrics {
            vibration_g: 3.0,
            pressure_bar: 330.0,
            ..nominal()
        },
        None,
    );

    let stats = m.statistics();
    assert_eq!(stats.total_checks, 4);
    assert_eq!(stats.total_alerts_generated, 2);
    assert_eq!(stats.alerts_by_type.get(&HazardType::ExcessiveVibration), Some(&1));
    assert_eq!(stats.alerts_by_type.get(&HazardType::Overpressure), Some(&1));
    assert_eq!(stats.alerts_by_level.get(&AlertLevel::Warning), Some(&2));
    assert_eq!(stats.emergency_stops, 0);
}

//! Config Validation Tests
//!
//! Typo detection, range validation, and file round-trips for
//! `guardian.toml`, exercised independently from the rest of the pipeline.

use std::io::Write;

use simba_guardian::config::validation::{known_config_keys, suggest_correction, validate_unknown_keys};
use simba_guardian::config::{ConfigError, GuardianConfig};

// ============================================================================
// Typo Detection
// ============================================================================

#[test]
fn typo_in_vibration_threshold_warns_with_suggestion() {
    let toml_str = r#"
[safety.vibration]
warnign_g = 2.0
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1, "Expected exactly 1 warning");
    assert_eq!(warnings[0].field, "safety.vibration.warnign_g");
    assert_eq!(
        warnings[0].suggestion.as_deref(),
        Some("safety.vibration.warning_g")
    );
    assert!(warnings[0].to_string().contains("did you mean"));
}

#[test]
fn typo_in_machine_section_warns() {
    let toml_str = r#"
[machine]
naem = "SIMBA-E7"
"#;
    let warnings = validate_unknown_keys(toml_str);
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].suggestion.as_deref(), Some("machine.name"));
}

#[test]
fn valid_config_produces_zero_warnings() {
    let toml_str = r#"
[machine]
name = "SIMBA-E7"
site = "Kiruna 1045"

[sensors]
fusion_interval_ms = 50

[sensors.fallbacks]
pressure = 210.0

[safety]
auto_shutdown_enabled = false

[safety.pressure]
min_bar = 140.0
"#;
    assert!(validate_unknown_keys(toml_str).is_empty());
}

#[test]
fn default_config_knows_its_own_keys() {
    let default_toml = GuardianConfig::default().to_toml().unwrap();
    assert!(validate_unknown_keys(&default_toml).is_empty());
}

#[test]
fn far_off_key_has_no_suggestion() {
    let known = known_config_keys();
    assert_eq!(suggest_correction("completely_unrelated_setting", &known), None);

    let warnings = validate_unknown_keys("[telemetry]\nendpoint = \"udp://10.0.0.1\"\n");
    assert_eq!(warnings.len(), 2, "table and its key are both unknown");
    assert!(warnings.iter().all(|w| w.suggestion.is_none()));
}

#[test]
fn unparseable_toml_is_left_to_the_loader() {
    assert!(validate_unknown_keys("[safety\nwarning_g = ").is_empty());
}

// ============================================================================
// Range Validation
// ============================================================================

#[test]
fn inverted_vibration_ladder_is_rejected() {
    let mut config = GuardianConfig::default();
    config.safety.vibration.critical_g = 7.0; // above emergency_g = 6.0
    match config.validate() {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("vibration.critical/emergency")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn overlapping_pressure_ladders_are_rejected() {
    let mut config = GuardianConfig::default();
    config.safety.pressure.warning_low_bar = 330.0;
    assert!(matches!(config.validate(), Err(ConfigError::Validation(_))));
}

#[test]
fn non_finite_threshold_is_rejected() {
    let mut config = GuardianConfig::default();
    config.safety.ground.fracture_vibration_g = f64::NAN;
    match config.validate() {
        Err(ConfigError::Validation(errors)) => {
            assert!(errors.iter().any(|e| e.contains("fracture_vibration_g")));
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[test]
fn zero_fusion_interval_is_rejected() {
    let mut config = GuardianConfig::default();
    config.sensors.fusion_interval_ms = 0;
    assert!(config.validate().is_err());
}

// ============================================================================
// File Round-Trips
// ============================================================================

#[test]
fn save_then_load_preserves_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("guardian.toml");

    let mut config = GuardianConfig::default();
    config.machine.name = "SIMBA-M6C".to_string();
    config.safety.temperature.hydraulic_warning_c = 62.5;
    config.safety.supersede_repeated_alerts = false;
    config.save_to_file(&path).unwrap();

    let loaded = GuardianConfig::load_from_file(&path).unwrap();
    assert_eq!(loaded.machine.name, "SIMBA-M6C");
    assert_eq!(loaded.safety.temperature.hydraulic_warning_c, 62.5);
    assert!(!loaded.safety.supersede_repeated_alerts);
    assert_eq!(loaded.safety.pressure.emergency_bar, 380.0);
}

#[test]
fn loading_an_invalid_file_fails_validation() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[safety.temperature]\nhydraulic_warning_c = 90.0\nhydraulic_critical_c = 80.0"
    )
    .unwrap();

    let err = GuardianConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Validation(_)), "got {err}");
}

#[test]
fn loading_malformed_toml_is_a_parse_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "[safety.vibration]\nwarning_g = \"loud\"").unwrap();

    let err = GuardianConfig::load_from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(..)), "got {err}");
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = GuardianConfig::load_from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(..)));
}

//! Guardian Configuration - sensor profiles and safety thresholds as TOML values
//!
//! Every tunable number in the fusion and safety paths is a field here. Each
//! struct implements `Default` with the values the rig was commissioned with,
//! so a missing config file means stock behaviour.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use super::defaults;
use super::validation::validate_unknown_keys;
use crate::types::{Channel, SensorType};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Root configuration for one drilling machine.
///
/// Load with `GuardianConfig::load()` which searches:
/// 1. `$SIMBA_CONFIG` env var
/// 2. `./guardian.toml`
/// 3. Built-in defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardianConfig {
    /// Machine identification
    #[serde(default)]
    pub machine: MachineInfo,

    /// Sensor profiles and fusion cadence
    #[serde(default)]
    pub sensors: SensorsConfig,

    /// Signal conditioning policy
    #[serde(default)]
    pub preprocess: PreprocessConfig,

    /// Hazard thresholds and alert bookkeeping
    #[serde(default)]
    pub safety: SafetyConfig,
}

impl GuardianConfig {
    /// Load configuration using the standard search order:
    /// 1. `$SIMBA_CONFIG` environment variable
    /// 2. `./guardian.toml` in the current working directory
    /// 3. Built-in defaults
    pub fn load() -> Self {
        if let Ok(path) = std::env::var("SIMBA_CONFIG") {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), machine = %config.machine.name, "Loaded guardian config from SIMBA_CONFIG");
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from SIMBA_CONFIG, falling back");
                    }
                }
            } else {
                warn!(path = %path, "SIMBA_CONFIG points to non-existent file, falling back");
            }
        }

        let local = PathBuf::from("guardian.toml");
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(machine = %config.machine.name, "Loaded guardian config from ./guardian.toml");
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./guardian.toml, using defaults");
                }
            }
        }

        info!("No guardian.toml found, using built-in defaults");
        Self::default()
    }

    /// Load from a specific TOML file path. The result is validated.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        for warning in validate_unknown_keys(&contents) {
            warn!(path = %path.display(), field = %warning.field, "{warning}");
        }
        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the current config to a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let contents = self.to_toml()?;
        std::fs::write(path, contents).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        info!(path = %path.display(), "Guardian config saved");
        Ok(())
    }

    /// Validate every threshold ladder and sizing parameter.
    ///
    /// Rules:
    /// - Ladders escalate: warning <= critical <= emergency
    /// - Under-pressure: minimum < warning_low < warning_high
    /// - Rates, capacities, windows, and ages are positive
    /// - Fractions lie in (0, 1]
    /// - No NaN or Inf anywhere
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors: Vec<String> = Vec::new();

        self.sensors.validate_into(&mut errors);
        self.preprocess.validate_into(&mut errors);

        let s = &self.safety;
        if s.alert_history_capacity == 0 {
            errors.push("safety.alert_history_capacity must be > 0".to_string());
        }

        // Vibration
        let v = &s.vibration;
        Self::check_escalation(v.warning_g, v.critical_g, "vibration.warning/critical", &mut errors);
        Self::check_escalation(v.critical_g, v.emergency_g, "vibration.critical/emergency", &mut errors);
        if v.history_capacity < v.baseline_window {
            errors.push(format!(
                "vibration.history_capacity ({}) must be >= baseline_window ({})",
                v.history_capacity, v.baseline_window
            ));
        }
        if v.pattern_window < 2 || v.pattern_window >= v.baseline_window {
            errors.push(format!(
                "vibration.pattern_window ({}) must be in 2..baseline_window ({})",
                v.pattern_window, v.baseline_window
            ));
        }
        if v.spike_multiplier <= 1.0 {
            errors.push("vibration.spike_multiplier must be > 1".to_string());
        }
        if v.trend_ratio <= 1.0 {
            errors.push("vibration.trend_ratio must be > 1".to_string());
        }

        // Temperature
        let t = &s.temperature;
        Self::check_escalation(t.hydraulic_warning_c, t.hydraulic_critical_c, "temperature.hydraulic", &mut errors);
        Self::check_escalation(t.hydraulic_critical_c, t.emergency_c, "temperature.hydraulic/emergency", &mut errors);
        Self::check_escalation(t.motor_warning_c, t.motor_critical_c, "temperature.motor", &mut errors);
        Self::check_escalation(t.motor_critical_c, t.emergency_c, "temperature.motor/emergency", &mut errors);
        if t.history_capacity == 0 {
            errors.push("temperature.history_capacity must be > 0".to_string());
        }

        // Pressure: two ladders, one rising and one falling
        let p = &s.pressure;
        Self::check_escalation(p.warning_high_bar, p.critical_high_bar, "pressure.high", &mut errors);
        Self::check_escalation(p.critical_high_bar, p.emergency_bar, "pressure.high/emergency", &mut errors);
        if p.min_bar > p.warning_low_bar {
            errors.push(format!(
                "pressure.min_bar ({:.1}) must be <= warning_low_bar ({:.1})",
                p.min_bar, p.warning_low_bar
            ));
        }
        if p.warning_low_bar >= p.warning_high_bar {
            errors.push(format!(
                "pressure.warning_low_bar ({:.1}) must be < warning_high_bar ({:.1})",
                p.warning_low_bar, p.warning_high_bar
            ));
        }

        // Ground stability
        let g = &s.ground;
        Self::check_fraction(g.void_warning_drop, "ground.void_warning_drop", &mut errors);
        Self::check_fraction(g.void_critical_drop, "ground.void_critical_drop", &mut errors);
        Self::check_escalation(g.void_warning_drop, g.void_critical_drop, "ground.void_drop", &mut errors);
        if g.resistance_spike_percent <= 0.0 {
            errors.push("ground.resistance_spike_percent must be > 0".to_string());
        }
        if g.baseline_lookback <= g.baseline_exclude_recent {
            errors.push(format!(
                "ground.baseline_lookback ({}) must be > baseline_exclude_recent ({})",
                g.baseline_lookback, g.baseline_exclude_recent
            ));
        }
        if g.min_samples <= g.baseline_exclude_recent {
            errors.push(format!(
                "ground.min_samples ({}) must be > baseline_exclude_recent ({})",
                g.min_samples, g.baseline_exclude_recent
            ));
        }
        if g.history_capacity < g.baseline_lookback {
            errors.push("ground.history_capacity must be >= baseline_lookback".to_string());
        }

        // Fatigue
        let f = &s.fatigue;
        if f.max_continuous_hours <= 0.0 {
            errors.push("fatigue.max_continuous_hours must be > 0".to_string());
        }
        Self::check_fraction(f.warning_fraction, "fatigue.warning_fraction", &mut errors);
        if f.break_recovery_points < 0.0 {
            errors.push("fatigue.break_recovery_points must be >= 0".to_string());
        }

        // NaN/Inf comparisons silently pass; sweep every float explicitly
        match toml::Value::try_from(self) {
            Ok(value) => collect_non_finite(&value, "", &mut errors),
            Err(e) => errors.push(format!("config could not be inspected: {e}")),
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    fn check_escalation(lower: f64, upper: f64, name: &str, errors: &mut Vec<String>) {
        if !lower.is_finite() || !upper.is_finite() {
            errors.push(format!(
                "{name}: values must be finite (got {lower} and {upper})"
            ));
            return;
        }
        if upper < lower {
            errors.push(format!(
                "{name}: upper tier ({upper:.3}) must be >= lower tier ({lower:.3})"
            ));
        }
    }

    fn check_fraction(value: f64, name: &str, errors: &mut Vec<String>) {
        if !(value > 0.0 && value <= 1.0) {
            errors.push(format!("{name} must be in (0, 1], got {value}"));
        }
    }
}

fn collect_non_finite(value: &toml::Value, path: &str, errors: &mut Vec<String>) {
    match value {
        toml::Value::Float(f) if !f.is_finite() => {
            errors.push(format!("{path}: must be a finite number, got {f}"));
        }
        toml::Value::Table(table) => {
            for (key, child) in table {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                collect_non_finite(child, &child_path, errors);
            }
        }
        toml::Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_non_finite(child, &format!("{path}[{i}]"), errors);
            }
        }
        _ => {}
    }
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config I/O error ({}): {}", .0.display(), .1)]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Config parse error ({}): {}", .0.display(), .1)]
    Parse(PathBuf, #[source] toml::de::Error),

    #[error("Config serialization error: {0}")]
    Serialize(#[source] toml::ser::Error),

    #[error("Config validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
}

// ============================================================================
// Machine Info
// ============================================================================

/// Identification metadata, used only in logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineInfo {
    #[serde(default = "default_machine_name")]
    pub name: String,

    /// Site or tunnel section
    #[serde(default)]
    pub site: String,
}

fn default_machine_name() -> String {
    "SIMBA".to_string()
}

impl Default for MachineInfo {
    fn default() -> Self {
        Self {
            name: default_machine_name(),
            site: String::new(),
        }
    }
}

// ============================================================================
// Sensors & Fusion
// ============================================================================

/// Fusion cadence, freshness, and per-sensor profiles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorsConfig {
    /// Readings older than this mark their channel inactive (s)
    #[serde(default = "default_max_data_age")]
    pub max_data_age_secs: f64,

    /// Seconds of data each buffer retains at the sensor's expected rate
    #[serde(default = "default_buffer_seconds")]
    pub buffer_seconds: f64,

    /// Fusion cycle period (ms)
    #[serde(default = "default_fusion_interval")]
    pub fusion_interval_ms: u64,

    /// Depth samples used for the feed-rate estimate
    #[serde(default = "default_feed_rate_window")]
    pub feed_rate_window: usize,

    /// Recent readings used for the realised-rate estimate
    #[serde(default = "default_rate_window")]
    pub rate_window: usize,

    /// Active channels required when the essential set is incomplete
    #[serde(default = "default_min_active_channels")]
    pub min_active_channels: usize,

    #[serde(default)]
    pub profiles: SensorProfiles,

    /// Values published for inactive channels
    #[serde(default)]
    pub fallbacks: ChannelFallbacks,
}

fn default_max_data_age() -> f64 {
    defaults::MAX_DATA_AGE_SECS
}
fn default_buffer_seconds() -> f64 {
    defaults::BUFFER_SECONDS
}
fn default_fusion_interval() -> u64 {
    defaults::FUSION_INTERVAL_MS
}
fn default_feed_rate_window() -> usize {
    defaults::FEED_RATE_WINDOW
}
fn default_rate_window() -> usize {
    defaults::RATE_ESTIMATION_WINDOW
}
fn default_min_active_channels() -> usize {
    defaults::MIN_ACTIVE_CHANNELS
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            max_data_age_secs: default_max_data_age(),
            buffer_seconds: default_buffer_seconds(),
            fusion_interval_ms: default_fusion_interval(),
            feed_rate_window: default_feed_rate_window(),
            rate_window: default_rate_window(),
            min_active_channels: default_min_active_channels(),
            profiles: SensorProfiles::default(),
            fallbacks: ChannelFallbacks::default(),
        }
    }
}

impl SensorsConfig {
    pub fn profile(&self, sensor_type: SensorType) -> &SensorProfile {
        let p = &self.profiles;
        match sensor_type {
            SensorType::Rpm => &p.rpm,
            SensorType::Current => &p.current,
            SensorType::Vibration => &p.vibration,
            SensorType::Depth => &p.depth,
            SensorType::Pressure => &p.pressure,
            SensorType::TemperatureHydraulic => &p.temperature_hydraulic,
            SensorType::TemperatureMotor => &p.temperature_motor,
            SensorType::Temperature => &p.temperature,
            SensorType::Acoustic => &p.acoustic,
            SensorType::Power => &p.power,
            SensorType::Other => &p.other,
        }
    }

    /// Ring capacity for a sensor of this type: `buffer_seconds` of data, at least 1.
    pub fn buffer_capacity(&self, sensor_type: SensorType) -> usize {
        let samples = self.profile(sensor_type).expected_rate_hz * self.buffer_seconds;
        if samples.is_finite() && samples >= 1.0 {
            samples as usize
        } else {
            1
        }
    }

    pub fn max_data_age(&self) -> chrono::Duration {
        chrono::Duration::microseconds((self.max_data_age_secs * 1e6) as i64)
    }

    fn validate_into(&self, errors: &mut Vec<String>) {
        if self.max_data_age_secs <= 0.0 {
            errors.push("sensors.max_data_age_secs must be > 0".to_string());
        }
        if self.buffer_seconds <= 0.0 {
            errors.push("sensors.buffer_seconds must be > 0".to_string());
        }
        if self.fusion_interval_ms == 0 {
            errors.push("sensors.fusion_interval_ms must be > 0".to_string());
        }
        if self.feed_rate_window < 2 {
            errors.push("sensors.feed_rate_window must be >= 2".to_string());
        }
        if self.rate_window < 2 {
            errors.push("sensors.rate_window must be >= 2".to_string());
        }
        let p = &self.profiles;
        for (name, profile) in [
            ("rpm", &p.rpm),
            ("current", &p.current),
            ("vibration", &p.vibration),
            ("depth", &p.depth),
            ("pressure", &p.pressure),
            ("temperature_hydraulic", &p.temperature_hydraulic),
            ("temperature_motor", &p.temperature_motor),
            ("temperature", &p.temperature),
            ("acoustic", &p.acoustic),
            ("power", &p.power),
            ("other", &p.other),
        ] {
            if profile.expected_rate_hz <= 0.0 {
                errors.push(format!("sensors.profiles.{name}.expected_rate_hz must be > 0"));
            }
            if profile.valid_min >= profile.valid_max {
                errors.push(format!(
                    "sensors.profiles.{name}: valid_min ({}) must be < valid_max ({})",
                    profile.valid_min, profile.valid_max
                ));
            }
        }
    }
}

/// Expected sampling rate and plausible value range for one sensor class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorProfile {
    pub expected_rate_hz: f64,
    pub valid_min: f64,
    pub valid_max: f64,
}

impl SensorProfile {
    pub const fn new(expected_rate_hz: f64, valid_min: f64, valid_max: f64) -> Self {
        Self {
            expected_rate_hz,
            valid_min,
            valid_max,
        }
    }

    pub fn valid_range(&self) -> (f64, f64) {
        (self.valid_min, self.valid_max)
    }
}

/// One profile per sensor class. Tables given in TOML must be complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorProfiles {
    pub rpm: SensorProfile,
    pub current: SensorProfile,
    pub vibration: SensorProfile,
    pub depth: SensorProfile,
    pub pressure: SensorProfile,
    pub temperature_hydraulic: SensorProfile,
    pub temperature_motor: SensorProfile,
    pub temperature: SensorProfile,
    pub acoustic: SensorProfile,
    pub power: SensorProfile,
    pub other: SensorProfile,
}

impl Default for SensorProfiles {
    fn default() -> Self {
        Self {
            rpm: SensorProfile::new(10.0, 0.0, 300.0),
            current: SensorProfile::new(10.0, 0.0, 500.0),
            vibration: SensorProfile::new(1000.0, 0.0, 15.0),
            depth: SensorProfile::new(10.0, 0.0, 100.0),
            pressure: SensorProfile::new(100.0, 0.0, 500.0),
            temperature_hydraulic: SensorProfile::new(10.0, 0.0, 120.0),
            temperature_motor: SensorProfile::new(10.0, 0.0, 150.0),
            temperature: SensorProfile::new(10.0, 0.0, 150.0),
            // Microphones are downsampled to 100 Hz before ingestion
            acoustic: SensorProfile::new(100.0, 20.0, 140.0),
            power: SensorProfile::new(10.0, 0.0, 500.0),
            other: SensorProfile::new(10.0, 0.0, 1000.0),
        }
    }
}

/// Substitute values for channels without a fresh reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelFallbacks {
    pub rpm: f64,
    pub current: f64,
    pub vibration: f64,
    pub depth: f64,
    pub pressure: f64,
    pub temperature_hydraulic: f64,
    pub temperature_motor: f64,
    pub acoustic: f64,
    pub power: f64,
}

impl Default for ChannelFallbacks {
    fn default() -> Self {
        Self {
            rpm: 0.0,
            current: 0.0,
            vibration: 0.0,
            depth: 0.0,
            pressure: 200.0,
            temperature_hydraulic: 45.0,
            temperature_motor: 50.0,
            acoustic: 70.0,
            power: 0.0,
        }
    }
}

impl ChannelFallbacks {
    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Rpm => self.rpm,
            Channel::Current => self.current,
            Channel::Vibration => self.vibration,
            Channel::Depth => self.depth,
            Channel::Pressure => self.pressure,
            Channel::TemperatureHydraulic => self.temperature_hydraulic,
            Channel::TemperatureMotor => self.temperature_motor,
            Channel::Acoustic => self.acoustic,
            Channel::Power => self.power,
        }
    }
}

// ============================================================================
// Preprocessing
// ============================================================================

/// Per-type conditioning policy applied to buffered series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Butterworth order for the low-pass stage
    #[serde(default = "default_filter_order")]
    pub filter_order: usize,

    #[serde(default = "default_vibration_sampling_rate")]
    pub vibration_sampling_rate_hz: f64,

    #[serde(default = "default_vibration_cutoff")]
    pub vibration_cutoff_hz: f64,

    #[serde(default = "default_vibration_outlier_z")]
    pub vibration_outlier_z: f64,

    #[serde(default = "default_acoustic_outlier_z")]
    pub acoustic_outlier_z: f64,

    #[serde(default = "default_standard_outlier_z")]
    pub standard_outlier_z: f64,

    #[serde(default = "default_acoustic_smoothing")]
    pub acoustic_smoothing_window: usize,

    #[serde(default = "default_standard_smoothing")]
    pub standard_smoothing_window: usize,
}

fn default_filter_order() -> usize {
    4
}
fn default_vibration_sampling_rate() -> f64 {
    1000.0
}
fn default_vibration_cutoff() -> f64 {
    200.0
}
fn default_vibration_outlier_z() -> f64 {
    4.0
}
fn default_acoustic_outlier_z() -> f64 {
    3.5
}
fn default_standard_outlier_z() -> f64 {
    3.0
}
fn default_acoustic_smoothing() -> usize {
    3
}
fn default_standard_smoothing() -> usize {
    5
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            filter_order: default_filter_order(),
            vibration_sampling_rate_hz: default_vibration_sampling_rate(),
            vibration_cutoff_hz: default_vibration_cutoff(),
            vibration_outlier_z: default_vibration_outlier_z(),
            acoustic_outlier_z: default_acoustic_outlier_z(),
            standard_outlier_z: default_standard_outlier_z(),
            acoustic_smoothing_window: default_acoustic_smoothing(),
            standard_smoothing_window: default_standard_smoothing(),
        }
    }
}

impl PreprocessConfig {
    fn validate_into(&self, errors: &mut Vec<String>) {
        if self.filter_order == 0 {
            errors.push("preprocess.filter_order must be > 0".to_string());
        }
        if self.vibration_sampling_rate_hz <= 0.0 {
            errors.push("preprocess.vibration_sampling_rate_hz must be > 0".to_string());
        }
        if self.vibration_cutoff_hz <= 0.0 {
            errors.push("preprocess.vibration_cutoff_hz must be > 0".to_string());
        }
        for (name, z) in [
            ("vibration_outlier_z", self.vibration_outlier_z),
            ("acoustic_outlier_z", self.acoustic_outlier_z),
            ("standard_outlier_z", self.standard_outlier_z),
        ] {
            if z <= 0.0 {
                errors.push(format!("preprocess.{name} must be > 0"));
            }
        }
        if self.acoustic_smoothing_window == 0 || self.standard_smoothing_window == 0 {
            errors.push("preprocess smoothing windows must be > 0".to_string());
        }
    }
}

// ============================================================================
// Safety (master container)
// ============================================================================

/// Hazard detection thresholds and alert bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyConfig {
    /// EMERGENCY alerts trip the emergency controller
    #[serde(default = "default_true")]
    pub auto_shutdown_enabled: bool,

    #[serde(default = "default_alert_history_capacity")]
    pub alert_history_capacity: usize,

    /// A new alert replaces older non-emergency active alerts raised by the
    /// same check for the same hazard, unless they are more severe
    #[serde(default = "default_true")]
    pub supersede_repeated_alerts: bool,

    #[serde(default)]
    pub vibration: VibrationThresholds,

    #[serde(default)]
    pub temperature: TemperatureThresholds,

    #[serde(default)]
    pub pressure: PressureThresholds,

    #[serde(default)]
    pub ground: GroundThresholds,

    #[serde(default)]
    pub fatigue: FatigueThresholds,
}

fn default_true() -> bool {
    true
}
fn default_alert_history_capacity() -> usize {
    defaults::ALERT_HISTORY_CAPACITY
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            auto_shutdown_enabled: true,
            alert_history_capacity: default_alert_history_capacity(),
            supersede_repeated_alerts: true,
            vibration: VibrationThresholds::default(),
            temperature: TemperatureThresholds::default(),
            pressure: PressureThresholds::default(),
            ground: GroundThresholds::default(),
            fatigue: FatigueThresholds::default(),
        }
    }
}

// ============================================================================
// Vibration Thresholds
// ============================================================================

/// Drill-string vibration ladder and pattern detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VibrationThresholds {
    #[serde(default = "default_vib_warning")]
    pub warning_g: f64,

    #[serde(default = "default_vib_critical")]
    pub critical_g: f64,

    /// EMERGENCY with automatic stop
    #[serde(default = "default_vib_emergency")]
    pub emergency_g: f64,

    #[serde(default = "default_vib_history")]
    pub history_capacity: usize,

    /// Most recent samples examined by the spike and trend checks.
    /// Also the minimum history before pattern checks run.
    #[serde(default = "default_vib_pattern_window")]
    pub pattern_window: usize,

    /// Baseline is the mean of the samples in this look-back that precede the
    /// pattern window; until the history exceeds it, `default_baseline_g` is used
    #[serde(default = "default_vib_baseline_window")]
    pub baseline_window: usize,

    #[serde(default = "default_vib_baseline")]
    pub default_baseline_g: f64,

    /// Current value above `baseline * spike_multiplier` is a spike
    #[serde(default = "default_vib_spike_multiplier")]
    pub spike_multiplier: f64,

    /// Second half-window mean above `first * trend_ratio` is a rising trend
    #[serde(default = "default_vib_trend_ratio")]
    pub trend_ratio: f64,

    /// A trend only counts once above this fraction of `warning_g`
    #[serde(default = "default_vib_trend_fraction")]
    pub trend_warning_fraction: f64,
}

fn default_vib_warning() -> f64 {
    2.5
}
fn default_vib_critical() -> f64 {
    4.0
}
fn default_vib_emergency() -> f64 {
    6.0
}
fn default_vib_history() -> usize {
    1000
}
fn default_vib_pattern_window() -> usize {
    20
}
fn default_vib_baseline_window() -> usize {
    100
}
fn default_vib_baseline() -> f64 {
    1.5
}
fn default_vib_spike_multiplier() -> f64 {
    3.0
}
fn default_vib_trend_ratio() -> f64 {
    1.5
}
fn default_vib_trend_fraction() -> f64 {
    0.8
}

impl Default for VibrationThresholds {
    fn default() -> Self {
        Self {
            warning_g: default_vib_warning(),
            critical_g: default_vib_critical(),
            emergency_g: default_vib_emergency(),
            history_capacity: default_vib_history(),
            pattern_window: default_vib_pattern_window(),
            baseline_window: default_vib_baseline_window(),
            default_baseline_g: default_vib_baseline(),
            spike_multiplier: default_vib_spike_multiplier(),
            trend_ratio: default_vib_trend_ratio(),
            trend_warning_fraction: default_vib_trend_fraction(),
        }
    }
}

// ============================================================================
// Temperature Thresholds
// ============================================================================

/// Hydraulic and motor circuit ladders sharing one emergency limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemperatureThresholds {
    #[serde(default = "default_hyd_warning")]
    pub hydraulic_warning_c: f64,

    #[serde(default = "default_hyd_critical")]
    pub hydraulic_critical_c: f64,

    #[serde(default = "default_motor_warning")]
    pub motor_warning_c: f64,

    #[serde(default = "default_motor_critical")]
    pub motor_critical_c: f64,

    /// Either circuit at or above this trips an automatic stop
    #[serde(default = "default_temp_emergency")]
    pub emergency_c: f64,

    #[serde(default = "default_temp_history")]
    pub history_capacity: usize,
}

fn default_hyd_warning() -> f64 {
    65.0
}
fn default_hyd_critical() -> f64 {
    80.0
}
fn default_motor_warning() -> f64 {
    85.0
}
fn default_motor_critical() -> f64 {
    105.0
}
fn default_temp_emergency() -> f64 {
    110.0
}
fn default_temp_history() -> usize {
    500
}

impl Default for TemperatureThresholds {
    fn default() -> Self {
        Self {
            hydraulic_warning_c: default_hyd_warning(),
            hydraulic_critical_c: default_hyd_critical(),
            motor_warning_c: default_motor_warning(),
            motor_critical_c: default_motor_critical(),
            emergency_c: default_temp_emergency(),
            history_capacity: default_temp_history(),
        }
    }
}

// ============================================================================
// Pressure Thresholds
// ============================================================================

/// Hydraulic pressure with over- and under-pressure ladders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PressureThresholds {
    #[serde(default = "default_pres_warning_high")]
    pub warning_high_bar: f64,

    #[serde(default = "default_pres_critical_high")]
    pub critical_high_bar: f64,

    #[serde(default = "default_pres_emergency")]
    pub emergency_bar: f64,

    /// Below this is an under-pressure WARNING
    #[serde(default = "default_pres_warning_low")]
    pub warning_low_bar: f64,

    /// Below this is an under-pressure CRITICAL (possible leak)
    #[serde(default = "default_pres_min")]
    pub min_bar: f64,

    #[serde(default = "default_pres_history")]
    pub history_capacity: usize,
}

fn default_pres_warning_high() -> f64 {
    320.0
}
fn default_pres_critical_high() -> f64 {
    340.0
}
fn default_pres_emergency() -> f64 {
    380.0
}
fn default_pres_warning_low() -> f64 {
    160.0
}
fn default_pres_min() -> f64 {
    150.0
}
fn default_pres_history() -> usize {
    500
}

impl Default for PressureThresholds {
    fn default() -> Self {
        Self {
            warning_high_bar: default_pres_warning_high(),
            critical_high_bar: default_pres_critical_high(),
            emergency_bar: default_pres_emergency(),
            warning_low_bar: default_pres_warning_low(),
            min_bar: default_pres_min(),
            history_capacity: default_pres_history(),
        }
    }
}

// ============================================================================
// Ground Stability Thresholds
// ============================================================================

/// Void and fractured-zone detection from drilling resistance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroundThresholds {
    #[serde(default = "default_true")]
    pub void_detection_enabled: bool,

    /// Resistance rise over baseline that counts as a spike (%)
    #[serde(default = "default_spike_percent")]
    pub resistance_spike_percent: f64,

    /// A spike is a fractured zone only while vibration exceeds this (g)
    #[serde(default = "default_fracture_vibration")]
    pub fracture_vibration_g: f64,

    /// Relative drop from baseline for a void WARNING
    #[serde(default = "default_void_warning_drop")]
    pub void_warning_drop: f64,

    /// Relative drop from baseline for a void CRITICAL
    #[serde(default = "default_void_critical_drop")]
    pub void_critical_drop: f64,

    #[serde(default = "default_ground_history")]
    pub history_capacity: usize,

    /// History needed before any check runs
    #[serde(default = "default_ground_min_samples")]
    pub min_samples: usize,

    /// Baseline covers samples from `baseline_lookback` back up to
    /// `baseline_exclude_recent` back (the current sample included in the count)
    #[serde(default = "default_ground_lookback")]
    pub baseline_lookback: usize,

    #[serde(default = "default_ground_exclude")]
    pub baseline_exclude_recent: usize,
}

fn default_spike_percent() -> f64 {
    50.0
}
fn default_fracture_vibration() -> f64 {
    3.0
}
fn default_void_warning_drop() -> f64 {
    0.5
}
fn default_void_critical_drop() -> f64 {
    0.7
}
fn default_ground_history() -> usize {
    500
}
fn default_ground_min_samples() -> usize {
    20
}
fn default_ground_lookback() -> usize {
    50
}
fn default_ground_exclude() -> usize {
    10
}

impl Default for GroundThresholds {
    fn default() -> Self {
        Self {
            void_detection_enabled: true,
            resistance_spike_percent: default_spike_percent(),
            fracture_vibration_g: default_fracture_vibration(),
            void_warning_drop: default_void_warning_drop(),
            void_critical_drop: default_void_critical_drop(),
            history_capacity: default_ground_history(),
            min_samples: default_ground_min_samples(),
            baseline_lookback: default_ground_lookback(),
            baseline_exclude_recent: default_ground_exclude(),
        }
    }
}

// ============================================================================
// Fatigue Thresholds
// ============================================================================

/// Continuous-operation limits for operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FatigueThresholds {
    /// CRITICAL once an operator has run this long without a break (h)
    #[serde(default = "default_max_continuous_hours")]
    pub max_continuous_hours: f64,

    /// WARNING at this fraction of the limit
    #[serde(default = "default_fatigue_warning_fraction")]
    pub warning_fraction: f64,

    /// Fatigue points removed by a recorded break
    #[serde(default = "default_break_recovery")]
    pub break_recovery_points: f64,

    /// Break length recommended in fatigue alerts (min)
    #[serde(default = "default_mandatory_break")]
    pub mandatory_break_minutes: u32,
}

fn default_max_continuous_hours() -> f64 {
    10.0
}
fn default_fatigue_warning_fraction() -> f64 {
    0.8
}
fn default_break_recovery() -> f64 {
    20.0
}
fn default_mandatory_break() -> u32 {
    30
}

impl Default for FatigueThresholds {
    fn default() -> Self {
        Self {
            max_continuous_hours: default_max_continuous_hours(),
            warning_fraction: default_fatigue_warning_fraction(),
            break_recovery_points: default_break_recovery(),
            mandatory_break_minutes: default_mandatory_break(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

//! System-wide default constants.
//!
//! Grouped by subsystem. Tunable thresholds live in [`GuardianConfig`](super::GuardianConfig);
//! these are the values it falls back to.

// ============================================================================
// Fusion
// ============================================================================

/// Period of the fusion cycle (ms). 100 ms = 10 Hz.
pub const FUSION_INTERVAL_MS: u64 = 100;

/// Readings older than this are stale and their channel is inactive (s).
pub const MAX_DATA_AGE_SECS: f64 = 5.0;

/// Each buffer holds this many seconds of data at the sensor's expected rate.
pub const BUFFER_SECONDS: f64 = 60.0;

/// Depth samples used to derive feed rate.
pub const FEED_RATE_WINDOW: usize = 10;

/// Most recent readings used to estimate a sensor's realised sampling rate.
pub const RATE_ESTIMATION_WINDOW: usize = 100;

/// Without all essential channels, at least this many channels must be active.
pub const MIN_ACTIVE_CHANNELS: usize = 2;

/// Minimum samples before outlier detection runs.
pub const MIN_OUTLIER_SAMPLES: usize = 10;

/// Minimum samples before drift is evaluated.
pub const MIN_DRIFT_SAMPLES: usize = 50;

/// Capacity of the fused-snapshot channel between fusion and safety tasks.
pub const SAFETY_CHANNEL_CAPACITY: usize = 64;

// ============================================================================
// Sensor health
// ============================================================================

/// Out-of-range share above which a sensor is faulty (%).
pub const FAULTY_OUT_OF_RANGE_PERCENT: f64 = 20.0;

/// Out-of-range share above which a sensor is degraded (%).
pub const DEGRADED_OUT_OF_RANGE_PERCENT: f64 = 5.0;

/// A sensor below this fraction of its expected rate is faulty.
pub const FAULTY_RATE_FRACTION: f64 = 0.5;

/// Coefficient of variation above which a sensor is degraded.
pub const DEGRADED_NOISE_CV: f64 = 0.3;

/// Relative drift above which a sensor is degraded.
pub const DEGRADED_DRIFT: f64 = 0.2;

/// Relative drift above which a degraded sensor needs calibration.
pub const CALIBRATION_DRIFT: f64 = 0.1;

// ============================================================================
// Safety
// ============================================================================

/// Alert history ring capacity.
pub const ALERT_HISTORY_CAPACITY: usize = 1_000;

/// Default look-back for alert history queries (hours).
pub const ALERT_HISTORY_DEFAULT_HOURS: f64 = 24.0;

/// Minimum samples before the temperature trend is anything but stable.
pub const THERMAL_TREND_MIN_SAMPLES: usize = 10;

/// Samples considered by the temperature trend.
pub const THERMAL_TREND_WINDOW: usize = 20;

/// Half-window change that counts as rising or falling (%).
pub const THERMAL_TREND_PERCENT: f64 = 5.0;

//! Stateless signal conditioning for buffered sensor series
//!
//! - `filter_noise`: zero-phase Butterworth low-pass (forward-backward, odd padding)
//! - `remove_outliers`: z-score outliers replaced by the window median
//! - `smooth`: centred moving average
//! - `resample`: timestamp-based linear interpolation to a target rate
//! - `preprocess`: the per-sensor-type policy built from the above

use std::f64::consts::PI;

use chrono::Duration;
use statrs::statistics::{Data, Median, Statistics};

use super::ProcessingError;
use crate::config::PreprocessConfig;
use crate::types::{SensorReading, SensorType};

/// Normalised cutoffs at or above this fraction of Nyquist are clamped to it.
const MAX_NORMALIZED_CUTOFF: f64 = 0.99;

/// One second-order (or first-order, with `b2 = a2 = 0`) section with
/// unity DC gain, `a0` normalised to 1.
#[derive(Debug, Clone, Copy)]
struct Section {
    b0: f64,
    b1: f64,
    b2: f64,
    a1: f64,
    a2: f64,
}

impl Section {
    fn low_pass_biquad(w0: f64, q: f64) -> Self {
        let cos_w = w0.cos();
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;
        Self {
            b0: (1.0 - cos_w) / 2.0 / a0,
            b1: (1.0 - cos_w) / a0,
            b2: (1.0 - cos_w) / 2.0 / a0,
            a1: -2.0 * cos_w / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn low_pass_first_order(w0: f64) -> Self {
        let k = (w0 / 2.0).tan();
        Self {
            b0: k / (1.0 + k),
            b1: k / (1.0 + k),
            b2: 0.0,
            a1: (k - 1.0) / (k + 1.0),
            a2: 0.0,
        }
    }

    /// Transposed direct form II, starting from the steady state for a
    /// constant input equal to `signal[0]`.
    fn run(&self, signal: &mut [f64]) {
        let Some(&initial) = signal.first() else {
            return;
        };
        let mut z1 = (1.0 - self.b0) * initial;
        let mut z2 = (self.b2 - self.a2) * initial;
        for x in signal.iter_mut() {
            let input = *x;
            let y = self.b0 * input + z1;
            z1 = self.b1 * input - self.a1 * y + z2;
            z2 = self.b2 * input - self.a2 * y;
            *x = y;
        }
    }
}

/// Digital Butterworth low-pass as a cascade of sections (bilinear transform,
/// pre-warped at the cutoff).
fn butterworth_sections(order: usize, normalized_cutoff: f64) -> Vec<Section> {
    let w0 = PI * normalized_cutoff;
    let mut sections = Vec::with_capacity(order / 2 + 1);
    // Conjugate pole pairs, angle measured from the negative real axis
    for k in 0..order / 2 {
        let theta = if order % 2 == 0 {
            (2 * k + 1) as f64 * PI / (2 * order) as f64
        } else {
            (k + 1) as f64 * PI / order as f64
        };
        let q = 1.0 / (2.0 * theta.cos());
        sections.push(Section::low_pass_biquad(w0, q));
    }
    if order % 2 == 1 {
        sections.push(Section::low_pass_first_order(w0));
    }
    sections
}

/// Zero-phase low-pass filter.
///
/// The series is extended at both ends by odd reflection (`3 * (order + 1)`
/// samples), filtered forward then backward, and trimmed. Series too short to
/// pad are returned unchanged.
pub fn filter_noise(
    values: &[f64],
    cutoff_hz: f64,
    sampling_rate_hz: f64,
    order: usize,
) -> Result<Vec<f64>, ProcessingError> {
    if !(sampling_rate_hz > 0.0) || !sampling_rate_hz.is_finite() {
        return Err(ProcessingError::InvalidSamplingRate(sampling_rate_hz));
    }
    if !(cutoff_hz > 0.0) || !cutoff_hz.is_finite() {
        return Err(ProcessingError::InvalidCutoff(cutoff_hz));
    }
    if order == 0 {
        return Err(ProcessingError::InvalidFilterOrder(order));
    }

    let pad = 3 * (order + 1);
    if values.len() <= pad {
        return Ok(values.to_vec());
    }

    let nyquist = sampling_rate_hz / 2.0;
    let normalized = (cutoff_hz / nyquist).min(MAX_NORMALIZED_CUTOFF);
    let sections = butterworth_sections(order, normalized);

    let n = values.len();
    let first = values[0];
    let last = values[n - 1];
    let mut extended = Vec::with_capacity(n + 2 * pad);
    extended.extend((1..=pad).rev().map(|i| 2.0 * first - values[i]));
    extended.extend_from_slice(values);
    extended.extend((1..=pad).map(|i| 2.0 * last - values[n - 1 - i]));

    for section in &sections {
        section.run(&mut extended);
    }
    extended.reverse();
    for section in &sections {
        section.run(&mut extended);
    }
    extended.reverse();

    Ok(extended[pad..pad + n].to_vec())
}

/// Replace values more than `z_threshold` standard deviations from the median
/// with the median. Fewer than three samples, or no spread, returns a copy.
pub fn remove_outliers(values: &[f64], z_threshold: f64) -> Vec<f64> {
    if values.len() < 3 {
        return values.to_vec();
    }
    let std = values.iter().population_std_dev();
    if !(std > 0.0) {
        return values.to_vec();
    }
    let median = Data::new(values.to_vec()).median();
    values
        .iter()
        .map(|&v| {
            if ((v - median) / std).abs() > z_threshold {
                median
            } else {
                v
            }
        })
        .collect()
}

/// Centred moving average over `window` samples.
///
/// Near the edges the window shrinks to the samples available, so the ends
/// are not pulled toward zero. Series shorter than the window are returned
/// unchanged.
pub fn smooth(values: &[f64], window: usize) -> Vec<f64> {
    if window <= 1 || values.len() < window {
        return values.to_vec();
    }
    let before = (window - 1) / 2;
    let after = window - 1 - before;

    let mut prefix = Vec::with_capacity(values.len() + 1);
    prefix.push(0.0);
    for v in values {
        prefix.push(prefix[prefix.len() - 1] + v);
    }

    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(before);
            let hi = (i + after + 1).min(values.len());
            (prefix[hi] - prefix[lo]) / (hi - lo) as f64
        })
        .collect()
}

/// Linearly resample readings onto `floor(duration * rate)` evenly spaced
/// instants from the first to the last timestamp inclusive.
///
/// Identity, template and quality come from the first reading. Fewer than two
/// readings, a non-positive duration, or fewer than one output sample returns
/// the input unchanged. Readings must be in timestamp order.
pub fn resample(
    readings: &[SensorReading],
    target_rate_hz: f64,
) -> Result<Vec<SensorReading>, ProcessingError> {
    if !(target_rate_hz > 0.0) || !target_rate_hz.is_finite() {
        return Err(ProcessingError::InvalidSamplingRate(target_rate_hz));
    }
    let (Some(template), Some(last)) = (readings.first(), readings.last()) else {
        return Ok(readings.to_vec());
    };
    if readings.len() < 2 {
        return Ok(readings.to_vec());
    }

    let start = template.timestamp;
    let offset = |r: &SensorReading| {
        (r.timestamp - start)
            .num_microseconds()
            .map_or(0.0, |us| us as f64 / 1e6)
    };
    let duration = offset(last);
    if duration <= 0.0 {
        return Ok(readings.to_vec());
    }
    let samples = (duration * target_rate_hz).floor() as usize;
    if samples < 1 {
        return Ok(readings.to_vec());
    }

    let times: Vec<f64> = readings.iter().map(offset).collect();
    let step = if samples > 1 {
        duration / (samples - 1) as f64
    } else {
        0.0
    };

    let mut out = Vec::with_capacity(samples);
    let mut seg = 0;
    for i in 0..samples {
        let t = step * i as f64;
        while seg + 2 < times.len() && times[seg + 1] < t {
            seg += 1;
        }
        let (t0, t1) = (times[seg], times[seg + 1]);
        let (v0, v1) = (readings[seg].value, readings[seg + 1].value);
        let value = if t <= t0 {
            v0
        } else if t >= t1 || t1 <= t0 {
            v1
        } else {
            v0 + (v1 - v0) * (t - t0) / (t1 - t0)
        };
        out.push(SensorReading {
            sensor_id: template.sensor_id.clone(),
            sensor_type: template.sensor_type,
            value,
            unit: template.unit.clone(),
            timestamp: start + Duration::microseconds((t * 1e6).round() as i64),
            quality: template.quality,
            metadata: Default::default(),
        });
    }
    Ok(out)
}

/// Apply the conditioning policy for `sensor_type`.
///
/// - vibration: outliers at the vibration z, then low-pass at the vibration cutoff
/// - acoustic: outliers at the acoustic z, then light smoothing
/// - everything else: standard outliers, then standard smoothing
pub fn preprocess(
    values: &[f64],
    sensor_type: SensorType,
    config: &PreprocessConfig,
) -> Result<Vec<f64>, ProcessingError> {
    match sensor_type {
        SensorType::Vibration => {
            let cleaned = remove_outliers(values, config.vibration_outlier_z);
            filter_noise(
                &cleaned,
                config.vibration_cutoff_hz,
                config.vibration_sampling_rate_hz,
                config.filter_order,
            )
        }
        SensorType::Acoustic => {
            let cleaned = remove_outliers(values, config.acoustic_outlier_z);
            Ok(smooth(&cleaned, config.acoustic_smoothing_window))
        }
        _ => {
            let cleaned = remove_outliers(values, config.standard_outlier_z);
            Ok(smooth(&cleaned, config.standard_smoothing_window))
        }
    }
}

//! # Pitch Detection Module
//!
//! This module estimates the fundamental frequency of a single plucked string
//! from one frame of time-domain samples. Two interchangeable estimators are
//! provided and selected through [`PitchAlgorithm`]:
//!
//! - A difference-based normalized autocorrelation that stops at the first
//!   descent after a strong correlation, which keeps it from locking onto
//!   longer lags
//! - The YIN cumulative mean normalized difference method
//!
//! Both refine the winning lag with parabolic interpolation for sub-sample
//! accuracy and report "no pitch" as `None`. Neither keeps state between calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest frequency reported as a valid pitch, in Hz.
pub const MIN_FREQUENCY: f32 = 50.0;
/// Highest frequency reported as a valid pitch, in Hz.
pub const MAX_FREQUENCY: f32 = 2000.0;
/// Default YIN threshold on the normalized difference function.
pub const DEFAULT_YIN_THRESHOLD: f32 = 0.1;

/// Frames quieter than this RMS are treated as silence by the autocorrelation.
const SILENCE_RMS: f32 = 0.01;
const GOOD_ENOUGH_CORRELATION: f32 = 0.9;
const MIN_USABLE_CORRELATION: f32 = 0.01;

/// The available fundamental-frequency estimators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PitchAlgorithm {
    #[default]
    Autocorrelation,
    Yin,
}

impl PitchAlgorithm {
    /// Runs the selected estimator on `signal`.
    ///
    /// Results outside [`MIN_FREQUENCY`, `MAX_FREQUENCY`] are dropped for both
    /// algorithms; `yin_threshold` is ignored by the autocorrelation.
    pub fn detect(self, signal: &[f32], sample_rate: u32, yin_threshold: f32) -> Option<f32> {
        match self {
            PitchAlgorithm::Autocorrelation => detect_pitch(signal, sample_rate),
            PitchAlgorithm::Yin => {
                detect_pitch_yin(signal, sample_rate, yin_threshold).filter(|&f| in_band(f))
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PitchAlgorithm::Autocorrelation => "autocorrelation",
            PitchAlgorithm::Yin => "yin",
        }
    }
}

impl fmt::Display for PitchAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for PitchAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "autocorrelation" | "acf" => Ok(PitchAlgorithm::Autocorrelation),
            "yin" => Ok(PitchAlgorithm::Yin),
            other => Err(format!("unknown pitch algorithm '{}'", other)),
        }
    }
}

/// Root-mean-square amplitude of a frame. Returns 0 for an empty frame.
pub fn rms_amplitude(signal: &[f32]) -> f32 {
    if signal.is_empty() {
        return 0.0;
    }
    (signal.iter().map(|&s| s * s).sum::<f32>() / signal.len() as f32).sqrt()
}

fn in_band(frequency: f32) -> bool {
    frequency.is_finite() && (MIN_FREQUENCY..=MAX_FREQUENCY).contains(&frequency)
}

/// Estimates the fundamental frequency with a difference-based autocorrelation.
///
/// For each lag up to half the frame, the correlation is one minus the mean
/// absolute difference between the signal and its shifted copy. Once the
/// correlation has risen above 0.9 the search follows it upward and stops at
/// the first lag where it falls again; that peak is refined by parabolic
/// interpolation.
///
/// # Arguments
/// * `signal` - Input audio frame, samples roughly in [-1, 1]
/// * `sample_rate` - Sample rate in Hz
///
/// # Returns
/// * `Some(frequency)` - Detected frequency in Hz, within [50, 2000]
/// * `None` - Silence (RMS below 0.01), no usable correlation, or out of band
pub fn detect_pitch(signal: &[f32], sample_rate: u32) -> Option<f32> {
    let max_lag = signal.len() / 2;
    if max_lag < 3 || rms_amplitude(signal) < SILENCE_RMS {
        return None;
    }

    let mut correlations = vec![0.0; max_lag];
    correlations[0] = 1.0;

    let mut best_lag = 0;
    let mut best_correlation = 0.0;
    let mut found_good_correlation = false;
    let mut last_correlation = 1.0;
    let mut refined_lag = None;

    for lag in 1..max_lag {
        let distance: f32 = signal[..max_lag]
            .iter()
            .zip(&signal[lag..lag + max_lag])
            .map(|(a, b)| (a - b).abs())
            .sum();
        let correlation = 1.0 - distance / max_lag as f32;
        correlations[lag] = correlation;

        if correlation > GOOD_ENOUGH_CORRELATION && correlation > last_correlation {
            found_good_correlation = true;
            if correlation > best_correlation {
                best_correlation = correlation;
                best_lag = lag;
            }
        } else if found_good_correlation {
            // First descent after the peak.
            refined_lag = Some(parabolic_vertex(&correlations, best_lag));
            break;
        }
        last_correlation = correlation;
    }

    let period = match refined_lag {
        Some(lag) => lag,
        None if best_correlation > MIN_USABLE_CORRELATION => best_lag as f32,
        None => return None,
    };

    let frequency = sample_rate as f32 / period;
    in_band(frequency).then_some(frequency)
}

/// Estimates the fundamental frequency with the YIN algorithm.
///
/// The cumulative mean normalized difference is computed lag by lag. The first
/// lag below `threshold` opens a dip; the search follows the dip while it
/// stays below the threshold and keeps its minimum, which is then refined by
/// parabolic interpolation.
///
/// No frequency band is enforced here; [`PitchAlgorithm::detect`] applies the
/// same [50, 2000] Hz filter as the autocorrelation.
///
/// # Returns
/// * `Some(frequency)` - Detected frequency in Hz
/// * `None` - The difference function never dropped below `threshold`
pub fn detect_pitch_yin(signal: &[f32], sample_rate: u32, threshold: f32) -> Option<f32> {
    let half = signal.len() / 2;
    if half < 3 {
        return None;
    }

    let mut yin_buffer = Vec::with_capacity(half);
    yin_buffer.push(1.0);
    let mut running_sum = 0.0;
    let mut dip: Option<usize> = None;

    for tau in 1..half {
        let difference: f32 = signal[..half]
            .iter()
            .zip(&signal[tau..tau + half])
            .map(|(a, b)| {
                let delta = a - b;
                delta * delta
            })
            .sum();
        running_sum += difference;
        let normalized = if running_sum > 0.0 {
            difference * tau as f32 / running_sum
        } else {
            1.0
        };
        yin_buffer.push(normalized);

        match dip {
            None if normalized < threshold => dip = Some(tau),
            Some(_) if normalized >= threshold => break,
            Some(best) if normalized < yin_buffer[best] => dip = Some(tau),
            _ => {}
        }
    }

    let period = parabolic_vertex(&yin_buffer, dip?);
    let frequency = sample_rate as f32 / period;
    frequency.is_finite().then_some(frequency)
}

/// Sub-sample position of the extremum around `index`, from the parabola
/// through its two neighbours. Falls back to `index` at the edges.
fn parabolic_vertex(values: &[f32], index: usize) -> f32 {
    if index == 0 || index + 1 >= values.len() {
        return index as f32;
    }
    let y1 = values[index - 1];
    let y2 = values[index];
    let y3 = values[index + 1];

    let denominator = y1 - 2.0 * y2 + y3;
    if denominator.abs() < 1e-12 {
        return index as f32;
    }
    let shift = (y1 - y3) / (2.0 * denominator);
    index as f32 + shift.clamp(-1.0, 1.0)
}

/// Index of the FFT bin nearest to `frequency`.
pub fn frequency_bin(frequency: f32, sample_rate: u32, fft_size: usize) -> usize {
    (frequency * fft_size as f32 / sample_rate as f32).round().max(0.0) as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(frequency: f32, sample_rate: u32, len: usize, amplitude: f32) -> Vec<f32> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn assert_within_percent(actual: Option<f32>, expected: f32, percent: f32) {
        let actual = actual.unwrap_or_else(|| panic!("no pitch detected for {} Hz", expected));
        let error = (actual - expected).abs() / expected * 100.0;
        assert!(
            error <= percent,
            "expected {} Hz, got {} Hz ({:.3}% off)",
            expected,
            actual,
            error
        );
    }

    #[test]
    fn autocorrelation_detects_sines() {
        for &frequency in &[82.41, 110.0, 146.83, 196.0, 246.94, 329.63, 440.0, 1000.0] {
            let signal = sine(frequency, 48_000, 4096, 0.5);
            assert_within_percent(detect_pitch(&signal, 48_000), frequency, 1.0);
        }
    }

    #[test]
    fn autocorrelation_at_four_samples_per_period() {
        let signal = sine(1000.0, 4000, 1024, 0.5);
        assert_within_percent(detect_pitch(&signal, 4000), 1000.0, 1.0);
    }

    #[test]
    fn yin_detects_sines() {
        for &frequency in &[82.41, 110.0, 196.0, 329.63, 440.0, 1000.0] {
            let signal = sine(frequency, 44_100, 4096, 0.5);
            let detected = detect_pitch_yin(&signal, 44_100, DEFAULT_YIN_THRESHOLD);
            assert_within_percent(detected, frequency, 1.0);
        }
    }

    #[test]
    fn fundamental_wins_over_strong_second_harmonic() {
        let fundamental = 110.0;
        let signal: Vec<f32> = (0..4096)
            .map(|i| {
                let t = i as f32 / 48_000.0;
                0.5 * (2.0 * PI * fundamental * t).sin()
                    + 0.4 * (2.0 * PI * 2.0 * fundamental * t).sin()
            })
            .collect();
        assert_within_percent(detect_pitch(&signal, 48_000), fundamental, 1.0);
        assert_within_percent(
            detect_pitch_yin(&signal, 48_000, DEFAULT_YIN_THRESHOLD),
            fundamental,
            1.0,
        );
    }

    #[test]
    fn silence_has_no_pitch() {
        let silence = vec![0.0; 2048];
        assert_eq!(detect_pitch(&silence, 48_000), None);
        assert_eq!(detect_pitch_yin(&silence, 48_000, DEFAULT_YIN_THRESHOLD), None);
    }

    /// Deterministic uniform noise in [-amplitude, amplitude].
    fn noise(len: usize, amplitude: f32) -> Vec<f32> {
        let mut state: u32 = 0x1234_5678;
        (0..len)
            .map(|_| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                (state as f32 / u32::MAX as f32 * 2.0 - 1.0) * amplitude
            })
            .collect()
    }

    #[test]
    fn quiet_noise_is_gated() {
        let noise = noise(2048, 0.01);
        assert!(rms_amplitude(&noise) < 0.01);
        assert_eq!(detect_pitch(&noise, 48_000), None);
    }

    #[test]
    fn loud_noise_has_no_pitch() {
        // Well above the silence gate, so only the correlation and CMND
        // thresholds can reject it.
        let noise = noise(4096, 0.5);
        assert!(rms_amplitude(&noise) > 0.2);
        assert_eq!(detect_pitch(&noise, 48_000), None);
        assert_eq!(detect_pitch_yin(&noise, 48_000, DEFAULT_YIN_THRESHOLD), None);
    }

    #[test]
    fn out_of_band_pitch_is_rejected() {
        let low = sine(30.0, 48_000, 4096, 0.5);
        assert_eq!(detect_pitch(&low, 48_000), None);

        // YIN reports it, the shared band filter drops it.
        assert!(detect_pitch_yin(&low, 48_000, DEFAULT_YIN_THRESHOLD).is_some());
        assert_eq!(PitchAlgorithm::Yin.detect(&low, 48_000, DEFAULT_YIN_THRESHOLD), None);

        let high = sine(2500.0, 48_000, 2048, 0.5);
        assert_eq!(detect_pitch(&high, 48_000), None);
        assert_eq!(PitchAlgorithm::Yin.detect(&high, 48_000, DEFAULT_YIN_THRESHOLD), None);
    }

    #[test]
    fn tiny_frames_have_no_pitch() {
        assert_eq!(detect_pitch(&[0.5, -0.5, 0.5, -0.5], 48_000), None);
        assert_eq!(detect_pitch_yin(&[], 48_000, DEFAULT_YIN_THRESHOLD), None);
    }

    #[test]
    fn algorithm_names_pad() {
        assert_eq!(format!("[{:<8}]", PitchAlgorithm::Yin), "[yin     ]");
    }

    #[test]
    fn algorithm_dispatch_matches_direct_calls() {
        let signal = sine(196.0, 48_000, 4096, 0.5);
        assert_eq!(
            PitchAlgorithm::Autocorrelation.detect(&signal, 48_000, DEFAULT_YIN_THRESHOLD),
            detect_pitch(&signal, 48_000)
        );
        assert_eq!(
            PitchAlgorithm::Yin.detect(&signal, 48_000, DEFAULT_YIN_THRESHOLD),
            detect_pitch_yin(&signal, 48_000, DEFAULT_YIN_THRESHOLD)
        );
    }

    #[test]
    fn algorithm_names_parse() {
        assert_eq!("YIN".parse::<PitchAlgorithm>(), Ok(PitchAlgorithm::Yin));
        assert_eq!(
            "autocorrelation".parse::<PitchAlgorithm>(),
            Ok(PitchAlgorithm::Autocorrelation)
        );
        assert!("fft".parse::<PitchAlgorithm>().is_err());
        assert_eq!(PitchAlgorithm::Yin.to_string(), "yin");
    }

    #[test]
    fn rms_of_sine_and_empty() {
        let signal = sine(440.0, 48_000, 48_000, 0.5);
        assert!((rms_amplitude(&signal) - 0.5 / 2f32.sqrt()).abs() < 1e-3);
        assert_eq!(rms_amplitude(&[]), 0.0);
    }

    #[test]
    fn nearest_fft_bin() {
        assert_eq!(frequency_bin(440.0, 48_000, 16_384), 150);
        assert_eq!(frequency_bin(0.0, 48_000, 16_384), 0);
    }
}

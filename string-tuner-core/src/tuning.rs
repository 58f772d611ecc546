//! # Tuning Module
//!
//! Turns a frequency estimate into tuning feedback: the deviation from the
//! target string in cents, a discrete accuracy tier, exponential smoothing of
//! successive readings and a short-term stability check.
//!
//! Every function here is pure. Temporal state (frequency history, the
//! previous smoothed reading) belongs to the caller, see [`crate::session`].

use crate::TuningResult;
use crate::layout::StringSpec;
use crate::pitch::{MAX_FREQUENCY, MIN_FREQUENCY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default smoothing factor (weight of the previous reading).
pub const DEFAULT_SMOOTHING_FACTOR: f32 = 0.8;
/// Default maximum deviation from the recent mean, in Hz, for a stable pitch.
pub const DEFAULT_STABILITY_TOLERANCE: f32 = 2.0;
/// Default RMS amplitude below which a frame counts as silence.
pub const DEFAULT_NOISE_THRESHOLD: f32 = 0.01;

const MIN_STABLE_READINGS: usize = 3;
const STABILITY_WINDOW: usize = 5;

/// How strict the accuracy tiers are. Each profile carries a tolerance in
/// cents that scales all tier boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrecisionProfile {
    Perfect,
    #[default]
    Excellent,
    Good,
    Ok,
}

impl PrecisionProfile {
    /// Tolerance in cents.
    pub fn tolerance(self) -> f32 {
        match self {
            PrecisionProfile::Perfect => 0.5,
            PrecisionProfile::Excellent => 1.0,
            PrecisionProfile::Good => 2.0,
            PrecisionProfile::Ok => 3.0,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PrecisionProfile::Perfect => "perfect",
            PrecisionProfile::Excellent => "excellent",
            PrecisionProfile::Good => "good",
            PrecisionProfile::Ok => "ok",
        }
    }
}

impl fmt::Display for PrecisionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl FromStr for PrecisionProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "perfect" => Ok(PrecisionProfile::Perfect),
            "excellent" => Ok(PrecisionProfile::Excellent),
            "good" => Ok(PrecisionProfile::Good),
            "ok" => Ok(PrecisionProfile::Ok),
            other => Err(format!("unknown precision profile '{}'", other)),
        }
    }
}

/// Accuracy tiers, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accuracy {
    Perfect,
    Excellent,
    Good,
    Ok,
    Off,
}

impl Accuracy {
    pub fn name(self) -> &'static str {
        match self {
            Accuracy::Perfect => "perfect",
            Accuracy::Excellent => "excellent",
            Accuracy::Good => "good",
            Accuracy::Ok => "ok",
            Accuracy::Off => "off",
        }
    }
}

impl fmt::Display for Accuracy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Calculates the deviation from a target frequency in cents.
///
/// Cents are a logarithmic unit of pitch measurement where:
/// - 100 cents = 1 semitone
/// - 1200 cents = 1 octave
/// - Positive values indicate sharpness, negative values indicate flatness
///
/// The result is rounded to one decimal. Non-positive inputs yield 0.
pub fn calculate_cents(actual: f32, target: f32) -> f32 {
    if !(actual > 0.0) || !(target > 0.0) {
        return 0.0;
    }
    let cents = 1200.0 * (actual / target).log2();
    (cents * 10.0).round() / 10.0
}

/// Maps a cents deviation onto an accuracy tier.
///
/// With `t` the profile tolerance: `|cents| <= t/2` is perfect, `<= t`
/// excellent, `<= 2t` good, `<= 3t` ok, anything else off.
pub fn classify_accuracy(cents: f32, profile: PrecisionProfile) -> Accuracy {
    let abs_cents = cents.abs();
    let tolerance = profile.tolerance();

    if abs_cents <= tolerance * 0.5 {
        Accuracy::Perfect
    } else if abs_cents <= tolerance {
        Accuracy::Excellent
    } else if abs_cents <= tolerance * 2.0 {
        Accuracy::Good
    } else if abs_cents <= tolerance * 3.0 {
        Accuracy::Ok
    } else {
        Accuracy::Off
    }
}

/// Exponential smoothing: `last * factor + new * (1 - factor)`.
///
/// A `last` of 0 means there is no previous reading and `new` passes through.
pub fn smooth_frequency(new: f32, last: f32, factor: f32) -> f32 {
    if last == 0.0 {
        return new;
    }
    last * factor + new * (1.0 - factor)
}

/// Whether the most recent readings agree.
///
/// Needs at least 3 readings. Takes the mean of the last 5 (or all, if fewer)
/// and requires each of them to be strictly closer than `tolerance` Hz to it.
pub fn is_stable(history: &[f32], tolerance: f32) -> bool {
    if history.len() < MIN_STABLE_READINGS {
        return false;
    }
    let recent = &history[history.len().saturating_sub(STABILITY_WINDOW)..];
    let average = recent.iter().sum::<f32>() / recent.len() as f32;
    recent.iter().all(|f| (f - average).abs() < tolerance)
}

/// Gate for frames worth analysing: loud enough and a plausible pitch in
/// (50, 2000) Hz, both bounds exclusive.
pub fn filter_noise(frequency: f32, amplitude: f32, noise_threshold: f32) -> bool {
    amplitude > noise_threshold && frequency > MIN_FREQUENCY && frequency < MAX_FREQUENCY
}

/// Builds the tuning snapshot for one frame.
pub fn build_result(
    string: &StringSpec,
    actual_frequency: f32,
    is_stable: bool,
    profile: PrecisionProfile,
) -> TuningResult {
    let cents = calculate_cents(actual_frequency, string.target_frequency);
    TuningResult {
        string: string.number,
        target_frequency: string.target_frequency,
        actual_frequency,
        cents,
        accuracy: classify_accuracy(cents, profile),
        is_stable,
    }
}

//! # Configuration Module
//!
//! Settings that steer the analysis pipeline. They are plain values: the core
//! reads them but never persists anything on its own. Settings files are
//! pretty-printed JSON and every field is optional.

use crate::error::{Result, TunerError};
use crate::layout::TuningLayout;
use crate::pitch::{DEFAULT_YIN_THRESHOLD, PitchAlgorithm};
use crate::tuning::{
    DEFAULT_NOISE_THRESHOLD, DEFAULT_SMOOTHING_FACTOR, DEFAULT_STABILITY_TOLERANCE,
    PrecisionProfile,
};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Smallest accepted analysis frame, in samples.
const MIN_BUFFER_SIZE: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerSettings {
    /// Preferred capture sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per analysis frame.
    pub buffer_size: usize,
    /// Weight of the previous reading in exponential smoothing, in [0, 1).
    pub smoothing_factor: f32,
    /// RMS amplitude a frame must exceed to be analysed.
    pub noise_threshold: f32,
    pub algorithm: PitchAlgorithm,
    pub yin_threshold: f32,
    pub precision: PrecisionProfile,
    /// Maximum deviation from the recent mean, in Hz, for a stable reading.
    pub stability_tolerance: f32,
    /// Extract harmonic peaks from the spectrum as identification evidence.
    pub harmonic_analysis: bool,
    /// Name of the active layout (custom layouts first, then presets).
    pub layout: String,
    pub custom_layouts: Vec<TuningLayout>,
}

impl Default for TunerSettings {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            buffer_size: 16_384,
            smoothing_factor: DEFAULT_SMOOTHING_FACTOR,
            noise_threshold: DEFAULT_NOISE_THRESHOLD,
            algorithm: PitchAlgorithm::default(),
            yin_threshold: DEFAULT_YIN_THRESHOLD,
            precision: PrecisionProfile::default(),
            stability_tolerance: DEFAULT_STABILITY_TOLERANCE,
            harmonic_analysis: true,
            layout: "Standard".to_string(),
            custom_layouts: Vec::new(),
        }
    }
}

impl TunerSettings {
    /// Loads and validates settings from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)?;
        let settings: TunerSettings = serde_json::from_str(&data)?;
        settings.validate()?;
        info!("[CONFIG] Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Writes the settings as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json_string = serde_json::to_string_pretty(self)?;
        fs::write(path, json_string)?;
        info!("[CONFIG] Saved settings to {}", path.display());
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(TunerError::InvalidSettings(reason.to_string()));

        if self.sample_rate == 0 {
            return invalid("sample_rate must be positive");
        }
        if self.buffer_size < MIN_BUFFER_SIZE {
            return Err(TunerError::InvalidSettings(format!(
                "buffer_size must be at least {} samples",
                MIN_BUFFER_SIZE
            )));
        }
        if !(0.0..1.0).contains(&self.smoothing_factor) {
            return invalid("smoothing_factor must be in [0, 1)");
        }
        if !(self.noise_threshold >= 0.0) {
            return invalid("noise_threshold must not be negative");
        }
        if !(self.yin_threshold > 0.0 && self.yin_threshold < 1.0) {
            return invalid("yin_threshold must be in (0, 1)");
        }
        if !(self.stability_tolerance >= 0.0) {
            return invalid("stability_tolerance must not be negative");
        }
        for layout in &self.custom_layouts {
            layout.validate()?;
        }
        self.resolve_layout().map(|_| ())
    }

    /// The layout named by `layout`: custom layouts are searched before the
    /// built-in presets, names compare case-insensitively.
    pub fn resolve_layout(&self) -> Result<TuningLayout> {
        self.custom_layouts
            .iter()
            .find(|layout| layout.name.eq_ignore_ascii_case(&self.layout))
            .cloned()
            .or_else(|| TuningLayout::by_name(&self.layout))
            .ok_or_else(|| TunerError::UnknownLayout(self.layout.clone()))
    }
}

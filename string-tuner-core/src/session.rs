//! # Analysis Session Module
//!
//! Owns the state that lives across frames: the active layout and string
//! identifier, the history of raw frequency estimates, the smoothing seed and
//! an optional manually selected string. [`TunerSession::process_frame`] runs
//! one frame through the whole pipeline.
//!
//! A session is meant to be driven by exactly one caller at a time, one frame
//! after another.

use crate::TuningResult;
use crate::config::TunerSettings;
use crate::error::{Result, TunerError};
use crate::fft;
use crate::history::History;
use crate::identifier::StringIdentifier;
use crate::layout::TuningLayout;
use crate::pitch;
use crate::tuning;
use log::{debug, info, trace};

const FREQUENCY_HISTORY_CAPACITY: usize = 10;
/// Partials beyond the fundamental inspected for harmonic evidence.
const HARMONIC_COUNT: usize = 4;

#[derive(Debug)]
pub struct TunerSession {
    settings: TunerSettings,
    identifier: StringIdentifier,
    frequency_history: History<f32>,
    /// Previous smoothed frequency; `None` after a frame without pitch.
    last_smoothed: Option<f32>,
    selected_string: Option<u32>,
    last_result: Option<TuningResult>,
}

impl TunerSession {
    /// Creates a session using the layout named in `settings`.
    pub fn new(settings: TunerSettings) -> Result<Self> {
        settings.validate()?;
        let layout = settings.resolve_layout()?;
        info!(
            "[SESSION] Layout '{}', algorithm {}, precision {}",
            layout.name, settings.algorithm, settings.precision
        );
        Ok(Self::with_layout(settings, layout))
    }

    /// Creates a session for an explicit layout, bypassing the name lookup.
    pub fn with_layout(settings: TunerSettings, layout: TuningLayout) -> Self {
        Self {
            settings,
            identifier: StringIdentifier::new(layout),
            frequency_history: History::with_capacity(FREQUENCY_HISTORY_CAPACITY),
            last_smoothed: None,
            selected_string: None,
            last_result: None,
        }
    }

    pub fn layout(&self) -> &TuningLayout {
        self.identifier.layout()
    }

    pub fn selected_string(&self) -> Option<u32> {
        self.selected_string
    }

    pub fn last_result(&self) -> Option<&TuningResult> {
        self.last_result.as_ref()
    }

    /// Raw frequency estimates of recent frames, oldest first.
    pub fn frequency_history(&self) -> Vec<f32> {
        self.frequency_history.iter().copied().collect()
    }

    /// Identifier confidence for the string of the last result.
    pub fn confidence(&self) -> f32 {
        self.last_result
            .as_ref()
            .map_or(0.0, |result| self.identifier.confidence(result.string))
    }

    /// Runs one frame through the pipeline.
    ///
    /// 1. RMS amplitude and fundamental with the configured algorithm
    /// 2. Noise gate on amplitude and frequency
    /// 3. Raw estimate recorded, smoothed against the previous smoothed value
    /// 4. Target string: the selected one, else identified from the smoothed
    ///    frequency and the harmonics found in the spectrum
    /// 5. Stability over the raw history and the result snapshot
    ///
    /// # Returns
    /// * `Some(result)` - Tuning feedback for this frame
    /// * `None` - Silence, no pitch, or no string matched
    pub fn process_frame(&mut self, buffer: &[f32], sample_rate: u32) -> Option<TuningResult> {
        let result = self.analyze(buffer, sample_rate);
        self.last_result = result.clone();
        result
    }

    fn analyze(&mut self, buffer: &[f32], sample_rate: u32) -> Option<TuningResult> {
        let amplitude = pitch::rms_amplitude(buffer);
        let detected = self
            .settings
            .algorithm
            .detect(buffer, sample_rate, self.settings.yin_threshold)
            .filter(|&frequency| {
                tuning::filter_noise(frequency, amplitude, self.settings.noise_threshold)
            });

        let Some(raw_frequency) = detected else {
            trace!("[SESSION] No pitch (rms {:.4})", amplitude);
            self.last_smoothed = None;
            return None;
        };

        self.frequency_history.push(raw_frequency);
        let smoothed = tuning::smooth_frequency(
            raw_frequency,
            self.last_smoothed.unwrap_or(0.0),
            self.settings.smoothing_factor,
        );
        self.last_smoothed = Some(smoothed);
        trace!(
            "[SESSION] raw {:.2} Hz, smoothed {:.2} Hz, rms {:.4}",
            raw_frequency, smoothed, amplitude
        );

        let target = match self.selected_string {
            Some(number) => number,
            None => {
                let harmonics = if self.settings.harmonic_analysis {
                    let magnitudes = fft::magnitude_spectrum(buffer);
                    fft::find_harmonics(&magnitudes, smoothed, sample_rate, HARMONIC_COUNT)
                } else {
                    Vec::new()
                };
                self.identifier.identify_string(smoothed, &harmonics)?
            }
        };

        let string = self.identifier.layout().string(target)?;
        let stable = tuning::is_stable(
            self.frequency_history.contiguous(),
            self.settings.stability_tolerance,
        );
        Some(tuning::build_result(
            string,
            smoothed,
            stable,
            self.settings.precision,
        ))
    }

    /// Switches to another layout and forgets everything learned so far.
    pub fn set_layout(&mut self, layout: TuningLayout) {
        info!("[SESSION] Switching layout to '{}'", layout.name);
        self.identifier.set_tuning_mode(layout);
        self.selected_string = None;
        self.clear_readings();
    }

    /// Locks analysis onto one string, or returns to automatic
    /// identification with `None`.
    pub fn select_string(&mut self, number: Option<u32>) -> Result<()> {
        if let Some(number) = number {
            if self.layout().string(number).is_none() {
                return Err(TunerError::UnknownString(number));
            }
        }
        debug!("[SESSION] Selected string: {:?}", number);
        self.selected_string = number;
        self.last_smoothed = None;
        self.last_result = None;
        Ok(())
    }

    /// Clears all temporal state; layout and settings are kept.
    pub fn reset(&mut self) {
        debug!("[SESSION] Reset");
        self.identifier.reset();
        self.clear_readings();
    }

    fn clear_readings(&mut self) {
        self.frequency_history.clear();
        self.last_smoothed = None;
        self.last_result = None;
    }
}

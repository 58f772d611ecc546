//! # Fast Fourier Transform (FFT) Module
//!
//! Spectrum analysis used to collect harmonic evidence for string
//! identification. A frame is centred, Hann-windowed and transformed with
//! RustFFT; peaks near integer multiples of the detected fundamental are then
//! located and refined to sub-bin accuracy.

use rustfft::{FftPlanner, num_complex::Complex};

/// Relative search window around each expected partial.
const PARTIAL_SEARCH_WIDTH: f32 = 0.03;
/// A partial must reach this fraction of the fundamental's magnitude.
const MIN_RELATIVE_MAGNITUDE: f32 = 0.05;

/// Removes the DC offset from a signal by making its average value zero.
fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 {
        return;
    }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Applies a Hann window to reduce spectral leakage.
fn apply_hann_window(buffer: &mut [f32]) {
    let n = buffer.len();
    if n < 2 {
        return;
    }
    let n_minus_1 = (n - 1) as f32;
    for (i, sample) in buffer.iter_mut().enumerate() {
        let multiplier = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n_minus_1).cos());
        *sample *= multiplier;
    }
}

/// Computes the magnitude spectrum of a frame.
///
/// The frame is DC-corrected and Hann-windowed before a forward FFT of the
/// same length. Only the first half of the spectrum (up to Nyquist) is
/// returned, so bin `k` covers `k * sample_rate / signal.len()` Hz.
pub fn magnitude_spectrum(signal: &[f32]) -> Vec<f32> {
    let len = signal.len();
    if len == 0 {
        return Vec::new();
    }

    let mut processed_signal = signal.to_vec();
    remove_dc_offset(&mut processed_signal);
    apply_hann_window(&mut processed_signal);

    let mut planner = FftPlanner::new();
    let fft = planner.plan_fft_forward(len);

    let mut buffer: Vec<Complex<f32>> = processed_signal
        .into_iter()
        .map(|sample| Complex { re: sample, im: 0.0 })
        .collect();

    fft.process(&mut buffer);
    buffer.iter().take(len / 2).map(|c| c.norm()).collect()
}

/// Finds the harmonic partials of `fundamental` in a magnitude spectrum.
///
/// Partials 2 through `count + 1` below Nyquist are searched within ±3% of
/// their ideal frequency. A partial is reported only when its peak reaches 5%
/// of the fundamental's peak, so a pure tone yields no harmonics.
///
/// # Arguments
/// * `magnitudes` - Half spectrum from [`magnitude_spectrum`]
/// * `fundamental` - Detected fundamental in Hz
/// * `sample_rate` - Sample rate in Hz
/// * `count` - Maximum number of partials to look for
///
/// # Returns
/// * Frequencies of the detected partials in Hz, ascending
pub fn find_harmonics(
    magnitudes: &[f32],
    fundamental: f32,
    sample_rate: u32,
    count: usize,
) -> Vec<f32> {
    if magnitudes.len() < 3 || !(fundamental > 0.0) {
        return Vec::new();
    }
    let bin_width = sample_rate as f32 / (magnitudes.len() * 2) as f32;
    let nyquist = sample_rate as f32 / 2.0;

    let Some((_, reference)) = spectral_peak(magnitudes, fundamental, bin_width) else {
        return Vec::new();
    };
    if reference <= 0.0 {
        return Vec::new();
    }

    (2..=count + 1)
        .map(|n| fundamental * n as f32)
        .take_while(|&expected| expected * (1.0 + PARTIAL_SEARCH_WIDTH) < nyquist)
        .filter_map(|expected| spectral_peak(magnitudes, expected, bin_width))
        .filter(|&(_, magnitude)| magnitude >= reference * MIN_RELATIVE_MAGNITUDE)
        .map(|(frequency, _)| frequency)
        .collect()
}

/// Strongest bin within the search window around `expected`, refined with
/// log-parabolic interpolation. Returns `(frequency, magnitude)`.
fn spectral_peak(magnitudes: &[f32], expected: f32, bin_width: f32) -> Option<(f32, f32)> {
    let last_bin = magnitudes.len() - 1;
    let radius = (expected * PARTIAL_SEARCH_WIDTH / bin_width).max(1.0);
    let target_bin = expected / bin_width;
    let start_bin = (target_bin - radius).max(1.0) as usize;
    let end_bin = ((target_bin + radius).ceil() as usize).min(last_bin - 1);
    if start_bin > end_bin {
        return None;
    }

    let (offset, &peak) = magnitudes[start_bin..=end_bin]
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    let peak_bin = start_bin + offset;

    Some((refine_peak(magnitudes, peak_bin) * bin_width, peak))
}

/// Interpolated bin position of a peak, using the logarithm of the three
/// magnitudes around it.
fn refine_peak(magnitudes: &[f32], peak_bin: usize) -> f32 {
    if peak_bin == 0 || peak_bin + 1 >= magnitudes.len() {
        return peak_bin as f32;
    }
    let y1 = magnitudes[peak_bin - 1].ln();
    let y2 = magnitudes[peak_bin].ln();
    let y3 = magnitudes[peak_bin + 1].ln();
    if !y1.is_finite() || !y2.is_finite() || !y3.is_finite() {
        return peak_bin as f32;
    }

    let denominator = 2.0 * y2 - y1 - y3;
    if denominator.abs() < 1e-6 {
        return peak_bin as f32;
    }
    let peak_shift = (y3 - y1) / (2.0 * denominator);
    peak_bin as f32 + peak_shift.clamp(-0.5, 0.5)
}

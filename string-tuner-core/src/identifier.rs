//! # String Identification Module
//!
//! Decides which string of the active layout is being played. Candidates are
//! the strings whose detection range contains the frequency; when ranges
//! overlap, candidates are scored on frequency proximity, harmonic evidence
//! and how often they were chosen recently. The recent-choice term acts as
//! hysteresis and keeps the display from flickering between neighbours.

use crate::history::History;
use crate::layout::{StringSpec, TuningLayout};
use log::{debug, trace};

/// Coarse band outside which no string is considered, in Hz.
const MIN_STRING_FREQUENCY: f32 = 50.0;
const MAX_STRING_FREQUENCY: f32 = 400.0;

const HISTORY_CAPACITY: usize = 10;
const HISTORY_WINDOW: usize = 5;

const FREQUENCY_WEIGHT: f32 = 0.6;
const HARMONIC_WEIGHT: f32 = 0.3;
const HISTORY_WEIGHT: f32 = 0.1;

/// Frequency score reaches zero at this relative deviation (10%).
const FREQUENCY_PENALTY: f32 = 10.0;
/// Relative tolerance for matching an observed harmonic to an expected one.
const HARMONIC_TOLERANCE: f32 = 0.05;
/// The best candidate must score strictly above this to be accepted.
const MIN_SCORE: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct StringIdentifier {
    layout: TuningLayout,
    history: History<u32>,
}

impl StringIdentifier {
    pub fn new(layout: TuningLayout) -> Self {
        Self {
            layout,
            history: History::with_capacity(HISTORY_CAPACITY),
        }
    }

    pub fn layout(&self) -> &TuningLayout {
        &self.layout
    }

    /// Identifies the string most likely producing `frequency`.
    ///
    /// Every identification is recorded in the history, including a lone
    /// candidate returned without scoring.
    ///
    /// # Arguments
    /// * `frequency` - Fundamental estimate in Hz
    /// * `harmonics` - Observed harmonic peaks in Hz, may be empty
    ///
    /// # Returns
    /// * `Some(number)` - The chosen string's number
    /// * `None` - Outside 50..=400 Hz, in no string's range, or no candidate
    ///   scored above 0.5
    pub fn identify_string(&mut self, frequency: f32, harmonics: &[f32]) -> Option<u32> {
        if !(MIN_STRING_FREQUENCY..=MAX_STRING_FREQUENCY).contains(&frequency) {
            return None;
        }

        let candidates = self.layout.candidates(frequency);
        let chosen = match candidates.as_slice() {
            [] => return None,
            [only] => only.number,
            _ => {
                let mut best: Option<(u32, f32)> = None;
                for candidate in &candidates {
                    let score = self.score(frequency, candidate, harmonics);
                    trace!("[IDENTIFY] string {} scored {:.3}", candidate.number, score);
                    // Strict comparison: ties go to the first candidate scanned.
                    if best.is_none_or(|(_, best_score)| score > best_score) {
                        best = Some((candidate.number, score));
                    }
                }
                match best {
                    Some((number, score)) if score > MIN_SCORE => number,
                    _ => {
                        debug!("[IDENTIFY] no candidate confident enough at {:.2} Hz", frequency);
                        return None;
                    }
                }
            }
        };

        self.history.push(chosen);
        Some(chosen)
    }

    fn score(&self, frequency: f32, candidate: &StringSpec, harmonics: &[f32]) -> f32 {
        let deviation = (frequency - candidate.target_frequency).abs() / candidate.target_frequency;
        let frequency_score = (1.0 - deviation * FREQUENCY_PENALTY).max(0.0);
        let harmonic_score = harmonic_score(harmonics, &candidate.harmonics);
        let history_score = self.recent_count(candidate.number) as f32 / HISTORY_WINDOW as f32;

        frequency_score * FREQUENCY_WEIGHT
            + harmonic_score * HARMONIC_WEIGHT
            + history_score * HISTORY_WEIGHT
    }

    fn recent_count(&self, number: u32) -> usize {
        self.history
            .recent(HISTORY_WINDOW)
            .filter(|&&n| n == number)
            .count()
    }

    /// Replaces the layout. Previous identifications say nothing about the new
    /// layout, so the history is cleared.
    pub fn set_tuning_mode(&mut self, layout: TuningLayout) {
        debug!("[IDENTIFY] switching layout to '{}'", layout.name);
        self.layout = layout;
        self.history.clear();
    }

    /// Clears the history without touching the layout.
    pub fn reset(&mut self) {
        self.history.clear();
    }

    /// Share of the last five identifications that chose `number`, for
    /// display. 0 when nothing has been identified yet.
    pub fn confidence(&self, number: u32) -> f32 {
        let recent = self.history.recent(HISTORY_WINDOW).count();
        if recent == 0 {
            return 0.0;
        }
        self.recent_count(number) as f32 / recent as f32
    }
}

/// Fraction of `expected` harmonics that have an observed peak within ±5%.
/// Zero when nothing was observed.
fn harmonic_score(observed: &[f32], expected: &[f32]) -> f32 {
    if observed.is_empty() || expected.is_empty() {
        return 0.0;
    }
    let matches = expected
        .iter()
        .filter(|&&target| {
            let tolerance = target * HARMONIC_TOLERANCE;
            observed.iter().any(|&peak| (peak - target).abs() < tolerance)
        })
        .count();
    matches as f32 / expected.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlapping_layout() -> TuningLayout {
        TuningLayout {
            name: "Overlap".to_string(),
            strings: vec![
                StringSpec::new(2, "G2", 100.0, (90.0, 130.0), &[200.0, 300.0, 400.0]),
                StringSpec::new(1, "A2", 120.0, (95.0, 140.0), &[240.0, 360.0, 480.0]),
            ],
        }
    }

    #[test]
    fn single_candidate_is_returned_directly() {
        let mut identifier = StringIdentifier::new(TuningLayout::standard());
        assert_eq!(identifier.identify_string(82.41, &[]), Some(6));
        // Far from target but still inside the range: no scoring applies.
        assert_eq!(identifier.identify_string(71.0, &[]), Some(6));
        assert_eq!(identifier.identify_string(329.63, &[]), Some(1));
        // Unscored identifications still count toward confidence.
        assert!((identifier.confidence(6) - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn outside_every_range_or_band() {
        let mut identifier = StringIdentifier::new(TuningLayout::standard());
        assert_eq!(identifier.identify_string(65.0, &[]), None);
        assert_eq!(identifier.identify_string(380.0, &[]), None);
        assert_eq!(identifier.identify_string(440.0, &[]), None);
        assert_eq!(identifier.identify_string(45.0, &[]), None);
    }

    #[test]
    fn overlap_resolved_by_frequency_score() {
        let mut identifier = StringIdentifier::new(overlapping_layout());
        assert_eq!(identifier.identify_string(119.0, &[]), Some(1));
        assert_eq!(identifier.identify_string(101.0, &[]), Some(2));
    }

    #[test]
    fn overlap_without_confident_candidate() {
        let mut identifier = StringIdentifier::new(overlapping_layout());
        // Halfway between the targets neither reaches 0.5.
        assert_eq!(identifier.identify_string(110.0, &[]), None);
        assert_eq!(identifier.confidence(1), 0.0);
    }

    #[test]
    fn equal_scores_break_toward_first_candidate() {
        let layout = TuningLayout {
            name: "Twins".to_string(),
            strings: vec![
                StringSpec::new(3, "A2", 110.0, (100.0, 120.0), &[]),
                StringSpec::new(7, "A2", 110.0, (105.0, 125.0), &[]),
            ],
        };
        let mut identifier = StringIdentifier::new(layout);
        assert_eq!(identifier.identify_string(110.0, &[]), Some(3));
    }

    #[test]
    fn harmonics_tip_the_balance() {
        let layout = TuningLayout {
            name: "Close".to_string(),
            strings: vec![
                StringSpec::new(2, "G2", 100.0, (90.0, 115.0), &[200.0, 300.0, 400.0]),
                StringSpec::new(1, "A2", 110.0, (95.0, 125.0), &[220.0, 330.0, 440.0]),
            ],
        };
        let mut identifier = StringIdentifier::new(layout);
        assert_eq!(identifier.identify_string(105.0, &[]), None);
        assert_eq!(identifier.identify_string(105.0, &[201.0, 299.0, 405.0]), Some(2));
        assert_eq!(identifier.identify_string(105.0, &[219.0, 331.0]), Some(1));
    }

    #[test]
    fn recent_choices_add_hysteresis() {
        let layout = TuningLayout {
            name: "Neighbours".to_string(),
            strings: vec![
                StringSpec::new(2, "X", 100.0, (90.0, 120.0), &[]),
                StringSpec::new(1, "Y", 104.0, (90.0, 120.0), &[]),
            ],
        };

        let mut fresh = StringIdentifier::new(layout.clone());
        assert_eq!(fresh.identify_string(102.0, &[]), None);

        let mut identifier = StringIdentifier::new(layout);
        for _ in 0..5 {
            assert_eq!(identifier.identify_string(104.0, &[]), Some(1));
        }
        assert_eq!(identifier.confidence(1), 1.0);
        assert_eq!(identifier.identify_string(102.0, &[]), Some(1));
    }

    #[test]
    fn confidence_over_last_five() {
        let mut identifier = StringIdentifier::new(TuningLayout::standard());
        assert_eq!(identifier.confidence(6), 0.0);
        for _ in 0..3 {
            identifier.identify_string(110.0, &[]);
        }
        for _ in 0..2 {
            identifier.identify_string(82.41, &[]);
        }
        assert!((identifier.confidence(5) - 0.6).abs() < 1e-6);
        assert!((identifier.confidence(6) - 0.4).abs() < 1e-6);
        for _ in 0..5 {
            identifier.identify_string(82.41, &[]);
        }
        assert_eq!(identifier.confidence(5), 0.0);
        assert_eq!(identifier.confidence(6), 1.0);
    }

    #[test]
    fn layout_switch_clears_history() {
        let mut identifier = StringIdentifier::new(TuningLayout::standard());
        identifier.identify_string(110.0, &[]);
        assert_eq!(identifier.confidence(5), 1.0);

        let drop_d = TuningLayout::by_name("Drop D").unwrap();
        identifier.set_tuning_mode(drop_d);
        assert_eq!(identifier.confidence(5), 0.0);
        assert_eq!(identifier.layout().name, "Drop D");
        assert_eq!(identifier.identify_string(73.42, &[]), Some(6));
    }

    #[test]
    fn reset_keeps_layout() {
        let mut identifier = StringIdentifier::new(TuningLayout::standard());
        identifier.identify_string(196.0, &[]);
        identifier.reset();
        assert_eq!(identifier.confidence(3), 0.0);
        assert_eq!(identifier.layout().name, "Standard");
    }

    #[test]
    fn harmonic_score_fraction() {
        assert_eq!(harmonic_score(&[], &[200.0, 300.0]), 0.0);
        assert_eq!(harmonic_score(&[200.0], &[]), 0.0);
        assert!((harmonic_score(&[198.0], &[200.0, 300.0]) - 0.5).abs() < 1e-6);
        // Just past 5% of 200 Hz.
        assert_eq!(harmonic_score(&[211.0], &[200.0]), 0.0);
    }
}

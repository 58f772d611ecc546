//! # Tuning Layout Module
//!
//! Static descriptions of an instrument's strings: the pitch each string is
//! tuned to, the band of frequencies attributed to it during detection, and
//! the harmonics expected when it rings.
//!
//! ## Features
//! - Built-in guitar layouts (Standard, Drop D, Half Step Down)
//! - Case-insensitive lookup by name
//! - Structural validation for layouts loaded from settings files

use crate::error::{Result, TunerError};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

/// A single string of an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringSpec {
    /// Physical string position, unique within a layout (6 = low E on a guitar).
    pub number: u32,
    /// Display label (e.g., "E2", "Bb3")
    pub note: String,
    /// Target frequency in Hz
    pub target_frequency: f32,
    /// Inclusive `[min, max]` band in Hz attributed to this string.
    /// Bands of different strings may overlap.
    pub detection_range: (f32, f32),
    /// Expected harmonic frequencies in Hz, ascending.
    pub harmonics: Vec<f32>,
}

impl StringSpec {
    pub fn new(
        number: u32,
        note: &str,
        target_frequency: f32,
        detection_range: (f32, f32),
        harmonics: &[f32],
    ) -> Self {
        Self {
            number,
            note: note.to_string(),
            target_frequency,
            detection_range,
            harmonics: harmonics.to_vec(),
        }
    }

    /// Whether `frequency` lies inside the (inclusive) detection range.
    pub fn accepts(&self, frequency: f32) -> bool {
        let (min, max) = self.detection_range;
        frequency >= min && frequency <= max
    }
}

/// A named, ordered set of strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningLayout {
    pub name: String,
    pub strings: Vec<StringSpec>,
}

static PRESETS: Lazy<Vec<TuningLayout>> = Lazy::new(|| {
    vec![
        TuningLayout {
            name: "Standard".to_string(),
            strings: vec![
                StringSpec::new(6, "E2", 82.41, (70.0, 95.0), &[165.0, 247.0, 330.0]),
                StringSpec::new(5, "A2", 110.00, (95.0, 125.0), &[220.0, 330.0, 440.0]),
                StringSpec::new(4, "D3", 146.83, (125.0, 165.0), &[294.0, 440.0, 587.0]),
                StringSpec::new(3, "G3", 196.00, (165.0, 220.0), &[392.0, 588.0, 784.0]),
                StringSpec::new(2, "B3", 246.94, (220.0, 280.0), &[494.0, 741.0, 988.0]),
                StringSpec::new(1, "E4", 329.63, (280.0, 370.0), &[659.0, 989.0, 1319.0]),
            ],
        },
        TuningLayout {
            name: "Drop D".to_string(),
            strings: vec![
                StringSpec::new(6, "D2", 73.42, (60.0, 85.0), &[147.0, 220.0, 294.0]),
                StringSpec::new(5, "A2", 110.00, (95.0, 125.0), &[220.0, 330.0, 440.0]),
                StringSpec::new(4, "D3", 146.83, (125.0, 165.0), &[294.0, 440.0, 587.0]),
                StringSpec::new(3, "G3", 196.00, (165.0, 220.0), &[392.0, 588.0, 784.0]),
                StringSpec::new(2, "B3", 246.94, (220.0, 280.0), &[494.0, 741.0, 988.0]),
                StringSpec::new(1, "E4", 329.63, (280.0, 370.0), &[659.0, 989.0, 1319.0]),
            ],
        },
        TuningLayout {
            name: "Half Step Down".to_string(),
            strings: vec![
                StringSpec::new(6, "Eb2", 77.78, (65.0, 90.0), &[156.0, 233.0, 311.0]),
                StringSpec::new(5, "Ab2", 103.83, (90.0, 118.0), &[208.0, 312.0, 415.0]),
                StringSpec::new(4, "Db3", 138.59, (118.0, 156.0), &[277.0, 415.0, 554.0]),
                StringSpec::new(3, "Gb3", 185.00, (156.0, 208.0), &[370.0, 555.0, 740.0]),
                StringSpec::new(2, "Bb3", 233.08, (208.0, 264.0), &[466.0, 699.0, 932.0]),
                StringSpec::new(1, "Eb4", 311.13, (264.0, 350.0), &[622.0, 933.0, 1244.0]),
            ],
        },
    ]
});

impl TuningLayout {
    /// All built-in layouts, Standard first.
    pub fn presets() -> &'static [TuningLayout] {
        &PRESETS
    }

    /// Standard six-string guitar tuning (E2 A2 D3 G3 B3 E4).
    pub fn standard() -> TuningLayout {
        PRESETS[0].clone()
    }

    /// Looks up a built-in layout by name, ignoring case.
    pub fn by_name(name: &str) -> Option<TuningLayout> {
        PRESETS
            .iter()
            .find(|layout| layout.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    pub fn string(&self, number: u32) -> Option<&StringSpec> {
        self.strings.iter().find(|s| s.number == number)
    }

    /// Strings whose detection range contains `frequency`, in layout order.
    pub fn candidates(&self, frequency: f32) -> Vec<&StringSpec> {
        self.strings.iter().filter(|s| s.accepts(frequency)).collect()
    }

    /// Checks the structural rules a layout must satisfy.
    ///
    /// Overlapping detection ranges are allowed.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| TunerError::InvalidLayout {
            layout: self.name.clone(),
            reason,
        };

        if self.strings.is_empty() {
            return Err(invalid("layout has no strings".to_string()));
        }

        for (i, string) in self.strings.iter().enumerate() {
            if string.number == 0 {
                return Err(invalid("string numbers start at 1".to_string()));
            }
            if self.strings[..i].iter().any(|s| s.number == string.number) {
                return Err(invalid(format!("duplicate string number {}", string.number)));
            }
            if !(string.target_frequency > 0.0) {
                return Err(invalid(format!(
                    "string {} has non-positive target frequency",
                    string.number
                )));
            }
            let (min, max) = string.detection_range;
            if !(min <= max) {
                return Err(invalid(format!(
                    "string {} has detection range [{}, {}] with min > max",
                    string.number, min, max
                )));
            }
            if string.harmonics.windows(2).any(|pair| pair[0] > pair[1]) {
                return Err(invalid(format!(
                    "string {} harmonics are not ascending",
                    string.number
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        assert_eq!(TuningLayout::presets().len(), 3);
        for layout in TuningLayout::presets() {
            layout.validate().unwrap();
            assert_eq!(layout.strings.len(), 6);
        }
    }

    #[test]
    fn lookup_ignores_case() {
        let layout = TuningLayout::by_name("drop d").unwrap();
        assert_eq!(layout.name, "Drop D");
        assert_eq!(layout.string(6).unwrap().note, "D2");
        assert!(TuningLayout::by_name("Open G").is_none());
    }

    #[test]
    fn detection_range_is_inclusive() {
        let layout = TuningLayout::standard();
        let bounds: Vec<u32> = layout.candidates(95.0).iter().map(|s| s.number).collect();
        // 95 Hz is both the top of the low E band and the bottom of the A band.
        assert_eq!(bounds, vec![6, 5]);
        assert!(layout.candidates(69.9).is_empty());
        assert_eq!(layout.candidates(370.0)[0].number, 1);
    }

    #[test]
    fn rejects_duplicate_numbers() {
        let layout = TuningLayout {
            name: "Broken".to_string(),
            strings: vec![
                StringSpec::new(1, "A2", 110.0, (100.0, 120.0), &[]),
                StringSpec::new(1, "B2", 123.47, (115.0, 130.0), &[]),
            ],
        };
        let err = layout.validate().unwrap_err();
        assert!(matches!(err, TunerError::InvalidLayout { .. }));
    }

    #[test]
    fn rejects_string_number_zero() {
        let layout = TuningLayout {
            name: "Broken".to_string(),
            strings: vec![StringSpec::new(0, "A2", 110.0, (100.0, 120.0), &[])],
        };
        assert!(matches!(
            layout.validate(),
            Err(TunerError::InvalidLayout { .. })
        ));
    }

    #[test]
    fn rejects_inverted_range_and_unsorted_harmonics() {
        let mut layout = TuningLayout {
            name: "Broken".to_string(),
            strings: vec![StringSpec::new(1, "A2", 110.0, (120.0, 100.0), &[])],
        };
        assert!(layout.validate().is_err());

        layout.strings[0].detection_range = (100.0, 120.0);
        layout.strings[0].harmonics = vec![330.0, 220.0];
        assert!(layout.validate().is_err());

        layout.strings[0].harmonics = vec![220.0, 330.0];
        assert!(layout.validate().is_ok());
    }

    #[test]
    fn layout_from_json() {
        let json = r#"{
            "name": "Bass",
            "strings": [
                { "number": 4, "note": "E1", "target_frequency": 41.2,
                  "detection_range": [35.0, 48.0], "harmonics": [82.4, 123.6] }
            ]
        }"#;
        let layout: TuningLayout = serde_json::from_str(json).unwrap();
        assert_eq!(layout.string(4).unwrap().detection_range, (35.0, 48.0));
        layout.validate().unwrap();
    }
}

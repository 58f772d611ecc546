// string-tuner-core/src/lib.rs

//! The core logic for the string instrument tuner.
//! This crate is responsible for pitch detection, string identification
//! and tuning feedback. It is completely headless and contains no
//! presentation code.
//!
//! Per frame the pipeline is: raw buffer -> pitch detector -> noise gate ->
//! string identifier -> tuning engine -> [`TuningResult`].

pub mod audio;
pub mod config;
pub mod error;
pub mod fft;
pub mod history;
pub mod identifier;
pub mod layout;
pub mod pitch;
pub mod session;
pub mod tuning;
pub mod worker;

pub use config::TunerSettings;
pub use error::{Result, TunerError};
pub use identifier::StringIdentifier;
pub use layout::{StringSpec, TuningLayout};
pub use pitch::PitchAlgorithm;
pub use session::TunerSession;
pub use tuning::{Accuracy, PrecisionProfile};

use serde::Serialize;

/// Tuning feedback for a single analysis frame.
///
/// A snapshot: it is created once per frame and never updated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TuningResult {
    /// Number of the string being tuned.
    pub string: u32,
    /// The string's target frequency in Hz.
    pub target_frequency: f32,
    /// The smoothed frequency estimate in Hz.
    pub actual_frequency: f32,
    /// Deviation from the target in cents (positive = sharp).
    pub cents: f32,
    pub accuracy: Accuracy,
    /// Whether recent readings agree with each other.
    pub is_stable: bool,
}

//! # Error Module
//!
//! Errors raised by configuration and layout handling. The pitch pipeline
//! itself never fails: silence, unmatched pitches and out-of-range readings
//! are reported as `None` by the functions that produce them.

use thiserror::Error;

/// Result type alias for tuner operations.
pub type Result<T> = std::result::Result<T, TunerError>;

#[derive(Error, Debug)]
pub enum TunerError {
    #[error("Unknown tuning layout: {0}")]
    UnknownLayout(String),

    #[error("Invalid tuning layout '{layout}': {reason}")]
    InvalidLayout { layout: String, reason: String },

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("String {0} is not part of the active layout")]
    UnknownString(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Settings file error: {0}")]
    Json(#[from] serde_json::Error),
}

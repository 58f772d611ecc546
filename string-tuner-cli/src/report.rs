//! Output formatting for tuning results.

use serde_json::json;
use string_tuner_core::{TuningLayout, TuningResult};

/// Prints one line per result. In text mode a run of frames without a
/// result collapses into a single idle line.
pub struct Printer {
    json: bool,
    idle: bool,
}

impl Printer {
    pub fn new(json: bool) -> Self {
        Self { json, idle: false }
    }

    pub fn print(
        &mut self,
        time: f32,
        result: Option<&TuningResult>,
        confidence: f32,
        layout: &TuningLayout,
    ) {
        if self.json {
            println!("{}", json_line(time, result, confidence, layout));
            return;
        }
        match result {
            Some(result) => {
                self.idle = false;
                println!("{}", text_line(time, result, confidence, layout));
            }
            None if !self.idle => {
                self.idle = true;
                println!("{:>8.2}s  --", time);
            }
            None => {}
        }
    }
}

fn note_of(layout: &TuningLayout, string: u32) -> &str {
    layout.string(string).map_or("?", |s| s.note.as_str())
}

fn text_line(time: f32, result: &TuningResult, confidence: f32, layout: &TuningLayout) -> String {
    format!(
        "{:>8.2}s  string {} {:<4} target {:>7.2} Hz  actual {:>7.2} Hz  {:>+7.1} cents  {:<9} {:<6}  conf {:>3.0}%",
        time,
        result.string,
        note_of(layout, result.string),
        result.target_frequency,
        result.actual_frequency,
        result.cents,
        result.accuracy,
        if result.is_stable { "stable" } else { "" },
        confidence * 100.0
    )
}

fn json_line(
    time: f32,
    result: Option<&TuningResult>,
    confidence: f32,
    layout: &TuningLayout,
) -> serde_json::Value {
    json!({
        "time": time,
        "note": result.map(|r| note_of(layout, r.string)),
        "result": result,
        "confidence": confidence,
    })
}

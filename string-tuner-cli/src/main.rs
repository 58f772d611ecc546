//! # String Tuner - Command Line Front End
//!
//! Headless front end for the tuner core. It either listens to the default
//! input device or analyses a WAV recording, and prints one line of tuning
//! feedback per analysed frame.
//!
//! ## Architecture
//! - **Main Thread**: argument parsing, output
//! - **Audio Callback**: CPAL stream slicing input into fixed-size frames
//! - **Analysis Thread**: [`AnalysisWorker`] running the tuner session
//! - **Communication**: Crossbeam channels between all three

mod report;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use env_logger::Env;
use log::{info, warn};
use report::Printer;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use string_tuner_core::audio::AudioCapture;
use string_tuner_core::worker::AnalysisWorker;
use string_tuner_core::{PitchAlgorithm, PrecisionProfile, TunerSession, TunerSettings, TuningLayout};

/// How long the output loop waits for a report before checking the deadline.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Parser, Debug)]
#[command(name = "string-tuner", version, about = "Headless tuner for string instruments")]
struct Cli {
    /// Settings file (JSON). Defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Tuning layout name, e.g. "Standard" or "Drop D"
    #[arg(long, global = true)]
    layout: Option<String>,

    /// Pitch algorithm: autocorrelation or yin
    #[arg(long, global = true)]
    algorithm: Option<PitchAlgorithm>,

    /// Precision profile: perfect, excellent, good or ok
    #[arg(long, global = true)]
    precision: Option<PrecisionProfile>,

    /// Tune a specific string number instead of identifying it
    #[arg(long, global = true)]
    string: Option<u32>,

    /// Print one JSON object per line
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Listen to the default input device
    Listen {
        /// Stop after this many seconds (0 = until the stream ends)
        #[arg(long, default_value_t = 0)]
        seconds: u64,
    },
    /// Analyse a WAV recording frame by frame
    Analyze { path: PathBuf },
    /// List the built-in tuning layouts
    Layouts,
    /// Write a settings file with the current options
    InitConfig { path: PathBuf },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    info!("[MAIN] String Tuner v{}", env!("CARGO_PKG_VERSION"));

    match &cli.command {
        Command::Listen { seconds } => listen(&cli, *seconds),
        Command::Analyze { path } => analyze(&cli, path),
        Command::Layouts => {
            list_layouts();
            Ok(())
        }
        Command::InitConfig { path } => {
            let settings = settings_from(&cli)?;
            settings.save(path)?;
            println!("Wrote settings to {}", path.display());
            Ok(())
        }
    }
}

/// Settings from the config file (or defaults) with command line overrides applied.
fn settings_from(cli: &Cli) -> Result<TunerSettings> {
    let mut settings = match &cli.config {
        Some(path) => TunerSettings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => TunerSettings::default(),
    };
    if let Some(layout) = &cli.layout {
        settings.layout = layout.clone();
    }
    if let Some(algorithm) = cli.algorithm {
        settings.algorithm = algorithm;
    }
    if let Some(precision) = cli.precision {
        settings.precision = precision;
    }
    settings.validate()?;
    Ok(settings)
}

fn new_session(cli: &Cli, settings: TunerSettings) -> Result<TunerSession> {
    let mut session = TunerSession::new(settings)?;
    if cli.string.is_some() {
        session.select_string(cli.string)?;
    }
    Ok(session)
}

fn listen(cli: &Cli, seconds: u64) -> Result<()> {
    let settings = settings_from(cli)?;
    let mut capture = AudioCapture::start(settings.sample_rate, settings.buffer_size)?;
    let session = new_session(cli, settings)?;
    let layout = session.layout().clone();

    let (report_tx, report_rx) = crossbeam_channel::unbounded();
    let worker = AnalysisWorker::spawn(session, capture.frames(), capture.sample_rate(), report_tx);
    let frame_seconds = capture.buffer_size() as f32 / capture.sample_rate() as f32;
    info!(
        "[MAIN] Capture ready: {}, {} Hz, {:.2}s per frame",
        capture.is_ready(),
        capture.sample_rate(),
        frame_seconds
    );

    let deadline = (seconds > 0).then(|| Instant::now() + Duration::from_secs(seconds));
    let mut printer = Printer::new(cli.json);
    let mut frame_index: usize = 0;

    while deadline.is_none_or(|d| Instant::now() < d) {
        match report_rx.recv_timeout(POLL_INTERVAL) {
            Ok(report) => {
                let time = frame_index as f32 * frame_seconds;
                printer.print(time, report.result.as_ref(), report.confidence, &layout);
                frame_index += 1;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    capture.stop()?;
    if worker.shutdown().is_none() {
        warn!("[MAIN] Analysis thread panicked before shutdown");
    }
    info!("[MAIN] Listened to {} frames", frame_index);
    Ok(())
}

fn analyze(cli: &Cli, path: &Path) -> Result<()> {
    let settings = settings_from(cli)?;
    let buffer_size = settings.buffer_size;
    let (samples, sample_rate) = read_wav_mono(path)?;
    if samples.len() < buffer_size {
        return Err(anyhow!(
            "{} holds {} samples, fewer than one {}-sample frame",
            path.display(),
            samples.len(),
            buffer_size
        ));
    }

    let mut session = new_session(cli, settings)?;
    let layout = session.layout().clone();
    let mut printer = Printer::new(cli.json);
    let mut tuned_frames = 0;
    let mut frame_count = 0;

    for (index, frame) in samples.chunks_exact(buffer_size).enumerate() {
        let result = session.process_frame(frame, sample_rate);
        if result.is_some() {
            tuned_frames += 1;
        }
        let time = (index * buffer_size) as f32 / sample_rate as f32;
        printer.print(time, result.as_ref(), session.confidence(), &layout);
        frame_count += 1;
    }

    info!(
        "[MAIN] Analysed {} frames of {}, {} with tuning feedback",
        frame_count,
        path.display(),
        tuned_frames
    );
    Ok(())
}

/// Reads a WAV file and averages its channels into one.
fn read_wav_mono(path: &Path) -> Result<(Vec<f32>, u32)> {
    let mut reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let mono = samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect();

    info!(
        "[MAIN] {}: {} Hz, {} channel(s), {}-bit {:?}",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        spec.sample_format
    );
    Ok((mono, spec.sample_rate))
}

fn list_layouts() {
    for layout in TuningLayout::presets() {
        println!("{}", layout.name);
        for string in &layout.strings {
            let (min, max) = string.detection_range;
            println!(
                "  {}  {:<4} {:>7.2} Hz   detects {:>5.0}-{:<5.0} Hz",
                string.number, string.note, string.target_frequency, min, max
            );
        }
    }
}

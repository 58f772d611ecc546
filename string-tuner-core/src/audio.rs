//! # Audio Capture Module
//!
//! This module handles real-time audio capture using CPAL (Cross-Platform Audio Library).
//! It selects an input device, accumulates the callback data into fixed-size
//! analysis frames and streams them to the analysis thread over a channel.
//!
//! ## Features
//! - Default input device selection
//! - 32-bit float input at the sample rate closest to the requested one
//! - Multichannel input down-mixed to mono
//! - Frames dropped rather than queued when the consumer falls behind

use anyhow::{Result, anyhow};
use cpal::SupportedStreamConfigRange;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use log::{error, info, warn};

/// Frames buffered between the audio callback and the analysis thread.
const FRAME_QUEUE_DEPTH: usize = 4;

/// A running capture stream delivering `buffer_size`-sample frames.
pub struct AudioCapture {
    stream: cpal::Stream,
    frames: Receiver<Vec<f32>>,
    sample_rate: u32,
    buffer_size: usize,
    running: bool,
}

impl AudioCapture {
    /// Starts capture from the default input device.
    ///
    /// # Arguments
    /// * `target_rate` - Preferred sample rate in Hz, clamped to what the device supports
    /// * `buffer_size` - Samples per delivered frame
    ///
    /// # Returns
    /// * `Ok(capture)` - Stream is playing, frames arrive on [`AudioCapture::frames`]
    /// * `Err(e)` - No device, no f32 format, or the stream failed to start
    pub fn start(target_rate: u32, buffer_size: usize) -> Result<Self> {
        let (sender, frames) = crossbeam_channel::bounded(FRAME_QUEUE_DEPTH);
        let (stream, sample_rate) = start_audio_capture(sender, target_rate, buffer_size)?;
        Ok(Self {
            stream,
            frames,
            sample_rate,
            buffer_size,
            running: true,
        })
    }

    /// Receiver for captured frames. Cloning it lets another thread consume them.
    pub fn frames(&self) -> Receiver<Vec<f32>> {
        self.frames.clone()
    }

    /// The sample rate the device actually runs at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn is_ready(&self) -> bool {
        self.running
    }

    /// Pauses the stream. No further frames are delivered.
    pub fn stop(&mut self) -> Result<()> {
        if self.running {
            self.stream.pause()?;
            self.running = false;
            info!("[AUDIO] Capture stopped");
        }
        Ok(())
    }
}

/// Opens the default input device and streams fixed-size mono frames to `sender`.
///
/// Returns the stream handle (capture stops when it is dropped) and the
/// sample rate in use.
pub fn start_audio_capture(
    sender: Sender<Vec<f32>>,
    target_rate: u32,
    buffer_size: usize,
) -> Result<(cpal::Stream, u32)> {
    if buffer_size == 0 {
        return Err(anyhow!("Buffer size must be greater than 0"));
    }

    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    info!("[AUDIO] Using audio input device: {}", device.name()?);

    let configs = device.supported_input_configs()?.collect::<Vec<_>>();
    let supported_config = find_supported_config(configs, target_rate)
        .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

    let rate = target_rate.clamp(
        supported_config.min_sample_rate().0,
        supported_config.max_sample_rate().0,
    );
    let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
    let channels = config.channels().max(1) as usize;
    let sample_rate = config.sample_rate().0;
    let config: cpal::StreamConfig = config.into();

    info!(
        "[AUDIO] Selected sample rate: {} Hz, {} channel(s), {} samples per frame",
        sample_rate, channels, buffer_size
    );

    let err_fn = |err| error!("[AUDIO] An error occurred on the audio stream: {}", err);

    // Accumulates mono samples until a full frame is available.
    let mut audio_buffer: Vec<f32> = Vec::with_capacity(buffer_size * 2);
    let mut dropped_frames: u64 = 0;

    let stream = device.build_input_stream(
        &config,
        move |data: &[f32], _: &cpal::InputCallbackInfo| {
            if channels == 1 {
                audio_buffer.extend_from_slice(data);
            } else {
                audio_buffer.extend(
                    data.chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                );
            }

            while audio_buffer.len() >= buffer_size {
                let frame_to_send = audio_buffer[..buffer_size].to_vec();
                if sender.try_send(frame_to_send).is_err() {
                    dropped_frames += 1;
                    if dropped_frames.is_power_of_two() {
                        warn!("[AUDIO] Analysis is lagging, {} frames dropped", dropped_frames);
                    }
                }
                audio_buffer.drain(..buffer_size);
            }
        },
        err_fn,
        None,
    )?;

    stream.play()?;

    Ok((stream, sample_rate))
}

/// Picks the f32 input configuration best suited to `target_rate`.
///
/// Ranges that contain the target rate win over ranges that don't; among
/// those, mono is preferred, then the smallest distance to the target.
fn find_supported_config(
    configs: Vec<SupportedStreamConfigRange>,
    target_rate: u32,
) -> Option<SupportedStreamConfigRange> {
    configs
        .into_iter()
        .filter(|c| c.sample_format() == cpal::SampleFormat::F32)
        .min_by_key(|c| {
            let min = c.min_sample_rate().0;
            let max = c.max_sample_rate().0;
            let distance = if target_rate < min {
                min - target_rate
            } else {
                target_rate.saturating_sub(max)
            };
            (distance, c.channels() != 1, c.channels())
        })
}

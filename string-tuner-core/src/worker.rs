//! # Analysis Worker Module
//!
//! Runs a [`TunerSession`] on a dedicated thread. Frames arrive on one
//! channel, control commands on another; every frame produces a
//! [`FrameReport`] for the presentation side. The session is owned by the
//! worker thread alone and handed back on shutdown.

use crate::TuningResult;
use crate::layout::TuningLayout;
use crate::pitch;
use crate::session::TunerSession;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, info, warn};
use std::thread::{self, JoinHandle};

/// Control messages for a running worker.
#[derive(Debug, Clone)]
pub enum WorkerCommand {
    SetLayout(TuningLayout),
    SelectString(Option<u32>),
    Reset,
    Shutdown,
}

/// Outcome of one analysed frame.
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// RMS amplitude of the frame.
    pub amplitude: f32,
    pub result: Option<TuningResult>,
    /// Identifier confidence for the reported string (0 without a result).
    pub confidence: f32,
}

#[derive(Debug)]
pub struct AnalysisWorker {
    command_tx: Sender<WorkerCommand>,
    thread_handle: Option<JoinHandle<TunerSession>>,
}

impl AnalysisWorker {
    /// Starts the analysis thread.
    ///
    /// The loop ends on [`WorkerCommand::Shutdown`], when the frame channel
    /// closes, or when nobody listens for reports anymore.
    pub fn spawn(
        mut session: TunerSession,
        frames: Receiver<Vec<f32>>,
        sample_rate: u32,
        reports: Sender<FrameReport>,
    ) -> Self {
        let (command_tx, command_rx) = crossbeam_channel::unbounded::<WorkerCommand>();

        let thread_handle = thread::spawn(move || {
            info!("[ANALYSIS-THREAD] Entering analysis loop at {} Hz", sample_rate);
            loop {
                crossbeam_channel::select! {
                    recv(frames) -> msg => match msg {
                        Ok(frame) => {
                            let amplitude = pitch::rms_amplitude(&frame);
                            let result = session.process_frame(&frame, sample_rate);
                            let report = FrameReport {
                                amplitude,
                                result,
                                confidence: session.confidence(),
                            };
                            if reports.send(report).is_err() {
                                warn!("[ANALYSIS-THREAD] Report receiver dropped");
                                break;
                            }
                        }
                        Err(_) => {
                            info!("[ANALYSIS-THREAD] Frame channel closed");
                            break;
                        }
                    },
                    recv(command_rx) -> msg => match msg {
                        Ok(WorkerCommand::SetLayout(layout)) => session.set_layout(layout),
                        Ok(WorkerCommand::SelectString(number)) => {
                            if let Err(e) = session.select_string(number) {
                                warn!("[ANALYSIS-THREAD] {}", e);
                            }
                        }
                        Ok(WorkerCommand::Reset) => session.reset(),
                        Ok(WorkerCommand::Shutdown) | Err(_) => {
                            info!("[ANALYSIS-THREAD] Received shutdown signal");
                            break;
                        }
                    },
                }
            }
            debug!("[ANALYSIS-THREAD] Analysis thread finished");
            session
        });

        Self {
            command_tx,
            thread_handle: Some(thread_handle),
        }
    }

    /// Queues a command. Returns `false` if the worker has already stopped.
    pub fn send(&self, command: WorkerCommand) -> bool {
        self.command_tx.send(command).is_ok()
    }

    /// Stops the worker and returns its session, unless the thread panicked.
    pub fn shutdown(mut self) -> Option<TunerSession> {
        let _ = self.command_tx.send(WorkerCommand::Shutdown);
        self.thread_handle.take()?.join().ok()
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.thread_handle.take() {
            let _ = self.command_tx.send(WorkerCommand::Shutdown);
            let _ = handle.join();
        }
    }
}

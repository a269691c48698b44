//! Single-threaded capture loop: frames in from the source, events out
//! through the sink, user commands in over a channel.
//!
//! The loop owns the session, the detector, and the most recent frame. All
//! session mutation happens here; command senders only enqueue. After the
//! frame stream ends the loop keeps draining commands until any armed
//! countdown has resolved, so a capture scheduled near the end of a stream
//! still lands.

use crate::capture::{CaptureRefusal, CaptureSession, FrameUpdate, SessionPhase};
use crate::config::CaptureOptions;
use crate::sink::EventSink;
use crate::source::{FrameSource, LandmarkDetector, VideoFrame};
use crate::still;
use anyhow::Result;
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const DRAIN_IDLE: Duration = Duration::from_millis(50);

const EXPORT_FAILED_MESSAGE: &str = "failed to export the captured frame";

/// User command delivered to the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineCommand {
    /// Capture now, subject to re-validation of the latest pose.
    Capture,
    /// Discard the captured image and re-arm.
    Retake,
    /// Stop the loop and tear down.
    Shutdown,
}

/// The capture loop and everything it owns.
pub struct CapturePipeline<D: LandmarkDetector, K: EventSink> {
    options: CaptureOptions,
    session: CaptureSession,
    detector: D,
    sink: K,
    last_frame: Option<VideoFrame>,
    shutdown: bool,
}

impl<D: LandmarkDetector, K: EventSink> CapturePipeline<D, K> {
    #[must_use]
    pub fn new(options: CaptureOptions, detector: D, sink: K) -> Self {
        let session = CaptureSession::new(options.gesture, options.auto_capture_delay);
        Self {
            options,
            session,
            detector,
            sink,
            last_frame: None,
            shutdown: false,
        }
    }

    #[must_use]
    pub fn session(&self) -> &CaptureSession {
        &self.session
    }

    /// Hand the sink back after the loop finishes.
    #[must_use]
    pub fn into_sink(self) -> K {
        self.sink
    }

    /// Run to completion: until the source runs dry, a shutdown command
    /// arrives, or acquisition fails to start.
    ///
    /// # Errors
    ///
    /// Acquisition-start failure is reported through the sink and the
    /// session, not as an `Err`; errors here are reserved for sink-level
    /// failures a future sink may surface.
    pub fn run<S: FrameSource>(
        &mut self,
        source: &mut S,
        commands: &Receiver<PipelineCommand>,
    ) -> Result<()> {
        if let Err(err) = source.start(&self.options) {
            warn!("frame source failed to start: {err:#}");
            let message = self.session.camera_failed(&format!("{err:#}"));
            self.sink.on_invalid(message);
            return Ok(());
        }
        self.session.camera_ready();
        let status = self.session.status().to_string();
        self.sink.on_status(&status);

        while !self.shutdown {
            self.drain_queued(commands);
            if self.shutdown {
                break;
            }
            if self.session.poll_countdown(Instant::now()) {
                self.finish_capture();
            }
            match source.next_frame() {
                Ok(Some(frame)) => self.handle_frame(frame),
                Ok(None) => break,
                Err(err) => {
                    warn!("frame source error, ending stream: {err:#}");
                    break;
                }
            }
        }

        if !self.shutdown {
            self.settle(commands);
        }
        self.teardown(source);
        Ok(())
    }

    fn handle_frame(&mut self, frame: VideoFrame) {
        let landmarks = match self.detector.detect(&frame) {
            Ok(landmarks) => landmarks,
            Err(err) => {
                debug!("landmark detection failed, frame skipped: {err:#}");
                return;
            }
        };
        self.last_frame = Some(frame);
        let update = self.session.observe(landmarks.as_ref(), Instant::now());
        if update != FrameUpdate::Unchanged {
            let status = self.session.status().to_string();
            self.sink.on_status(&status);
        }
    }

    fn handle_command(&mut self, command: PipelineCommand) {
        match command {
            PipelineCommand::Shutdown => {
                self.shutdown = true;
            }
            PipelineCommand::Capture => match self.session.request_capture() {
                Ok(()) => self.finish_capture(),
                Err(CaptureRefusal::InvalidPose(reason)) => {
                    self.sink.on_invalid(reason.message());
                }
                Err(CaptureRefusal::AlreadyCaptured) => {
                    debug!("capture command after capture, ignored");
                }
                Err(CaptureRefusal::NotReady) => {
                    debug!("capture command while not armed, ignored");
                }
            },
            PipelineCommand::Retake => {
                if self.session.phase() == SessionPhase::Failed {
                    debug!("retake ignored, session failed");
                    return;
                }
                self.session.retake();
                self.sink.on_retake();
                let status = self.session.status().to_string();
                self.sink.on_status(&status);
            }
        }
    }

    /// Export the most recent frame. The session has already taken the
    /// single-capture guard by the time this runs.
    fn finish_capture(&mut self) {
        let Some(frame) = self.last_frame.clone() else {
            self.session.capture_failed("no frame delivered yet");
            self.sink.on_invalid(EXPORT_FAILED_MESSAGE);
            return;
        };
        match still::encode_frame(&frame) {
            Ok(image) => {
                self.sink.on_valid(&image);
                let status = self.session.status().to_string();
                self.sink.on_status(&status);
            }
            Err(err) => {
                warn!("still-image export failed: {err:#}");
                self.session.capture_failed(&format!("{err:#}"));
                self.sink.on_invalid(EXPORT_FAILED_MESSAGE);
            }
        }
    }

    fn drain_queued(&mut self, commands: &Receiver<PipelineCommand>) {
        loop {
            match commands.try_recv() {
                Ok(command) => self.handle_command(command),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Post-stream phase: wait out an armed countdown and any late commands.
    fn settle(&mut self, commands: &Receiver<PipelineCommand>) {
        while !self.shutdown {
            let wait = match self.session.countdown_deadline() {
                Some(deadline) => deadline.saturating_duration_since(Instant::now()),
                None => DRAIN_IDLE,
            };
            match commands.recv_timeout(wait) {
                Ok(command) => self.handle_command(command),
                Err(RecvTimeoutError::Timeout) => {
                    if self.session.poll_countdown(Instant::now()) {
                        self.finish_capture();
                        continue;
                    }
                    if self.session.countdown_deadline().is_none() {
                        break;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => {
                    if let Some(deadline) = self.session.countdown_deadline() {
                        let remaining = deadline.saturating_duration_since(Instant::now());
                        if !remaining.is_zero() {
                            std::thread::sleep(remaining);
                        }
                        if self.session.poll_countdown(Instant::now()) {
                            self.finish_capture();
                        }
                    }
                    break;
                }
            }
        }
    }

    /// Ordered teardown; each step is guarded so one failure cannot block
    /// the next.
    fn teardown<S: FrameSource>(&mut self, source: &mut S) {
        self.session.cancel_countdown();
        if let Err(err) = source.stop() {
            warn!("frame source stop failed: {err:#}");
        }
        if let Err(err) = self.detector.release() {
            warn!("detector release failed: {err:#}");
        }
    }
}

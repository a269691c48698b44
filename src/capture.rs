//! Capture session state machine that gates still-image export behind a held pose.
//!
//! The session is the policy layer between per-frame pose verdicts and the
//! single still image a session may produce. It tracks the settle countdown
//! while a valid pose is held and owns the one-shot `has_captured` guard that
//! keeps a racing auto-fire and manual command from both capturing.
//!
//! All mutation happens on the pipeline's loop thread; callers pass `now`
//! explicitly so countdown behavior stays deterministic under test.

use crate::landmark::LandmarkFrame;
use crate::pose::{classify, GestureKind, PoseCheck, RejectReason};
use std::time::{Duration, Instant};

/// Settle time a valid pose must be held before auto-capture fires.
pub const DEFAULT_AUTO_CAPTURE_DELAY: Duration = Duration::from_millis(1500);

/// Fixed message surfaced when the camera or detector cannot be started.
pub const CAMERA_ERROR_MESSAGE: &str = "camera permission denied or unavailable";

const CAPTURED_MESSAGE: &str = "pose valid, photo captured";

/// Lifecycle of one capture attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Camera not yet running.
    Idle,
    /// Watching frames, nothing captured yet.
    Armed,
    /// Valid pose observed, settle countdown running.
    CountingDown,
    /// Still image produced; only retake leaves this phase.
    Captured,
    /// Acquisition failed; terminal for the session.
    Failed,
}

/// What changed after feeding one observation to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameUpdate {
    /// Nothing user-visible changed.
    Unchanged,
    /// The status line changed.
    Status,
    /// A valid pose armed the settle countdown.
    CountdownStarted,
    /// An invalid pose disarmed a running countdown.
    CountdownCancelled,
}

/// Why a manual capture command was not honored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureRefusal {
    /// Session is Idle or Failed; there is nothing to capture from.
    NotReady,
    /// The session already produced its one image. Silently resolved upstream.
    AlreadyCaptured,
    /// The latest classification is invalid; carries the current reason.
    InvalidPose(RejectReason),
}

/// Mutable state of one capture attempt.
pub struct CaptureSession {
    gesture: GestureKind,
    auto_delay: Duration,
    phase: SessionPhase,
    has_captured: bool,
    countdown_deadline: Option<Instant>,
    last_check: PoseCheck,
    status: String,
    last_error: Option<String>,
}

impl CaptureSession {
    #[must_use]
    pub fn new(gesture: GestureKind, auto_delay: Duration) -> Self {
        Self {
            gesture,
            auto_delay,
            phase: SessionPhase::Idle,
            has_captured: false,
            countdown_deadline: None,
            last_check: PoseCheck::Invalid(RejectReason::HandNotDetected),
            status: gesture.prompt().to_string(),
            last_error: None,
        }
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    #[must_use]
    pub fn gesture(&self) -> GestureKind {
        self.gesture
    }

    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    #[must_use]
    pub fn has_captured(&self) -> bool {
        self.has_captured
    }

    /// Deadline the pipeline should poll against, if a countdown is armed.
    #[must_use]
    pub fn countdown_deadline(&self) -> Option<Instant> {
        self.countdown_deadline
    }

    /// Frame source is up: Idle becomes Armed and the gesture prompt shows.
    pub fn camera_ready(&mut self) {
        if self.phase == SessionPhase::Idle {
            self.phase = SessionPhase::Armed;
            self.status = self.gesture.prompt().to_string();
        }
    }

    /// Terminal acquisition failure. Returns the fixed user-facing message;
    /// the underlying detail is kept in `last_error`. No automatic retry.
    pub fn camera_failed(&mut self, detail: &str) -> &'static str {
        self.phase = SessionPhase::Failed;
        self.countdown_deadline = None;
        self.last_error = Some(detail.to_string());
        self.status = CAMERA_ERROR_MESSAGE.to_string();
        CAMERA_ERROR_MESSAGE
    }

    /// Feed the latest observation. Arms the countdown on a valid pose,
    /// disarms it on an invalid one, and keeps the status line current.
    pub fn observe(&mut self, observation: Option<&LandmarkFrame>, now: Instant) -> FrameUpdate {
        let check = classify(self.gesture, observation);
        self.last_check = check;

        if !matches!(self.phase, SessionPhase::Armed | SessionPhase::CountingDown) {
            return FrameUpdate::Unchanged;
        }

        match check {
            PoseCheck::Valid => {
                if self.has_captured || self.countdown_deadline.is_some() {
                    return FrameUpdate::Unchanged;
                }
                self.countdown_deadline = Some(now + self.auto_delay);
                self.phase = SessionPhase::CountingDown;
                self.status = format!(
                    "hold the pose, capturing in {} ms",
                    self.auto_delay.as_millis()
                );
                FrameUpdate::CountdownStarted
            }
            PoseCheck::Invalid(reason) => {
                let cancelled = self.countdown_deadline.take().is_some();
                if cancelled {
                    self.phase = SessionPhase::Armed;
                }
                let message = reason.message();
                let status_changed = self.status != message;
                if status_changed {
                    self.status = message.to_string();
                }
                if cancelled {
                    FrameUpdate::CountdownCancelled
                } else if status_changed {
                    FrameUpdate::Status
                } else {
                    FrameUpdate::Unchanged
                }
            }
        }
    }

    /// One-shot countdown check. Returns true exactly when the auto-capture
    /// should fire; the single-capture guard flips in the same step, so a
    /// stale deadline can never authorize a second image.
    pub fn poll_countdown(&mut self, now: Instant) -> bool {
        let Some(deadline) = self.countdown_deadline else {
            return false;
        };
        if now < deadline {
            return false;
        }
        self.countdown_deadline = None;
        self.try_begin_capture()
    }

    /// Explicit user capture. Re-validates against the latest classification
    /// at call time, not the one that armed the countdown.
    pub fn request_capture(&mut self) -> Result<(), CaptureRefusal> {
        match self.phase {
            SessionPhase::Idle | SessionPhase::Failed => Err(CaptureRefusal::NotReady),
            SessionPhase::Captured => Err(CaptureRefusal::AlreadyCaptured),
            SessionPhase::Armed | SessionPhase::CountingDown => match self.last_check {
                PoseCheck::Invalid(reason) => {
                    self.status = reason.message().to_string();
                    Err(CaptureRefusal::InvalidPose(reason))
                }
                PoseCheck::Valid => {
                    if self.try_begin_capture() {
                        Ok(())
                    } else {
                        Err(CaptureRefusal::AlreadyCaptured)
                    }
                }
            },
        }
    }

    /// Discard the captured image and re-arm for another attempt.
    pub fn retake(&mut self) {
        self.has_captured = false;
        self.last_error = None;
        self.countdown_deadline = None;
        if matches!(
            self.phase,
            SessionPhase::Armed | SessionPhase::CountingDown | SessionPhase::Captured
        ) {
            self.phase = SessionPhase::Armed;
        }
        self.status = self.gesture.prompt().to_string();
    }

    /// Disarm any pending countdown without other state changes. Teardown path.
    pub fn cancel_countdown(&mut self) {
        self.countdown_deadline = None;
        if self.phase == SessionPhase::CountingDown {
            self.phase = SessionPhase::Armed;
        }
    }

    /// Still-image export failed after the guard was taken. The session keeps
    /// its captured flag (the attempt is spent) and records the failure.
    pub fn capture_failed(&mut self, detail: &str) {
        self.last_error = Some(detail.to_string());
        self.status = "failed to export the captured frame".to_string();
    }

    /// Check-and-set guard shared by the auto and manual capture paths.
    /// First caller to flip the flag wins; the loser no-ops.
    fn try_begin_capture(&mut self) -> bool {
        if self.has_captured {
            return false;
        }
        self.has_captured = true;
        self.countdown_deadline = None;
        self.phase = SessionPhase::Captured;
        self.status = CAPTURED_MESSAGE.to_string();
        true
    }
}

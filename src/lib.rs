//! Gesture-gated still capture: validate a hand pose per frame, hold it
//! through a settle countdown, export exactly one JPEG per session.

pub mod capture;
pub mod config;
pub mod landmark;
pub mod pipeline;
pub mod pose;
pub mod replay;
pub mod sink;
pub mod source;
pub mod still;
mod telemetry;

pub use capture::{
    CaptureRefusal, CaptureSession, FrameUpdate, SessionPhase, CAMERA_ERROR_MESSAGE,
    DEFAULT_AUTO_CAPTURE_DELAY,
};
pub use config::{AppConfig, CaptureOptions, UserConfig};
pub use pipeline::{CapturePipeline, PipelineCommand};
pub use pose::{classify, GestureKind, PoseCheck, RejectReason};
pub use telemetry::init_tracing;

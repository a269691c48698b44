//! Acquisition contract between the capture pipeline and its collaborators.
//!
//! The crate does not ship a live camera or ML model; it specifies the seams.
//! A `FrameSource` owns the camera device for one session and yields frames
//! best-effort (frames may be skipped under load, there is no backpressure).
//! A `LandmarkDetector` is invoked at most once per delivered frame.

use crate::config::CaptureOptions;
use crate::landmark::LandmarkFrame;
use anyhow::Result;

/// One RGB8 video frame. `rgb` holds `width * height * 3` bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
}

impl VideoFrame {
    /// A solid-color frame, used by scripted sources and tests.
    #[must_use]
    pub fn solid(width: u32, height: u32, shade: u8) -> Self {
        Self {
            width,
            height,
            rgb: vec![shade; (width as usize) * (height as usize) * 3],
        }
    }
}

/// Continuous camera frame source, exclusively owned by one session.
pub trait FrameSource {
    /// Acquire the device. Failure here is fatal for the session.
    fn start(&mut self, options: &CaptureOptions) -> Result<()>;

    /// Next frame, or `None` when the stream has ended. May block briefly to
    /// pace delivery; must not block indefinitely once started.
    fn next_frame(&mut self) -> Result<Option<VideoFrame>>;

    /// Stop the device. Called exactly once during teardown, after the
    /// session's countdown is cancelled and before the detector is released.
    fn stop(&mut self) -> Result<()>;
}

/// Per-frame hand landmark detector, exclusively owned by one session.
pub trait LandmarkDetector {
    /// Detect a hand in the frame. `Ok(None)` means no hand; an error means
    /// this frame is skipped, not that the session ends.
    fn detect(&mut self, frame: &VideoFrame) -> Result<Option<LandmarkFrame>>;

    /// Release model resources. Called exactly once during teardown.
    fn release(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solid_frame_allocates_three_bytes_per_pixel() {
        let frame = VideoFrame::solid(4, 3, 0x80);
        assert_eq!(frame.rgb.len(), 36);
        assert!(frame.rgb.iter().all(|&b| b == 0x80));
    }
}

//! Hand landmark frame types shared by the pose classifier and capture pipeline.
//!
//! Coordinates follow the detector's image convention: x and y are normalized
//! to [0,1] and smaller y means higher in the frame. A complete frame carries
//! the standard 21-point hand topology; incomplete frames from a misbehaving
//! detector are representable and must be survivable downstream.

use serde::{Deserialize, Serialize};

/// Landmark indices per the standard 21-point hand topology.
pub mod index {
    pub const WRIST: usize = 0;
    pub const THUMB_TIP: usize = 4;
    pub const INDEX_MCP: usize = 5;
    pub const INDEX_PIP: usize = 6;
    pub const INDEX_TIP: usize = 8;
    pub const MIDDLE_MCP: usize = 9;
    pub const MIDDLE_PIP: usize = 10;
    pub const MIDDLE_TIP: usize = 12;
    pub const RING_MCP: usize = 13;
    pub const RING_PIP: usize = 14;
    pub const RING_TIP: usize = 16;
    pub const PINKY_MCP: usize = 17;
    pub const PINKY_PIP: usize = 18;
    pub const PINKY_TIP: usize = 20;
}

/// Number of points in a complete hand detection.
pub const LANDMARK_COUNT: usize = 21;

/// A single normalized 2D point on a detected hand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
}

impl Landmark {
    #[must_use]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One detection result: landmark points plus the detector's confidence.
///
/// Absence of a hand is modeled as `Option<LandmarkFrame>` being `None` at
/// the call sites; a present frame always came from a detected hand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LandmarkFrame {
    pub points: Vec<Landmark>,
    pub confidence: f32,
}

impl LandmarkFrame {
    #[must_use]
    pub fn new(points: Vec<Landmark>, confidence: f32) -> Self {
        Self { points, confidence }
    }

    /// Look up a landmark by topology index. `None` for truncated frames.
    #[must_use]
    pub fn point(&self, idx: usize) -> Option<Landmark> {
        self.points.get(idx).copied()
    }

    /// Whether the frame carries the full 21-point topology.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.points.len() >= LANDMARK_COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn point_lookup_returns_none_past_truncated_frame() {
        let frame = LandmarkFrame::new(vec![Landmark::new(0.5, 0.5); 4], 0.9);
        assert!(frame.point(3).is_some());
        assert!(frame.point(4).is_none());
        assert!(frame.point(index::PINKY_TIP).is_none());
        assert!(!frame.is_complete());
    }

    #[test]
    fn complete_frame_resolves_every_topology_index() {
        let frame = LandmarkFrame::new(vec![Landmark::default(); LANDMARK_COUNT], 1.0);
        assert!(frame.is_complete());
        for idx in 0..LANDMARK_COUNT {
            assert!(frame.point(idx).is_some());
        }
    }

    #[test]
    fn frame_round_trips_through_serde() {
        let frame = LandmarkFrame::new(vec![Landmark::new(0.25, 0.75); 2], 0.8);
        let json = serde_json::to_string(&frame).expect("serialize frame");
        let back: LandmarkFrame = serde_json::from_str(&json).expect("deserialize frame");
        assert_eq!(back, frame);
    }
}

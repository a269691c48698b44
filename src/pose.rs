//! Rule-based hand-pose validation over a single landmark frame.
//!
//! Classification is pure and per-frame: only the most recent detection
//! matters, and the same inputs always produce the same verdict. Rejections
//! carry the most specific actionable reason so the status line can tell the
//! user what to fix. Predicate order within a gesture is fixed: extension
//! checks first, then folding checks, then spread/geometry gates.

use crate::landmark::{index, LandmarkFrame};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detections below this confidence are rejected outright.
pub const MIN_CONFIDENCE: f32 = 0.7;

const THUMB_WRIST_MIN_DX: f32 = 0.07;
const OPEN_PALM_MIN_SPREAD: f32 = 0.03;
const V_SIGN_MIN_TIP_GAP: f32 = 0.04;
const THREE_FINGER_MIN_SPREAD: f32 = 0.025;
const ONE_FINGER_MIN_RISE: f32 = 0.1;

/// Which rule set gates the capture. Fixed for the lifetime of a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    #[default]
    OpenPalm,
    VSign,
    ThreeFingers,
    OneFinger,
    NoPoseRequired,
}

impl GestureKind {
    /// Descriptive prompt shown while the session waits for the pose.
    #[must_use]
    pub fn prompt(self) -> &'static str {
        match self {
            GestureKind::OpenPalm => "show an open palm with all fingers spread",
            GestureKind::VSign => "make a V sign: raise index and middle finger, fold the rest",
            GestureKind::ThreeFingers => "raise index, middle, and ring finger, fold the pinky",
            GestureKind::OneFinger => "raise only the index finger, fold the rest",
            GestureKind::NoPoseRequired => "no specific pose required",
        }
    }
}

/// Why a frame failed validation. Each variant maps to one fixed status message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    HandNotDetected,
    LowConfidence,
    FingersNotSpread,
    RaiseIndexAndMiddle,
    FoldRingAndPinky,
    IndexMiddleTooClose,
    RaiseIndexMiddleRing,
    FoldPinky,
    SpreadFingersWider,
    RaiseIndexFinger,
    FoldMiddleRingPinky,
    StraightenIndexFinger,
    ValidationFailed,
}

impl RejectReason {
    /// User-facing corrective instruction for the status line.
    #[must_use]
    pub fn message(self) -> &'static str {
        match self {
            RejectReason::HandNotDetected => "hand not detected",
            RejectReason::LowConfidence => "confidence too low",
            RejectReason::FingersNotSpread => "fingers not spread open",
            RejectReason::RaiseIndexAndMiddle => "raise index and middle finger",
            RejectReason::FoldRingAndPinky => "fold ring and pinky",
            RejectReason::IndexMiddleTooClose => "index and middle finger too close together",
            RejectReason::RaiseIndexMiddleRing => "raise index, middle, and ring finger",
            RejectReason::FoldPinky => "fold the pinky",
            RejectReason::SpreadFingersWider => "fingers too close together, spread wider",
            RejectReason::RaiseIndexFinger => "raise the index finger",
            RejectReason::FoldMiddleRingPinky => "fold middle, ring, and pinky",
            RejectReason::StraightenIndexFinger => "straighten index finger",
            RejectReason::ValidationFailed => "failed to validate pose",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Verdict for one frame against one gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseCheck {
    Valid,
    Invalid(RejectReason),
}

impl PoseCheck {
    #[must_use]
    pub fn is_valid(self) -> bool {
        matches!(self, PoseCheck::Valid)
    }

    #[must_use]
    pub fn reject_reason(self) -> Option<RejectReason> {
        match self {
            PoseCheck::Valid => None,
            PoseCheck::Invalid(reason) => Some(reason),
        }
    }
}

/// Validate one observation against the session gesture.
///
/// Never panics: a truncated frame maps to
/// [`RejectReason::ValidationFailed`] rather than an error.
#[must_use]
pub fn classify(gesture: GestureKind, observation: Option<&LandmarkFrame>) -> PoseCheck {
    if gesture == GestureKind::NoPoseRequired {
        return PoseCheck::Valid;
    }
    let Some(frame) = observation else {
        return PoseCheck::Invalid(RejectReason::HandNotDetected);
    };
    if frame.confidence < MIN_CONFIDENCE || frame.confidence.is_nan() {
        return PoseCheck::Invalid(RejectReason::LowConfidence);
    }
    let checked = match gesture {
        GestureKind::OpenPalm => check_open_palm(frame),
        GestureKind::VSign => check_v_sign(frame),
        GestureKind::ThreeFingers => check_three_fingers(frame),
        GestureKind::OneFinger => check_one_finger(frame),
        GestureKind::NoPoseRequired => Some(PoseCheck::Valid),
    };
    checked.unwrap_or(PoseCheck::Invalid(RejectReason::ValidationFailed))
}

/// Population standard deviation of fingertip x positions.
fn spread(xs: &[f32]) -> f32 {
    let mean = xs.iter().sum::<f32>() / xs.len() as f32;
    let variance = xs.iter().map(|x| (x - mean) * (x - mean)).sum::<f32>() / xs.len() as f32;
    variance.sqrt()
}

fn check_open_palm(frame: &LandmarkFrame) -> Option<PoseCheck> {
    let pairs = [
        (index::INDEX_TIP, index::INDEX_PIP),
        (index::MIDDLE_TIP, index::MIDDLE_PIP),
        (index::RING_TIP, index::RING_PIP),
        (index::PINKY_TIP, index::PINKY_PIP),
    ];
    let mut all_extended = true;
    for (tip, pip) in pairs {
        all_extended &= frame.point(tip)?.y < frame.point(pip)?.y;
    }

    let wrist_x = frame.point(index::WRIST)?.x;
    let thumb_open = (frame.point(index::THUMB_TIP)?.x - wrist_x).abs() >= THUMB_WRIST_MIN_DX;
    let tips_x = [
        frame.point(index::INDEX_TIP)?.x,
        frame.point(index::MIDDLE_TIP)?.x,
        frame.point(index::RING_TIP)?.x,
        frame.point(index::PINKY_TIP)?.x,
    ];
    let spread_ok = spread(&tips_x) >= OPEN_PALM_MIN_SPREAD;

    Some(if all_extended && (thumb_open || spread_ok) {
        PoseCheck::Valid
    } else {
        PoseCheck::Invalid(RejectReason::FingersNotSpread)
    })
}

fn check_v_sign(frame: &LandmarkFrame) -> Option<PoseCheck> {
    let index_tip = frame.point(index::INDEX_TIP)?;
    let middle_tip = frame.point(index::MIDDLE_TIP)?;
    let index_extended = index_tip.y < frame.point(index::INDEX_PIP)?.y;
    let middle_extended = middle_tip.y < frame.point(index::MIDDLE_PIP)?.y;
    if !(index_extended && middle_extended) {
        return Some(PoseCheck::Invalid(RejectReason::RaiseIndexAndMiddle));
    }

    let ring_folded = frame.point(index::RING_TIP)?.y > frame.point(index::RING_MCP)?.y;
    let pinky_folded = frame.point(index::PINKY_TIP)?.y > frame.point(index::PINKY_MCP)?.y;
    if !(ring_folded && pinky_folded) {
        return Some(PoseCheck::Invalid(RejectReason::FoldRingAndPinky));
    }

    Some(if (index_tip.x - middle_tip.x).abs() >= V_SIGN_MIN_TIP_GAP {
        PoseCheck::Valid
    } else {
        PoseCheck::Invalid(RejectReason::IndexMiddleTooClose)
    })
}

fn check_three_fingers(frame: &LandmarkFrame) -> Option<PoseCheck> {
    let index_extended = frame.point(index::INDEX_TIP)?.y < frame.point(index::INDEX_PIP)?.y;
    let middle_extended = frame.point(index::MIDDLE_TIP)?.y < frame.point(index::MIDDLE_PIP)?.y;
    let ring_extended = frame.point(index::RING_TIP)?.y < frame.point(index::RING_PIP)?.y;
    if !(index_extended && middle_extended && ring_extended) {
        return Some(PoseCheck::Invalid(RejectReason::RaiseIndexMiddleRing));
    }

    let pinky_folded = frame.point(index::PINKY_TIP)?.y > frame.point(index::PINKY_MCP)?.y;
    if !pinky_folded {
        return Some(PoseCheck::Invalid(RejectReason::FoldPinky));
    }

    let tips_x = [
        frame.point(index::INDEX_TIP)?.x,
        frame.point(index::MIDDLE_TIP)?.x,
        frame.point(index::RING_TIP)?.x,
    ];
    Some(if spread(&tips_x) >= THREE_FINGER_MIN_SPREAD {
        PoseCheck::Valid
    } else {
        PoseCheck::Invalid(RejectReason::SpreadFingersWider)
    })
}

fn check_one_finger(frame: &LandmarkFrame) -> Option<PoseCheck> {
    let index_tip = frame.point(index::INDEX_TIP)?;
    let index_extended = index_tip.y < frame.point(index::INDEX_PIP)?.y;
    if !index_extended {
        return Some(PoseCheck::Invalid(RejectReason::RaiseIndexFinger));
    }

    let middle_folded = frame.point(index::MIDDLE_TIP)?.y > frame.point(index::MIDDLE_MCP)?.y;
    let ring_folded = frame.point(index::RING_TIP)?.y > frame.point(index::RING_MCP)?.y;
    let pinky_folded = frame.point(index::PINKY_TIP)?.y > frame.point(index::PINKY_MCP)?.y;
    if !(middle_folded && ring_folded && pinky_folded) {
        return Some(PoseCheck::Invalid(RejectReason::FoldMiddleRingPinky));
    }

    // Straightness gate: the tip must rise well above the knuckle.
    let index_mcp = frame.point(index::INDEX_MCP)?;
    Some(if index_mcp.y - index_tip.y > ONE_FINGER_MIN_RISE {
        PoseCheck::Valid
    } else {
        PoseCheck::Invalid(RejectReason::StraightenIndexFinger)
    })
}

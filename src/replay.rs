//! Scripted acquisition: a JSONL script stands in for the camera and the
//! landmark model so the pipeline can run without hardware.
//!
//! Each script line is one step. `frame` and `no_hand` steps pace delivery
//! with `hold_ms`; `capture` and `retake` steps carry absolute `at_ms`
//! offsets and are replayed by a command sender thread. The scripted source
//! and detector share a handoff queue so the detector answers for exactly
//! the frames the source delivered, in order.

use crate::config::CaptureOptions;
use crate::landmark::{Landmark, LandmarkFrame, LANDMARK_COUNT};
use crate::pipeline::PipelineCommand;
use crate::pose::GestureKind;
use crate::source::{FrameSource, LandmarkDetector, VideoFrame};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::debug;

/// Default frame pacing, roughly 30 fps.
pub const DEFAULT_HOLD_MS: u64 = 33;

fn default_hold_ms() -> u64 {
    DEFAULT_HOLD_MS
}

/// One line of a replay script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReplayStep {
    /// A camera frame with a detected hand.
    Frame {
        #[serde(default = "default_hold_ms")]
        hold_ms: u64,
        confidence: f32,
        points: Vec<[f32; 2]>,
    },
    /// A camera frame with no hand in view.
    NoHand {
        #[serde(default = "default_hold_ms")]
        hold_ms: u64,
    },
    /// User presses capture at this offset from pipeline start.
    Capture { at_ms: u64 },
    /// User requests a retake at this offset from pipeline start.
    Retake { at_ms: u64 },
}

/// A user command scheduled at an offset from pipeline start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimedCommand {
    pub at: Duration,
    pub command: PipelineCommand,
}

/// Parsed replay script.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayScript {
    pub steps: Vec<ReplayStep>,
}

impl ReplayScript {
    /// Parse a script from JSONL text. Blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error naming the offending line when a step fails to parse.
    pub fn parse_str(text: &str) -> Result<Self> {
        let mut steps = Vec::new();
        for (line_no, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let step: ReplayStep = serde_json::from_str(line)
                .with_context(|| format!("replay script line {}", line_no + 1))?;
            steps.push(step);
        }
        if steps.is_empty() {
            bail!("replay script contains no steps");
        }
        Ok(Self { steps })
    }

    /// Load a script file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading replay script {}", path.display()))?;
        Self::parse_str(&text)
    }

    /// Built-in demo: a short no-hand lead-in, then the target gesture held
    /// long enough for the auto-capture countdown to fire.
    #[must_use]
    pub fn demo(gesture: GestureKind, auto_delay: Duration) -> Self {
        let mut steps = vec![ReplayStep::NoHand { hold_ms: DEFAULT_HOLD_MS }; 5];
        let hold_frames = auto_delay.as_millis() as u64 / DEFAULT_HOLD_MS + 8;
        let points = demo_points(gesture);
        for _ in 0..hold_frames {
            steps.push(ReplayStep::Frame {
                hold_ms: DEFAULT_HOLD_MS,
                confidence: 0.95,
                points: points.clone(),
            });
        }
        Self { steps }
    }

    /// Split into the scripted source/detector pair and the timed commands.
    #[must_use]
    pub fn split(self) -> (ScriptedSource, ScriptedDetector, Vec<TimedCommand>) {
        let mut frames = VecDeque::new();
        let mut commands = Vec::new();
        for step in self.steps {
            match step {
                ReplayStep::Frame {
                    hold_ms,
                    confidence,
                    points,
                } => {
                    let landmarks = LandmarkFrame::new(
                        points.iter().map(|p| Landmark::new(p[0], p[1])).collect(),
                        confidence,
                    );
                    frames.push_back(ScriptedFrame {
                        hold: Duration::from_millis(hold_ms),
                        landmarks: Some(landmarks),
                    });
                }
                ReplayStep::NoHand { hold_ms } => frames.push_back(ScriptedFrame {
                    hold: Duration::from_millis(hold_ms),
                    landmarks: None,
                }),
                ReplayStep::Capture { at_ms } => commands.push(TimedCommand {
                    at: Duration::from_millis(at_ms),
                    command: PipelineCommand::Capture,
                }),
                ReplayStep::Retake { at_ms } => commands.push(TimedCommand {
                    at: Duration::from_millis(at_ms),
                    command: PipelineCommand::Retake,
                }),
            }
        }
        commands.sort_by_key(|cmd| cmd.at);

        let handoff = Arc::new(Mutex::new(VecDeque::new()));
        let source = ScriptedSource {
            pending: frames,
            handoff: Arc::clone(&handoff),
            frame_size: (0, 0),
            shade_seq: 0,
            started: false,
            stopped: false,
            fail_start: None,
        };
        let detector = ScriptedDetector {
            handoff,
            released: false,
        };
        (source, detector, commands)
    }
}

/// Reference landmark layout satisfying one gesture's predicates.
fn demo_points(gesture: GestureKind) -> Vec<[f32; 2]> {
    use crate::landmark::index;

    let mut points = vec![[0.5_f32, 0.5_f32]; LANDMARK_COUNT];
    points[index::WRIST] = [0.5, 0.9];
    points[index::THUMB_TIP] = [0.25, 0.5];

    let fingers = [
        (index::INDEX_TIP, index::INDEX_PIP, index::INDEX_MCP, 0.35),
        (index::MIDDLE_TIP, index::MIDDLE_PIP, index::MIDDLE_MCP, 0.45),
        (index::RING_TIP, index::RING_PIP, index::RING_MCP, 0.55),
        (index::PINKY_TIP, index::PINKY_PIP, index::PINKY_MCP, 0.65),
    ];
    let extended = |points: &mut Vec<[f32; 2]>, tip: usize, pip: usize, mcp: usize, x: f32| {
        points[tip] = [x, 0.25];
        points[pip] = [x, 0.45];
        points[mcp] = [x, 0.6];
    };
    let folded = |points: &mut Vec<[f32; 2]>, tip: usize, pip: usize, mcp: usize, x: f32| {
        points[tip] = [x, 0.75];
        points[pip] = [x, 0.65];
        points[mcp] = [x, 0.6];
    };

    for (slot, (tip, pip, mcp, x)) in fingers.into_iter().enumerate() {
        let raise = match gesture {
            GestureKind::OpenPalm => true,
            GestureKind::VSign => slot < 2,
            GestureKind::ThreeFingers => slot < 3,
            GestureKind::OneFinger => slot == 0,
            GestureKind::NoPoseRequired => false,
        };
        if raise {
            extended(&mut points, tip, pip, mcp, x);
        } else {
            folded(&mut points, tip, pip, mcp, x);
        }
    }
    points
}

struct ScriptedFrame {
    hold: Duration,
    landmarks: Option<LandmarkFrame>,
}

/// Frame source that replays scripted frames with their configured pacing.
pub struct ScriptedSource {
    pending: VecDeque<ScriptedFrame>,
    handoff: Arc<Mutex<VecDeque<Option<LandmarkFrame>>>>,
    frame_size: (u32, u32),
    shade_seq: u8,
    started: bool,
    stopped: bool,
    fail_start: Option<String>,
}

impl ScriptedSource {
    /// A source whose `start` fails, for exercising the acquisition-error path.
    #[must_use]
    pub fn failing(message: &str) -> Self {
        Self {
            pending: VecDeque::new(),
            handoff: Arc::new(Mutex::new(VecDeque::new())),
            frame_size: (0, 0),
            shade_seq: 0,
            started: false,
            stopped: false,
            fail_start: Some(message.to_string()),
        }
    }
}

impl FrameSource for ScriptedSource {
    fn start(&mut self, options: &CaptureOptions) -> Result<()> {
        if let Some(message) = &self.fail_start {
            bail!("{message}");
        }
        self.frame_size = (options.width, options.height);
        debug!(
            gesture = ?options.gesture,
            mirror = options.mirror,
            overlay = options.overlay,
            "replay source started"
        );
        self.started = true;
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<VideoFrame>> {
        if !self.started || self.stopped {
            return Ok(None);
        }
        let Some(step) = self.pending.pop_front() else {
            return Ok(None);
        };
        if !step.hold.is_zero() {
            thread::sleep(step.hold);
        }
        match self.handoff.lock() {
            Ok(mut queue) => queue.push_back(step.landmarks),
            Err(_) => bail!("replay handoff queue poisoned"),
        }
        // Vary the shade so consecutive captures are distinguishable.
        let shade = 16_u8.wrapping_add(self.shade_seq.wrapping_mul(7));
        self.shade_seq = self.shade_seq.wrapping_add(1);
        Ok(Some(VideoFrame::solid(
            self.frame_size.0,
            self.frame_size.1,
            shade,
        )))
    }

    fn stop(&mut self) -> Result<()> {
        self.stopped = true;
        self.pending.clear();
        Ok(())
    }
}

/// Detector that answers with the landmarks scripted for each frame.
pub struct ScriptedDetector {
    handoff: Arc<Mutex<VecDeque<Option<LandmarkFrame>>>>,
    released: bool,
}

impl LandmarkDetector for ScriptedDetector {
    fn detect(&mut self, _frame: &VideoFrame) -> Result<Option<LandmarkFrame>> {
        if self.released {
            bail!("detector used after release");
        }
        let queued = match self.handoff.lock() {
            Ok(mut queue) => queue.pop_front(),
            Err(_) => bail!("replay handoff queue poisoned"),
        };
        Ok(queued.flatten())
    }

    fn release(&mut self) -> Result<()> {
        self.released = true;
        if let Ok(mut queue) = self.handoff.lock() {
            queue.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pose::{classify, PoseCheck};
    use rstest::rstest;

    #[test]
    fn script_parses_steps_and_applies_default_hold() {
        let script = ReplayScript::parse_str(
            r#"
{"type":"no_hand"}
{"type":"frame","confidence":0.9,"points":[[0.1,0.2],[0.3,0.4]]}
{"type":"capture","at_ms":250}
{"type":"retake","at_ms":900,"extra_is_rejected_by_serde":false}
"#,
        );
        // serde(deny) is not set; unknown fields pass through by default, so
        // the last line parses too.
        let script = script.expect("parse script");
        assert_eq!(script.steps.len(), 4);
        assert_eq!(
            script.steps[0],
            ReplayStep::NoHand {
                hold_ms: DEFAULT_HOLD_MS
            }
        );
        match &script.steps[1] {
            ReplayStep::Frame {
                hold_ms,
                confidence,
                points,
            } => {
                assert_eq!(*hold_ms, DEFAULT_HOLD_MS);
                assert_eq!(*confidence, 0.9);
                assert_eq!(points.len(), 2);
            }
            other => panic!("expected frame step, got {other:?}"),
        }
    }

    #[test]
    fn malformed_line_reports_its_line_number() {
        let err = ReplayScript::parse_str("{\"type\":\"no_hand\"}\nnot json\n")
            .expect_err("second line must fail");
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn empty_script_is_rejected() {
        assert!(ReplayScript::parse_str("\n\n").is_err());
    }

    #[test]
    fn split_orders_commands_by_offset() {
        let script = ReplayScript::parse_str(
            r#"
{"type":"retake","at_ms":900}
{"type":"no_hand"}
{"type":"capture","at_ms":250}
"#,
        )
        .expect("parse");
        let (_, _, commands) = script.split();
        assert_eq!(
            commands,
            vec![
                TimedCommand {
                    at: Duration::from_millis(250),
                    command: PipelineCommand::Capture
                },
                TimedCommand {
                    at: Duration::from_millis(900),
                    command: PipelineCommand::Retake
                },
            ]
        );
    }

    #[rstest]
    #[case(GestureKind::OpenPalm)]
    #[case(GestureKind::VSign)]
    #[case(GestureKind::ThreeFingers)]
    #[case(GestureKind::OneFinger)]
    #[case(GestureKind::NoPoseRequired)]
    fn demo_frames_satisfy_their_gesture(#[case] gesture: GestureKind) {
        let frame = LandmarkFrame::new(
            demo_points(gesture)
                .iter()
                .map(|p| Landmark::new(p[0], p[1]))
                .collect(),
            0.95,
        );
        assert_eq!(classify(gesture, Some(&frame)), PoseCheck::Valid);
    }

    #[test]
    fn source_and_detector_stay_paired_per_frame() {
        let script = ReplayScript::parse_str(
            r#"
{"type":"no_hand","hold_ms":0}
{"type":"frame","hold_ms":0,"confidence":0.8,"points":[[0.5,0.5]]}
"#,
        )
        .expect("parse");
        let (mut source, mut detector, _) = script.split();
        source
            .start(&CaptureOptions::default())
            .expect("start scripted source");

        let first = source.next_frame().expect("frame one").expect("some frame");
        assert_eq!(detector.detect(&first).expect("detect one"), None);

        let second = source.next_frame().expect("frame two").expect("some frame");
        let landmarks = detector
            .detect(&second)
            .expect("detect two")
            .expect("hand present");
        assert_eq!(landmarks.confidence, 0.8);
        assert_eq!(landmarks.points.len(), 1);

        assert!(source.next_frame().expect("end of script").is_none());
    }

    #[test]
    fn source_yields_nothing_before_start_or_after_stop() {
        let script = ReplayScript::parse_str("{\"type\":\"no_hand\",\"hold_ms\":0}").expect("parse");
        let (mut source, _, _) = script.split();
        assert!(source.next_frame().expect("pre-start").is_none());

        source
            .start(&CaptureOptions::default())
            .expect("start scripted source");
        source.stop().expect("stop scripted source");
        assert!(source.next_frame().expect("post-stop").is_none());
    }

    #[test]
    fn failing_source_reports_its_message_on_start() {
        let mut source = ScriptedSource::failing("device is busy");
        let err = source
            .start(&CaptureOptions::default())
            .expect_err("start must fail");
        assert!(err.to_string().contains("device is busy"));
    }

    #[test]
    fn released_detector_rejects_further_use() {
        let script = ReplayScript::parse_str("{\"type\":\"no_hand\",\"hold_ms\":0}").expect("parse");
        let (_, mut detector, _) = script.split();
        detector.release().expect("release detector");
        assert!(detector.detect(&VideoFrame::solid(2, 2, 0)).is_err());
    }
}

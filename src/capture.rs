// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Live capture loop.
//!
//! Frames from a [`FrameSource`] drive a [`MotionGate`] through an
//! optical-flow estimate of consecutive frames. While the gate is
//! `Recognizing`, each frame goes through a [`LandmarkExtractor`] and is
//! appended to the clip. Camera, flow and landmark detection are external
//! collaborators supplied by the caller.

use std::time::Instant;

use ndarray::{Array3, ArrayView3};

use crate::cli::logging::gate_transition;
use crate::error::{Result, SignError};
use crate::landmarks::{Clip, Frame, Landmark};
use crate::motion::{GateConfig, GateState, MotionGate};
use crate::skeleton::POSE_LANDMARK_SUBSET;
use crate::verbose;

/// Supplies video frames as `(height, width, 3)` pixels.
pub trait FrameSource {
    /// Next frame, or `None` when none is available.
    ///
    /// `None` before the gesture has ended aborts the capture run.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the capture run.
    fn read(&mut self) -> Result<Option<Array3<u8>>>;
}

/// Dense optical flow between two frames.
pub trait FlowEstimator {
    /// Flow field of shape `(height, width, 2)` holding `(dx, dy)` per pixel.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the capture run.
    fn estimate(&mut self, prev: ArrayView3<'_, u8>, curr: ArrayView3<'_, u8>) -> Result<Array3<f32>>;
}

/// Holistic landmark detector.
pub trait LandmarkExtractor {
    /// Detect the full landmark sets in a frame.
    ///
    /// # Errors
    ///
    /// Any error is fatal to the capture run.
    fn extract(&mut self, image: ArrayView3<'_, u8>) -> Result<Detection>;
}

/// Time source for the gate's stillness timer.
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall-clock [`Clock`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Landmarks detected in one image. `pose` holds the full 33-point MediaPipe
/// pose; hands hold 21 points each.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Detection {
    pub pose: Option<Vec<Landmark>>,
    pub left_hand: Option<Vec<Landmark>>,
    pub right_hand: Option<Vec<Landmark>>,
}

impl Detection {
    /// Keep the upper-body pose subset and build a numbered frame.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InvalidFrame`] if the pose is too short for the
    /// subset or the frame fails validation.
    pub fn into_frame(self, index: usize) -> Result<Frame> {
        let pose = self
            .pose
            .map(|full| {
                POSE_LANDMARK_SUBSET
                    .iter()
                    .map(|&i| {
                        full.get(i).copied().ok_or_else(|| {
                            SignError::InvalidFrame(format!(
                                "Pose has {} landmarks, landmark {i} is required",
                                full.len()
                            ))
                        })
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;
        Frame::new(index, pose, self.left_hand, self.right_hand)
    }
}

/// Run the capture loop until the gate reaches `RecognitionEnded`, returning
/// the frames recorded while `Recognizing`.
///
/// # Errors
///
/// Returns [`SignError::CaptureError`] if the source stops delivering frames
/// before the gesture ends, or any collaborator fails. The run is not retried.
pub fn capture_clip<S, F, L, C>(
    source: &mut S,
    flow: &mut F,
    extractor: &mut L,
    clock: &C,
    config: GateConfig,
) -> Result<Clip>
where
    S: FrameSource + ?Sized,
    F: FlowEstimator + ?Sized,
    L: LandmarkExtractor + ?Sized,
    C: Clock + ?Sized,
{
    let mut prev = source
        .read()
        .map_err(capture_error)?
        .ok_or_else(|| SignError::CaptureError("No frame available from source".to_string()))?;

    let mut gate = MotionGate::new(config);
    let mut clip = Clip::default();

    loop {
        let Some(curr) = source.read().map_err(capture_error)? else {
            return Err(SignError::CaptureError(format!(
                "No frame available from source while {} ({} frames recorded)",
                gate.state(),
                clip.len()
            )));
        };
        let field = flow.estimate(prev.view(), curr.view()).map_err(capture_error)?;
        let before = gate.state();
        let state = gate.observe_flow(field.view(), clock.now());
        if state != before {
            verbose!("{}", gate_transition(before, state));
        }

        match state {
            GateState::RecognitionEnded => break,
            GateState::Recognizing => {
                let detection = extractor.extract(curr.view()).map_err(capture_error)?;
                let frame = detection.into_frame(clip.len())?;
                clip.push(frame)?;
            }
            GateState::Waiting => {}
        }
        prev = curr;
    }

    verbose!("Captured {} frames", clip.len());
    Ok(clip)
}

fn capture_error(err: SignError) -> SignError {
    match err {
        SignError::CaptureError(_) => err,
        other => SignError::CaptureError(other.to_string()),
    }
}

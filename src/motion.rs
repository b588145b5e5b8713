// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Presence and motion gating.
//!
//! Two independent signals decide where a gesture starts and stops:
//!
//! - the landmark-based [`has_hand`] / [`motion_state`] tests, used after
//!   capture to trim a clip, and
//! - the optical-flow [`MotionGate`], advanced once per live video frame to
//!   decide which frames are captured at all.

use std::fmt;
use std::time::{Duration, Instant};

use ndarray::ArrayView3;

use crate::landmarks::{Frame, Landmark};
use crate::skeleton::NUM_NODES;

/// Landmark y at or beyond this value lies below the image.
pub const OFF_FRAME_Y: f32 = 1.0;

/// Whether a hand group is detected and fully inside the lower image bound.
#[must_use]
pub fn hand_present(hand: Option<&[Landmark]>) -> bool {
    hand.is_some_and(|landmarks| landmarks.iter().all(|lm| lm.y < OFF_FRAME_Y))
}

/// Whether either hand passes the presence test.
#[must_use]
pub fn has_hand(frame: &Frame) -> bool {
    hand_present(frame.left_hand_landmarks.as_deref()) || hand_present(frame.right_hand_landmarks.as_deref())
}

/// Landmark motion between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    Moving,
    Stop,
}

impl MotionState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Moving => "moving",
            Self::Stop => "stop",
        }
    }

    #[must_use]
    pub const fn is_moving(&self) -> bool {
        matches!(self, Self::Moving)
    }
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Thresholds of the landmark motion test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionThresholds {
    /// A point moved when its squared displacement exceeds this.
    pub squared_displacement: f32,
    /// Frames are moving when more than this many points moved.
    pub min_moved_points: usize,
}

impl Default for MotionThresholds {
    fn default() -> Self {
        Self {
            squared_displacement: 0.05,
            min_moved_points: 5,
        }
    }
}

impl MotionThresholds {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_squared_displacement(mut self, threshold: f32) -> Self {
        self.squared_displacement = threshold;
        self
    }

    #[must_use]
    pub const fn with_min_moved_points(mut self, count: usize) -> Self {
        self.min_moved_points = count;
        self
    }
}

/// Count points whose squared displacement exceeds the threshold.
///
/// The squared length is compared directly against the threshold, not the
/// length itself.
#[must_use]
pub fn moved_points(prev: &[[f32; 2]; NUM_NODES], curr: &[[f32; 2]; NUM_NODES], squared_displacement: f32) -> usize {
    prev.iter()
        .zip(curr)
        .filter(|(p, c)| {
            let dx = c[0] - p[0];
            let dy = c[1] - p[1];
            dx * dx + dy * dy > squared_displacement
        })
        .count()
}

/// Motion state between two consecutive frames with default thresholds.
#[must_use]
pub fn motion_state(prev: &Frame, curr: &Frame) -> MotionState {
    motion_state_with(prev, curr, &MotionThresholds::default())
}

/// Motion state between two consecutive frames.
#[must_use]
pub fn motion_state_with(prev: &Frame, curr: &Frame, thresholds: &MotionThresholds) -> MotionState {
    let moved = moved_points(&prev.points(), &curr.points(), thresholds.squared_displacement);
    if moved > thresholds.min_moved_points {
        MotionState::Moving
    } else {
        MotionState::Stop
    }
}

/// State of the live capture gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GateState {
    /// Waiting for the signer to hold still before recording.
    #[default]
    Waiting,
    /// Recording frames.
    Recognizing,
    /// Signer held still again after recording.
    RecognitionEnded,
}

impl GateState {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "Waiting",
            Self::Recognizing => "Recognizing",
            Self::RecognitionEnded => "Recognition Ended",
        }
    }

    const fn next(self) -> Self {
        match self {
            Self::Waiting => Self::Recognizing,
            Self::Recognizing | Self::RecognitionEnded => Self::RecognitionEnded,
        }
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Configuration of the live optical-flow gate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GateConfig {
    /// How long the scene must stay still before the state advances.
    pub time_threshold: Duration,
    /// A flow sample moves when its truncated squared magnitude exceeds this.
    pub flow_squared_magnitude: i32,
    /// Fewer moving samples than this counts as still.
    pub still_below: usize,
    /// Pixel stride of the sampling grid (first sample at half the stride).
    pub grid_stride: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            time_threshold: Duration::from_secs(2),
            flow_squared_magnitude: 200,
            still_below: 5,
            grid_stride: 16,
        }
    }
}

impl GateConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set how long stillness must last before the gate advances.
    #[must_use]
    pub const fn with_time_threshold(mut self, threshold: Duration) -> Self {
        self.time_threshold = threshold;
        self
    }

    #[must_use]
    pub const fn with_flow_squared_magnitude(mut self, threshold: i32) -> Self {
        self.flow_squared_magnitude = threshold;
        self
    }

    #[must_use]
    pub const fn with_still_below(mut self, count: usize) -> Self {
        self.still_below = count;
        self
    }

    #[must_use]
    pub const fn with_grid_stride(mut self, stride: usize) -> Self {
        self.grid_stride = stride;
        self
    }
}

/// Count grid-sampled flow vectors with large motion.
///
/// `flow` has shape `(height, width, 2)` holding `(dx, dy)` per pixel. Samples
/// are taken every `grid_stride` pixels starting at `grid_stride / 2`, and the
/// components are truncated to integers before squaring.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn count_flow_motion(flow: ArrayView3<'_, f32>, config: &GateConfig) -> usize {
    let (height, width, channels) = flow.dim();
    if channels < 2 || config.grid_stride == 0 {
        return 0;
    }
    let start = config.grid_stride / 2;
    let mut moved = 0;
    for y in (start..height).step_by(config.grid_stride) {
        for x in (start..width).step_by(config.grid_stride) {
            let dx = flow[[y, x, 0]] as i32;
            let dy = flow[[y, x, 1]] as i32;
            if dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy)) > config.flow_squared_magnitude {
                moved += 1;
            }
        }
    }
    moved
}

/// Live `Waiting -> Recognizing -> RecognitionEnded` state machine.
///
/// Stillness lasting `time_threshold` advances the state one step; any
/// movement restarts the stillness timer without changing state.
#[derive(Debug, Clone)]
pub struct MotionGate {
    config: GateConfig,
    state: GateState,
    still_since: Option<Instant>,
}

impl MotionGate {
    #[must_use]
    pub const fn new(config: GateConfig) -> Self {
        Self {
            config,
            state: GateState::Waiting,
            still_since: None,
        }
    }

    #[must_use]
    pub const fn state(&self) -> GateState {
        self.state
    }

    #[must_use]
    pub const fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Whether captured frames should be kept.
    #[must_use]
    pub const fn is_recording(&self) -> bool {
        matches!(self.state, GateState::Recognizing)
    }

    /// Advance with a flow field observed at `now`.
    pub fn observe_flow(&mut self, flow: ArrayView3<'_, f32>, now: Instant) -> GateState {
        let moved = count_flow_motion(flow, &self.config);
        self.update(moved, now)
    }

    /// Advance with the number of moving flow samples observed at `now`.
    pub fn update(&mut self, moved: usize, now: Instant) -> GateState {
        if moved >= self.config.still_below {
            self.still_since = None;
            return self.state;
        }
        if self.state == GateState::RecognitionEnded {
            return self.state;
        }

        let since = *self.still_since.get_or_insert(now);
        if now.saturating_duration_since(since) >= self.config.time_threshold {
            self.state = self.state.next();
            self.still_since = None;
        }
        self.state
    }

    /// Return to `Waiting` with no running timer.
    pub fn reset(&mut self) {
        self.state = GateState::Waiting;
        self.still_since = None;
    }
}

impl Default for MotionGate {
    fn default() -> Self {
        Self::new(GateConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::skeleton::HAND_NODES;
    use ndarray::Array3;

    fn frame_with_hand(offset: f32, y: f32) -> Frame {
        let hand = (0..HAND_NODES).map(|_| Landmark::new(offset, y, 0.0)).collect();
        Frame::new(0, None, Some(hand), None).unwrap()
    }

    #[test]
    fn test_presence() {
        assert!(has_hand(&frame_with_hand(0.0, 0.5)));
        assert!(!has_hand(&frame_with_hand(0.0, 1.0)));
        assert!(!has_hand(&Frame::default()));

        // Detected but empty group passes.
        assert!(hand_present(Some(&[][..])));
        assert!(!hand_present(None));
    }

    #[test]
    fn test_presence_either_hand() {
        let mut frame = frame_with_hand(0.0, 1.2);
        frame.right_hand_landmarks = Some(vec![Landmark::new(0.3, 0.3, 0.0)]);
        assert!(has_hand(&frame));
    }

    #[test]
    fn test_squared_displacement_compared_directly() {
        // A 0.2 displacement is longer than 0.05 but its square (0.04) is not.
        let prev = [[0.0_f32; 2]; NUM_NODES];
        let mut curr = prev;
        curr[0] = [0.25, 0.0];
        curr[1] = [0.2, 0.0];
        assert_eq!(moved_points(&prev, &curr, 0.05), 1);
    }

    #[test]
    fn test_motion_state_needs_more_than_five_points() {
        let prev = Frame::default();
        let mut curr = Frame::default();
        curr.left_hand_landmarks = Some(vec![Landmark::new(0.5, 0.5, 0.0); 5]);
        assert_eq!(motion_state(&prev, &curr), MotionState::Stop);

        curr.left_hand_landmarks = Some(vec![Landmark::new(0.5, 0.5, 0.0); 6]);
        assert_eq!(motion_state(&prev, &curr), MotionState::Moving);
    }

    #[test]
    fn test_count_flow_motion_grid() {
        let mut flow = Array3::<f32>::zeros((64, 64, 2));
        // Sampled: (8, 8), (8, 24), ...
        flow[[8, 8, 0]] = 15.0; // 225 > 200
        flow[[8, 24, 1]] = 14.9; // truncated to 14: 196
        flow[[9, 9, 0]] = 100.0; // off grid
        assert_eq!(count_flow_motion(flow.view(), &GateConfig::default()), 1);
    }

    #[test]
    fn test_gate_transitions() {
        let mut gate = MotionGate::new(GateConfig::default());
        let t0 = Instant::now();
        let s = Duration::from_millis;

        assert_eq!(gate.update(0, t0), GateState::Waiting);
        assert_eq!(gate.update(0, t0 + s(1999)), GateState::Waiting);
        assert_eq!(gate.update(0, t0 + s(2000)), GateState::Recognizing);
        assert!(gate.is_recording());

        // Signing: movement keeps the timer reset.
        assert_eq!(gate.update(10, t0 + s(2500)), GateState::Recognizing);
        assert_eq!(gate.update(0, t0 + s(3000)), GateState::Recognizing);
        assert_eq!(gate.update(9, t0 + s(4000)), GateState::Recognizing);
        assert_eq!(gate.update(0, t0 + s(4100)), GateState::Recognizing);
        assert_eq!(gate.update(0, t0 + s(6100)), GateState::RecognitionEnded);

        // Terminal.
        assert_eq!(gate.update(0, t0 + s(9000)), GateState::RecognitionEnded);
        gate.reset();
        assert_eq!(gate.state(), GateState::Waiting);
    }

    #[test]
    fn test_gate_movement_resets_timer_without_state_change() {
        let mut gate = MotionGate::new(GateConfig::default().with_time_threshold(Duration::from_secs(1)));
        let t0 = Instant::now();
        gate.update(0, t0);
        gate.update(5, t0 + Duration::from_millis(900));
        assert_eq!(gate.update(0, t0 + Duration::from_millis(1500)), GateState::Waiting);
        assert_eq!(gate.update(0, t0 + Duration::from_millis(2500)), GateState::Recognizing);
    }

    #[test]
    fn test_state_names() {
        assert_eq!(GateState::RecognitionEnded.to_string(), "Recognition Ended");
        assert_eq!(MotionState::Moving.to_string(), "moving");
    }
}

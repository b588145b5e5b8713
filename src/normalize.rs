// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Gesture segmentation and clip normalization.
//!
//! A raw capture is turned into the canonical network input in three steps:
//!
//! 1. **Trim** to the gesture interval found by [`find_boundaries`].
//! 2. **Rescale** x and y into `[0, 1]` using the extrema of the whole clip
//!    ([`normalize_spatial`]).
//! 3. **Resample** to a fixed frame count by index selection ([`resample`]).
//!
//! # Example
//!
//! ```no_run
//! use sign_inference::{Clip, normalize};
//!
//! let raw = Clip::load("capture.json")?;
//! let clip = normalize::normalize(&raw)?;
//! assert_eq!(clip.len(), 60);
//! # Ok::<(), sign_inference::SignError>(())
//! ```

use crate::cli::logging::gesture_span;
use crate::error::{Result, SignError};
use crate::landmarks::{Clip, Frame};
use crate::motion::{MotionThresholds, has_hand, motion_state_with};
use crate::verbose;

/// Frame count of a normalized clip.
pub const TARGET_FRAMES: usize = 60;

/// Configuration of the normalization pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizeConfig {
    /// Frames in the resampled clip.
    pub target_frames: usize,
    /// Thresholds used when searching for gesture boundaries.
    pub motion: MotionThresholds,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            target_frames: TARGET_FRAMES,
            motion: MotionThresholds::default(),
        }
    }
}

impl NormalizeConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the resampled frame count.
    #[must_use]
    pub const fn with_target_frames(mut self, frames: usize) -> Self {
        self.target_frames = frames;
        self
    }

    /// Set the boundary search thresholds.
    #[must_use]
    pub const fn with_motion(mut self, motion: MotionThresholds) -> Self {
        self.motion = motion;
        self
    }
}

/// Inclusive gesture interval within a raw clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Boundaries {
    pub start: usize,
    pub end: usize,
}

impl Boundaries {
    /// Frames in the interval.
    #[must_use]
    pub const fn frame_count(&self) -> usize {
        self.end - self.start + 1
    }
}

/// First index where the gesture begins, if any.
///
/// Without a hand in the first frame, the first frame showing one; otherwise
/// the earlier frame of the first moving pair.
fn find_start(frames: &[Frame], motion: &MotionThresholds) -> Option<usize> {
    let first = frames.first()?;
    if has_hand(first) {
        frames
            .windows(2)
            .position(|pair| motion_state_with(&pair[0], &pair[1], motion).is_moving())
    } else {
        frames.iter().position(has_hand)
    }
}

/// Last index where the gesture ends, if any.
///
/// Mirror of [`find_start`]: the last frame showing a hand, or the later
/// frame of the last moving pair.
fn find_end(frames: &[Frame], motion: &MotionThresholds) -> Option<usize> {
    let last = frames.last()?;
    if has_hand(last) {
        frames
            .windows(2)
            .rposition(|pair| motion_state_with(&pair[0], &pair[1], motion).is_moving())
            .map(|i| i + 1)
    } else {
        frames.iter().rposition(has_hand)
    }
}

/// Locate the gesture interval, defaulting to the whole clip.
///
/// # Errors
///
/// Returns [`SignError::SegmentationError`] if the clip is empty or the start
/// boundary falls after the end boundary.
pub fn find_boundaries(clip: &Clip, motion: &MotionThresholds) -> Result<Boundaries> {
    let frames = clip.frames();
    if frames.is_empty() {
        return Err(SignError::SegmentationError("clip has no frames".to_string()));
    }

    let start = find_start(frames, motion).unwrap_or(0);
    let end = find_end(frames, motion).unwrap_or(frames.len() - 1);
    if start > end {
        return Err(SignError::SegmentationError(format!(
            "gesture boundaries cross (start {start} > end {end})"
        )));
    }
    Ok(Boundaries { start, end })
}

/// Slice to `[start, end]` and renumber frames from 0.
///
/// # Errors
///
/// Returns [`SignError::SegmentationError`] if the interval lies outside the clip.
pub fn trim(clip: &Clip, boundaries: Boundaries) -> Result<Clip> {
    let frames = clip
        .frames()
        .get(boundaries.start..=boundaries.end)
        .ok_or_else(|| {
            SignError::SegmentationError(format!(
                "interval {}..={} outside clip of {} frames",
                boundaries.start,
                boundaries.end,
                clip.len()
            ))
        })?;

    let frames = frames
        .iter()
        .enumerate()
        .map(|(i, frame)| Frame {
            frame: i,
            ..frame.clone()
        })
        .collect();
    Clip::new(frames)
}

/// Min-max rescale x and y of every landmark with clip-global extrema.
///
/// Only detected landmarks are pooled; z and visibility are left untouched.
///
/// # Errors
///
/// Returns [`SignError::DegenerateClipError`] if the clip has no landmarks or
/// all pooled x (or y) values are equal.
pub fn normalize_spatial(clip: &mut Clip) -> Result<()> {
    let mut extent: Option<[f32; 4]> = None;
    for lm in clip.frames().iter().flat_map(Frame::landmarks) {
        let [min_x, max_x, min_y, max_y] = extent.get_or_insert([lm.x, lm.x, lm.y, lm.y]);
        *min_x = min_x.min(lm.x);
        *max_x = max_x.max(lm.x);
        *min_y = min_y.min(lm.y);
        *max_y = max_y.max(lm.y);
    }

    let Some([min_x, max_x, min_y, max_y]) = extent else {
        return Err(SignError::DegenerateClipError("clip contains no landmarks".to_string()));
    };
    let range_x = max_x - min_x;
    let range_y = max_y - min_y;
    if range_x <= 0.0 {
        return Err(SignError::DegenerateClipError(format!("all x coordinates equal {min_x}")));
    }
    if range_y <= 0.0 {
        return Err(SignError::DegenerateClipError(format!("all y coordinates equal {min_y}")));
    }

    for lm in clip.frames_mut().iter_mut().flat_map(Frame::landmarks_mut) {
        lm.x = (lm.x - min_x) / range_x;
        lm.y = (lm.y - min_y) / range_y;
    }
    Ok(())
}

/// Evenly spaced source indices, first and last included.
///
/// Index `i` maps to `floor(i * (len - 1) / (target - 1))`.
#[must_use]
pub fn resample_indices(len: usize, target: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }
    if target <= 1 {
        return vec![0; target];
    }
    (0..target).map(|i| i * (len - 1) / (target - 1)).collect()
}

/// Select `target` frames by index, duplicating or skipping as needed.
///
/// Frames keep their `frame` numbers, so the output records which source
/// frame each slot came from.
///
/// # Errors
///
/// Returns [`SignError::SegmentationError`] if the clip is empty.
pub fn resample(clip: &Clip, target: usize) -> Result<Clip> {
    if clip.is_empty() {
        return Err(SignError::SegmentationError("cannot resample an empty clip".to_string()));
    }
    let frames = resample_indices(clip.len(), target)
        .into_iter()
        .map(|i| clip.frames()[i].clone())
        .collect();
    Clip::new(frames)
}

/// Run trim, spatial normalization and resampling with default settings.
///
/// # Errors
///
/// See [`normalize_with_config`].
pub fn normalize(clip: &Clip) -> Result<Clip> {
    normalize_with_config(clip, &NormalizeConfig::default())
}

/// Run trim, spatial normalization and resampling.
///
/// # Errors
///
/// Returns [`SignError::SegmentationError`] for empty or crossing intervals and
/// [`SignError::DegenerateClipError`] when the clip has no spatial extent.
pub fn normalize_with_config(clip: &Clip, config: &NormalizeConfig) -> Result<Clip> {
    if config.target_frames == 0 {
        return Err(SignError::ConfigError("target_frames must be at least 1".to_string()));
    }

    let boundaries = find_boundaries(clip, &config.motion)?;
    verbose!("{}", gesture_span(&boundaries, clip.len()));

    let mut trimmed = trim(clip, boundaries)?;
    normalize_spatial(&mut trimmed)?;
    resample(&trimmed, config.target_frames)
}

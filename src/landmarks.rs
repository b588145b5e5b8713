// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Landmark, frame and clip data model.
//!
//! Frames arrive as JSON records with optional `pose_landmarks`,
//! `left_hand_landmarks` and `right_hand_landmarks` groups. They are validated
//! once, here, when they enter the crate; downstream stages trust the layout.

use std::fs;
use std::path::Path;

use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SignError};
use crate::skeleton::{HAND_NODES, LEFT_HAND_START, NODE_CHANNELS, NUM_NODES, POSE_NODES, RIGHT_HAND_START};

/// One tracked keypoint in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    /// Detection confidence. Hand landmarks carry none.
    #[serde(default)]
    pub visibility: Option<f32>,
}

impl Landmark {
    /// Create a landmark without visibility.
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z, visibility: None }
    }

    /// Create a landmark with visibility.
    #[must_use]
    pub const fn with_visibility(x: f32, y: f32, z: f32, visibility: f32) -> Self {
        Self {
            x,
            y,
            z,
            visibility: Some(visibility),
        }
    }

    /// Packed `[x, y, z, visibility]`, absent visibility as 0.
    #[must_use]
    pub fn to_node(&self) -> [f32; NODE_CHANNELS] {
        [self.x, self.y, self.z, self.visibility.unwrap_or(0.0)]
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite() && self.visibility.is_none_or(f32::is_finite)
    }
}

/// Which landmark group a node belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LandmarkGroup {
    Pose,
    LeftHand,
    RightHand,
}

impl LandmarkGroup {
    /// All groups in node order.
    pub const ALL: [Self; 3] = [Self::Pose, Self::LeftHand, Self::RightHand];

    /// Number of nodes reserved for the group.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        match self {
            Self::Pose => POSE_NODES,
            Self::LeftHand | Self::RightHand => HAND_NODES,
        }
    }

    /// First node index of the group.
    #[must_use]
    pub const fn offset(&self) -> usize {
        match self {
            Self::Pose => 0,
            Self::LeftHand => LEFT_HAND_START,
            Self::RightHand => RIGHT_HAND_START,
        }
    }

    /// JSON field name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pose => "pose_landmarks",
            Self::LeftHand => "left_hand_landmarks",
            Self::RightHand => "right_hand_landmarks",
        }
    }
}

/// One captured frame of keypoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// Position of the frame in its clip.
    #[serde(default)]
    pub frame: usize,
    #[serde(default)]
    pub pose_landmarks: Option<Vec<Landmark>>,
    #[serde(default)]
    pub left_hand_landmarks: Option<Vec<Landmark>>,
    #[serde(default)]
    pub right_hand_landmarks: Option<Vec<Landmark>>,
}

impl Frame {
    /// Build and validate a frame.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InvalidFrame`] if a group holds more landmarks than
    /// its node budget or any coordinate is not finite.
    pub fn new(
        frame: usize,
        pose: Option<Vec<Landmark>>,
        left_hand: Option<Vec<Landmark>>,
        right_hand: Option<Vec<Landmark>>,
    ) -> Result<Self> {
        let frame = Self {
            frame,
            pose_landmarks: pose,
            left_hand_landmarks: left_hand,
            right_hand_landmarks: right_hand,
        };
        frame.validate()?;
        Ok(frame)
    }

    /// Landmarks of one group, if detected.
    #[must_use]
    pub fn group(&self, group: LandmarkGroup) -> Option<&[Landmark]> {
        match group {
            LandmarkGroup::Pose => self.pose_landmarks.as_deref(),
            LandmarkGroup::LeftHand => self.left_hand_landmarks.as_deref(),
            LandmarkGroup::RightHand => self.right_hand_landmarks.as_deref(),
        }
    }

    /// Mutable landmarks of one group, if detected.
    pub fn group_mut(&mut self, group: LandmarkGroup) -> Option<&mut Vec<Landmark>> {
        match group {
            LandmarkGroup::Pose => self.pose_landmarks.as_mut(),
            LandmarkGroup::LeftHand => self.left_hand_landmarks.as_mut(),
            LandmarkGroup::RightHand => self.right_hand_landmarks.as_mut(),
        }
    }

    /// Iterate over every detected landmark in node order.
    pub fn landmarks(&self) -> impl Iterator<Item = &Landmark> {
        LandmarkGroup::ALL
            .into_iter()
            .filter_map(|group| self.group(group))
            .flatten()
    }

    /// Iterate mutably over every detected landmark in node order.
    pub fn landmarks_mut(&mut self) -> impl Iterator<Item = &mut Landmark> {
        [
            self.pose_landmarks.as_mut(),
            self.left_hand_landmarks.as_mut(),
            self.right_hand_landmarks.as_mut(),
        ]
        .into_iter()
        .flatten()
        .flatten()
    }

    /// Check group sizes and coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InvalidFrame`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        for group in LandmarkGroup::ALL {
            let Some(landmarks) = self.group(group) else {
                continue;
            };
            if landmarks.len() > group.capacity() {
                return Err(SignError::InvalidFrame(format!(
                    "frame {}: {} has {} landmarks, expected at most {}",
                    self.frame,
                    group.as_str(),
                    landmarks.len(),
                    group.capacity()
                )));
            }
            if let Some(i) = landmarks.iter().position(|lm| !lm.is_finite()) {
                return Err(SignError::InvalidFrame(format!(
                    "frame {}: {}[{i}] has a non-finite coordinate",
                    self.frame,
                    group.as_str()
                )));
            }
        }
        Ok(())
    }

    /// Pack into `(54, 4)` nodes, zero-filling absent landmarks.
    #[must_use]
    pub fn to_nodes(&self) -> Array2<f32> {
        let mut nodes = Array2::<f32>::zeros((NUM_NODES, NODE_CHANNELS));
        for group in LandmarkGroup::ALL {
            let Some(landmarks) = self.group(group) else {
                continue;
            };
            for (i, lm) in landmarks.iter().take(group.capacity()).enumerate() {
                let node = lm.to_node();
                for (c, value) in node.into_iter().enumerate() {
                    nodes[[group.offset() + i, c]] = value;
                }
            }
        }
        nodes
    }

    /// Packed `(x, y)` per node, zero-filled, used by the motion test.
    #[must_use]
    pub fn points(&self) -> [[f32; 2]; NUM_NODES] {
        let mut points = [[0.0; 2]; NUM_NODES];
        for group in LandmarkGroup::ALL {
            let Some(landmarks) = self.group(group) else {
                continue;
            };
            for (i, lm) in landmarks.iter().take(group.capacity()).enumerate() {
                points[group.offset() + i] = [lm.x, lm.y];
            }
        }
        points
    }
}

/// Ordered sequence of frames for one gesture attempt.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Clip {
    frames: Vec<Frame>,
}

impl Clip {
    /// Create a clip, validating every frame.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InvalidFrame`] for the first invalid frame.
    pub fn new(frames: Vec<Frame>) -> Result<Self> {
        for frame in &frames {
            frame.validate()?;
        }
        Ok(Self { frames })
    }

    /// Parse a JSON array of frames.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ParseError`] for malformed JSON and
    /// [`SignError::InvalidFrame`] for frames that fail validation.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let frames: Vec<Frame> = serde_json::from_str(json)?;
        Self::new(frames)
    }

    /// Load a clip from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SignError::IoError(format!("Clip file not found: {}", path.display())));
        }
        let json = fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    /// Serialize the clip as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ParseError`] if serialization fails.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the clip to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_json_string()?)?;
        Ok(())
    }

    /// Number of frames.
    #[must_use]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether the clip has no frames.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frames in order.
    #[must_use]
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub(crate) fn frames_mut(&mut self) -> &mut [Frame] {
        &mut self.frames
    }

    /// Consume the clip, returning its frames.
    #[must_use]
    pub fn into_frames(self) -> Vec<Frame> {
        self.frames
    }

    /// Append a frame.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InvalidFrame`] if the frame fails validation.
    pub fn push(&mut self, frame: Frame) -> Result<()> {
        frame.validate()?;
        self.frames.push(frame);
        Ok(())
    }

    /// Pack as `(frames, 54, 4)`, the stored axis order.
    #[must_use]
    pub fn to_array(&self) -> Array3<f32> {
        let mut out = Array3::<f32>::zeros((self.len(), NUM_NODES, NODE_CHANNELS));
        for (mut slot, frame) in out.outer_iter_mut().zip(&self.frames) {
            slot.assign(&frame.to_nodes());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hand(y: f32) -> Vec<Landmark> {
        (0..HAND_NODES).map(|i| Landmark::new(0.01 * i as f32, y, -0.1)).collect()
    }

    #[test]
    fn test_pack_zero_fills_missing_groups() {
        let frame = Frame::new(0, None, None, Some(hand(0.5))).unwrap();
        let nodes = frame.to_nodes();
        assert_eq!(nodes.dim(), (54, 4));

        // Pose and left hand are all zero.
        assert!(nodes.slice(ndarray::s![..33, ..]).iter().all(|&v| v == 0.0));
        // Right hand root carries x, y, z and zero visibility.
        assert!((nodes[[33, 1]] - 0.5).abs() < f32::EPSILON);
        assert!((nodes[[33, 2]] + 0.1).abs() < f32::EPSILON);
        assert!(nodes[[33, 3]].abs() < f32::EPSILON);
    }

    #[test]
    fn test_pack_short_group_and_visibility() {
        let pose = vec![Landmark::with_visibility(0.2, 0.3, 0.0, 0.9); 3];
        let frame = Frame::new(0, Some(pose), Some(Vec::new()), None).unwrap();
        let nodes = frame.to_nodes();
        assert!((nodes[[2, 3]] - 0.9).abs() < f32::EPSILON);
        assert!(nodes[[3, 0]].abs() < f32::EPSILON);
        assert_eq!(frame.landmarks().count(), 3);
    }

    #[test]
    fn test_validate_rejects_oversized_group() {
        let pose = vec![Landmark::new(0.0, 0.0, 0.0); 33];
        let err = Frame::new(0, Some(pose), None, None).unwrap_err();
        assert!(matches!(err, SignError::InvalidFrame(_)));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let err = Frame::new(3, None, Some(vec![Landmark::new(f32::NAN, 0.0, 0.0)]), None).unwrap_err();
        assert!(err.to_string().contains("frame 3"));
    }

    #[test]
    fn test_json_round_trip_schema() {
        let json = r#"[
            {"frame": 0,
             "pose_landmarks": [{"x": 0.1, "y": 0.2, "z": 0.3, "visibility": 0.99}],
             "left_hand_landmarks": null,
             "right_hand_landmarks": [{"x": 0.5, "y": 0.6, "z": 0.0}]},
            {"frame": 1}
        ]"#;
        let clip = Clip::from_json_str(json).unwrap();
        assert_eq!(clip.len(), 2);
        assert_eq!(clip.frames()[0].pose_landmarks.as_ref().unwrap()[0].visibility, Some(0.99));
        assert!(clip.frames()[0].left_hand_landmarks.is_none());
        assert!(clip.frames()[1].right_hand_landmarks.is_none());

        let again = Clip::from_json_str(&clip.to_json_string().unwrap()).unwrap();
        assert_eq!(again, clip);
    }

    #[test]
    fn test_clip_to_array_layout() {
        let frames = vec![
            Frame::new(0, None, Some(hand(0.4)), None).unwrap(),
            Frame::new(1, None, None, None).unwrap(),
        ];
        let clip = Clip::new(frames).unwrap();
        let arr = clip.to_array();
        assert_eq!(arr.dim(), (2, 54, 4));
        assert!((arr[[0, 12, 1]] - 0.4).abs() < f32::EPSILON);
        assert!(arr.index_axis(ndarray::Axis(0), 1).iter().all(|&v| v == 0.0));
    }
}

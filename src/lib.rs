// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

#![allow(clippy::multiple_crate_versions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # Sign Inference Library
//!
//! Isolated sign-language recognition from body and hand keypoints, written in
//! pure Rust. A short capture of MediaPipe-style landmarks is segmented to the
//! gesture interval, normalized to a canonical 60-frame clip and classified by
//! a spatial-temporal graph convolutional network (ST-GCN) over a fixed
//! 54-node upper-body skeleton.
//!
//! ## Features
//!
//! - **Motion gating** - Presence and landmark-motion tests, plus the live
//!   optical-flow `Waiting -> Recognizing -> Recognition Ended` state machine
//! - **Segmentation** - Gesture boundary search, clip-global min-max scaling and
//!   index resampling to a fixed frame count
//! - **ST-GCN** - Ten spatio-temporal blocks on `candle`, batched, inference-only
//! - **SafeTensors weights** - Strict, name-checked checkpoint loading and export
//! - **Accelerators** - CPU by default, CUDA or Metal with the `cuda` / `metal` features
//! - **Results API** - Label, class index, probabilities (`top1`, `top5`) and timing
//!
//! ## Quick Start (Library)
//!
//! ```no_run
//! use sign_inference::{ClassifierConfig, Clip, LabelVocabulary, SignClassifier};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let classifier = SignClassifier::load(
//!         "emergency.safetensors",
//!         LabelVocabulary::emergency_words(),
//!         ClassifierConfig::new(),
//!     )?;
//!
//!     // Raw capture: segment, normalize, classify
//!     let raw = Clip::load("capture.json")?;
//!     let prediction = classifier.predict_raw(&raw)?;
//!     println!("{} ({:.1}%)", prediction.label, prediction.confidence() * 100.0);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## CLI Usage
//!
//! ```bash
//! # Classify an already normalized 60-frame clip
//! sign-inference classify --weights emergency.safetensors --clip clip.json
//!
//! # Segment and normalize a raw capture first, rejecting weak predictions
//! sign-inference classify -w emergency.safetensors -c capture.json --raw --threshold 0.5
//!
//! # Custom vocabulary, one label per line
//! sign-inference classify -w police.safetensors -c clip.json --labels police.txt
//!
//! # Normalize only
//! sign-inference normalize --clip capture.json --output clip.json
//! ```
//!
//! ## Clip Format
//!
//! A clip is a JSON array of frames. Absent landmark groups are `null` and are
//! packed as zeros:
//!
//! ```json
//! [
//!   {
//!     "frame": 0,
//!     "pose_landmarks": [{"x": 0.41, "y": 0.52, "z": -0.3, "visibility": 0.99}],
//!     "left_hand_landmarks": null,
//!     "right_hand_landmarks": [{"x": 0.63, "y": 0.71, "z": -0.02}]
//!   }
//! ]
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`skeleton`] | 54-node layout and adjacency ([`SkeletonGraph`]) |
//! | [`landmarks`] | [`Landmark`], [`Frame`], [`Clip`] and JSON I/O |
//! | [`motion`] | Presence test, motion test, live [`MotionGate`] |
//! | [`normalize`] | Boundary search, spatial scaling, resampling |
//! | [`network`] | [`StGcnModel`] and its layers |
//! | [`weights`] | [`StateDict`] `SafeTensors` I/O |
//! | [`classifier`] | [`SignClassifier`] and clip packing |
//! | [`capture`] | Live capture loop over camera, flow and landmark collaborators |
//! | [`registry`] | Init-once [`ClassifierRegistry`] |
//! | [`results`] | [`Prediction`], [`Probs`], [`Speed`] |
//! | [`error`] | Error types ([`SignError`], [`Result`]) |
//!
//! ## License
//!
//! This project is licensed under [AGPL-3.0](https://ultralytics.com/license).

// Modules
pub mod capture;
pub mod classifier;
pub mod cli;
pub mod device;
pub mod error;
pub mod inference;
pub mod labels;
pub mod landmarks;
pub mod motion;
pub mod network;
pub mod normalize;
pub mod registry;
pub mod results;
pub mod skeleton;
pub mod utils;
pub mod weights;

// Re-export main types for convenience
pub use capture::{Clock, Detection, FlowEstimator, FrameSource, LandmarkExtractor, SystemClock, capture_clip};
pub use classifier::{SignClassifier, pack_batch, pack_clip};
pub use device::Device;
pub use error::{Result, SignError};
pub use inference::ClassifierConfig;
pub use labels::LabelVocabulary;
pub use landmarks::{Clip, Frame, Landmark, LandmarkGroup};
pub use motion::{GateConfig, GateState, MotionGate, MotionState, MotionThresholds};
pub use network::{ModelConfig, StGcnModel};
pub use normalize::{Boundaries, NormalizeConfig, find_boundaries, normalize};
pub use registry::ClassifierRegistry;
pub use results::{Prediction, Probs, Speed};
pub use skeleton::SkeletonGraph;
pub use weights::StateDict;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(VERSION.contains('.'));
    }

    #[test]
    fn test_name() {
        assert_eq!(NAME, "sign-inference");
    }
}

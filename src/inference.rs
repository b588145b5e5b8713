// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Classifier configuration.
//!
//! [`ClassifierConfig`] controls how a [`crate::SignClassifier`] packs clips
//! and interprets the network output.

use crate::device::Device;
use crate::error::{Result, SignError};
use crate::normalize::TARGET_FRAMES;

/// Configuration for sign classification.
///
/// # Example
///
/// ```rust
/// use sign_inference::ClassifierConfig;
///
/// let config = ClassifierConfig::new()
///     .with_rejection_threshold(0.5)
///     .with_num_frames(60);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Requested compute device. `None` picks the first available one.
    pub device: Option<Device>,
    /// Top-1 probability at or below which a prediction is rejected.
    /// Disabled by default.
    pub rejection_threshold: Option<f32>,
    /// Frames per packed clip; shorter clips are zero-padded, longer ones truncated.
    pub num_frames: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            device: None,
            rejection_threshold: None,
            num_frames: TARGET_FRAMES,
        }
    }
}

impl ClassifierConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a specific device.
    #[must_use]
    pub const fn with_device(mut self, device: Device) -> Self {
        self.device = Some(device);
        self
    }

    /// Enable rejection of low-confidence predictions.
    ///
    /// Predictions whose top-1 probability is `<= threshold` are labelled
    /// [`crate::results::REJECTED_LABEL`].
    #[must_use]
    pub const fn with_rejection_threshold(mut self, threshold: f32) -> Self {
        self.rejection_threshold = Some(threshold);
        self
    }

    /// Set the packed clip length.
    #[must_use]
    pub const fn with_num_frames(mut self, frames: usize) -> Self {
        self.num_frames = frames;
        self
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ConfigError`] for a zero frame count or a threshold
    /// outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.num_frames == 0 {
            return Err(SignError::ConfigError("num_frames must be positive".to_string()));
        }
        if let Some(threshold) = self.rejection_threshold.filter(|t| !(0.0..=1.0).contains(t)) {
            return Err(SignError::ConfigError(format!(
                "rejection_threshold must be within [0, 1], got {threshold}"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClassifierConfig::default();
        assert_eq!(config.device, None);
        assert_eq!(config.rejection_threshold, None);
        assert_eq!(config.num_frames, 60);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder() {
        let config = ClassifierConfig::new()
            .with_device(Device::Cpu)
            .with_rejection_threshold(0.5)
            .with_num_frames(30);
        assert_eq!(config.device, Some(Device::Cpu));
        assert_eq!(config.rejection_threshold, Some(0.5));
        assert_eq!(config.num_frames, 30);
    }

    #[test]
    fn test_validate() {
        assert!(ClassifierConfig::new().with_num_frames(0).validate().is_err());
        assert!(ClassifierConfig::new().with_rejection_threshold(1.5).validate().is_err());
        assert!(ClassifierConfig::new().with_rejection_threshold(0.0).validate().is_ok());
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Sign classifier: weights loading, clip packing, forward pass and label mapping.

use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{D, Tensor};
use ndarray::{Array1, Array4, Axis, s};

use crate::device::Device;
use crate::error::{Result, SignError};
use crate::inference::ClassifierConfig;
use crate::labels::LabelVocabulary;
use crate::landmarks::Clip;
use crate::network::{ModelConfig, StGcnModel};
use crate::normalize::{NormalizeConfig, normalize_with_config};
use crate::results::{Probs, Prediction, REJECTED_LABEL, Speed};
use crate::skeleton::{NODE_CHANNELS, NUM_NODES};
use crate::utils::argmax;
use crate::{verbose, warn};

/// Pack one clip as `(1, 4, fixed_length, 54)`.
///
/// Frames are stored `(frame, node, channel)` and transposed to
/// `(channel, frame, node)`. Clips shorter than `fixed_length` are zero-padded
/// at the end; longer ones are truncated.
#[must_use]
pub fn pack_clip(clip: &Clip, fixed_length: usize) -> Array4<f32> {
    pack_batch(std::slice::from_ref(clip), fixed_length)
}

/// Pack clips as `(N, 4, fixed_length, 54)`, padding or truncating each.
#[must_use]
pub fn pack_batch(clips: &[Clip], fixed_length: usize) -> Array4<f32> {
    let mut batch = Array4::<f32>::zeros((clips.len(), NODE_CHANNELS, fixed_length, NUM_NODES));
    for (mut sample, clip) in batch.outer_iter_mut().zip(clips) {
        let frames = clip.to_array();
        let kept = frames.len_of(Axis(0)).min(fixed_length);
        // (T, V, C) -> (C, T, V)
        let transposed = frames.slice(s![..kept, .., ..]).permuted_axes([2, 0, 1]);
        sample.slice_mut(s![.., ..kept, ..]).assign(&transposed);
    }
    batch
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// ST-GCN sign classifier bound to a label vocabulary.
///
/// Weights are read-only after loading, so one classifier can be shared across
/// threads behind an `Arc`.
#[derive(Clone)]
pub struct SignClassifier {
    model: StGcnModel,
    labels: LabelVocabulary,
    config: ClassifierConfig,
    device: Device,
    weights_path: Option<PathBuf>,
}

impl SignClassifier {
    /// Load a `SafeTensors` checkpoint for `labels`.
    ///
    /// The network is built with one output per label and every checkpoint
    /// parameter must match it exactly.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ModelLoadError`] if the file is missing or does not
    /// match the network, and [`SignError::ConfigError`] for an invalid
    /// configuration or unavailable device.
    pub fn load<P: AsRef<Path>>(weights: P, labels: LabelVocabulary, config: ClassifierConfig) -> Result<Self> {
        let path = weights.as_ref();
        config.validate()?;
        let device = Device::select(config.device)?;

        let start = Instant::now();
        let model = StGcnModel::load(path, ModelConfig::new(labels.len()), &device.to_candle()?)?;
        verbose!(
            "Loaded {} ({} classes, {} parameters) on {device} in {:.1}ms",
            path.display(),
            labels.len(),
            model.param_count(),
            elapsed_ms(start)
        );

        Ok(Self {
            model,
            labels,
            config,
            device,
            weights_path: Some(path.to_path_buf()),
        })
    }

    /// Wrap an already built network.
    ///
    /// Without an explicit device in `config` the classifier runs wherever the
    /// network's tensors live.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ModelLoadError`] if the network's output size does
    /// not equal the vocabulary length, and [`SignError::ConfigError`] for an
    /// invalid configuration or a device the network does not live on.
    pub fn from_model(model: StGcnModel, labels: LabelVocabulary, config: ClassifierConfig) -> Result<Self> {
        config.validate()?;
        if model.num_classes() != labels.len() {
            return Err(SignError::ModelLoadError(format!(
                "Network has {} outputs but the vocabulary has {} labels",
                model.num_classes(),
                labels.len()
            )));
        }
        let device = match config.device {
            Some(requested) => {
                let device = Device::select(Some(requested))?;
                if device.to_candle()?.location() != model.device().location() {
                    return Err(SignError::ConfigError(format!(
                        "Network lives on {} but {device} was requested",
                        Device::from(model.device().location())
                    )));
                }
                device
            }
            None => Device::from(model.device().location()),
        };
        Ok(Self {
            model,
            labels,
            config,
            device,
            weights_path: None,
        })
    }

    /// Classify a normalized clip.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InferenceError`] if the forward pass fails.
    pub fn predict(&self, clip: &Clip) -> Result<Prediction> {
        let mut predictions = self.predict_batch(std::slice::from_ref(clip))?;
        predictions
            .pop()
            .ok_or_else(|| SignError::InferenceError("Forward pass returned no rows".to_string()))
    }

    /// Classify several normalized clips in one forward pass.
    ///
    /// Stage timings are split evenly across the batch.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InferenceError`] if the forward pass fails.
    pub fn predict_batch(&self, clips: &[Clip]) -> Result<Vec<Prediction>> {
        if clips.is_empty() {
            return Ok(Vec::new());
        }

        let start_preprocess = Instant::now();
        for clip in clips.iter().filter(|clip| clip.len() != self.config.num_frames) {
            warn!(
                "Clip has {} frames, expected {}; packing pads or truncates",
                clip.len(),
                self.config.num_frames
            );
        }
        let packed = pack_batch(clips, self.config.num_frames);
        let input = Tensor::from_vec(packed.iter().copied().collect(), packed.dim(), self.model.device())?;
        let preprocess_time = elapsed_ms(start_preprocess);

        let start_inference = Instant::now();
        let logits = self.model.forward(&input)?;
        let inference_time = elapsed_ms(start_inference);

        let start_postprocess = Instant::now();
        let probs = candle_nn::ops::softmax(&logits, D::Minus1)?;
        let mut predictions = logits
            .to_vec2::<f32>()?
            .into_iter()
            .zip(probs.to_vec2::<f32>()?)
            .map(|(row, probs)| self.interpret(Array1::from(row), Array1::from(probs)))
            .collect::<Result<Vec<_>>>()?;
        let postprocess_time = elapsed_ms(start_postprocess);

        #[allow(clippy::cast_precision_loss)]
        let n = clips.len() as f64;
        let speed = Speed::new(preprocess_time / n, inference_time / n, postprocess_time / n);
        for prediction in &mut predictions {
            prediction.speed = speed.clone();
        }
        Ok(predictions)
    }

    /// Label of a normalized clip.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InferenceError`] if the forward pass fails.
    pub fn classify(&self, clip: &Clip) -> Result<String> {
        Ok(self.predict(clip)?.label)
    }

    /// Segment and normalize a raw capture, then classify it.
    ///
    /// Normalization time is included in `speed.preprocess`.
    ///
    /// # Errors
    ///
    /// Returns the segmentation or normalization error for unusable clips, or
    /// [`SignError::InferenceError`] if the forward pass fails.
    pub fn predict_raw(&self, raw: &Clip) -> Result<Prediction> {
        let start = Instant::now();
        let normalize_config = NormalizeConfig::new().with_target_frames(self.config.num_frames);
        let clip = normalize_with_config(raw, &normalize_config)?;
        let normalize_time = elapsed_ms(start);

        let mut prediction = self.predict(&clip)?;
        prediction.speed.preprocess = Some(prediction.speed.preprocess.unwrap_or(0.0) + normalize_time);
        Ok(prediction)
    }

    /// The class is the logit argmax; probabilities only drive confidence.
    fn interpret(&self, logits: Array1<f32>, probs: Array1<f32>) -> Result<Prediction> {
        let class_index = argmax(logits.view())
            .ok_or_else(|| SignError::InferenceError("Forward pass returned no logits".to_string()))?;
        let probs = Probs::new(probs);
        let confidence = probs.data.get(class_index).copied().unwrap_or(0.0);
        let rejected = self
            .config
            .rejection_threshold
            .is_some_and(|threshold| confidence <= threshold);
        let label = if rejected {
            REJECTED_LABEL.to_string()
        } else {
            self.labels
                .get(class_index)
                .ok_or_else(|| SignError::InferenceError(format!("Class index {class_index} has no label")))?
                .to_string()
        };
        Ok(Prediction {
            class_index,
            label,
            probs,
            logits,
            rejected,
            speed: Speed::default(),
        })
    }

    #[must_use]
    pub const fn labels(&self) -> &LabelVocabulary {
        &self.labels
    }

    #[must_use]
    pub const fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    #[must_use]
    pub const fn device(&self) -> Device {
        self.device
    }

    #[must_use]
    pub const fn model(&self) -> &StGcnModel {
        &self.model
    }

    /// Checkpoint the classifier was loaded from, if any.
    #[must_use]
    pub fn weights_path(&self) -> Option<&Path> {
        self.weights_path.as_deref()
    }
}

impl std::fmt::Debug for SignClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignClassifier")
            .field("weights", &self.weights_path)
            .field("num_classes", &self.labels.len())
            .field("device", &self.device)
            .field("num_frames", &self.config.num_frames)
            .finish()
    }
}

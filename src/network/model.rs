// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! The full spatial-temporal graph network.

use std::path::Path;

use candle_core::{Device, Tensor};
use ndarray::{Array2, ArrayView4};
use rand::SeedableRng;
use rand::distr::{Distribution, Uniform};
use rand::rngs::StdRng;

use super::block::{BlockShape, StGcnBlock};
use super::layers::{BatchNorm, Head, ParamInit, ParamSpec, global_average_pool};
use crate::error::{Result, SignError};
use crate::skeleton::{NODE_CHANNELS, NUM_NODES, SPATIAL_KERNEL_SIZE, SkeletonGraph};
use crate::weights::StateDict;

/// Default temporal kernel length.
pub const TEMPORAL_KERNEL_SIZE: usize = 9;

/// Name of the stored adjacency buffer.
pub const ADJACENCY_KEY: &str = "A";

/// Output channels and temporal stride of each block, in order.
pub const BLOCK_LAYOUT: [(usize, usize); 10] = [
    (64, 1),
    (64, 1),
    (64, 1),
    (64, 1),
    (128, 2),
    (128, 1),
    (128, 1),
    (256, 2),
    (256, 1),
    (256, 1),
];

/// Network hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    /// Channels per node in the input tensor.
    pub in_channels: usize,
    /// Size of the output vocabulary.
    pub num_classes: usize,
    pub temporal_kernel_size: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            in_channels: NODE_CHANNELS,
            num_classes: 10,
            temporal_kernel_size: TEMPORAL_KERNEL_SIZE,
        }
    }
}

impl ModelConfig {
    #[must_use]
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn with_in_channels(mut self, channels: usize) -> Self {
        self.in_channels = channels;
        self
    }

    #[must_use]
    pub const fn with_temporal_kernel_size(mut self, size: usize) -> Self {
        self.temporal_kernel_size = size;
        self
    }

    /// Check the configuration describes a buildable network.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ConfigError`] for zero channels or classes, or an
    /// even temporal kernel.
    pub fn validate(&self) -> Result<()> {
        if self.in_channels == 0 {
            return Err(SignError::ConfigError("in_channels must be positive".to_string()));
        }
        if self.num_classes == 0 {
            return Err(SignError::ConfigError("num_classes must be positive".to_string()));
        }
        if self.temporal_kernel_size == 0 || self.temporal_kernel_size % 2 == 0 {
            return Err(SignError::ConfigError(format!(
                "temporal_kernel_size must be odd, got {}",
                self.temporal_kernel_size
            )));
        }
        Ok(())
    }

    /// Shapes of the block stack.
    #[must_use]
    pub fn blocks(&self) -> Vec<BlockShape> {
        let mut in_channels = self.in_channels;
        BLOCK_LAYOUT
            .iter()
            .enumerate()
            .map(|(i, &(out_channels, stride))| {
                let shape = BlockShape::new(in_channels, out_channels, stride);
                in_channels = out_channels;
                if i == 0 { shape.without_residual() } else { shape }
            })
            .collect()
    }

    /// Every learnable parameter of the network, in layer order.
    #[must_use]
    pub fn parameter_specs(&self) -> Vec<ParamSpec> {
        let mut specs = BatchNorm::specs("data_bn", self.in_channels * NUM_NODES);
        for (i, shape) in self.blocks().into_iter().enumerate() {
            specs.extend(StGcnBlock::specs(
                &format!("st_gcn_networks.{i}"),
                shape,
                self.temporal_kernel_size,
                SPATIAL_KERNEL_SIZE,
            ));
        }
        specs.extend(Head::specs("fcn", final_channels(), self.num_classes));
        specs
    }
}

fn final_channels() -> usize {
    BLOCK_LAYOUT[BLOCK_LAYOUT.len() - 1].0
}

/// ST-GCN classifier over the 54-node skeleton.
#[derive(Debug, Clone)]
pub struct StGcnModel {
    config: ModelConfig,
    device: Device,
    /// `(K, V, V)` partition stack.
    partitions: Tensor,
    /// Partitions flattened to `(K * V, V)` for the graph contraction.
    adjacency: Tensor,
    data_bn: BatchNorm,
    blocks: Vec<StGcnBlock>,
    head: Head,
    /// Parameters the layers were built from, for export.
    weights: StateDict,
}

impl StGcnModel {
    /// Build a network with uniformly initialized weights from a fixed seed.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ConfigError`] for an invalid configuration.
    pub fn random(config: ModelConfig, seed: u64, device: &Device) -> Result<Self> {
        config.validate()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let mut dict = StateDict::new();
        for spec in config.parameter_specs() {
            let numel = spec.shape.iter().product::<usize>();
            let data: Vec<f32> = match spec.init {
                ParamInit::Zeros => vec![0.0; numel],
                ParamInit::Ones => vec![1.0; numel],
                ParamInit::Uniform { fan_in } => {
                    let bound = 1.0 / (fan_in.max(1) as f32).sqrt();
                    let dist = Uniform::new_inclusive(-bound, bound)
                        .map_err(|e| SignError::ConfigError(format!("Invalid init range for '{}': {e}", spec.name)))?;
                    (0..numel).map(|_| dist.sample(&mut rng)).collect()
                }
            };
            dict.insert(spec.name, Tensor::from_vec(data, spec.shape, device)?);
        }
        Self::from_state_dict(config, dict, device)
    }

    /// Build a network from named parameters.
    ///
    /// Every parameter named by [`ModelConfig::parameter_specs`] must be present
    /// with its exact shape, and nothing else may be left over. A stored
    /// adjacency buffer, if any, must match the skeleton graph.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ModelLoadError`] on any missing, extra or
    /// mis-shaped parameter, and [`SignError::ConfigError`] for an invalid
    /// configuration.
    pub fn from_state_dict(config: ModelConfig, mut dict: StateDict, device: &Device) -> Result<Self> {
        config.validate()?;
        let graph = SkeletonGraph::new().partitions();
        let partitions = Tensor::from_vec(graph.iter().copied().collect(), graph.dim(), device)?;

        if let Some(stored) = dict.remove(ADJACENCY_KEY) {
            check_adjacency(&stored, graph.iter().copied())?;
        }

        let specs = config.parameter_specs();
        dict.ensure_exact(specs.iter().map(|spec| (spec.name.as_str(), spec.shape.as_slice())))?;

        Self::build(config, partitions, dict, device)
            .map_err(|e| SignError::ModelLoadError(format!("Failed to build network: {e}")))
    }

    fn build(
        config: ModelConfig,
        partitions: Tensor,
        weights: StateDict,
        device: &Device,
    ) -> candle_core::Result<Self> {
        let vb = weights.clone().into_var_builder(device);
        let data_bn = BatchNorm::load(config.in_channels * NUM_NODES, vb.pp("data_bn"))?;
        let stack = vb.pp("st_gcn_networks");
        let blocks = config
            .blocks()
            .into_iter()
            .enumerate()
            .map(|(i, shape)| {
                StGcnBlock::load(
                    shape,
                    config.temporal_kernel_size,
                    SPATIAL_KERNEL_SIZE,
                    stack.pp(i.to_string()),
                )
            })
            .collect::<candle_core::Result<Vec<_>>>()?;
        let head = Head::load(final_channels(), config.num_classes, vb.pp("fcn"))?;
        let (k, v, _) = partitions.dims3()?;
        let adjacency = partitions.reshape((k * v, v))?;

        Ok(Self {
            config,
            device: device.clone(),
            partitions,
            adjacency,
            data_bn,
            blocks,
            head,
            weights,
        })
    }

    /// Load a `SafeTensors` checkpoint onto `device`.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ModelLoadError`] if the file cannot be read or does
    /// not match `config`.
    pub fn load<P: AsRef<Path>>(path: P, config: ModelConfig, device: &Device) -> Result<Self> {
        let path = path.as_ref();
        let dict = StateDict::load(path, device)?;
        Self::from_state_dict(config, dict, device).map_err(|e| match e {
            SignError::ModelLoadError(msg) => SignError::ModelLoadError(format!("{}: {msg}", path.display())),
            other => other,
        })
    }

    /// Export every parameter plus the adjacency buffer.
    #[must_use]
    pub fn to_state_dict(&self) -> StateDict {
        let mut dict = self.weights.clone();
        dict.insert(ADJACENCY_KEY, self.partitions.clone());
        dict
    }

    /// Write a `SafeTensors` checkpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.to_state_dict().save(path)
    }

    #[must_use]
    pub const fn config(&self) -> &ModelConfig {
        &self.config
    }

    #[must_use]
    pub const fn device(&self) -> &Device {
        &self.device
    }

    #[must_use]
    pub const fn num_classes(&self) -> usize {
        self.head.num_classes()
    }

    /// Number of learnable parameters.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.weights.param_count()
    }

    /// Logits `(N, classes)` for a batch shaped `(N, C, T, V)`.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::InferenceError`] if the channel or node count does
    /// not match, or the batch is empty.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let dims = x.dims4()?;
        let (batch, channels, frames, nodes) = dims;
        if channels != self.config.in_channels {
            return Err(SignError::InferenceError(format!(
                "Expected {} input channels, got {channels}",
                self.config.in_channels
            )));
        }
        if nodes != NUM_NODES {
            return Err(SignError::InferenceError(format!(
                "Expected {NUM_NODES} nodes, got {nodes}"
            )));
        }
        if batch == 0 || frames == 0 {
            return Err(SignError::InferenceError(format!("Empty input batch of shape {dims:?}")));
        }

        let mut features = self.data_bn.forward_node_features(x)?;
        for block in &self.blocks {
            features = block.forward(&features, &self.adjacency)?;
        }
        let pooled = global_average_pool(&features)?;
        Ok(self.head.forward(&pooled)?)
    }

    /// [`Self::forward`] for a host array, copied to the model's device.
    ///
    /// # Errors
    ///
    /// Same as [`Self::forward`].
    pub fn forward_array(&self, x: ArrayView4<'_, f32>) -> Result<Array2<f32>> {
        let input = Tensor::from_vec(x.iter().copied().collect(), x.dim(), &self.device)?;
        let logits = self.forward(&input)?;
        let (rows, cols) = logits.dims2()?;
        let data = logits.flatten_all()?.to_vec1::<f32>()?;
        Ok(Array2::from_shape_vec((rows, cols), data)?)
    }
}

/// Compare a stored adjacency buffer against the skeleton graph.
fn check_adjacency(stored: &Tensor, expected: impl ExactSizeIterator<Item = f32>) -> Result<()> {
    let shape = (SPATIAL_KERNEL_SIZE, NUM_NODES, NUM_NODES);
    if stored.dims() != [shape.0, shape.1, shape.2] {
        return Err(SignError::ModelLoadError(format!(
            "Parameter '{ADJACENCY_KEY}' has shape {:?}, expected {shape:?}",
            stored.dims()
        )));
    }
    let values = stored.flatten_all()?.to_vec1::<f32>()?;
    let matches = values.len() == expected.len() && values.iter().zip(expected).all(|(a, b)| (a - b).abs() <= 1e-6);
    if matches {
        Ok(())
    } else {
        Err(SignError::ModelLoadError(
            "Checkpoint adjacency does not match the skeleton graph".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array4, s};

    fn input(batch: usize, frames: usize) -> Array4<f32> {
        Array4::from_shape_fn((batch, NODE_CHANNELS, frames, NUM_NODES), |(n, c, t, v)| {
            ((n * 7 + c * 3 + t + v) % 11) as f32 / 11.0
        })
    }

    fn random(classes: usize, seed: u64) -> StGcnModel {
        StGcnModel::random(ModelConfig::new(classes), seed, &Device::Cpu).unwrap()
    }

    #[test]
    fn test_block_layout() {
        let blocks = ModelConfig::default().blocks();
        assert_eq!(blocks.len(), 10);
        assert_eq!(blocks[0], BlockShape::new(4, 64, 1).without_residual());
        assert_eq!(blocks[4], BlockShape::new(64, 128, 2));
        assert_eq!(blocks[7], BlockShape::new(128, 256, 2));
        assert_eq!(blocks[9], BlockShape::new(256, 256, 1));
    }

    #[test]
    fn test_config_validation() {
        assert!(ModelConfig::new(0).validate().is_err());
        assert!(ModelConfig::new(10).with_temporal_kernel_size(8).validate().is_err());
        assert!(ModelConfig::new(10).with_in_channels(0).validate().is_err());
        assert!(ModelConfig::default().validate().is_ok());
    }

    #[test]
    fn test_forward_shape_and_determinism() {
        let model = random(10, 7);
        let x = input(2, 20);
        let first = model.forward_array(x.view()).unwrap();
        let second = model.forward_array(x.view()).unwrap();
        assert_eq!(first.dim(), (2, 10));
        assert_eq!(first, second);
        assert!(first.iter().all(|v| v.is_finite()));

        let same_seed = random(10, 7);
        assert_eq!(same_seed.forward_array(x.view()).unwrap(), first);
    }

    #[test]
    fn test_batch_rows_are_independent() {
        let model = random(5, 1);
        let x = input(3, 20);
        let batched = model.forward_array(x.view()).unwrap();
        let single = model.forward_array(x.slice(s![1..2, .., .., ..])).unwrap();
        for (a, b) in batched.row(1).iter().zip(single.row(0).iter()) {
            assert!((a - b).abs() < 1e-4);
        }
    }

    #[test]
    fn test_forward_rejects_wrong_layout() {
        let model = random(3, 0);
        let wrong_channels = Array4::<f32>::zeros((1, 3, 60, NUM_NODES));
        assert!(matches!(
            model.forward_array(wrong_channels.view()),
            Err(SignError::InferenceError(_))
        ));
        let wrong_nodes = Array4::<f32>::zeros((1, 4, 60, 50));
        assert!(model.forward_array(wrong_nodes.view()).is_err());
        let flat = Tensor::zeros((4, 60), candle_core::DType::F32, &Device::Cpu).unwrap();
        assert!(model.forward(&flat).is_err());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        let model = random(4, 3);
        model.save(&path).unwrap();

        let loaded = StGcnModel::load(&path, ModelConfig::new(4), &Device::Cpu).unwrap();
        let x = input(1, 30);
        assert_eq!(loaded.forward_array(x.view()).unwrap(), model.forward_array(x.view()).unwrap());
        assert_eq!(loaded.param_count(), model.param_count());
        let expected: usize = ModelConfig::new(4)
            .parameter_specs()
            .iter()
            .map(|spec| spec.shape.iter().product::<usize>())
            .sum();
        assert_eq!(model.param_count(), expected);
    }

    #[test]
    fn test_load_rejects_class_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.safetensors");
        random(4, 3).save(&path).unwrap();

        let err = StGcnModel::load(&path, ModelConfig::new(10), &Device::Cpu).unwrap_err();
        assert!(matches!(err, SignError::ModelLoadError(_)));
        assert!(err.to_string().contains("fcn.weight"));
    }

    #[test]
    fn test_rejects_foreign_adjacency_and_extra_keys() {
        let model = random(2, 5);

        let mut dict = model.to_state_dict();
        let adjacency = dict.remove(ADJACENCY_KEY).unwrap();
        let mut values = adjacency.flatten_all().unwrap().to_vec1::<f32>().unwrap();
        values[53] = 1.0;
        let foreign = Tensor::from_vec(values, adjacency.dims(), &Device::Cpu).unwrap();
        dict.insert(ADJACENCY_KEY, foreign);
        assert!(StGcnModel::from_state_dict(ModelConfig::new(2), dict, &Device::Cpu).is_err());

        let mut dict = model.to_state_dict();
        dict.insert("edge_importance.0", Tensor::zeros(1, candle_core::DType::F32, &Device::Cpu).unwrap());
        let err = StGcnModel::from_state_dict(ModelConfig::new(2), dict, &Device::Cpu).unwrap_err();
        assert!(err.to_string().contains("edge_importance.0"));

        let mut dict = model.to_state_dict();
        dict.remove(ADJACENCY_KEY);
        assert!(StGcnModel::from_state_dict(ModelConfig::new(2), dict, &Device::Cpu).is_ok());
    }
}

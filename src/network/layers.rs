// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Inference-mode layers over `(N, C, T, V)` tensors.
//!
//! Layers are built from a [`VarBuilder`] scoped to their parameter prefix.
//! Each layer also lists its parameters as [`ParamSpec`]s, so strict
//! checkpoint validation and random initialization share one naming scheme.

use candle_core::{Module, ModuleT, Result, Tensor};
use candle_nn::{BatchNormConfig, Conv1d, Conv1dConfig, Conv2d, Conv2dConfig, VarBuilder};

/// Batch-norm epsilon used at training time.
pub const BN_EPS: f64 = 1e-5;

/// How a parameter is initialized when no checkpoint is available.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamInit {
    /// Uniform in `±1/sqrt(fan_in)`.
    Uniform { fan_in: usize },
    Zeros,
    Ones,
}

/// Name, shape and initializer of one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub shape: Vec<usize>,
    pub init: ParamInit,
}

impl ParamSpec {
    fn new(prefix: &str, suffix: &str, shape: Vec<usize>, init: ParamInit) -> Self {
        Self {
            name: format!("{prefix}.{suffix}"),
            shape,
            init,
        }
    }
}

fn conv_specs(prefix: &str, weight: Vec<usize>, fan_in: usize) -> Vec<ParamSpec> {
    let init = ParamInit::Uniform { fan_in };
    let out_channels = weight[0];
    vec![
        ParamSpec::new(prefix, "weight", weight, init),
        ParamSpec::new(prefix, "bias", vec![out_channels], init),
    ]
}

/// Batch normalization over dim 1 using running statistics.
#[derive(Debug, Clone)]
pub struct BatchNorm {
    inner: candle_nn::BatchNorm,
    features: usize,
}

impl BatchNorm {
    /// Parameters of a batch norm over `features` channels.
    #[must_use]
    pub fn specs(prefix: &str, features: usize) -> Vec<ParamSpec> {
        vec![
            ParamSpec::new(prefix, "weight", vec![features], ParamInit::Ones),
            ParamSpec::new(prefix, "bias", vec![features], ParamInit::Zeros),
            ParamSpec::new(prefix, "running_mean", vec![features], ParamInit::Zeros),
            ParamSpec::new(prefix, "running_var", vec![features], ParamInit::Ones),
        ]
    }

    pub fn load(features: usize, vb: VarBuilder) -> Result<Self> {
        let config = BatchNormConfig {
            eps: BN_EPS,
            ..Default::default()
        };
        Ok(Self {
            inner: candle_nn::batch_norm(features, config, vb)?,
            features,
        })
    }

    #[must_use]
    pub const fn features(&self) -> usize {
        self.features
    }

    /// Normalize along the channel axis of `(N, C, ...)`.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        self.inner.forward_t(x, false)
    }

    /// Normalize each `(channel, node)` pair of `(N, C, T, V)` as its own feature.
    ///
    /// Feature index is `c * V + v`, statistics are shared over batch and time.
    pub fn forward_node_features(&self, x: &Tensor) -> Result<Tensor> {
        let (n, c, t, v) = x.dims4()?;
        let flat = x.permute((0, 1, 3, 2))?.contiguous()?.reshape((n, c * v, t))?;
        self.forward(&flat)?
            .reshape((n, c, v, t))?
            .permute((0, 1, 3, 2))?
            .contiguous()
    }
}

/// Convolution along the time axis only, kernel `(k, 1)`.
///
/// The stored weight is `(out, in, k, 1)`; it runs as a 1d convolution over
/// every node's sequence.
#[derive(Debug, Clone)]
pub struct TemporalConv {
    conv: Conv1d,
    kernel_size: usize,
    stride: usize,
    padding: usize,
}

impl TemporalConv {
    /// Parameters of a `(kernel, 1)` convolution.
    #[must_use]
    pub fn specs(prefix: &str, in_channels: usize, out_channels: usize, kernel: usize) -> Vec<ParamSpec> {
        conv_specs(prefix, vec![out_channels, in_channels, kernel, 1], in_channels * kernel)
    }

    /// Padding keeps the length at stride 1.
    pub fn load(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        vb: VarBuilder,
    ) -> Result<Self> {
        let weight = vb.get((out_channels, in_channels, kernel_size, 1), "weight")?.squeeze(3)?;
        let bias = vb.get(out_channels, "bias")?;
        let stride = stride.max(1);
        let padding = kernel_size.saturating_sub(1) / 2;
        let config = Conv1dConfig {
            padding,
            stride,
            ..Default::default()
        };
        Ok(Self {
            conv: Conv1d::new(weight, Some(bias), config),
            kernel_size,
            stride,
            padding,
        })
    }

    #[must_use]
    pub const fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    /// Output length for `frames` input frames.
    #[must_use]
    pub fn output_frames(&self, frames: usize) -> Option<usize> {
        (frames + 2 * self.padding)
            .checked_sub(self.kernel_size)
            .map(|span| span / self.stride + 1)
    }

    /// Zero-padded strided convolution along T.
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        let (n, c, t, v) = x.dims4()?;
        let sequences = x.permute((0, 3, 1, 2))?.contiguous()?.reshape((n * v, c, t))?;
        let y = self.conv.forward(&sequences)?;
        let (_, out_channels, frames) = y.dims3()?;
        y.reshape((n, v, out_channels, frames))?.permute((0, 2, 3, 1))?.contiguous()
    }
}

/// Spatial graph convolution: 1x1 projection to `K * C_out` channels, then a
/// contraction of each partition against its adjacency, summed over `K`.
#[derive(Debug, Clone)]
pub struct GraphConv {
    conv: Conv2d,
    kernel_size: usize,
    out_channels: usize,
}

impl GraphConv {
    /// Parameters under `prefix.conv`.
    #[must_use]
    pub fn specs(prefix: &str, in_channels: usize, out_channels: usize, kernel_size: usize) -> Vec<ParamSpec> {
        conv_specs(
            &format!("{prefix}.conv"),
            vec![out_channels * kernel_size, in_channels, 1, 1],
            in_channels,
        )
    }

    /// Read the projection under `conv`.
    pub fn load(in_channels: usize, out_channels: usize, kernel_size: usize, vb: VarBuilder) -> Result<Self> {
        let conv = candle_nn::conv2d(
            in_channels,
            out_channels * kernel_size,
            1,
            Conv2dConfig::default(),
            vb.pp("conv"),
        )?;
        Ok(Self {
            conv,
            kernel_size,
            out_channels,
        })
    }

    #[must_use]
    pub const fn out_channels(&self) -> usize {
        self.out_channels
    }

    /// `out[n, c, t, w] = sum_k sum_v y[n, k, c, t, v] * A[k, v, w]`.
    ///
    /// `adjacency` is the `(K, V, V)` partition stack flattened to `(K * V, V)`.
    pub fn forward(&self, x: &Tensor, adjacency: &Tensor) -> Result<Tensor> {
        let y = self.conv.forward(x)?;
        let (n, _, t, v) = y.dims4()?;
        let (k, c) = (self.kernel_size, self.out_channels);
        // Rows ordered (n, c, t), columns (k, v).
        let rows = y
            .reshape((n, k, c, t, v))?
            .permute((0, 2, 3, 1, 4))?
            .contiguous()?
            .reshape((n * c * t, k * v))?;
        rows.matmul(adjacency)?.reshape((n, c, t, v))
    }
}

/// Global average over the time and node axes, `(N, C, T, V) -> (N, C)`.
pub fn global_average_pool(x: &Tensor) -> Result<Tensor> {
    x.flatten_from(2)?.mean(2)
}

/// 1x1 classification head applied to pooled features, `(N, C) -> (N, classes)`.
#[derive(Debug, Clone)]
pub struct Head {
    conv: Conv2d,
    num_classes: usize,
}

impl Head {
    #[must_use]
    pub fn specs(prefix: &str, in_channels: usize, num_classes: usize) -> Vec<ParamSpec> {
        conv_specs(prefix, vec![num_classes, in_channels, 1, 1], in_channels)
    }

    pub fn load(in_channels: usize, num_classes: usize, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            conv: candle_nn::conv2d(in_channels, num_classes, 1, Conv2dConfig::default(), vb)?,
            num_classes,
        })
    }

    #[must_use]
    pub const fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Logits for pooled features.
    pub fn forward(&self, pooled: &Tensor) -> Result<Tensor> {
        let (n, c) = pooled.dims2()?;
        self.conv.forward(&pooled.reshape((n, c, 1, 1))?)?.reshape((n, self.num_classes))
    }
}

// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use candle_core::{Result, Tensor};
use candle_nn::VarBuilder;

use super::layers::{BatchNorm, GraphConv, ParamSpec, TemporalConv};

/// Shortcut added to a block's output.
#[derive(Debug, Clone)]
pub enum Residual {
    /// No shortcut (first block of the stack).
    None,
    /// Raw input, when channels and stride are unchanged.
    Identity,
    /// 1x1 strided convolution followed by batch norm.
    Projection { conv: TemporalConv, bn: BatchNorm },
}

/// Which shortcut a block of the given shape uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResidualKind {
    None,
    Identity,
    Projection,
}

/// Shape of one spatial-temporal block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockShape {
    pub in_channels: usize,
    pub out_channels: usize,
    pub stride: usize,
    pub residual: bool,
}

impl BlockShape {
    #[must_use]
    pub const fn new(in_channels: usize, out_channels: usize, stride: usize) -> Self {
        Self {
            in_channels,
            out_channels,
            stride,
            residual: true,
        }
    }

    /// Same shape with the shortcut disabled.
    #[must_use]
    pub const fn without_residual(mut self) -> Self {
        self.residual = false;
        self
    }

    #[must_use]
    pub const fn residual_kind(&self) -> ResidualKind {
        if !self.residual {
            ResidualKind::None
        } else if self.in_channels == self.out_channels && self.stride == 1 {
            ResidualKind::Identity
        } else {
            ResidualKind::Projection
        }
    }
}

/// Graph convolution followed by a temporal convolution unit, plus shortcut.
#[derive(Debug, Clone)]
pub struct StGcnBlock {
    shape: BlockShape,
    gcn: GraphConv,
    tcn_bn_in: BatchNorm,
    tcn_conv: TemporalConv,
    tcn_bn_out: BatchNorm,
    residual: Residual,
}

impl StGcnBlock {
    /// Parameter names and shapes of a block under `prefix`.
    #[must_use]
    pub fn specs(prefix: &str, shape: BlockShape, temporal_kernel: usize, spatial_kernel: usize) -> Vec<ParamSpec> {
        let BlockShape {
            in_channels,
            out_channels,
            ..
        } = shape;
        let mut specs = GraphConv::specs(&format!("{prefix}.gcn"), in_channels, out_channels, spatial_kernel);
        specs.extend(BatchNorm::specs(&format!("{prefix}.tcn.0"), out_channels));
        specs.extend(TemporalConv::specs(
            &format!("{prefix}.tcn.2"),
            out_channels,
            out_channels,
            temporal_kernel,
        ));
        specs.extend(BatchNorm::specs(&format!("{prefix}.tcn.3"), out_channels));
        if shape.residual_kind() == ResidualKind::Projection {
            specs.extend(TemporalConv::specs(
                &format!("{prefix}.residual.0"),
                in_channels,
                out_channels,
                1,
            ));
            specs.extend(BatchNorm::specs(&format!("{prefix}.residual.1"), out_channels));
        }
        specs
    }

    /// Build a block from the parameters under `vb`.
    pub fn load(shape: BlockShape, temporal_kernel: usize, spatial_kernel: usize, vb: VarBuilder) -> Result<Self> {
        let BlockShape {
            in_channels,
            out_channels,
            stride,
            ..
        } = shape;
        let gcn = GraphConv::load(in_channels, out_channels, spatial_kernel, vb.pp("gcn"))?;
        let tcn = vb.pp("tcn");
        let tcn_bn_in = BatchNorm::load(out_channels, tcn.pp("0"))?;
        let tcn_conv = TemporalConv::load(out_channels, out_channels, temporal_kernel, stride, tcn.pp("2"))?;
        let tcn_bn_out = BatchNorm::load(out_channels, tcn.pp("3"))?;
        let residual = match shape.residual_kind() {
            ResidualKind::None => Residual::None,
            ResidualKind::Identity => Residual::Identity,
            ResidualKind::Projection => {
                let vb = vb.pp("residual");
                Residual::Projection {
                    conv: TemporalConv::load(in_channels, out_channels, 1, stride, vb.pp("0"))?,
                    bn: BatchNorm::load(out_channels, vb.pp("1"))?,
                }
            }
        };
        Ok(Self {
            shape,
            gcn,
            tcn_bn_in,
            tcn_conv,
            tcn_bn_out,
            residual,
        })
    }

    #[must_use]
    pub const fn shape(&self) -> BlockShape {
        self.shape
    }

    #[must_use]
    pub const fn residual(&self) -> &Residual {
        &self.residual
    }

    /// Run the block. Dropout is inactive at inference and omitted.
    pub fn forward(&self, x: &Tensor, adjacency: &Tensor) -> Result<Tensor> {
        let y = self.gcn.forward(x, adjacency)?;
        let y = self.tcn_bn_in.forward(&y)?.relu()?;
        let y = self.tcn_bn_out.forward(&self.tcn_conv.forward(&y)?)?;

        let y = match &self.residual {
            Residual::None => y,
            Residual::Identity => (y + x)?,
            Residual::Projection { conv, bn } => (y + bn.forward(&conv.forward(x)?)?)?,
        };
        y.relu()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device};
    use std::collections::HashMap;

    #[test]
    fn test_residual_kind() {
        assert_eq!(BlockShape::new(4, 64, 1).without_residual().residual_kind(), ResidualKind::None);
        assert_eq!(BlockShape::new(64, 64, 1).residual_kind(), ResidualKind::Identity);
        assert_eq!(BlockShape::new(64, 128, 2).residual_kind(), ResidualKind::Projection);
        assert_eq!(BlockShape::new(64, 64, 2).residual_kind(), ResidualKind::Projection);
    }

    #[test]
    fn test_specs_follow_layer_names() {
        let names: Vec<String> = StGcnBlock::specs("st_gcn_networks.4", BlockShape::new(64, 128, 2), 9, 3)
            .into_iter()
            .map(|spec| spec.name)
            .collect();
        assert!(names.contains(&"st_gcn_networks.4.gcn.conv.weight".to_string()));
        assert!(names.contains(&"st_gcn_networks.4.tcn.2.bias".to_string()));
        assert!(names.contains(&"st_gcn_networks.4.residual.1.running_var".to_string()));
        // gcn 2 + bn 4 + tconv 2 + bn 4 + residual conv 2 + residual bn 4
        assert_eq!(names.len(), 18);

        let identity = StGcnBlock::specs("b", BlockShape::new(64, 64, 1), 9, 3);
        assert_eq!(identity.len(), 12);
        let gcn_weight = &identity[0];
        assert_eq!(gcn_weight.shape, vec![192, 64, 1, 1]);
    }

    #[test]
    fn test_projection_block_halves_time() {
        let shape = BlockShape::new(2, 4, 2);
        let tensors: HashMap<String, Tensor> = StGcnBlock::specs("b", shape, 3, 1)
            .into_iter()
            .map(|spec| {
                let value = if spec.name.ends_with("running_var") { 1.0_f32 } else { 0.1 };
                let tensor = Tensor::full(value, spec.shape, &Device::Cpu).unwrap();
                (spec.name, tensor)
            })
            .collect();
        let vb = VarBuilder::from_tensors(tensors, DType::F32, &Device::Cpu);
        let block = StGcnBlock::load(shape, 3, 1, vb.pp("b")).unwrap();
        assert!(matches!(block.residual(), Residual::Projection { .. }));

        let x = Tensor::ones((1, 2, 10, 5), DType::F32, &Device::Cpu).unwrap();
        let adjacency = Tensor::eye(5, DType::F32, &Device::Cpu).unwrap();
        let y = block.forward(&x, &adjacency).unwrap();
        assert_eq!(y.dims(), &[1, 4, 5, 5]);
    }
}

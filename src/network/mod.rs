// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Spatial-temporal graph convolutional network.
//!
//! Built on `candle`. Tensors are laid out `(batch, channels, frames, nodes)`.
//! The network runs in inference mode only: batch norms use their running
//! statistics and dropout is a no-op.

mod block;
mod layers;
mod model;

pub use block::{BlockShape, Residual, ResidualKind, StGcnBlock};
pub use layers::{BN_EPS, BatchNorm, GraphConv, Head, ParamInit, ParamSpec, TemporalConv, global_average_pool};
pub use model::{ADJACENCY_KEY, BLOCK_LAYOUT, ModelConfig, StGcnModel, TEMPORAL_KERNEL_SIZE};

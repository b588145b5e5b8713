// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Checkpoint state dictionaries.
//!
//! Weights are stored as `SafeTensors` files keyed by layer name
//! (`data_bn.weight`, `st_gcn_networks.3.tcn.2.weight`, `fcn.bias`, ...).
//! Training checkpoints that nest the parameters under `model_state_dict.`
//! are accepted as well; any other top-level entries are then ignored.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;

use crate::error::{Result, SignError};

/// Key prefix used by training checkpoints.
pub const STATE_DICT_PREFIX: &str = "model_state_dict.";

/// Batch-norm step counters carried by training checkpoints, never used here.
const IGNORED_SUFFIX: &str = "num_batches_tracked";

/// Named `f32` tensors of a model.
#[derive(Debug, Clone, Default)]
pub struct StateDict {
    tensors: HashMap<String, Tensor>,
}

impl StateDict {
    /// Create an empty state dict.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a `SafeTensors` checkpoint onto `device`.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ModelLoadError`] if the file is missing, is not a
    /// valid `SafeTensors` file, or holds non-`f32` parameters.
    pub fn load<P: AsRef<Path>>(path: P, device: &Device) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(SignError::ModelLoadError(format!(
                "Weights file not found: {}",
                path.display()
            )));
        }
        let tensors = candle_core::safetensors::load(path, device)
            .map_err(|e| SignError::ModelLoadError(format!("{}: {e}", path.display())))?;
        Self::from_checkpoint(tensors)
            .map_err(|e| SignError::ModelLoadError(format!("{}: {e}", path.display())))
    }

    /// Parse a `SafeTensors` buffer onto `device`.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ModelLoadError`] for malformed buffers or
    /// unsupported dtypes.
    pub fn from_bytes(bytes: &[u8], device: &Device) -> Result<Self> {
        let tensors = candle_core::safetensors::load_buffer(bytes, device)
            .map_err(|e| SignError::ModelLoadError(format!("Failed to parse SafeTensors: {e}")))?;
        Self::from_checkpoint(tensors)
    }

    /// Strip the training prefix, drop step counters and require `f32`.
    fn from_checkpoint(raw: HashMap<String, Tensor>) -> Result<Self> {
        let nested = raw.keys().any(|name| name.starts_with(STATE_DICT_PREFIX));

        let mut tensors = HashMap::with_capacity(raw.len());
        for (name, tensor) in raw {
            let key = if nested {
                match name.strip_prefix(STATE_DICT_PREFIX) {
                    Some(key) => key.to_string(),
                    None => continue,
                }
            } else {
                name
            };
            if key.ends_with(IGNORED_SUFFIX) {
                continue;
            }
            if tensor.dtype() != DType::F32 {
                return Err(SignError::ModelLoadError(format!(
                    "Tensor '{key}' has dtype {:?}, expected F32",
                    tensor.dtype()
                )));
            }
            tensors.insert(key, tensor);
        }
        Ok(Self { tensors })
    }

    /// Write as a `SafeTensors` file.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::IoError`] if serialization or the write fails.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        candle_core::safetensors::save(&self.tensors, path)
            .map_err(|e| SignError::IoError(format!("Failed to write {}: {e}", path.display())))
    }

    /// Insert or replace a tensor.
    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(name.into(), tensor);
    }

    /// Tensor by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    /// Remove a tensor by name.
    pub fn remove(&mut self, name: &str) -> Option<Tensor> {
        self.tensors.remove(name)
    }

    /// Tensor names in sorted order.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tensors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    /// Total number of scalar parameters.
    #[must_use]
    pub fn param_count(&self) -> usize {
        self.tensors.values().map(Tensor::elem_count).sum()
    }

    /// Require exactly the `expected` names, each with its exact shape.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ModelLoadError`] naming the first missing or
    /// mis-shaped parameter, or listing every unexpected one.
    pub fn ensure_exact<'a, I>(&self, expected: I) -> Result<()>
    where
        I: IntoIterator<Item = (&'a str, &'a [usize])>,
    {
        let mut seen = HashSet::new();
        for (name, shape) in expected {
            let tensor = self
                .tensors
                .get(name)
                .ok_or_else(|| SignError::ModelLoadError(format!("Missing parameter '{name}'")))?;
            if tensor.dims() != shape {
                return Err(SignError::ModelLoadError(format!(
                    "Parameter '{name}' has shape {:?}, expected {shape:?}",
                    tensor.dims()
                )));
            }
            seen.insert(name);
        }

        let unexpected: Vec<&str> = self.names().into_iter().filter(|name| !seen.contains(name)).collect();
        if unexpected.is_empty() {
            Ok(())
        } else {
            Err(SignError::ModelLoadError(format!(
                "Unexpected parameters in checkpoint: {}",
                unexpected.join(", ")
            )))
        }
    }

    /// Hand the tensors to a [`VarBuilder`] for layer construction.
    #[must_use]
    pub fn into_var_builder(self, device: &Device) -> VarBuilder<'static> {
        VarBuilder::from_tensors(self.tensors, DType::F32, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StateDict {
        let mut dict = StateDict::new();
        dict.insert("fcn.bias", Tensor::new(&[0.5_f32, -1.0], &Device::Cpu).unwrap());
        dict.insert(
            "fcn.weight",
            Tensor::arange(0_f32, 6.0, &Device::Cpu).unwrap().reshape((2, 3)).unwrap(),
        );
        dict
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dict.safetensors");
        let dict = sample();
        dict.save(&path).unwrap();

        let restored = StateDict::load(&path, &Device::Cpu).unwrap();
        assert_eq!(restored.names(), vec!["fcn.bias", "fcn.weight"]);
        assert_eq!(restored.param_count(), 8);
        let weight = restored.get("fcn.weight").unwrap().to_vec2::<f32>().unwrap();
        assert_eq!(weight, vec![vec![0.0, 1.0, 2.0], vec![3.0, 4.0, 5.0]]);
    }

    #[test]
    fn test_nested_checkpoint_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.safetensors");
        let mut nested = StateDict::new();
        let one = Tensor::new(&[1.0_f32], &Device::Cpu).unwrap();
        nested.insert("model_state_dict.fcn.bias", one.clone());
        nested.insert("model_state_dict.data_bn.num_batches_tracked", one.clone());
        nested.insert("optimizer_state_dict.lr", one);
        nested.save(&path).unwrap();

        let dict = StateDict::load(&path, &Device::Cpu).unwrap();
        assert_eq!(dict.names(), vec!["fcn.bias"]);
    }

    #[test]
    fn test_non_f32_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f64.safetensors");
        let mut dict = StateDict::new();
        dict.insert("fcn.bias", Tensor::new(&[1.0_f64], &Device::Cpu).unwrap());
        dict.save(&path).unwrap();

        let err = StateDict::load(&path, &Device::Cpu).unwrap_err();
        assert!(matches!(err, SignError::ModelLoadError(ref msg) if msg.contains("F32")));
    }

    #[test]
    fn test_ensure_exact() {
        let dict = sample();
        let bias: &[usize] = &[2];
        let weight: &[usize] = &[2, 3];
        assert!(dict.ensure_exact([("fcn.bias", bias), ("fcn.weight", weight)]).is_ok());

        let transposed: &[usize] = &[3, 2];
        let err = dict.ensure_exact([("fcn.bias", bias), ("fcn.weight", transposed)]).unwrap_err();
        assert!(err.to_string().contains("fcn.weight"));

        let err = dict.ensure_exact([("fcn.bias", bias), ("data_bn.bias", bias)]).unwrap_err();
        assert!(err.to_string().contains("Missing parameter 'data_bn.bias'"));

        let err = dict.ensure_exact([("fcn.bias", bias)]).unwrap_err();
        assert!(err.to_string().contains("Unexpected parameters in checkpoint: fcn.weight"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = StateDict::load("/nonexistent/weights.safetensors", &Device::Cpu).unwrap_err();
        assert!(matches!(err, SignError::ModelLoadError(_)));
    }

    #[test]
    fn test_garbage_bytes() {
        assert!(matches!(
            StateDict::from_bytes(b"not a checkpoint", &Device::Cpu),
            Err(SignError::ModelLoadError(_))
        ));
    }
}

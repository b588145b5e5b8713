// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! Compute device selection.
//!
//! CUDA and Metal are usable when the crate is built with the `cuda` or
//! `metal` feature and the hardware is present; the CPU always is.

use std::fmt;
use std::str::FromStr;

use candle_core::utils::{cuda_is_available, metal_is_available};

use crate::error::{Result, SignError};

/// Compute device for inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Device {
    #[default]
    Cpu,
    /// NVIDIA GPU with the given index.
    Cuda(usize),
    /// Apple Metal Performance Shaders.
    Mps,
}

impl Device {
    /// Whether this build can run on the device.
    #[must_use]
    pub fn is_available(&self) -> bool {
        match self {
            Self::Cpu => true,
            Self::Cuda(index) => cuda_is_available() && candle_core::Device::new_cuda(*index).is_ok(),
            Self::Mps => metal_is_available() && candle_core::Device::new_metal(0).is_ok(),
        }
    }

    /// Every device this build can run on, preferred first.
    #[must_use]
    pub fn available() -> Vec<Self> {
        [Self::Cuda(0), Self::Mps]
            .into_iter()
            .filter(Self::is_available)
            .chain(std::iter::once(Self::Cpu))
            .collect()
    }

    /// The tensor backend device.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ConfigError`] if the backend cannot open the device.
    pub fn to_candle(&self) -> Result<candle_core::Device> {
        let device = match self {
            Self::Cpu => Ok(candle_core::Device::Cpu),
            Self::Cuda(index) => candle_core::Device::new_cuda(*index),
            Self::Mps => candle_core::Device::new_metal(0),
        };
        device.map_err(|e| SignError::ConfigError(format!("Cannot open device '{self}': {e}")))
    }

    /// Resolve an explicit request, or pick the first available device.
    ///
    /// # Errors
    ///
    /// Returns [`SignError::ConfigError`] if an explicitly requested device is
    /// not available.
    pub fn select(requested: Option<Self>) -> Result<Self> {
        match requested {
            Some(device) if device.is_available() => Ok(device),
            Some(device) => Err(SignError::ConfigError(format!(
                "Device '{device}' is not available (available: {})",
                Self::available().iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
            ))),
            None => Ok(Self::available().first().copied().unwrap_or_default()),
        }
    }
}

impl From<candle_core::DeviceLocation> for Device {
    fn from(location: candle_core::DeviceLocation) -> Self {
        match location {
            candle_core::DeviceLocation::Cpu => Self::Cpu,
            candle_core::DeviceLocation::Cuda { gpu_id } => Self::Cuda(gpu_id),
            candle_core::DeviceLocation::Metal { .. } => Self::Mps,
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda(i) => write!(f, "cuda:{i}"),
            Self::Mps => write!(f, "mps"),
        }
    }
}

impl FromStr for Device {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        match s.as_str() {
            "cpu" => Ok(Self::Cpu),
            "mps" => Ok(Self::Mps),
            _ => s
                .strip_prefix("cuda")
                .map(|rest| Self::Cuda(parse_device_index(rest).unwrap_or(0)))
                .ok_or_else(|| format!("Unknown device: {s}")),
        }
    }
}

/// Parse an index suffix such as `":1"`.
fn parse_device_index(s: &str) -> Option<usize> {
    s.strip_prefix(':')
        .and_then(|index_str| index_str.parse::<usize>().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_device() {
        assert_eq!(Device::from_str("cpu").unwrap(), Device::Cpu);
        assert_eq!(Device::from_str("CUDA").unwrap(), Device::Cuda(0));
        assert_eq!(Device::from_str("cuda:1").unwrap(), Device::Cuda(1));
        assert_eq!(Device::from_str("mps").unwrap(), Device::Mps);
        assert!(Device::from_str("tpu").is_err());
    }

    #[test]
    fn test_display_round_trip() {
        for device in [Device::Cpu, Device::Cuda(2), Device::Mps] {
            assert_eq!(device.to_string().parse::<Device>().unwrap(), device);
        }
    }

    #[test]
    fn test_select() {
        let preferred = Device::select(None).unwrap();
        assert_eq!(Some(&preferred), Device::available().first());
        assert_eq!(Device::select(Some(Device::Cpu)).unwrap(), Device::Cpu);
        assert_eq!(Device::available().last(), Some(&Device::Cpu));

        // Index far past any real GPU count.
        let err = Device::select(Some(Device::Cuda(4096))).unwrap_err();
        assert!(matches!(err, SignError::ConfigError(_)));
        assert!(err.to_string().contains("cuda:4096"));
    }

    #[test]
    fn test_to_candle() {
        assert!(Device::Cpu.to_candle().unwrap().is_cpu());
        assert_eq!(Device::from(candle_core::Device::Cpu.location()), Device::Cpu);
        if !Device::Cuda(0).is_available() {
            assert!(matches!(Device::Cuda(0).to_candle(), Err(SignError::ConfigError(_))));
        }
    }
}

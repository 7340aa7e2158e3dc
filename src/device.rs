//! Compute device selection.
//!
//! The device is configuration, passed in with the rest of the fitness
//! settings. `Auto` prefers an accelerator when the crate was built with the
//! `cuda` or `metal` feature and falls back to the CPU otherwise.

use candle_core::Device;
use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum DeviceConfig {
    /// Host computation.
    #[default]
    Cpu,
    /// CUDA device with the given ordinal.
    Cuda(usize),
    /// Metal device with the given ordinal.
    Metal(usize),
    /// First available accelerator, else CPU.
    Auto,
}

impl DeviceConfig {
    /// Open the configured device.
    ///
    /// # Errors
    ///
    /// Explicit `Cuda`/`Metal` requests fail if the device is missing or the
    /// crate was built without the matching feature. `Cpu` and `Auto` never fail.
    pub fn resolve(self) -> Result<Device> {
        let device = match self {
            Self::Cpu => Device::Cpu,
            Self::Cuda(ordinal) => Device::new_cuda(ordinal)?,
            Self::Metal(ordinal) => Device::new_metal(ordinal)?,
            Self::Auto => auto_device(),
        };
        log::debug!("Using device: {:?}", device);
        Ok(device)
    }
}

fn auto_device() -> Device {
    #[cfg(feature = "cuda")]
    if let Ok(device) = Device::cuda_if_available(0) {
        if device.is_cuda() {
            return device;
        }
    }
    #[cfg(feature = "metal")]
    if let Ok(device) = Device::new_metal(0) {
        if device.is_metal() {
            return device;
        }
    }
    Device::Cpu
}

//! Configuration values for device setup.
//!
//! None of these values are required to talk to a touchpad. They describe how
//! patient the library is and which register values put a touchpad into
//! absolute mode.

use crate::{channel::RetryPolicy, protocol::HardwareGeneration};

/// The retry policies used during setup.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RetryConfig {
    /// The policy for every single custom command step.
    pub command: RetryPolicy,

    /// The policy for reading back register 0x10 after enabling absolute
    /// mode.
    pub read_back: RetryPolicy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            command: RetryPolicy::COMMAND,
            read_back: RetryPolicy::READ_BACK,
        }
    }
}

/// A single register write.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterWrite {
    /// The register address.
    pub register: u8,

    /// The value written to the register.
    pub value: u8,
}

impl RegisterWrite {
    const fn new(register: u8, value: u8) -> Self {
        Self { register, value }
    }
}

/// The register plans switching a touchpad into absolute mode, per
/// generation.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AbsoluteModeConfig {
    /// The plan for V1 touchpads.
    pub v1: Vec<RegisterWrite>,

    /// The plan for V2 touchpads.
    pub v2: Vec<RegisterWrite>,

    /// The V3 plan used unless [`Self::hardware_resolution`] is set.
    pub v3: Vec<RegisterWrite>,

    /// The V3 plan used if [`Self::hardware_resolution`] is set.
    pub v3_hardware_resolution: Vec<RegisterWrite>,

    /// The plan for V4 touchpads.
    pub v4: Vec<RegisterWrite>,

    /// Whether V3 touchpads should report coordinates in their native
    /// resolution.
    pub hardware_resolution: bool,
}

impl AbsoluteModeConfig {
    /// Selects the register plan for a generation.
    pub fn plan(&self, generation: HardwareGeneration) -> &[RegisterWrite] {
        match generation {
            HardwareGeneration::V1 => &self.v1,
            HardwareGeneration::V2 => &self.v2,
            HardwareGeneration::V3 if self.hardware_resolution => &self.v3_hardware_resolution,
            HardwareGeneration::V3 => &self.v3,
            HardwareGeneration::V4 => &self.v4,
        }
    }
}

impl Default for AbsoluteModeConfig {
    fn default() -> Self {
        Self {
            v1: vec![RegisterWrite::new(0x10, 0x16), RegisterWrite::new(0x11, 0x8f)],
            v2: vec![
                RegisterWrite::new(0x10, 0x54),
                RegisterWrite::new(0x11, 0x88),
                RegisterWrite::new(0x21, 0x60),
            ],
            v3: vec![RegisterWrite::new(0x10, 0x01)],
            v3_hardware_resolution: vec![RegisterWrite::new(0x10, 0x0b)],
            v4: vec![RegisterWrite::new(0x07, 0x01)],
            hardware_resolution: false,
        }
    }
}

/// The reporting parameters set before enabling the data stream.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct StreamConfig {
    /// The sample rate in reports per second.
    pub sample_rate: u8,

    /// The generic PS/2 resolution code.
    pub resolution: u8,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: 100,
            resolution: 3,
        }
    }
}

//! Implements the protocol-specific parts of the Elantech PS/2 extension.
//!
//! Elantech touchpads speak a superset of the generic PS/2 mouse protocol.
//! Proprietary commands are smuggled through sequences of generic commands,
//! and both the smuggling technique and the meaning of replies depend on the
//! hardware generation of the touchpad.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;

use crate::nibble::U4;

pub mod dialect;

/// The Elantech opcodes, both queries and register access.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Opcode {
    /// Queries the firmware ID. On V3 and V4 the reply packs the coordinate
    /// maxima.
    FirmwareIdQuery = 0x00,

    /// Queries the firmware version.
    FirmwareVersionQuery = 0x01,

    /// Queries the capability bytes.
    CapabilitiesQuery = 0x02,

    /// Queries the sample bytes.
    SampleQuery = 0x03,

    /// Queries the per-axis resolution codes (V4 only).
    ResolutionQuery = 0x04,

    /// Reads a register on V1 and V2.
    RegisterRead = 0x10,

    /// Writes a register on V1 and V2.
    RegisterWrite = 0x11,
}

impl Opcode {
    /// Combined register read/write opcode of V3 and V4.
    ///
    /// It shares its value with [`Opcode::FirmwareIdQuery`], the position in
    /// the command sequence tells them apart.
    pub const REGISTER_READ_WRITE: u8 = 0x00;
}

/// The prefix announcing an Elantech custom command byte.
pub const CUSTOM_COMMAND: u8 = 0xf8;

/// Represents the hardware generation of an Elantech touchpad.
///
/// The generation governs command framing, register access and packet layout.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HardwareGeneration {
    /// The first generation, which does not follow the IC body numbering.
    V1,

    /// IC body versions 2 and 4.
    V2,

    /// IC body version 5.
    V3,

    /// IC body versions 6 to 15.
    V4,
}

impl HardwareGeneration {
    /// Determines the hardware generation from a firmware version.
    ///
    /// Returns [`UnknownHardware`] if the IC body version maps to no known
    /// generation.
    pub fn from_firmware(version: FirmwareVersion) -> Result<Self, UnknownHardware> {
        // Early firmwares do not obey the IC body rule.
        if version.as_u32() < 0x020030 || version.as_u32() == 0x020600 {
            return Ok(Self::V1);
        }

        match version.ic_body().to_lo() {
            2 | 4 => Ok(Self::V2),
            5 => Ok(Self::V3),
            6..=15 => Ok(Self::V4),
            _ => Err(UnknownHardware(version)),
        }
    }

    /// Selects the dialect capability queries are framed in.
    pub fn dialect(self) -> CommandDialect {
        match self {
            Self::V1 | Self::V2 => CommandDialect::SlicedPs2,
            Self::V3 | Self::V4 => CommandDialect::DirectElan,
        }
    }

    /// The numeric generation as printed by diagnostics.
    pub fn number(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
            Self::V3 => 3,
            Self::V4 => 4,
        }
    }
}

/// Selects how queries are framed on the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandDialect {
    /// The opcode is sliced into 2-bit chunks sent via set-resolution
    /// commands.
    SlicedPs2,

    /// The opcode is sent directly after the Elantech custom command prefix.
    DirectElan,
}

/// Represents the 24-bit firmware version of a touchpad.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FirmwareVersion(u32);

impl FirmwareVersion {
    /// Packs the three reply bytes of a firmware version query, big-endian.
    pub fn from_bytes(bytes: [u8; 3]) -> Self {
        Self(u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]))
    }

    /// Constructs a firmware version from its packed value, dropping
    /// anything above 24 bits.
    pub fn from_u32(raw: u32) -> Self {
        Self(raw & 0x00ff_ffff)
    }

    /// Returns the packed value.
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the three bytes as the device reported them.
    pub fn to_bytes(self) -> [u8; 3] {
        let [_, b0, b1, b2] = self.0.to_be_bytes();
        [b0, b1, b2]
    }

    /// The IC body version, bits 16 to 19.
    pub fn ic_body(self) -> U4 {
        U4::from_lo(self.to_bytes()[0])
    }

    /// Whether packets carry a CRC instead of the constant V4 header bits.
    pub fn crc_enabled(self) -> bool {
        self.0 & 0x4000 != 0
    }
}

impl fmt::Debug for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FirmwareVersion({:#08x})", self.0)
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:06x}", self.0)
    }
}

/// Indicates that a firmware version maps to no known hardware generation.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
#[error("firmware version {0} maps to no known hardware generation")]
pub struct UnknownHardware(pub FirmwareVersion);

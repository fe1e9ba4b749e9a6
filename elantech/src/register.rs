//! Implements register access on Elantech touchpads.
//!
//! Registers are the only way to configure the touchpad (most prominently to
//! switch it to absolute mode). The wire framing of a register access depends
//! on the hardware generation:
//!
//! - V1 sends the opcode, register and value as [sliced](dialect::sliced)
//!   commands.
//! - V2 to V4 send every step as a custom command, each one retried on its
//!   own. V3 and V4 share one read/write opcode, V4 repeats it before the
//!   value of a write.

use std::{ops::RangeInclusive, sync::Arc};

use thiserror::Error;
use tracing::warn;

use crate::{
    channel::{ChannelError, INFO_REPLY_LENGTH, Ps2Channel, Ps2Command, RetryPolicy, retry},
    protocol::{CUSTOM_COMMAND, HardwareGeneration, Opcode, dialect},
};

/// The register addresses that may be accessed.
pub const REGISTER_WINDOWS: [RangeInclusive<u8>; 2] = [0x07..=0x11, 0x20..=0x26];

/// Checks whether an address lies within one of the [`REGISTER_WINDOWS`].
pub fn is_valid_register(address: u8) -> bool {
    REGISTER_WINDOWS.iter().any(|window| window.contains(&address))
}

/// Provides read and write access to the registers of a touchpad.
#[derive(Clone)]
pub struct RegisterIo {
    /// The underlying PS/2 channel.
    chan: Arc<Ps2Channel>,

    /// The hardware generation selecting the wire framing.
    generation: HardwareGeneration,

    /// The retry policy applied to every custom command step.
    policy: RetryPolicy,
}

impl RegisterIo {
    /// Creates register access for a touchpad of the given generation.
    pub fn new(chan: Arc<Ps2Channel>, generation: HardwareGeneration, policy: RetryPolicy) -> Self {
        Self {
            chan,
            generation,
            policy,
        }
    }

    /// Writes `value` to the register at `address`.
    ///
    /// Returns [`RegisterError::InvalidRegister`] without touching the channel
    /// if the address lies outside the [`REGISTER_WINDOWS`].
    pub async fn write_register(&self, address: u8, value: u8) -> Result<(), RegisterError> {
        if !is_valid_register(address) {
            return Err(RegisterError::InvalidRegister(address));
        }

        let res = match self.generation {
            HardwareGeneration::V1 => self.write_sliced(address, value).await,
            HardwareGeneration::V2 | HardwareGeneration::V3 | HardwareGeneration::V4 => {
                self.steps(&write_steps(self.generation, address, value))
                    .await
            },
        };

        res.inspect_err(|err| {
            warn!(address, value, %err, "failed to write register");
        })
        .map_err(RegisterError::from)
    }

    /// Reads the register at `address`.
    ///
    /// Returns [`RegisterError::InvalidRegister`] without touching the channel
    /// if the address lies outside the [`REGISTER_WINDOWS`].
    pub async fn read_register(&self, address: u8) -> Result<u8, RegisterError> {
        if !is_valid_register(address) {
            return Err(RegisterError::InvalidRegister(address));
        }

        let res = match self.generation {
            HardwareGeneration::V1 => self.read_sliced(address).await,
            HardwareGeneration::V2 | HardwareGeneration::V3 | HardwareGeneration::V4 => {
                self.read_custom(address).await
            },
        };

        match res {
            Ok(reply) => Ok(read_value(self.generation, reply)),
            Err(err) => {
                warn!(address, %err, "failed to read register");
                Err(err.into())
            },
        }
    }

    async fn write_sliced(&self, address: u8, value: u8) -> Result<(), ChannelError> {
        for byte in [Opcode::RegisterWrite.into(), address, value] {
            self.chan.send(&dialect::sliced(byte)).await?;
        }
        self.chan.send(&[u8::from(Ps2Command::SetScaling1To1)]).await
    }

    async fn read_sliced(&self, address: u8) -> Result<[u8; INFO_REPLY_LENGTH], ChannelError> {
        for byte in [Opcode::RegisterRead.into(), address] {
            self.chan.send(&dialect::sliced(byte)).await?;
        }
        self.chan.query(&[u8::from(Ps2Command::GetInfo)]).await
    }

    async fn read_custom(&self, address: u8) -> Result<[u8; INFO_REPLY_LENGTH], ChannelError> {
        self.steps(&read_steps(self.generation, address)).await?;

        let commands = [u8::from(Ps2Command::GetInfo)];
        retry(self.policy, self.chan.delay(), || self.chan.query(&commands)).await
    }

    /// Sends every command as its own retried transfer.
    async fn steps(&self, commands: &[u8]) -> Result<(), ChannelError> {
        for &command in commands {
            let single = [command];
            retry(self.policy, self.chan.delay(), || self.chan.send(&single)).await?;
        }

        Ok(())
    }
}

/// The custom command steps of a register write, including the terminating
/// 1:1 scaling command.
///
/// V1 has no custom command steps and yields an empty sequence.
pub fn write_steps(generation: HardwareGeneration, address: u8, value: u8) -> Vec<u8> {
    let opcode = match generation {
        HardwareGeneration::V1 => return Vec::new(),
        HardwareGeneration::V2 => Opcode::RegisterWrite.into(),
        HardwareGeneration::V3 | HardwareGeneration::V4 => Opcode::REGISTER_READ_WRITE,
    };

    let mut steps = vec![CUSTOM_COMMAND, opcode, CUSTOM_COMMAND, address];
    if generation == HardwareGeneration::V4 {
        steps.extend([CUSTOM_COMMAND, opcode]);
    }
    steps.extend([CUSTOM_COMMAND, value, Ps2Command::SetScaling1To1.into()]);

    steps
}

/// The custom command steps of a register read, excluding the final
/// [`Ps2Command::GetInfo`].
///
/// V1 has no custom command steps and yields an empty sequence.
pub fn read_steps(generation: HardwareGeneration, address: u8) -> Vec<u8> {
    let opcode = match generation {
        HardwareGeneration::V1 => return Vec::new(),
        HardwareGeneration::V2 => Opcode::RegisterRead.into(),
        HardwareGeneration::V3 | HardwareGeneration::V4 => Opcode::REGISTER_READ_WRITE,
    };

    vec![CUSTOM_COMMAND, opcode, CUSTOM_COMMAND, address]
}

/// Extracts the register value from a read reply.
///
/// V4 shifts the value one position to the right.
pub fn read_value(generation: HardwareGeneration, reply: [u8; INFO_REPLY_LENGTH]) -> u8 {
    match generation {
        HardwareGeneration::V4 => reply[1],
        HardwareGeneration::V1 | HardwareGeneration::V2 | HardwareGeneration::V3 => reply[0],
    }
}

/// Represents an error that occurred when accessing a register.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// Indicates that the address lies outside the accessible windows.
    #[error("register {0:#04x} is outside the accessible register windows")]
    InvalidRegister(u8),

    /// Indicates that the underlying [`Ps2Channel`] returned an error.
    #[error("the PS/2 channel returned an error")]
    Channel(#[from] ChannelError),
}

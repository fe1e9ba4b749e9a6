//! Encodes Elantech commands into sequences of generic PS/2 commands.

use super::{CUSTOM_COMMAND, CommandDialect, Opcode};
use crate::channel::Ps2Command;

/// The length of a sliced command on the wire.
pub const SLICED_LENGTH: usize = 9;

/// Encodes an arbitrary byte as a sliced command.
///
/// The sequence starts with 1:1 scaling and continues with four
/// set-resolution commands whose arguments carry two bits of `byte` each,
/// most significant pair first.
pub fn sliced(byte: u8) -> [u8; SLICED_LENGTH] {
    let mut commands = [u8::from(Ps2Command::SetScaling1To1); SLICED_LENGTH];

    for (pair, shift) in [6u8, 4, 2, 0].into_iter().enumerate() {
        commands[1 + pair * 2] = Ps2Command::SetResolution.into();
        commands[2 + pair * 2] = (byte >> shift) & 0x03;
    }

    commands
}

/// Encodes a single custom command step: the Elantech prefix followed by
/// the byte itself.
pub fn custom(byte: u8) -> [u8; 2] {
    [CUSTOM_COMMAND, byte]
}

/// Encodes a query for `opcode` in the given dialect, including the
/// terminating [`Ps2Command::GetInfo`].
pub fn query(dialect: CommandDialect, opcode: Opcode) -> Vec<u8> {
    let mut commands = match dialect {
        CommandDialect::SlicedPs2 => sliced(opcode.into()).to_vec(),
        CommandDialect::DirectElan => custom(opcode.into()).to_vec(),
    };
    commands.push(Ps2Command::GetInfo.into());
    commands
}

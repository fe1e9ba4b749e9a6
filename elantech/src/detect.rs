//! Determines whether the device behind a channel is an Elantech touchpad.

use thiserror::Error;
use tracing::{debug, info};

use crate::{
    channel::{ChannelError, INFO_REPLY_LENGTH, Ps2Channel, Ps2Command},
    protocol::{CommandDialect, FirmwareVersion, Opcode, dialect},
};

/// The commands provoking the Elantech signature reply.
pub const MAGIC_KNOCK: [Ps2Command; 5] = [
    Ps2Command::SetDefaultsAndDisable,
    Ps2Command::SetScaling1To1,
    Ps2Command::SetScaling1To1,
    Ps2Command::SetScaling1To1,
    Ps2Command::GetInfo,
];

/// Sample rates a generic PS/2 mouse echoes in the third byte of an info
/// reply.
const LEGACY_SAMPLE_RATES: [u8; 7] = [200, 100, 80, 60, 40, 20, 10];

/// Checks the reply to the [`MAGIC_KNOCK`].
pub fn is_knock_reply(reply: [u8; INFO_REPLY_LENGTH]) -> bool {
    matches!(reply, [0x3c, 0x03, 0xc8 | 0x00])
}

/// Checks whether a firmware version reply looks like it came from an
/// Elantech touchpad.
///
/// Some other pointing devices answer the magic knock as well. They are told
/// apart by their reply to the firmware version query, which echoes one of
/// the generic sample rates.
pub fn is_signature_valid(reply: [u8; INFO_REPLY_LENGTH]) -> bool {
    if reply[0] == 0 {
        return false;
    }

    if reply[1] == 0 {
        return true;
    }

    // Newer ICs number their revisions differently.
    if reply[0] & 0x0f >= 0x06 && reply[1] & 0xaf == 0x0f && reply[2] < 40 {
        return true;
    }

    !LEGACY_SAMPLE_RATES.contains(&reply[2])
}

/// Knocks on the device and reads its firmware version.
///
/// Neither step is retried. Returns [`DetectError::NotElantech`] if the
/// device does not identify as an Elantech touchpad.
pub async fn detect(chan: &Ps2Channel) -> Result<FirmwareVersion, DetectError> {
    let knock = MAGIC_KNOCK.map(u8::from);
    let reply = chan.query(&knock).await?;

    if !is_knock_reply(reply) {
        debug!(?reply, "unexpected magic knock reply");
        return Err(NotElantech::MagicKnock(reply).into());
    }

    // The dialect is not known yet, the firmware version query is always
    // sliced.
    let reply = chan
        .query(&dialect::query(
            CommandDialect::SlicedPs2,
            Opcode::FirmwareVersionQuery,
        ))
        .await?;

    if !is_signature_valid(reply) {
        debug!(?reply, "probably not a real Elantech touchpad");
        return Err(NotElantech::Signature(reply).into());
    }

    let version = FirmwareVersion::from_bytes(reply);
    info!(%version, "found an Elantech touchpad");

    Ok(version)
}

/// Indicates that the device did not identify as an Elantech touchpad.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Error)]
pub enum NotElantech {
    /// The reply to the magic knock did not match.
    #[error("unexpected magic knock reply {0:02x?}")]
    MagicKnock([u8; INFO_REPLY_LENGTH]),

    /// The firmware version reply looks like it came from a generic mouse.
    #[error("the firmware version {0:02x?} has an invalid signature")]
    Signature([u8; INFO_REPLY_LENGTH]),
}

/// Represents an error that occurred during detection.
#[derive(Debug, Error)]
pub enum DetectError {
    /// Indicates that the underlying [`Ps2Channel`] returned an error.
    #[error("the PS/2 channel returned an error")]
    Channel(#[from] ChannelError),

    /// Indicates that the device is not an Elantech touchpad.
    #[error(transparent)]
    NotElantech(#[from] NotElantech),
}

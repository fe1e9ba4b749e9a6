//! Classifies V4 packets.

use crate::profile::DeviceProfile;

/// The length of a V4 packet.
pub const PACKET_LENGTH: usize = 6;

/// A raw V4 packet.
pub type Packet = [u8; PACKET_LENGTH];

/// The kind of a V4 packet.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketKind {
    /// The packet failed the sanity check or carries an unknown type.
    Unknown,

    /// The packet originates from an attached trackpoint.
    TrackPoint,

    /// The packet lists the fingers currently touching.
    Status,

    /// The packet carries the absolute position of one finger.
    Head,

    /// The packet carries position deltas of up to two fingers.
    Motion,
}

/// Classifies a packet according to the profile of the touchpad it came
/// from.
///
/// The constant bits validated by the sanity check depend on whether the
/// firmware protects packets with a CRC and on the IC body version.
pub fn classify(packet: &Packet, profile: &DeviceProfile) -> PacketKind {
    if profile.quirks.has_trackpoint && packet[3] & 0x0f == 0x06 {
        return PacketKind::TrackPoint;
    }

    let sane = if profile.crc_enabled {
        packet[3] & 0x08 == 0x00
    } else if profile.ic_body().to_lo() == 7 && profile.samples[1] == 0x2a {
        packet[3] & 0x1c == 0x10
    } else {
        packet[0] & 0x08 == 0x00 && packet[3] & 0x1c == 0x10
    };

    if !sane {
        return PacketKind::Unknown;
    }

    match packet[3] & 0x03 {
        0 => PacketKind::Status,
        1 => PacketKind::Head,
        2 => PacketKind::Motion,
        _ => PacketKind::Unknown,
    }
}

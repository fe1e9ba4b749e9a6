//! Decodes V4 packets into multi-touch finger positions.
//!
//! V4 touchpads report up to [`MAX_FINGERS`] contacts with three kinds of
//! packets:
//!
//! - status packets list the fingers currently touching,
//! - head packets carry the absolute position of one finger,
//! - motion packets carry signed deltas for up to two fingers.
//!
//! The [`Decoder`] keeps the position of every finger in a [`FingerTable`]
//! and turns each packet into a [`PacketEvent`]. Decoding never fails: a
//! packet that cannot be applied is reported as [`PacketEvent::Ignored`] and
//! leaves the table untouched.

use tracing::trace;

use crate::{
    packet::{PACKET_LENGTH, Packet, PacketKind, classify},
    profile::DeviceProfile,
    protocol::HardwareGeneration,
};

/// The maximum amount of simultaneous contacts.
pub const MAX_FINGERS: usize = 5;

/// The factor applied to coarse motion deltas.
pub const WEIGHT: i32 = 5;

/// The absolute position of one finger.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FingerPosition {
    /// The slot of the finger, below [`MAX_FINGERS`].
    pub finger: u8,

    /// The horizontal position, growing to the right.
    pub x: i32,

    /// The vertical position, growing downwards.
    pub y: i32,
}

/// A slot of the [`FingerTable`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct FingerSlot {
    /// The last known horizontal position.
    pub x: i32,

    /// The last known vertical position.
    pub y: i32,
}

/// The positions and liveness of every finger slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct FingerTable {
    /// The last known position of every slot.
    pub slots: [FingerSlot; MAX_FINGERS],

    /// The slots currently touching, one bit per slot.
    pub live: u8,

    /// The slots whose position was set by a head packet since they last
    /// lifted. Only these accept motion deltas.
    pub anchored: u8,
}

impl FingerTable {
    fn position(&self, finger: u8) -> FingerPosition {
        let slot = self.slots[usize::from(finger)];
        FingerPosition {
            finger,
            x: slot.x,
            y: slot.y,
        }
    }

    fn is_anchored(&self, finger: u8) -> bool {
        self.anchored & (1 << finger) != 0
    }

    /// Applies a delta to an anchored slot.
    fn shift(&mut self, finger: u8, dx: i32, dy: i32) -> Option<FingerPosition> {
        if !self.is_anchored(finger) {
            return None;
        }

        let slot = &mut self.slots[usize::from(finger)];
        slot.x = slot.x.saturating_add(dx);
        slot.y = slot.y.saturating_sub(dy);

        Some(self.position(finger))
    }
}

/// The outcome of decoding one packet.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PacketEvent {
    /// A status packet listed the fingers currently touching.
    FingersSync {
        /// The touching fingers, one bit per slot.
        mask: u8,

        /// The previously touching fingers that are absent from `mask`.
        lifted: u8,
    },

    /// A head packet set the absolute position of a finger.
    FingerUpdate {
        /// The new position of the finger.
        finger: FingerPosition,

        /// The contact pressure.
        pressure: u8,

        /// The amount of traces the contact covers.
        traces: u8,
    },

    /// A motion packet moved one or two fingers.
    FingerMotion {
        /// The moved position of the first finger, if it was anchored.
        primary: Option<FingerPosition>,

        /// The moved position of the second finger, if any.
        secondary: Option<FingerPosition>,
    },

    /// The packet originates from an attached trackpoint and is passed on
    /// as is.
    TrackPoint(Packet),

    /// The packet was dropped.
    Ignored,
}

/// Decodes the packet stream of a V4 touchpad.
///
/// Other generations are identified and configured by this crate, but their
/// packets are not decoded. A decoder for them ignores every packet.
#[derive(Clone, Debug)]
pub struct Decoder<'a> {
    profile: &'a DeviceProfile,
    table: FingerTable,
    buffer: Packet,
    buffered: usize,
}

impl<'a> Decoder<'a> {
    /// Creates a decoder with an empty finger table.
    pub fn new(profile: &'a DeviceProfile) -> Self {
        Self {
            profile,
            table: FingerTable::default(),
            buffer: [0; PACKET_LENGTH],
            buffered: 0,
        }
    }

    /// The current finger table.
    pub fn table(&self) -> &FingerTable {
        &self.table
    }

    /// Feeds a single byte of the stream.
    ///
    /// Returns the decoded event whenever the byte completes a packet and
    /// [`None`] while a packet is still incomplete.
    pub fn on_byte(&mut self, byte: u8) -> Option<PacketEvent> {
        self.buffer[self.buffered] = byte;
        self.buffered += 1;

        if self.buffered < PACKET_LENGTH {
            return None;
        }

        self.buffered = 0;
        let packet = self.buffer;
        Some(self.process(&packet))
    }

    /// Classifies and decodes a complete packet.
    pub fn process(&mut self, packet: &Packet) -> PacketEvent {
        if self.profile.generation != HardwareGeneration::V4 {
            return PacketEvent::Ignored;
        }

        let kind = classify(packet, self.profile);
        let event = self.apply(kind, packet);

        if event == PacketEvent::Ignored {
            trace!(?kind, ?packet, "dropped packet");
        }

        event
    }

    /// Decodes a packet of an already known kind.
    pub fn apply(&mut self, kind: PacketKind, packet: &Packet) -> PacketEvent {
        match kind {
            PacketKind::Unknown => PacketEvent::Ignored,
            PacketKind::TrackPoint => PacketEvent::TrackPoint(*packet),
            PacketKind::Status => self.status(packet),
            PacketKind::Head => self.head(packet),
            PacketKind::Motion => self.motion(packet),
        }
    }

    fn status(&mut self, packet: &Packet) -> PacketEvent {
        let mask = packet[1] & 0x1f;
        let lifted = self.table.live & !mask;

        self.table.live = mask;
        self.table.anchored &= mask;

        PacketEvent::FingersSync { mask, lifted }
    }

    fn head(&mut self, packet: &Packet) -> PacketEvent {
        let Ok(Some(finger)) = finger_id(packet[3]) else {
            return PacketEvent::Ignored;
        };

        let y_max = i32::try_from(self.profile.bounds.y_max).unwrap_or(i32::MAX);
        self.table.slots[usize::from(finger)] = FingerSlot {
            x: i32::from(u16::from(packet[1] & 0x0f) << 8 | u16::from(packet[2])),
            y: y_max - i32::from(u16::from(packet[4] & 0x0f) << 8 | u16::from(packet[5])),
        };
        self.table.live |= 1 << finger;
        self.table.anchored |= 1 << finger;

        PacketEvent::FingerUpdate {
            finger: self.table.position(finger),
            pressure: (packet[1] & 0xf0) | (packet[4] >> 4),
            traces: packet[0] >> 4,
        }
    }

    fn motion(&mut self, packet: &Packet) -> PacketEvent {
        let (Ok(Some(primary)), Ok(secondary)) = (finger_id(packet[0]), finger_id(packet[3]))
        else {
            return PacketEvent::Ignored;
        };

        let weight = if packet[0] & 0x10 != 0 { WEIGHT } else { 1 };
        let delta = |byte: u8| i32::from(byte as i8) * weight;

        let primary = self
            .table
            .shift(primary, delta(packet[1]), delta(packet[2]));
        let secondary =
            secondary.and_then(|finger| self.table.shift(finger, delta(packet[4]), delta(packet[5])));

        if primary.is_none() && secondary.is_none() {
            return PacketEvent::Ignored;
        }

        PacketEvent::FingerMotion { primary, secondary }
    }
}

/// A wire finger id naming a slot beyond [`MAX_FINGERS`].
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
struct SlotOutOfRange;

/// Extracts a finger slot from the three high bits of a byte.
///
/// The wire value is the slot plus one, zero means no finger.
fn finger_id(byte: u8) -> Result<Option<u8>, SlotOutOfRange> {
    match (byte >> 5).checked_sub(1) {
        None => Ok(None),
        Some(id) if usize::from(id) < MAX_FINGERS => Ok(Some(id)),
        Some(_) => Err(SlotOutOfRange),
    }
}

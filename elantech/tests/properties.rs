//! Property-based tests for generation mapping, register access and packet
//! decoding.

mod common;

use common::{Identity, connect};
use elantech::{
    channel::RetryPolicy,
    mt::{Decoder, FingerPosition, PacketEvent},
    packet::{Packet, PacketKind, classify},
    profile::{DeviceProfile, DeviceQueries, resolve},
    protocol::{FirmwareVersion, HardwareGeneration},
    register::{RegisterError, RegisterIo, is_valid_register},
};
use futures::executor::block_on;
use proptest::prelude::*;

fn identity(index: usize) -> Identity {
    match index {
        0 => Identity::v1(),
        1 => Identity::v2(),
        2 => Identity::v3(),
        _ => Identity::v4(),
    }
}

fn v4_profile() -> DeviceProfile {
    resolve(&DeviceQueries {
        firmware_version: [0x46, 0x0f, 0x01],
        capabilities: [0x00, 0x10, 0x08],
        firmware_id: Some([0x25, 0x00, 0x80]),
        ..Default::default()
    })
    .unwrap()
}

fn valid_register() -> impl Strategy<Value = u8> {
    prop_oneof![0x07u8..=0x11, 0x20u8..=0x26]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Every firmware version outside the legacy range maps by its IC body.
    #[test]
    fn prop_generation_follows_ic_body(raw in 0x020030u32..=0xff_ffff) {
        prop_assume!(raw != 0x020600);

        let version = FirmwareVersion::from_u32(raw);
        let expected = match (raw >> 16) & 0x0f {
            2 | 4 => Some(HardwareGeneration::V2),
            5 => Some(HardwareGeneration::V3),
            6..=15 => Some(HardwareGeneration::V4),
            _ => None,
        };

        prop_assert_eq!(HardwareGeneration::from_firmware(version).ok(), expected);
    }

    /// Registers outside the windows fail before any transfer.
    #[test]
    fn prop_invalid_registers_are_rejected(
        generation in 0usize..4,
        address in any::<u8>().prop_filter("outside the windows", |a| !is_valid_register(*a)),
        value: u8,
    ) {
        let identity = identity(generation);
        let generation = identity.generation();
        let (chan, emulator, _) = connect(identity);
        let registers = RegisterIo::new(chan, generation, RetryPolicy::COMMAND);

        let write = block_on(registers.write_register(address, value));
        let read = block_on(registers.read_register(address));

        prop_assert!(matches!(write, Err(RegisterError::InvalidRegister(a)) if a == address));
        prop_assert!(matches!(read, Err(RegisterError::InvalidRegister(a)) if a == address));
        prop_assert!(emulator.transfers().is_empty());
    }

    /// A written register reads back the written value.
    #[test]
    fn prop_register_round_trip(
        generation in 0usize..4,
        address in valid_register(),
        value: u8,
    ) {
        let identity = identity(generation);
        let generation = identity.generation();
        let (chan, _, _) = connect(identity);
        let registers = RegisterIo::new(chan, generation, RetryPolicy::COMMAND);

        block_on(registers.write_register(address, value)).unwrap();
        prop_assert_eq!(block_on(registers.read_register(address)).unwrap(), value);
    }

    /// Packets failing classification never touch the finger table.
    #[test]
    fn prop_unknown_packets_keep_table(
        heads in prop::collection::vec((1u8..=5, 0u16..0x500, 0u16..0x280), 0..5),
        packet in any::<Packet>(),
    ) {
        let profile = v4_profile();
        prop_assume!(classify(&packet, &profile) == PacketKind::Unknown);

        let mut decoder = Decoder::new(&profile);
        for (id, x, y) in heads {
            let [x_hi, x_lo] = x.to_be_bytes();
            let [y_hi, y_lo] = y.to_be_bytes();
            decoder.process(&[0x00, x_hi, x_lo, id << 5 | 0x11, y_hi, y_lo]);
        }
        let before = *decoder.table();

        prop_assert_eq!(decoder.process(&packet), PacketEvent::Ignored);
        prop_assert_eq!(*decoder.table(), before);
    }

    /// Motion deltas are signed and weighted.
    #[test]
    fn prop_motion_applies_weighted_deltas(
        x in 0u16..0x500,
        y in 0u16..0x280,
        dx: i8,
        dy: i8,
        coarse: bool,
    ) {
        let profile = v4_profile();
        let mut decoder = Decoder::new(&profile);

        let [x_hi, x_lo] = x.to_be_bytes();
        let [y_hi, y_lo] = y.to_be_bytes();
        decoder.process(&[0x00, x_hi, x_lo, 0x31, y_hi, y_lo]);

        let weight = if coarse { 5 } else { 1 };
        let header = 0x20 | if coarse { 0x10 } else { 0x00 };
        let event = decoder.process(&[header, dx as u8, dy as u8, 0x12, 0, 0]);

        prop_assert_eq!(event, PacketEvent::FingerMotion {
            primary: Some(FingerPosition {
                finger: 0,
                x: i32::from(x) + i32::from(dx) * weight,
                y: 0x280 - i32::from(y) - i32::from(dy) * weight,
            }),
            secondary: None,
        });
    }
}

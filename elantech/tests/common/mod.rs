//! An emulated Elantech touchpad for driving the library without hardware.
//!
//! The emulator interprets the command stream the way the firmware does:
//! custom command arguments and sliced bytes are collected as parameters,
//! a 1:1 scaling command commits a complete register write and a get-info
//! command answers a query, a register read or the magic knock. A reset
//! answers with its self-test result.

#![allow(dead_code)]

use std::{
    error::Error,
    sync::{Arc, Mutex},
    time::Duration,
};

use elantech::{
    async_trait,
    channel::{Delay, Ps2Channel, RawPs2Channel},
    protocol::{FirmwareVersion, HardwareGeneration},
};

pub const KNOCK: [u8; 5] = [0xf5, 0xe6, 0xe6, 0xe6, 0xe9];

/// What the emulated touchpad answers to identification queries.
#[derive(Clone, Debug)]
pub struct Identity {
    pub knock_reply: [u8; 3],
    pub firmware_version: [u8; 3],
    pub capabilities: [u8; 3],
    pub samples: [u8; 3],
    pub firmware_id: [u8; 3],
    /// Answering the resolution query fails if this is [`None`].
    pub resolution: Option<[u8; 3]>,
}

impl Identity {
    pub fn v1() -> Self {
        Self {
            knock_reply: [0x3c, 0x03, 0xc8],
            firmware_version: [0x02, 0x00, 0x22],
            capabilities: [0x00, 0x00, 0x00],
            samples: [0x00, 0x00, 0x00],
            firmware_id: [0x00, 0x00, 0x00],
            resolution: None,
        }
    }

    pub fn v2() -> Self {
        Self {
            firmware_version: [0x04, 0x01, 0x00],
            capabilities: [0x00, 0x12, 0x0c],
            ..Self::v1()
        }
    }

    pub fn v3() -> Self {
        Self {
            firmware_version: [0x15, 0x05, 0x00],
            capabilities: [0x80, 0x00, 0x00],
            firmware_id: [0x3c, 0x01, 0xff],
            ..Self::v1()
        }
    }

    pub fn v4() -> Self {
        Self {
            knock_reply: [0x3c, 0x03, 0x00],
            firmware_version: [0x46, 0x0f, 0x01],
            capabilities: [0x10, 0x14, 0x0c],
            samples: [0x00, 0x00, 0x00],
            firmware_id: [0x25, 0x00, 0x80],
            resolution: Some([0x00, 0x21, 0x07]),
        }
    }

    pub fn generation(&self) -> HardwareGeneration {
        HardwareGeneration::from_firmware(FirmwareVersion::from_bytes(self.firmware_version))
            .unwrap()
    }
}

#[derive(Default)]
struct Parser {
    /// The commands received since the last get-info or reset.
    raw: Vec<u8>,

    /// The collected custom command arguments and sliced bytes.
    params: Vec<u8>,

    /// The command waiting for its argument byte.
    awaiting: Option<u8>,

    /// The sliced byte being assembled and the amount of pairs received.
    slice: Option<(u8, u8)>,
}

struct State {
    identity: Identity,
    generation: HardwareGeneration,
    registers: [u8; 0x100],
    parser: Parser,
    transfers: Vec<Vec<u8>>,
    writes: Vec<(u8, u8)>,
    failures: usize,
    failing_reads: usize,
    refuse_absolute_mode: bool,
    self_test: [u8; 3],
    resets: usize,
}

impl State {
    /// Processes a single command byte. Returns the reply if the command
    /// produced one, and an error if a query could not be answered.
    fn command(&mut self, byte: u8) -> Result<Option<[u8; 3]>, ()> {
        self.parser.raw.push(byte);

        if let Some(command) = self.parser.awaiting.take() {
            self.argument(command, byte);
            return Ok(None);
        }

        match byte {
            0xf8 | 0xe8 | 0xf3 => self.parser.awaiting = Some(byte),
            0xe6 => match self.complete_write() {
                Some((register, value)) => {
                    self.commit(register, value);
                    self.parser.params.clear();
                },
                None => self.parser.slice = Some((0, 0)),
            },
            0xe9 => {
                let reply = self.answer();
                self.parser = Parser::default();
                return reply.map(Some).ok_or(());
            },
            0xf5 => {
                self.parser = Parser {
                    raw: vec![byte],
                    ..Default::default()
                }
            },
            0xff => {
                self.parser = Parser::default();
                self.resets += 1;
                return Ok(Some(self.self_test));
            },
            _ => {},
        }

        Ok(None)
    }

    fn argument(&mut self, command: u8, byte: u8) {
        match command {
            0xf8 => self.parser.params.push(byte),
            0xe8 => {
                if let Some((acc, pairs)) = self.parser.slice {
                    let acc = acc << 2 | (byte & 0x03);
                    if pairs == 3 {
                        self.parser.params.push(acc);
                        self.parser.slice = None;
                    } else {
                        self.parser.slice = Some((acc, pairs + 1));
                    }
                }
            },
            _ => {},
        }
    }

    fn complete_write(&self) -> Option<(u8, u8)> {
        match (self.generation, self.parser.params.as_slice()) {
            (HardwareGeneration::V1 | HardwareGeneration::V2, &[0x11, register, value]) => {
                Some((register, value))
            },
            (HardwareGeneration::V3, &[0x00, register, value]) => Some((register, value)),
            (HardwareGeneration::V4, &[0x00, register, 0x00, value]) => Some((register, value)),
            _ => None,
        }
    }

    fn commit(&mut self, register: u8, mut value: u8) {
        if self.refuse_absolute_mode && register == 0x10 {
            value &= !0x04;
        }

        self.registers[usize::from(register)] = value;
        self.writes.push((register, value));
    }

    fn answer(&mut self) -> Option<[u8; 3]> {
        if self.parser.raw == KNOCK {
            return Some(self.identity.knock_reply);
        }

        let is_read = matches!(
            (self.generation, self.parser.params.as_slice()),
            (HardwareGeneration::V1 | HardwareGeneration::V2, &[0x10, _])
                | (HardwareGeneration::V3 | HardwareGeneration::V4, &[0x00, _])
        );
        if is_read && self.failing_reads > 0 {
            self.failing_reads -= 1;
            return None;
        }

        let identity = &self.identity;
        match (self.generation, self.parser.params.as_slice()) {
            (_, &[0x00]) => Some(identity.firmware_id),
            (_, &[0x01]) => Some(identity.firmware_version),
            (_, &[0x02]) => Some(identity.capabilities),
            (_, &[0x03]) => Some(identity.samples),
            (_, &[0x04]) => identity.resolution,
            (HardwareGeneration::V1 | HardwareGeneration::V2, &[0x10, register]) => {
                Some([self.registers[usize::from(register)], 0, 0])
            },
            (HardwareGeneration::V3, &[0x00, register]) => {
                Some([self.registers[usize::from(register)], 0, 0])
            },
            (HardwareGeneration::V4, &[0x00, register]) => {
                Some([0, self.registers[usize::from(register)], 0])
            },
            _ => None,
        }
    }
}

/// The emulated touchpad. Clones share their state.
#[derive(Clone)]
pub struct Emulator(Arc<Mutex<State>>);

impl Emulator {
    pub fn new(identity: Identity) -> Self {
        Self(Arc::new(Mutex::new(State {
            generation: HardwareGeneration::from_firmware(FirmwareVersion::from_bytes(
                identity.firmware_version,
            ))
            .unwrap_or(HardwareGeneration::V1),
            identity,
            registers: [0; 0x100],
            parser: Parser::default(),
            transfers: Vec::new(),
            writes: Vec::new(),
            failures: 0,
            failing_reads: 0,
            refuse_absolute_mode: false,
            self_test: [0xaa, 0x00, 0x00],
            resets: 0,
        })))
    }

    /// Every submitted command sequence, including failed ones.
    pub fn transfers(&self) -> Vec<Vec<u8>> {
        self.0.lock().unwrap().transfers.clone()
    }

    /// Every committed register write.
    pub fn writes(&self) -> Vec<(u8, u8)> {
        self.0.lock().unwrap().writes.clone()
    }

    pub fn register(&self, register: u8) -> u8 {
        self.0.lock().unwrap().registers[usize::from(register)]
    }

    /// Lets the next `count` transfers fail without any completed step.
    pub fn fail_next(&self, count: usize) {
        self.0.lock().unwrap().failures = count;
    }

    /// Lets the next `count` register reads fail at the get-info step.
    pub fn fail_reads(&self, count: usize) {
        self.0.lock().unwrap().failing_reads = count;
    }

    /// Clears the absolute mode bit from every write to register 0x10.
    pub fn refuse_absolute_mode(&self) {
        self.0.lock().unwrap().refuse_absolute_mode = true;
    }

    /// Answers resets with a failed self-test.
    pub fn fail_self_test(&self) {
        self.0.lock().unwrap().self_test = [0xfc, 0x00, 0x00];
    }

    pub fn resets(&self) -> usize {
        self.0.lock().unwrap().resets
    }

    pub fn clear_transfers(&self) {
        self.0.lock().unwrap().transfers.clear();
    }
}

#[async_trait]
impl RawPs2Channel for Emulator {
    async fn submit(
        &self,
        commands: &[u8],
        reply: &mut [u8],
    ) -> Result<usize, Box<dyn Error + Sync + Send>> {
        let mut state = self.0.lock().unwrap();
        state.transfers.push(commands.to_vec());

        if state.failures > 0 {
            state.failures -= 1;
            return Ok(0);
        }

        let mut last_reply = None;
        for (done, &byte) in commands.iter().enumerate() {
            match state.command(byte) {
                Ok(Some(answer)) => last_reply = Some(answer),
                Ok(None) => {},
                Err(()) => return Ok(done),
            }
        }

        let read = match last_reply {
            Some(answer) => {
                let read = reply.len().min(answer.len());
                reply[..read].copy_from_slice(&answer[..read]);
                read
            },
            None => 0,
        };

        Ok(commands.len() + read)
    }
}

/// A delay that returns immediately and records every requested duration.
#[derive(Clone, Default)]
pub struct RecordingDelay(Arc<Mutex<Vec<Duration>>>);

impl RecordingDelay {
    pub fn recorded(&self) -> Vec<Duration> {
        self.0.lock().unwrap().clone()
    }
}

#[async_trait]
impl Delay for RecordingDelay {
    async fn delay(&self, duration: Duration) {
        self.0.lock().unwrap().push(duration);
    }
}

/// Connects a channel to a freshly emulated touchpad.
pub fn connect(identity: Identity) -> (Arc<Ps2Channel>, Emulator, RecordingDelay) {
    let emulator = Emulator::new(identity);
    let delay = RecordingDelay::default();
    let chan = Arc::new(Ps2Channel::new(emulator.clone(), delay.clone()));

    (chan, emulator, delay)
}

/// The sliced encoding of a byte, as sent on the wire.
pub fn sliced(byte: u8) -> Vec<u8> {
    let mut commands = vec![0xe6];
    for shift in [6, 4, 2, 0] {
        commands.extend([0xe8, (byte >> shift) & 0x03]);
    }
    commands
}

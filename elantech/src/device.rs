//! Implements Elantech touchpads connected to PS/2 channels.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    channel::{ChannelError, INFO_REPLY_LENGTH, Ps2Channel, Ps2Command, retry},
    config::{AbsoluteModeConfig, RetryConfig, StreamConfig},
    detect::{self, DetectError, NotElantech},
    mt::Decoder,
    profile::{self, DeviceProfile, DeviceQueries, ResolveError},
    protocol::{CommandDialect, HardwareGeneration, Opcode, dialect},
    register::{RegisterError, RegisterIo},
};

/// The register whose value is read back after enabling absolute mode.
const READ_BACK_REGISTER: u8 = 0x10;

/// The bit of register 0x10 a V1 touchpad sets once in absolute mode.
const R10_ABSOLUTE_MODE: u8 = 0x04;

/// Represents an identified Elantech touchpad connected to a [`Ps2Channel`].
#[derive(Clone)]
pub struct Touchpad {
    /// The underlying PS/2 channel.
    chan: Arc<Ps2Channel>,

    /// The retry policies used for register access.
    retry: RetryConfig,

    /// The raw replies the profile was resolved from.
    queries: DeviceQueries,

    /// The resolved profile.
    profile: DeviceProfile,
}

impl Touchpad {
    /// Identifies the device behind the channel and resolves its profile.
    ///
    /// This runs the magic knock, the firmware version query and every
    /// capability query the detected generation needs, strictly one after
    /// another. None of the queries is retried.
    ///
    /// Returns [`SetupError::NotElantech`] if the device does not identify as
    /// an Elantech touchpad and [`SetupError::Resolve`] if its generation or
    /// geometry cannot be determined.
    pub async fn identify_and_resolve(
        chan: Arc<Ps2Channel>,
        retry: RetryConfig,
    ) -> Result<Self, SetupError> {
        let firmware = detect::detect(&chan).await?;
        let generation = HardwareGeneration::from_firmware(firmware).map_err(ResolveError::from)?;
        let dialect = generation.dialect();
        info!(
            generation = generation.number(),
            ?dialect,
            "determined hardware generation"
        );

        let mut queries = DeviceQueries {
            firmware_version: firmware.to_bytes(),
            ..Default::default()
        };

        queries.capabilities = query(&chan, dialect, Opcode::CapabilitiesQuery).await?;

        if generation != HardwareGeneration::V1 {
            queries.samples = query(&chan, dialect, Opcode::SampleQuery).await?;
        }

        profile::check_absolute_mode(generation, queries.samples).map_err(ResolveError::from)?;

        if queries.needs_resolution(generation) {
            queries.resolution = query(&chan, dialect, Opcode::ResolutionQuery)
                .await
                .inspect_err(|err| warn!(%err, "failed to query resolution data"))
                .ok();
        }

        if queries.needs_firmware_id(generation) {
            queries.firmware_id = Some(query(&chan, dialect, Opcode::FirmwareIdQuery).await?);
        }

        if queries.needs_dpi_samples(generation) {
            queries.dpi_samples = Some(query(&chan, dialect, Opcode::SampleQuery).await?);
        }

        let profile = profile::resolve(&queries)?;
        debug!(?profile, "resolved touchpad profile");

        Ok(Self {
            chan,
            retry,
            queries,
            profile,
        })
    }

    /// The resolved profile of the touchpad.
    pub fn profile(&self) -> &DeviceProfile {
        &self.profile
    }

    /// The raw query replies the profile was resolved from.
    pub fn queries(&self) -> &DeviceQueries {
        &self.queries
    }

    /// Provides register access using the configured command retry policy.
    pub fn registers(&self) -> RegisterIo {
        RegisterIo::new(
            Arc::clone(&self.chan),
            self.profile.generation,
            self.retry.command,
        )
    }

    /// Creates a packet decoder for this touchpad.
    pub fn decoder(&self) -> Decoder<'_> {
        Decoder::new(&self.profile)
    }

    /// Resets the touchpad and switches it to absolute mode.
    ///
    /// Every generation but V4 reads back register 0x10 afterwards, retried
    /// according to [`RetryConfig::read_back`]. A V1 touchpad must report the
    /// absolute mode bit, otherwise [`SetupError::AbsoluteModeRefused`] is
    /// returned.
    pub async fn enable_absolute_mode(&self, config: &AbsoluteModeConfig) -> Result<(), SetupError> {
        let generation = self.profile.generation;
        let registers = self.registers();

        self.chan.reset().await?;

        for write in config.plan(generation) {
            registers
                .write_register(write.register, write.value)
                .await?;
        }

        if generation == HardwareGeneration::V4 {
            return Ok(());
        }

        let value = retry(self.retry.read_back, self.chan.delay(), || {
            registers.read_register(READ_BACK_REGISTER)
        })
        .await
        .inspect_err(|_| warn!("failed to read back register 0x10"))?;

        if generation == HardwareGeneration::V1 && value & R10_ABSOLUTE_MODE == 0 {
            warn!(value, "touchpad refuses to switch to absolute mode");
            return Err(SetupError::AbsoluteModeRefused { value });
        }

        debug!(value, "absolute mode enabled");
        Ok(())
    }

    /// Sets the reporting parameters and enables the data stream.
    pub async fn configure_stream(&self, config: &StreamConfig) -> Result<(), SetupError> {
        let commands = [
            u8::from(Ps2Command::SetDefaultsAndDisable),
            u8::from(Ps2Command::SetSampleRate),
            config.sample_rate,
            u8::from(Ps2Command::SetResolution),
            config.resolution,
            u8::from(Ps2Command::SetScaling1To1),
            u8::from(Ps2Command::Enable),
        ];

        self.chan.send(&commands).await?;
        debug!(?config, "stream reporting enabled");
        Ok(())
    }
}

async fn query(
    chan: &Ps2Channel,
    dialect: CommandDialect,
    opcode: Opcode,
) -> Result<[u8; INFO_REPLY_LENGTH], ChannelError> {
    let reply = chan.query(&dialect::query(dialect, opcode)).await?;
    debug!(?opcode, ?reply, "query reply");
    Ok(reply)
}

/// Represents an error that occurred when setting up a touchpad.
#[derive(Debug, Error)]
pub enum SetupError {
    /// Indicates that the underlying [`Ps2Channel`] returned an error.
    #[error("the PS/2 channel returned an error")]
    Channel(#[from] ChannelError),

    /// Indicates that the device is not an Elantech touchpad.
    #[error(transparent)]
    NotElantech(#[from] NotElantech),

    /// Indicates that the profile of the touchpad could not be resolved.
    #[error("the touchpad profile could not be resolved")]
    Resolve(#[from] ResolveError),

    /// Indicates that a register access failed.
    #[error("a register access failed")]
    Register(#[from] RegisterError),

    /// Indicates that a V1 touchpad did not set the absolute mode bit.
    #[error("the touchpad refuses to switch to absolute mode (register 0x10 is {value:#04x})")]
    AbsoluteModeRefused { value: u8 },
}

impl From<DetectError> for SetupError {
    fn from(err: DetectError) -> Self {
        match err {
            DetectError::Channel(err) => Self::Channel(err),
            DetectError::NotElantech(err) => Self::NotElantech(err),
        }
    }
}

//! Implements basic command/reply messaging across a PS/2 auxiliary port.
//!
//! This includes the generic PS/2 mouse command set and the bounded retry
//! combinator used by everything that talks to the device more than once.

use std::{error::Error, future::Future, time::Duration};

use async_trait::async_trait;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use thiserror::Error;
use tracing::debug;

/// The length of every reply to [`Ps2Command::GetInfo`].
pub const INFO_REPLY_LENGTH: usize = 3;

/// The reply to [`Ps2Command::Reset`] of a device that passed its self-test.
pub const SELF_TEST_PASSED: [u8; 2] = [0xaa, 0x00];

/// Represents an arbitrary PS/2 auxiliary channel.
///
/// Any type this trait is implemented for can be used to talk to an Elantech
/// touchpad. Whether the device behind the channel actually is an Elantech
/// touchpad is determined at a later stage.
#[async_trait]
pub trait RawPs2Channel: Send + Sync + 'static {
    /// Sends every byte of `commands` to the device, waiting for the
    /// acknowledge of each one, and reads `reply.len()` bytes from the data
    /// port into `reply` afterwards.
    ///
    /// Returns the amount of completed steps, meaning acknowledged commands
    /// plus read reply bytes. A transfer that stopped early must return the
    /// amount of steps completed until then instead of an error.
    async fn submit(
        &self,
        commands: &[u8],
        reply: &mut [u8],
    ) -> Result<usize, Box<dyn Error + Sync + Send>>;
}

/// Represents a source of waiting.
///
/// The library never sleeps on its own. Every pause between retried
/// operations goes through this trait.
#[async_trait]
pub trait Delay: Send + Sync + 'static {
    /// Waits for (at least) the given duration.
    async fn delay(&self, duration: Duration);
}

/// The generic PS/2 mouse commands used by the Elantech protocol.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum Ps2Command {
    /// Sets 1:1 scaling. Doubles as the start marker of sliced commands and
    /// as the terminator of register writes.
    SetScaling1To1 = 0xe6,

    /// Sets the resolution. Its argument carries two bits of a sliced byte.
    SetResolution = 0xe8,

    /// Requests the 3-byte status/information reply.
    GetInfo = 0xe9,

    /// Sets the sample rate.
    SetSampleRate = 0xf3,

    /// Enables data reporting.
    Enable = 0xf4,

    /// Restores defaults and disables data reporting.
    SetDefaultsAndDisable = 0xf5,

    /// Resets the device.
    Reset = 0xff,
}

/// Represents a PS/2 channel an Elantech touchpad may be connected to.
pub struct Ps2Channel {
    /// The underlying raw PS/2 channel.
    raw_channel: Box<dyn RawPs2Channel>,

    /// The source of waiting used between retries.
    delay: Box<dyn Delay>,
}

impl Ps2Channel {
    /// Constructs a channel from a raw PS/2 channel and a delay source.
    pub fn new(raw: impl RawPs2Channel, delay: impl Delay) -> Self {
        Self {
            raw_channel: Box::new(raw),
            delay: Box::new(delay),
        }
    }

    /// Returns the delay source of the channel.
    pub fn delay(&self) -> &dyn Delay {
        self.delay.as_ref()
    }

    /// Sends a sequence of commands that do not produce a reply.
    pub async fn send(&self, commands: &[u8]) -> Result<(), ChannelError> {
        self.transfer(commands, &mut []).await
    }

    /// Sends a sequence of commands that ends in [`Ps2Command::GetInfo`] and
    /// returns the 3-byte reply.
    pub async fn query(&self, commands: &[u8]) -> Result<[u8; INFO_REPLY_LENGTH], ChannelError> {
        let mut reply = [0u8; INFO_REPLY_LENGTH];
        self.transfer(commands, &mut reply).await?;
        Ok(reply)
    }

    /// Resets the device and consumes its self-test reply.
    pub async fn reset(&self) -> Result<(), ChannelError> {
        let mut reply = [0u8; SELF_TEST_PASSED.len()];
        self.transfer(&[u8::from(Ps2Command::Reset)], &mut reply)
            .await?;

        if reply != SELF_TEST_PASSED {
            debug!(?reply, "PS/2 self-test failed");
            return Err(ChannelError::SelfTest(reply));
        }

        Ok(())
    }

    async fn transfer(&self, commands: &[u8], reply: &mut [u8]) -> Result<(), ChannelError> {
        let expected = commands.len() + reply.len();
        let transferred = self.raw_channel.submit(commands, reply).await?;

        if transferred != expected {
            debug!(?commands, expected, transferred, "PS/2 transfer stopped early");
            return Err(ChannelError::Transfer {
                expected,
                transferred,
            });
        }

        Ok(())
    }
}

/// Describes how often and how patiently an operation is retried.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RetryPolicy {
    /// The total amount of attempts, including the first one.
    pub tries: u8,

    /// The pause between two attempts in microseconds.
    pub delay_us: u32,
}

impl RetryPolicy {
    /// The policy used for single Elantech custom command steps.
    pub const COMMAND: Self = Self {
        tries: 3,
        delay_us: 500_000,
    };

    /// The policy used when reading back a register after enabling absolute
    /// mode.
    pub const READ_BACK: Self = Self {
        tries: 5,
        delay_us: 2_000,
    };

    /// A policy that never retries.
    pub const ONCE: Self = Self {
        tries: 1,
        delay_us: 0,
    };

    /// The pause between two attempts.
    pub fn delay(&self) -> Duration {
        Duration::from_micros(self.delay_us.into())
    }
}

/// Runs `attempt` until it succeeds or the policy is exhausted.
///
/// Waits for [`RetryPolicy::delay`] after every failed attempt but the last
/// one. A policy with zero tries still runs the operation once.
pub async fn retry<T, E, F, Fut>(
    policy: RetryPolicy,
    delay: &dyn Delay,
    mut attempt: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let tries = policy.tries.max(1);
    let mut remaining = tries;

    loop {
        remaining -= 1;

        match attempt().await {
            Ok(value) => return Ok(value),
            Err(err) if remaining == 0 => return Err(err),
            Err(_) => {
                debug!(attempt = tries - remaining, tries, "retrying failed PS/2 operation");
                delay.delay(policy.delay()).await;
            },
        }
    }
}

/// Represents an error that occurred when interacting with a PS/2 channel.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Indicates that the concrete implementation of [`RawPs2Channel`]
    /// returned an error.
    #[error("the PS/2 channel implementation returned an error")]
    Implementation(#[from] Box<dyn Error + Sync + Send>),

    /// Indicates that fewer steps than requested were transferred.
    #[error("only {transferred} of {expected} PS/2 steps were transferred")]
    Transfer {
        /// The amount of commands plus reply bytes requested.
        expected: usize,

        /// The amount of steps that completed.
        transferred: usize,
    },

    /// Indicates that the device replied to a reset with something other
    /// than [`SELF_TEST_PASSED`].
    #[error("the device failed its self-test (replied {0:02x?})")]
    SelfTest([u8; 2]),
}

//! Implements PS/2 communication over Linux `serio_raw` character devices.
//!
//! The `serio_raw` driver passes every byte written to the device node to the
//! auxiliary port and every byte the port receives back to readers. Commands
//! are acknowledged with [`ACK`].

use std::{error::Error, path::Path, time::Duration};

use anyhow::{Context, Result};
use elantech::{
    async_trait,
    channel::{Delay, Ps2Command, RawPs2Channel},
};
use tokio::{
    fs::{File, OpenOptions},
    io::{AsyncReadExt, AsyncWriteExt},
    sync::Mutex,
    time::timeout,
};
use tracing::trace;

/// The byte a PS/2 device acknowledges a command with.
const ACK: u8 = 0xfa;

/// How long to wait for a single byte from the device.
const BYTE_TIMEOUT: Duration = Duration::from_millis(200);

/// How long to wait for the self-test result after a reset.
const SELF_TEST_TIMEOUT: Duration = Duration::from_millis(1_000);

/// The default `serio_raw` device node.
pub const DEFAULT_DEVICE: &str = "/dev/serio_raw0";

pub struct SerioRawDevice(Mutex<File>);

impl SerioRawDevice {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .await
            .with_context(|| format!("could not open {}", path.display()))?;

        Ok(Self(Mutex::new(file)))
    }
}

async fn read_byte(file: &mut File, patience: Duration) -> Option<u8> {
    timeout(patience, file.read_u8()).await.ok()?.ok()
}

#[async_trait]
impl RawPs2Channel for SerioRawDevice {
    async fn submit(
        &self,
        commands: &[u8],
        reply: &mut [u8],
    ) -> Result<usize, Box<dyn Error + Sync + Send>> {
        let mut file = self.0.lock().await;
        let mut done = 0;

        for &command in commands {
            file.write_all(&[command]).await?;
            file.flush().await?;

            match read_byte(&mut file, BYTE_TIMEOUT).await {
                Some(ACK) => done += 1,
                other => {
                    trace!(command, ?other, "command was not acknowledged");
                    return Ok(done);
                },
            }
        }

        let patience = if commands.last() == Some(&u8::from(Ps2Command::Reset)) {
            SELF_TEST_TIMEOUT
        } else {
            BYTE_TIMEOUT
        };

        for slot in reply.iter_mut() {
            let Some(byte) = read_byte(&mut file, patience).await else {
                return Ok(done);
            };
            *slot = byte;
            done += 1;
        }

        Ok(done)
    }
}

/// Waits using the tokio timer.
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn delay(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

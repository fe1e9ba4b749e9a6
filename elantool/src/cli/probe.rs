use std::{
    io::{BufWriter, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{Context, Result};
use clap::Args;
use elantech::{channel::Ps2Channel, device::Touchpad};
use owo_colors::OwoColorize;
use serde_json::json;

use super::{Cli, profile::write_profile};
use crate::{
    config::ToolConfig,
    serio_raw_impl::{DEFAULT_DEVICE, SerioRawDevice, TokioDelay},
};

/// Identify the touchpad behind a serio_raw device and view its profile.
#[derive(Args)]
pub struct ProbeCommand {
    /// The serio_raw device node the touchpad is bound to
    #[arg(short, long, default_value = DEFAULT_DEVICE)]
    device: PathBuf,

    /// Switch the touchpad to absolute mode and enable reporting afterwards
    #[arg(short, long)]
    enable: bool,
}

impl ProbeCommand {
    pub async fn execute(&self, root: &Cli) -> Result<()> {
        let config = ToolConfig::load(root.config.as_deref())?;

        let raw = SerioRawDevice::open(&self.device).await?;
        let chan = Arc::new(Ps2Channel::new(raw, TokioDelay));

        let touchpad = Touchpad::identify_and_resolve(chan, config.retry)
            .await
            .with_context(|| format!("could not identify a touchpad on {}", self.device.display()))?;

        if self.enable {
            touchpad
                .enable_absolute_mode(&config.absolute_mode)
                .await
                .context("could not switch to absolute mode")?;
            touchpad
                .configure_stream(&config.stream)
                .await
                .context("could not enable reporting")?;
        }

        let mut stdout = BufWriter::new(anstream::stdout());

        if root.json {
            writeln!(
                stdout,
                "{}",
                json!({
                    "queries": touchpad.queries(),
                    "profile": touchpad.profile(),
                    "absolute_mode": self.enable,
                })
            )?;
            return Ok(stdout.flush()?);
        }

        write_profile(&mut stdout, touchpad.profile())?;
        if self.enable {
            writeln!(stdout)?;
            writeln!(stdout, "{}", "Absolute mode and reporting enabled.".green())?;
        }

        Ok(stdout.flush()?)
    }
}

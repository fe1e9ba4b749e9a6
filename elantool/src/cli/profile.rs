use std::{
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Args;
use elantech::profile::{self, DeviceProfile, DeviceQueries};
use itertools::Itertools;
use owo_colors::OwoColorize;
use serde_json::json;

use super::Cli;
use crate::config::read_json;

/// Resolve a touchpad profile from recorded query replies.
#[derive(Args)]
pub struct ProfileCommand {
    /// A JSON file containing the raw query replies
    queries: PathBuf,
}

impl ProfileCommand {
    pub fn execute(&self, root: &Cli) -> Result<()> {
        let profile = load_profile(&self.queries)?;

        let mut stdout = BufWriter::new(anstream::stdout());
        if root.json {
            writeln!(stdout, "{}", json!(profile))?;
        } else {
            write_profile(&mut stdout, &profile)?;
        }

        Ok(stdout.flush()?)
    }
}

/// Reads recorded query replies and resolves them.
pub fn load_profile(path: &Path) -> Result<DeviceProfile> {
    let queries: DeviceQueries = read_json(path)?;
    profile::resolve(&queries).context("could not resolve the touchpad profile")
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02x}")).join(" ")
}

/// Prints a human-readable tree of a profile.
pub fn write_profile(out: &mut impl Write, profile: &DeviceProfile) -> Result<()> {
    writeln!(
        out,
        "Elantech touchpad V{} ({}) {}",
        profile.generation.number().bright_blue(),
        format!("{:?}", profile.dialect).green(),
        format!("firmware {}", profile.firmware_version).bright_black()
    )?;
    writeln!(out, " │")?;

    let bounds = profile.bounds;
    let range = profile.input_range();
    let mut properties = vec![
        format!(
            "BOUNDS: {}..={} x {}..={}",
            bounds.x_min,
            bounds.x_max.bright_black(),
            bounds.y_min,
            bounds.y_max.bright_black()
        ),
        format!(
            "RESOLUTION: {}x{} dots/mm ({}x{} mm)",
            profile.resolution.x,
            profile.resolution.y,
            range.physical_x_mm.bright_black(),
            range.physical_y_mm.bright_black()
        ),
        format!("CAPABILITIES: {}", hex(&profile.capabilities).bright_black()),
        format!("SAMPLES: {}", hex(&profile.samples).bright_black()),
    ];

    if let Some(traces) = profile.traces {
        properties.push(format!(
            "TRACES: {} columns, {} rows, {} wide",
            traces.x_traces,
            traces
                .y_traces
                .map_or_else(|| "unknown".to_string(), |rows| rows.to_string()),
            traces.width.bright_black()
        ));
    }
    if let Some(bus) = profile.bus {
        properties.push(format!("BUS: {:#04x}", bus.bright_black()));
    }

    let quirks = [
        (profile.quirks.has_trackpoint, "trackpoint"),
        (profile.quirks.jumpy_cursor, "jumpy cursor"),
        (profile.quirks.reports_pressure, "pressure"),
        (profile.crc_enabled, "crc"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .join(", ");
    if !quirks.is_empty() {
        properties.push(format!("QUIRKS: {}", quirks.yellow()));
    }

    let properties_len = properties.len();
    for (property_i, property) in properties.into_iter().enumerate() {
        writeln!(
            out,
            "{} {}",
            if property_i == properties_len - 1 {
                " ╰─"
            } else {
                " ├─"
            },
            property
        )?;
    }

    Ok(())
}

use std::{
    fs,
    io::{BufWriter, Write},
    path::PathBuf,
};

use anyhow::{Context, Result, anyhow};
use clap::Args;
use elantech::mt::{Decoder, FingerPosition, PacketEvent};
use owo_colors::OwoColorize;
use serde_json::json;

use super::{Cli, profile::load_profile};

/// Decode a captured V4 packet stream.
#[derive(Args)]
pub struct DecodeCommand {
    /// A JSON file containing the raw query replies of the touchpad
    queries: PathBuf,

    /// A capture of the byte stream as whitespace-separated hex bytes, `#`
    /// starts a comment
    capture: PathBuf,
}

impl DecodeCommand {
    pub fn execute(&self, root: &Cli) -> Result<()> {
        let profile = load_profile(&self.queries)?;
        let capture = fs::read_to_string(&self.capture)
            .with_context(|| format!("could not read {}", self.capture.display()))?;
        let bytes = parse_capture(&capture)?;

        let mut stdout = BufWriter::new(anstream::stdout());
        let mut decoder = Decoder::new(&profile);

        for (packet_i, event) in bytes
            .into_iter()
            .filter_map(|byte| decoder.on_byte(byte))
            .enumerate()
        {
            if root.json {
                writeln!(stdout, "{}", json!({ "packet": packet_i, "event": event }))?;
            } else {
                writeln!(stdout, "{:>5} {}", packet_i.bright_black(), describe(&event))?;
            }
        }

        Ok(stdout.flush()?)
    }
}

/// Parses whitespace-separated hex bytes, ignoring everything after a `#`
/// on each line.
fn parse_capture(capture: &str) -> Result<Vec<u8>> {
    capture
        .lines()
        .enumerate()
        .flat_map(|(line_i, line)| {
            let content = line.split('#').next().unwrap_or_default();
            content
                .split_whitespace()
                .map(move |token| (line_i + 1, token))
        })
        .map(|(line, token)| {
            let digits = token.trim_start_matches("0x");
            u8::from_str_radix(digits, 16)
                .map_err(|_| anyhow!("invalid byte {token:?} on line {line}"))
        })
        .collect()
}

fn position(finger: &FingerPosition) -> String {
    format!("#{} at {}x{}", finger.finger, finger.x, finger.y)
}

fn describe(event: &PacketEvent) -> String {
    match event {
        PacketEvent::FingersSync { mask, lifted } => {
            let mut line = format!("{} fingers {:05b}", "SYNC".blue(), mask);
            if *lifted != 0 {
                line.push_str(&format!(", lifted {}", format!("{lifted:05b}").yellow()));
            }
            line
        },
        PacketEvent::FingerUpdate {
            finger,
            pressure,
            traces,
        } => format!(
            "{} {} {}",
            "HEAD".green(),
            position(finger),
            format!("(pressure {pressure}, {traces} traces)").bright_black()
        ),
        PacketEvent::FingerMotion { primary, secondary } => {
            let moved = [primary, secondary]
                .into_iter()
                .flatten()
                .map(position)
                .collect::<Vec<_>>();
            format!("{} {}", "MOTION".cyan(), moved.join(", "))
        },
        PacketEvent::TrackPoint(packet) => {
            format!("{} {:02x?}", "TRACKPOINT".magenta(), packet)
        },
        PacketEvent::Ignored => "ignored".bright_black().italic().to_string(),
    }
}

//! Loads the optional tool configuration file.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use elantech::config::{AbsoluteModeConfig, RetryConfig, StreamConfig};
use serde::{Deserialize, Serialize};

/// The configuration of the tool. Missing fields fall back to their
/// defaults.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub retry: RetryConfig,
    pub absolute_mode: AbsoluteModeConfig,
    pub stream: StreamConfig,
}

impl ToolConfig {
    /// Reads the configuration from a JSON file, or returns the defaults if
    /// no path was given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        read_json(path).context("could not load configuration")
    }
}

/// Reads and deserializes a JSON file.
pub fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).with_context(|| format!("could not read {}", path.display()))?;

    serde_json::from_str(&content).with_context(|| format!("invalid JSON in {}", path.display()))
}

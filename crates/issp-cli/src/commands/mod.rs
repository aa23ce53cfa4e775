//! Command implementations for isspctl

pub mod config;
pub mod image;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;
use issp_host::IsspConfig;

use crate::error::CliError;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a JSON host configuration
    Check {
        /// Configuration file
        path: PathBuf,
    },

    /// Print the default configuration
    Show,
}

/// Load a configuration file, or the defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<IsspConfig> {
    let Some(path) = path else {
        return Ok(IsspConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .map_err(CliError::from)
        .with_context(|| format!("reading {}", path.display()))?;
    let config = IsspConfig::from_json(&text).map_err(CliError::from)?;
    Ok(config)
}

/// Parse a version byte given as decimal or `0x`-prefixed hex
pub fn parse_version(input: &str) -> Result<u8, String> {
    let input = input.trim();
    let parsed = match input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => input.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid version byte {input:?}: {e}"))
}

//! Host configuration commands

use anyhow::Result;
use issp_host::IsspConfig;

use crate::commands::{ConfigCommands, load_config};
use crate::output;

/// Execute config command
pub fn execute(cmd: &ConfigCommands, json: bool) -> Result<()> {
    match cmd {
        ConfigCommands::Check { path } => {
            let config = load_config(Some(path))?;
            output::print_config(&config, json, true);
            Ok(())
        }
        ConfigCommands::Show => {
            output::print_config(&IsspConfig::default(), json, false);
            Ok(())
        }
    }
}

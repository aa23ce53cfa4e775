//! isspctl - ISSP firmware image and host configuration tool
//!
//! Inspects record-stream firmware images, evaluates update decisions
//! offline, and validates host configurations before they are deployed.

#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;
mod error;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{ConfigCommands, load_config, parse_version};
use crate::error::CliError;

#[derive(Parser)]
#[command(name = "isspctl")]
#[command(about = "ISSP firmware tool - inspect images, check update decisions and configurations")]
#[command(version)]
#[command(long_about = "
isspctl works on the same firmware images and host configurations the ISSP
host uses at attach time, without touching hardware.

Use --json for machine-readable output suitable for scripting.
")]
struct Cli {
    /// Output in JSON format for machine parsing
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a firmware image
    Inspect {
        /// Record-stream image file
        image: PathBuf,
        /// Host configuration (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Decide whether a device would be reprogrammed with an image
    Decide {
        /// Record-stream image file
        image: PathBuf,
        /// Version byte currently on the device (decimal or 0x-hex)
        #[arg(short = 'd', long, value_parser = parse_version)]
        device_version: Option<u8>,
        /// The device's version block is read-protected
        #[arg(long)]
        protected: bool,
        /// Reprogram whenever versions differ
        #[arg(short, long)]
        force: bool,
        /// Host configuration (JSON); defaults apply when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Host configuration commands
    #[command(subcommand)]
    Config(ConfigCommands),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("isspctl={log_level},issp_firmware={log_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    match execute_command(&cli) {
        Ok(()) => Ok(()),
        Err(e) => {
            if cli.json {
                output::print_error_json(&e);
            } else {
                output::print_error_human(&e);
            }

            let exit_code = e.downcast_ref::<CliError>().map_or(1, CliError::exit_code);
            std::process::exit(exit_code);
        }
    }
}

fn execute_command(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Inspect { image, config } => {
            let config = load_config(config.as_deref())?;
            commands::image::inspect(image, &config, cli.json)
        }
        Commands::Decide {
            image,
            device_version,
            protected,
            force,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            commands::image::decide_update(
                image,
                &config,
                *device_version,
                *protected,
                *force,
                cli.json,
            )?;
            Ok(())
        }
        Commands::Config(cmd) => commands::config::execute(cmd, cli.json),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    #[test]
    fn parse_inspect_defaults() -> TestResult {
        let cli = Cli::try_parse_from(["isspctl", "inspect", "js.fw"])?;
        assert!(!cli.json);
        assert_eq!(cli.verbose, 0);
        assert!(matches!(
            cli.command,
            Commands::Inspect { ref image, config: None } if image == &PathBuf::from("js.fw")
        ));
        Ok(())
    }

    #[test]
    fn parse_decide_with_hex_version() -> TestResult {
        let cli = Cli::try_parse_from([
            "isspctl",
            "decide",
            "js.fw",
            "--device-version",
            "0x10",
            "--force",
            "--json",
        ])?;
        assert!(cli.json);
        assert!(matches!(
            cli.command,
            Commands::Decide {
                device_version: Some(0x10),
                force: true,
                protected: false,
                ..
            }
        ));
        Ok(())
    }

    #[test]
    fn parse_decide_rejects_bad_version() {
        let result = Cli::try_parse_from(["isspctl", "decide", "js.fw", "-d", "300"]);
        assert!(result.is_err());
    }

    #[test]
    fn parse_verbose_count() -> TestResult {
        let cli = Cli::try_parse_from(["isspctl", "-vv", "config", "show"])?;
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Commands::Config(ConfigCommands::Show)));
        Ok(())
    }
}

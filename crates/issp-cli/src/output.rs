//! Output formatting for CLI responses

use anyhow::Error;
use colored::*;
use issp_firmware::{DecisionReason, DeviceVersion, UpdateDecision};
use issp_host::IsspConfig;
use serde::Serialize;
use serde_json::json;

use crate::commands::image::ImageSummary;

fn print_json(value: &impl Serialize, what: &str) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format {what} as JSON: {e}"),
    }
}

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
            "chain": error.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        }
    });
    print_json(&error_json, "error");
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

/// Print the result of `inspect`
pub fn print_image_summary(summary: &ImageSummary, json: bool) {
    if json {
        print_json(
            &json!({
                "success": true,
                "image": summary,
            }),
            "image summary",
        );
        return;
    }

    println!("{} {}", "Image:".bold(), summary.path);
    println!("  {} {}", "Status:".bold(), "valid".green());
    println!("  Records: {}", summary.records);
    println!(
        "  Data: {} bytes ({} byte flash)",
        summary.data_bytes, summary.flash_size
    );
    println!("  Version: 0x{:02x}", summary.validation.device_version);
    println!("  Checksum: 0x{:04x}", summary.validation.checksum);
    println!(
        "  Security record: {} @ 0x{:08x}",
        summary.validation.security_record, summary.security_address
    );
}

fn reason_text(reason: DecisionReason) -> &'static str {
    match reason {
        DecisionReason::ProtectedBlock => "version block is protected",
        DecisionReason::NewerImage => "image is newer than the device",
        DecisionReason::Forced => "versions differ and update is forced",
        DecisionReason::UpToDate => "device firmware is current",
    }
}

/// Print an update decision
pub fn print_decision(decision: &UpdateDecision, json: bool) {
    if json {
        print_json(
            &json!({
                "success": true,
                "decision": decision,
            }),
            "decision",
        );
        return;
    }

    let device = match decision.device {
        DeviceVersion::Known(v) => format!("0x{v:02x}"),
        DeviceVersion::Protected => "protected".to_string(),
    };
    let verdict = if decision.update {
        "update".yellow().bold()
    } else {
        "up to date".green().bold()
    };
    println!(
        "{} {} (device {}, image 0x{:02x})",
        "Decision:".bold(),
        verdict,
        device,
        decision.image_version
    );
    println!("  Reason: {}", reason_text(decision.reason));
}

/// Print a configuration, marking it as checked when `checked` is set
pub fn print_config(config: &IsspConfig, json: bool, checked: bool) {
    if json {
        print_json(
            &json!({
                "success": true,
                "valid": checked,
                "config": config,
            }),
            "configuration",
        );
        return;
    }

    if checked {
        println!("{} {}", "Configuration:".bold(), "valid".green());
    } else {
        println!("{}", "Default configuration:".bold());
    }
    println!("  Firmware: {}", config.firmware_name);
    println!(
        "  Flash: {} blocks x {} bytes",
        config.blocks, config.block_size
    );
    println!("  Version byte: 0x{:x}", config.version_address);
    println!("  Silicon ID: {}", config.silicon_id);
    println!("  Force update: {}", config.force_update);
    println!(
        "  Recovery: delay {} ms, settle {} ms, {} attempt(s)",
        config.recovery.delay_ms, config.recovery.settle_ms, config.recovery.attempts
    );
}

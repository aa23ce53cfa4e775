//! Firmware image commands
//!
//! - `inspect <image>` - parse and validate an image, print its metadata
//! - `decide <image> --device-version <v>` - evaluate the update decision

use std::path::Path;

use anyhow::{Context, Result};
use issp_firmware::{
    DeviceVersion, FirmwareError, FirmwareImage, UpdateDecision, UpdatePolicy, ValidationResult,
    decide, validate,
};
use issp_host::IsspConfig;
use serde::Serialize;
use tracing::debug;

use crate::error::CliError;
use crate::output;

/// What `inspect` reports about an image.
#[derive(Debug, Clone, Serialize)]
pub struct ImageSummary {
    /// Image file
    pub path: String,
    /// Number of records
    pub records: usize,
    /// Data bytes across all records
    pub data_bytes: usize,
    /// Expected programmed size
    pub flash_size: u64,
    /// Extracted metadata
    pub validation: ValidationResult,
    /// Address of the security record
    pub security_address: u32,
}

/// Read and validate `path` against `config`
pub fn load_image(path: &Path, config: &IsspConfig) -> Result<(FirmwareImage, ValidationResult)> {
    let bytes = std::fs::read(path)
        .map_err(CliError::from)
        .with_context(|| format!("reading {}", path.display()))?;
    debug!(path = %path.display(), len = bytes.len(), "image loaded");

    let image = FirmwareImage::parse(&bytes)
        .map_err(FirmwareError::from)
        .map_err(CliError::from)?;
    let validation = validate(&image, &config.layout()).map_err(CliError::from)?;
    Ok((image, validation))
}

pub fn inspect(path: &Path, config: &IsspConfig, json: bool) -> Result<()> {
    let (image, validation) = load_image(path, config)?;
    let summary = ImageSummary {
        path: path.display().to_string(),
        records: image.records().len(),
        data_bytes: image.total_data_len(),
        flash_size: config.layout().expected_size(),
        validation,
        security_address: config.security_address,
    };
    output::print_image_summary(&summary, json);
    Ok(())
}

pub fn decide_update(
    path: &Path,
    config: &IsspConfig,
    device_version: Option<u8>,
    protected: bool,
    force: bool,
    json: bool,
) -> Result<UpdateDecision> {
    let device = match (protected, device_version) {
        (true, _) => DeviceVersion::Protected,
        (false, Some(version)) => DeviceVersion::Known(version),
        (false, None) => {
            return Err(CliError::InvalidArgument(
                "either --device-version or --protected is required".to_string(),
            )
            .into());
        }
    };

    let (_, validation) = load_image(path, config)?;
    let policy = UpdatePolicy {
        force_update: force || config.force_update,
    };
    let decision = decide(device, validation.device_version, policy);
    output::print_decision(&decision, json);
    Ok(decision)
}

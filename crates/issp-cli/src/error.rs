//! Error types for isspctl

use issp_firmware::FirmwareError;
use issp_host::ConfigError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Firmware image rejected: {0}")]
    ImageRejected(#[from] FirmwareError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::ImageRejected(_) => 2,
            CliError::InvalidConfiguration(_) | CliError::JsonError(_) => 3,
            CliError::InvalidArgument(_) => 4,
            CliError::IoError(_) => 1,
        }
    }
}

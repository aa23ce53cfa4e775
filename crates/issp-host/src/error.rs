//! Error types for the ISSP host

use issp_firmware::{FirmwareError, ImageError};
use thiserror::Error;

use crate::programmer::SiliconId;

/// Failures reported by the programmer capability or the signal lines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProgrammerError {
    /// The requested flash block is read-protected
    #[error("Flash block {block} is protected")]
    Protected {
        /// Block index
        block: u32,
    },

    /// The device did not answer in time
    #[error("Device timeout: {0}")]
    Timeout(String),

    /// Wire-level communication failed
    #[error("Device communication error: {0}")]
    Communication(String),

    /// Programmed data did not verify
    #[error("Verification failed at block {block}")]
    Verify {
        /// Block index
        block: u32,
    },

    /// A read returned fewer bytes than requested
    #[error("Short read: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Requested length
        expected: usize,
        /// Returned length
        actual: usize,
    },

    /// A GPIO line could not be driven or sampled
    #[error("Signal line error: {0}")]
    Line(String),
}

/// Configuration errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field holds an unusable value
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The configuration document could not be decoded
    #[error("Malformed configuration: {0}")]
    Malformed(String),
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Malformed(e.to_string())
    }
}

/// Errors surfaced by attach, recovery and the control surface.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// Configuration rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Firmware image rejected
    #[error(transparent)]
    Firmware(#[from] FirmwareError),

    /// Programmer or signal line failure
    #[error(transparent)]
    Programmer(#[from] ProgrammerError),

    /// The attached controller is not the expected part
    #[error("Silicon ID check failed: expected {expected}, found {found}")]
    IdentityMismatch {
        /// Configured identity
        expected: SiliconId,
        /// Identity read from the device
        found: SiliconId,
    },

    /// The dependent subsystem failed to unload or reload
    #[error("Dependent subsystem error: {0}")]
    Subsystem(String),

    /// A host resource (thread, guard) could not be set up
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The task runner has shut down
    #[error("Task runner stopped")]
    SchedulerStopped,

    /// A control value could not be parsed
    #[error("Invalid line level: {0:?}")]
    InvalidLevel(String),
}

impl From<ImageError> for HostError {
    fn from(e: ImageError) -> Self {
        HostError::Firmware(e.into())
    }
}

/// Result alias for host operations
pub type HostResult<T> = Result<T, HostError>;

//! Convenience re-exports for common firmware types

pub use crate::decision::{DecisionReason, DeviceVersion, UpdateDecision, UpdatePolicy, decide};
pub use crate::error::{FirmwareError, FirmwareResult, ImageError};
pub use crate::image::{Cursor, FirmwareImage};
pub use crate::record::{FirmwareRecord, RecordRef};
pub use crate::validator::{
    DEFAULT_CHECKSUM_ADDRESS, DEFAULT_SECURITY_ADDRESS, FirmwareLayout, ValidationResult,
    VersionLocation, validate,
};

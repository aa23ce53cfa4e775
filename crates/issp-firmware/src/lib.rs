//! Firmware images for ISSP-programmed microcontrollers
//!
//! This crate covers everything that can be decided about a firmware update
//! without touching hardware:
//!
//! - [`record`]: the packed, address-tagged binary record stream
//! - [`image`]: an owned image with a streaming read cursor
//! - [`validator`]: single-pass metadata extraction (checksum, version, security record)
//! - [`decision`]: whether the device should be reprogrammed
//! - [`error`]: error types
//!
//! # Example
//!
//! ```
//! use issp_firmware::prelude::*;
//!
//! # fn main() -> Result<(), FirmwareError> {
//! let layout = FirmwareLayout::new(64, 2, 0x42);
//! let records = vec![
//!     FirmwareRecord::new(0x00, vec![0; 64])?,
//!     FirmwareRecord::new(0x40, vec![0, 0, 0x05, 0, 0, 0, 0, 0])?,
//!     FirmwareRecord::new(0x48, vec![0; 56])?,
//!     FirmwareRecord::new(DEFAULT_SECURITY_ADDRESS, vec![0xff; 4])?,
//!     FirmwareRecord::new(DEFAULT_CHECKSUM_ADDRESS, vec![0x12, 0x34])?,
//! ];
//! let image = FirmwareImage::new(records)?;
//!
//! let result = validate(&image, &layout)?;
//! assert_eq!(result.device_version, 0x05);
//! assert_eq!(result.checksum, 0x1234);
//!
//! let decision = decide(DeviceVersion::Known(0x03), result.device_version, UpdatePolicy::default());
//! assert!(decision.update);
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_op_in_unsafe_fn, clippy::unwrap_used)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod decision;
pub mod error;
pub mod image;
pub mod prelude;
pub mod record;
pub mod validator;

pub use decision::{DecisionReason, DeviceVersion, UpdateDecision, UpdatePolicy, decide};
pub use error::{FirmwareError, FirmwareResult, ImageError};
pub use image::{Cursor, FirmwareImage};
pub use record::{FirmwareRecord, RECORD_HEADER_LEN, RecordRef, encode_records, parse_records};
pub use validator::{
    DEFAULT_CHECKSUM_ADDRESS, DEFAULT_SECURITY_ADDRESS, FirmwareLayout, ValidationResult,
    VersionLocation, validate,
};

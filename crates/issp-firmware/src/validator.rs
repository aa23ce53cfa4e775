//! Firmware image validation
//!
//! A programmable image must carry four markers, found anywhere in the
//! record stream and in any order:
//!
//! - a record that ends exactly at the device capacity,
//! - the security record at its reserved address,
//! - the checksum record at its reserved address,
//! - a record whose span holds the version byte address past its first byte.
//!
//! The validator makes a single pass over the records and stops as soon as
//! all four are confirmed.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{FirmwareError, FirmwareResult};
use crate::image::FirmwareImage;
use crate::record::RecordRef;

/// Reserved address of the security record
pub const DEFAULT_SECURITY_ADDRESS: u32 = 0x0010_0000;

/// Reserved address of the checksum record
pub const DEFAULT_CHECKSUM_ADDRESS: u32 = 0x0020_0000;

/// Device geometry and reserved addresses an image is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareLayout {
    /// Flash block size in bytes
    pub block_size: u32,
    /// Number of flash blocks
    pub blocks: u32,
    /// Absolute address of the firmware version byte
    pub version_address: u32,
    /// Address of the security record
    pub security_address: u32,
    /// Address of the checksum record
    pub checksum_address: u32,
}

impl FirmwareLayout {
    /// Layout with the default reserved record addresses.
    pub fn new(block_size: u32, blocks: u32, version_address: u32) -> Self {
        Self {
            block_size,
            blocks,
            version_address,
            security_address: DEFAULT_SECURITY_ADDRESS,
            checksum_address: DEFAULT_CHECKSUM_ADDRESS,
        }
    }

    /// Total programmed size, `block_size * blocks`
    pub fn expected_size(&self) -> u64 {
        u64::from(self.block_size) * u64::from(self.blocks)
    }

    /// Block index and in-block offset of the version byte.
    ///
    /// # Errors
    ///
    /// Returns [`FirmwareError::InvalidLayout`] for a zero block size.
    pub fn version_location(&self) -> FirmwareResult<VersionLocation> {
        if self.block_size == 0 {
            return Err(FirmwareError::InvalidLayout(
                "block_size must be non-zero".to_string(),
            ));
        }
        Ok(VersionLocation {
            block: self.version_address / self.block_size,
            offset: self.version_address % self.block_size,
        })
    }

    /// Check that the layout can describe a valid image.
    ///
    /// # Errors
    ///
    /// Returns [`FirmwareError::InvalidLayout`] describing the first problem.
    pub fn validate(&self) -> FirmwareResult<()> {
        if self.block_size == 0 || self.blocks == 0 {
            return Err(FirmwareError::InvalidLayout(
                "block_size and blocks must be non-zero".to_string(),
            ));
        }
        if self.version_address == 0 {
            return Err(FirmwareError::InvalidLayout(
                "version address 0 cannot lie inside a record".to_string(),
            ));
        }
        if u64::from(self.version_address) >= self.expected_size() {
            return Err(FirmwareError::InvalidLayout(format!(
                "version address 0x{:x} is outside the {} byte flash",
                self.version_address,
                self.expected_size()
            )));
        }
        if self.security_address == self.checksum_address {
            return Err(FirmwareError::InvalidLayout(
                "security and checksum records cannot share an address".to_string(),
            ));
        }
        Ok(())
    }
}

/// Where the version byte lives on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionLocation {
    /// Flash block index
    pub block: u32,
    /// Offset within the block
    pub offset: u32,
}

/// Metadata extracted from a valid image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// A record ends exactly at the device capacity
    pub total_length_confirmed: bool,
    /// The security record
    pub security_record: RecordRef,
    /// Checksum carried by the checksum record
    pub checksum: u16,
    /// Firmware version embedded in the image
    pub device_version: u8,
}

#[derive(Debug, Default)]
struct Markers {
    end: bool,
    security: Option<RecordRef>,
    checksum: Option<u16>,
    version: Option<u8>,
}

impl Markers {
    fn confirmed(&self) -> usize {
        usize::from(self.end)
            + usize::from(self.security.is_some())
            + usize::from(self.checksum.is_some())
            + usize::from(self.version.is_some())
    }

    fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if !self.end {
            missing.push("end-of-flash record");
        }
        if self.security.is_none() {
            missing.push("security record");
        }
        if self.checksum.is_none() {
            missing.push("checksum record");
        }
        if self.version.is_none() {
            missing.push("version byte");
        }
        missing
    }
}

const REQUIRED_MARKERS: usize = 4;

/// Scan `image` once and extract its metadata.
///
/// Each marker is taken from the first record that satisfies it. A checksum
/// record shorter than two bytes does not count.
///
/// # Errors
///
/// Returns [`FirmwareError::InvalidImage`] listing the markers not found.
pub fn validate(image: &FirmwareImage, layout: &FirmwareLayout) -> FirmwareResult<ValidationResult> {
    let expected_size = layout.expected_size();
    let mut markers = Markers::default();

    for (rec_ref, record) in image.iter_refs() {
        let address = record.address();

        if !markers.end && record.end() == expected_size {
            markers.end = true;
        }

        if markers.security.is_none() && address == layout.security_address {
            markers.security = Some(rec_ref);
        }

        if markers.checksum.is_none() && address == layout.checksum_address {
            if let Some(&[hi, lo]) = record.data().get(..2) {
                markers.checksum = Some(u16::from_be_bytes([hi, lo]));
            }
        }

        if markers.version.is_none() && record.strictly_contains(layout.version_address) {
            markers.version = record.byte_at(layout.version_address);
        }

        if markers.confirmed() == REQUIRED_MARKERS {
            break;
        }
    }

    match markers {
        Markers {
            end: true,
            security: Some(security_record),
            checksum: Some(checksum),
            version: Some(device_version),
        } => {
            debug!(
                checksum,
                version = device_version,
                security = %security_record,
                "firmware image validated"
            );
            Ok(ValidationResult {
                total_length_confirmed: true,
                security_record,
                checksum,
                device_version,
            })
        }
        _ => {
            let missing = markers.missing();
            error!(?missing, "firmware image invalid");
            Err(FirmwareError::InvalidImage { missing })
        }
    }
}

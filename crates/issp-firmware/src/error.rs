//! Error types for firmware image parsing and validation

use thiserror::Error;

/// Errors raised while decoding a binary record stream.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImageError {
    /// The stream holds no data records before its terminator
    #[error("Firmware image contains no data records")]
    Empty,

    /// A record header runs past the end of the buffer
    #[error("Truncated record header at offset {offset}")]
    TruncatedHeader {
        /// Byte offset of the header
        offset: usize,
    },

    /// A record's data runs past the end of the buffer
    #[error("Record at 0x{address:08x} declares {length} bytes but only {available} remain")]
    TruncatedData {
        /// Record address
        address: u32,
        /// Declared length
        length: u16,
        /// Bytes left in the buffer
        available: usize,
    },

    /// The buffer ended without an end-of-stream record
    #[error("Record stream ends without a terminator")]
    MissingTerminator,

    /// A data record carries no bytes
    #[error("Record at 0x{0:08x} carries no data")]
    EmptyRecord(u32),

    /// A record carries more data than the length field can describe
    #[error("Record at 0x{address:08x} is {length} bytes long (max 65535)")]
    RecordTooLong {
        /// Record address
        address: u32,
        /// Actual data length
        length: usize,
    },

    /// A record reference does not belong to this image
    #[error("No record #{0} in image")]
    UnknownRecord(usize),
}

/// Errors raised by firmware validation and the update decision.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FirmwareError {
    /// Fewer than all required markers were found
    #[error("Invalid firmware image: missing {}", missing.join(", "))]
    InvalidImage {
        /// Names of the markers that were not found
        missing: Vec<&'static str>,
    },

    /// Layout configuration cannot describe a valid image
    #[error("Invalid firmware layout: {0}")]
    InvalidLayout(String),

    /// Record stream could not be decoded
    #[error(transparent)]
    Image(#[from] ImageError),
}

/// Result alias for firmware operations
pub type FirmwareResult<T> = Result<T, FirmwareError>;

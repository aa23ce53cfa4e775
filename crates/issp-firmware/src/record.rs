//! Binary record stream codec
//!
//! A firmware file is a packed sequence of address-tagged records:
//!
//! ```text
//! +-----------------+---------------+------------------+---------+
//! | address (u32 BE)| length (u16 BE)| data[length]    | pad→4   |
//! +-----------------+---------------+------------------+---------+
//! ```
//!
//! Every header starts on a 4-byte boundary. A record with `length == 0`
//! ends the stream.

use serde::{Deserialize, Serialize};

use crate::error::ImageError;

/// Size of a record header in bytes
pub const RECORD_HEADER_LEN: usize = 6;

const RECORD_ALIGN: usize = 4;

/// A single address-tagged chunk of firmware data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FirmwareRecord {
    address: u32,
    data: Vec<u8>,
}

impl FirmwareRecord {
    /// Create a record, rejecting empty or oversized payloads.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::EmptyRecord`] for empty data and
    /// [`ImageError::RecordTooLong`] when the data does not fit a `u16` length.
    pub fn new(address: u32, data: Vec<u8>) -> Result<Self, ImageError> {
        if data.is_empty() {
            return Err(ImageError::EmptyRecord(address));
        }
        if data.len() > usize::from(u16::MAX) {
            return Err(ImageError::RecordTooLong {
                address,
                length: data.len(),
            });
        }
        Ok(Self { address, data })
    }

    /// Start address of the record
    pub fn address(&self) -> u32 {
        self.address
    }

    /// Number of data bytes
    pub fn len(&self) -> u16 {
        u16::try_from(self.data.len()).unwrap_or(u16::MAX)
    }

    /// Records are never empty once constructed
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Record payload
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// First address past the record, widened so it cannot overflow
    pub fn end(&self) -> u64 {
        u64::from(self.address) + u64::from(self.len())
    }

    /// Whether `address` falls within `[self.address, self.end())`
    pub fn contains(&self, address: u32) -> bool {
        address >= self.address && u64::from(address) < self.end()
    }

    /// Whether `address` falls within `(self.address, self.end())`, excluding
    /// the record's first byte
    pub fn strictly_contains(&self, address: u32) -> bool {
        address != self.address && self.contains(address)
    }

    /// Byte stored at absolute `address`, if this record covers it
    pub fn byte_at(&self, address: u32) -> Option<u8> {
        let offset = address.checked_sub(self.address)?;
        self.data.get(usize::try_from(offset).ok()?).copied()
    }
}

/// Stable reference to a record inside a [`crate::FirmwareImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef(pub(crate) usize);

impl RecordRef {
    /// Position of the record within the image
    pub fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for RecordRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

fn padded_len(data_len: usize) -> usize {
    (RECORD_HEADER_LEN + data_len).next_multiple_of(RECORD_ALIGN)
}

/// Decode a packed record stream.
///
/// Every record must lie fully inside `bytes` and the stream must be
/// terminated by a zero-length record. Bytes after the terminator are ignored.
///
/// # Errors
///
/// Returns an [`ImageError`] describing the first framing problem found.
pub fn parse_records(bytes: &[u8]) -> Result<Vec<FirmwareRecord>, ImageError> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    loop {
        if offset >= bytes.len() {
            return Err(ImageError::MissingTerminator);
        }
        let Some(&[a0, a1, a2, a3, l0, l1]) = bytes.get(offset..offset + RECORD_HEADER_LEN) else {
            return Err(ImageError::TruncatedHeader { offset });
        };
        let address = u32::from_be_bytes([a0, a1, a2, a3]);
        let length = u16::from_be_bytes([l0, l1]);

        if length == 0 {
            break;
        }

        let data_start = offset + RECORD_HEADER_LEN;
        let data = bytes
            .get(data_start..data_start + usize::from(length))
            .ok_or(ImageError::TruncatedData {
                address,
                length,
                available: bytes.len().saturating_sub(data_start),
            })?;
        records.push(FirmwareRecord::new(address, data.to_vec())?);

        offset += padded_len(usize::from(length));
    }

    if records.is_empty() {
        return Err(ImageError::Empty);
    }
    Ok(records)
}

/// Encode records into the packed stream format, terminator included.
pub fn encode_records(records: &[FirmwareRecord]) -> Vec<u8> {
    let capacity = records
        .iter()
        .map(|r| padded_len(r.data.len()))
        .sum::<usize>()
        + RECORD_HEADER_LEN;
    let mut out = Vec::with_capacity(capacity);

    for record in records {
        out.extend_from_slice(&record.address.to_be_bytes());
        out.extend_from_slice(&record.len().to_be_bytes());
        out.extend_from_slice(&record.data);
        out.resize(out.len().next_multiple_of(RECORD_ALIGN), 0);
    }
    out.extend_from_slice(&[0u8; RECORD_HEADER_LEN]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(address: u32, data: &[u8]) -> Result<FirmwareRecord, ImageError> {
        FirmwareRecord::new(address, data.to_vec())
    }

    #[test]
    fn test_record_span() -> Result<(), ImageError> {
        let r = rec(0x40, &[1, 2, 3, 4])?;
        assert_eq!(r.end(), 0x44);
        assert!(r.contains(0x40));
        assert!(r.contains(0x43));
        assert!(!r.contains(0x44));
        assert!(!r.strictly_contains(0x40));
        assert!(r.strictly_contains(0x41));
        assert!(!r.strictly_contains(0x44));
        assert_eq!(r.byte_at(0x42), Some(3));
        assert_eq!(r.byte_at(0x3f), None);
        Ok(())
    }

    #[test]
    fn test_record_end_does_not_overflow() -> Result<(), ImageError> {
        let r = rec(u32::MAX, &[0xaa, 0xbb])?;
        assert_eq!(r.end(), u64::from(u32::MAX) + 2);
        Ok(())
    }

    #[test]
    fn test_empty_record_rejected() {
        assert_eq!(rec(0x10, &[]), Err(ImageError::EmptyRecord(0x10)));
    }

    #[test]
    fn test_parse_aligned_stream() -> Result<(), ImageError> {
        // one 3-byte record padded to 12 bytes, then the terminator
        let bytes = [
            0x00, 0x00, 0x01, 0x00, 0x00, 0x03, 0xaa, 0xbb, 0xcc, 0x00, 0x00, 0x00, //
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        let records = parse_records(&bytes)?;
        assert_eq!(records.len(), 1);
        assert_eq!(records.first().map(FirmwareRecord::address), Some(0x100));
        assert_eq!(
            records.first().map(FirmwareRecord::data),
            Some(&[0xaa, 0xbb, 0xcc][..])
        );
        Ok(())
    }

    #[test]
    fn test_encode_matches_parse() -> Result<(), ImageError> {
        let records = vec![rec(0, &[1, 2])?, rec(0x2000, &[9; 7])?, rec(0x10, &[5])?];
        let bytes = encode_records(&records);
        assert_eq!(bytes.len() % RECORD_ALIGN, 2);
        assert_eq!(parse_records(&bytes)?, records);
        Ok(())
    }

    #[test]
    fn test_parse_rejects_truncated_data() {
        let bytes = [0x00, 0x00, 0x00, 0x00, 0x00, 0x08, 0x01, 0x02];
        assert_eq!(
            parse_records(&bytes),
            Err(ImageError::TruncatedData {
                address: 0,
                length: 8,
                available: 2,
            })
        );
    }

    #[test]
    fn test_parse_rejects_truncated_header() {
        let bytes = [0x00, 0x00, 0x00];
        assert_eq!(
            parse_records(&bytes),
            Err(ImageError::TruncatedHeader { offset: 0 })
        );
    }

    #[test]
    fn test_parse_requires_terminator() {
        let bytes = [0x00, 0x00, 0x00, 0x00, 0x00, 0x02, 0x01, 0x02];
        assert_eq!(parse_records(&bytes), Err(ImageError::MissingTerminator));
    }

    #[test]
    fn test_parse_rejects_empty_stream() {
        assert_eq!(parse_records(&[0u8; 6]), Err(ImageError::Empty));
        assert_eq!(parse_records(&[]), Err(ImageError::MissingTerminator));
    }
}

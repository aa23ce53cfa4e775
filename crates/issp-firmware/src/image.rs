//! Firmware image with a streaming read cursor
//!
//! Programmers pull the image one byte at a time in the order the records
//! appear. The cursor crosses record boundaries on its own, and can be
//! rewound or moved to the security record for device-specific steps.

use crate::error::ImageError;
use crate::record::{FirmwareRecord, RecordRef, encode_records, parse_records};

/// Position of the read cursor.
///
/// `offset` is always inside the current record; once it reaches the
/// record's length the cursor moves on to offset 0 of the next record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    /// Index of the current record
    pub record: usize,
    /// Offset inside the current record
    pub offset: usize,
}

/// An ordered, owned set of firmware records plus a read cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    records: Vec<FirmwareRecord>,
    cursor: Cursor,
}

impl FirmwareImage {
    /// Build an image from already decoded records.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::Empty`] when `records` is empty.
    pub fn new(records: Vec<FirmwareRecord>) -> Result<Self, ImageError> {
        if records.is_empty() {
            return Err(ImageError::Empty);
        }
        Ok(Self {
            records,
            cursor: Cursor::default(),
        })
    }

    /// Decode an image from the packed record stream.
    ///
    /// # Errors
    ///
    /// Returns an [`ImageError`] if the stream is malformed.
    pub fn parse(bytes: &[u8]) -> Result<Self, ImageError> {
        Self::new(parse_records(bytes)?)
    }

    /// Encode the image back into the packed record stream.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode_records(&self.records)
    }

    /// All records in stream order
    pub fn records(&self) -> &[FirmwareRecord] {
        &self.records
    }

    /// Look up a record by reference
    pub fn record(&self, rec: RecordRef) -> Option<&FirmwareRecord> {
        self.records.get(rec.0)
    }

    /// Iterate records together with their references
    pub fn iter_refs(&self) -> impl Iterator<Item = (RecordRef, &FirmwareRecord)> {
        self.records
            .iter()
            .enumerate()
            .map(|(idx, rec)| (RecordRef(idx), rec))
    }

    /// Total number of payload bytes across all records
    pub fn total_data_len(&self) -> usize {
        self.records.iter().map(|r| r.data().len()).sum()
    }

    /// Current cursor position
    pub fn position(&self) -> Cursor {
        self.cursor
    }

    /// Whether every byte has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.cursor.record >= self.records.len()
    }

    /// Move the cursor to the first byte of the first record.
    pub fn rewind(&mut self) {
        self.cursor = Cursor::default();
    }

    /// Move the cursor to the first byte of `rec`.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::UnknownRecord`] if `rec` is not part of this image.
    pub fn seek_security(&mut self, rec: RecordRef) -> Result<(), ImageError> {
        if rec.0 >= self.records.len() {
            return Err(ImageError::UnknownRecord(rec.0));
        }
        self.cursor = Cursor {
            record: rec.0,
            offset: 0,
        };
        Ok(())
    }

    /// Return the byte under the cursor and advance.
    ///
    /// Returns `None` once the last record is consumed. Callers are expected
    /// to know how many bytes the programming protocol needs.
    pub fn next_byte(&mut self) -> Option<u8> {
        let record = self.records.get(self.cursor.record)?;
        let byte = record.data().get(self.cursor.offset).copied()?;

        self.cursor.offset += 1;
        if self.cursor.offset >= record.data().len() {
            self.cursor.record += 1;
            self.cursor.offset = 0;
        }
        Some(byte)
    }

    /// Fill `buf` from the cursor, returning how many bytes were written.
    ///
    /// Fewer than `buf.len()` bytes are written only when the image runs out.
    pub fn fill(&mut self, buf: &mut [u8]) -> usize {
        let mut written = 0;
        for slot in buf.iter_mut() {
            match self.next_byte() {
                Some(byte) => {
                    *slot = byte;
                    written += 1;
                }
                None => break,
            }
        }
        written
    }
}

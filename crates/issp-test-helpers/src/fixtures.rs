//! Firmware image fixtures.
//!
//! [`ImageBuilder`] lays a flash region out as fixed-size data records, then
//! appends the security and checksum records. Individual markers can be
//! left out to produce invalid images.

use issp_firmware::{
    DEFAULT_CHECKSUM_ADDRESS, DEFAULT_SECURITY_ADDRESS, FirmwareImage, FirmwareLayout,
    FirmwareRecord, ImageError, encode_records,
};
use issp_host::{IsspConfig, IsspConfigBuilder, RecoveryConfig, SiliconId};

/// Silicon ID used by the default fixtures
pub const FIXTURE_SILICON_ID: SiliconId = SiliconId::new([0x00, 0x5f, 0x52, 0x21]);

/// A marker the validator looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    EndOfFlash,
    Security,
    Checksum,
    Version,
}

/// Builder for record-stream images.
#[derive(Debug, Clone)]
pub struct ImageBuilder {
    block_size: u32,
    blocks: u32,
    chunk: u32,
    version_address: u32,
    version: u8,
    checksum: u16,
    security: Vec<u8>,
    omit: Vec<Marker>,
}

impl Default for ImageBuilder {
    fn default() -> Self {
        Self {
            block_size: 64,
            blocks: 8,
            chunk: 64,
            version_address: 0x42,
            version: 0x05,
            checksum: 0x5a3c,
            security: vec![0xff; 16],
            omit: Vec::new(),
        }
    }
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn geometry(mut self, block_size: u32, blocks: u32) -> Self {
        self.block_size = block_size;
        self.blocks = blocks;
        self
    }

    /// Size of each data record
    pub fn chunk(mut self, chunk: u32) -> Self {
        self.chunk = chunk.max(1);
        self
    }

    pub fn version_address(mut self, address: u32) -> Self {
        self.version_address = address;
        self
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn checksum(mut self, checksum: u16) -> Self {
        self.checksum = checksum;
        self
    }

    /// Leave `marker` out of the image
    pub fn without(mut self, marker: Marker) -> Self {
        self.omit.push(marker);
        self
    }

    pub fn layout(&self) -> FirmwareLayout {
        FirmwareLayout::new(self.block_size, self.blocks, self.version_address)
    }

    /// Configuration matching this image's geometry
    pub fn config(&self) -> IsspConfigBuilder {
        IsspConfig::builder()
            .firmware_name("fixture.fw")
            .geometry(self.block_size, self.blocks)
            .version_address(self.version_address)
            .silicon_id(FIXTURE_SILICON_ID)
            .recovery(RecoveryConfig {
                delay_ms: 0,
                settle_ms: 0,
                attempts: 1,
            })
    }

    /// Flash contents: a repeating pattern with the version byte patched in.
    pub fn flash(&self) -> Vec<u8> {
        let size = self.block_size.saturating_mul(self.blocks);
        (0..size)
            .map(|addr| {
                if addr == self.version_address {
                    self.version
                } else {
                    (addr % 251) as u8
                }
            })
            .collect()
    }

    pub fn records(&self) -> Result<Vec<FirmwareRecord>, ImageError> {
        let flash = self.flash();
        let size = flash.len();
        let chunk = self.chunk as usize;
        let mut records = Vec::new();

        for (i, data) in flash.chunks(chunk).enumerate() {
            let start = i * chunk;
            let end = start + data.len();
            let version = self.version_address as usize;
            let holds_version = start < version && version < end;
            if holds_version && self.omit.contains(&Marker::Version) {
                continue;
            }
            let data = if end == size && self.omit.contains(&Marker::EndOfFlash) {
                &data[..data.len() - 1]
            } else {
                data
            };
            if data.is_empty() {
                continue;
            }
            records.push(FirmwareRecord::new(start as u32, data.to_vec())?);
        }

        if !self.omit.contains(&Marker::Security) {
            records.push(FirmwareRecord::new(
                DEFAULT_SECURITY_ADDRESS,
                self.security.clone(),
            )?);
        }
        if !self.omit.contains(&Marker::Checksum) {
            records.push(FirmwareRecord::new(
                DEFAULT_CHECKSUM_ADDRESS,
                self.checksum.to_be_bytes().to_vec(),
            )?);
        }
        Ok(records)
    }

    pub fn build(&self) -> Result<FirmwareImage, ImageError> {
        FirmwareImage::new(self.records()?)
    }

    /// Encoded record stream
    pub fn to_bytes(&self) -> Result<Vec<u8>, ImageError> {
        Ok(encode_records(&self.records()?))
    }
}

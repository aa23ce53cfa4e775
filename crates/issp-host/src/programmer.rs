//! Hardware capabilities the host drives
//!
//! The ISSP wire protocol itself lives behind [`Programmer`]; the raw data
//! and clock GPIOs live behind [`SignalLines`]. Both are owned by
//! [`Hardware`], which is only ever reached through the recovery
//! coordinator's exclusive lock.

use issp_firmware::{FirmwareImage, ValidationResult};
use serde::{Deserialize, Serialize};

use crate::error::{HostError, ProgrammerError};

/// Four-byte part/revision identity read back from the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SiliconId([u8; 4]);

impl SiliconId {
    /// Wrap raw identity bytes
    pub const fn new(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }

    /// Raw identity bytes
    pub fn bytes(&self) -> [u8; 4] {
        self.0
    }
}

impl From<[u8; 4]> for SiliconId {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

impl std::fmt::Display for SiliconId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}")
    }
}

/// Logic level of a signal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Level {
    /// Logic 0
    Low,
    /// Logic 1
    High,
}

impl Level {
    /// Parse the text form used by operator endpoints: `"0"` or `"1"`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::InvalidLevel`] for anything else.
    pub fn parse(input: &str) -> Result<Self, HostError> {
        match input.trim() {
            "0" => Ok(Level::Low),
            "1" => Ok(Level::High),
            other => Err(HostError::InvalidLevel(other.to_string())),
        }
    }

    /// Level as a bit
    pub fn as_u8(self) -> u8 {
        match self {
            Level::Low => 0,
            Level::High => 1,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// Opaque ISSP programming capability.
///
/// Implementations own the erase/program/verify waveform sequencing on the
/// data and clock lines.
pub trait Programmer: Send {
    /// Enter programming mode and read back the silicon identity.
    fn enter_programming(&mut self) -> Result<SiliconId, ProgrammerError>;

    /// Toggle the controller's reset pin.
    fn reset(&mut self) -> Result<(), ProgrammerError>;

    /// Leave programming mode and let the controller run.
    fn run(&mut self) -> Result<(), ProgrammerError>;

    /// Read `len` bytes at `offset` inside flash block `block`.
    ///
    /// Must return [`ProgrammerError::Protected`] when the block is
    /// read-protected.
    fn read_block(&mut self, block: u32, offset: u32, len: usize)
    -> Result<Vec<u8>, ProgrammerError>;

    /// Erase, program and verify the device from `image`.
    ///
    /// The image cursor is rewound before this is called. `meta` carries the
    /// security record and checksum for the device-specific steps.
    fn program(
        &mut self,
        image: &mut FirmwareImage,
        meta: &ValidationResult,
    ) -> Result<(), ProgrammerError>;
}

/// Raw access to the ISSP data and clock GPIOs.
pub trait SignalLines: Send {
    /// Sample the data line
    fn data(&self) -> Result<Level, ProgrammerError>;

    /// Drive the data line
    fn set_data(&mut self, level: Level) -> Result<(), ProgrammerError>;

    /// Sample the clock line
    fn clock(&self) -> Result<Level, ProgrammerError>;

    /// Drive the clock line
    fn set_clock(&mut self, level: Level) -> Result<(), ProgrammerError>;

    /// Return both lines to non-driving inputs.
    fn release(&mut self) -> Result<(), ProgrammerError>;
}

/// The shared mutable hardware: programmer plus signal lines.
pub struct Hardware {
    /// ISSP programmer
    pub programmer: Box<dyn Programmer>,
    /// Data and clock lines
    pub lines: Box<dyn SignalLines>,
}

impl Hardware {
    /// Bundle a programmer with its lines
    pub fn new(programmer: Box<dyn Programmer>, lines: Box<dyn SignalLines>) -> Self {
        Self { programmer, lines }
    }
}

impl std::fmt::Debug for Hardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hardware").finish_non_exhaustive()
    }
}

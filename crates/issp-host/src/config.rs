//! Host configuration
//!
//! Describes the attached controller: flash geometry, where the version
//! byte lives, the reserved record addresses, the expected silicon identity
//! and recovery timing.

use std::time::Duration;

use issp_firmware::{
    DEFAULT_CHECKSUM_ADDRESS, DEFAULT_SECURITY_ADDRESS, FirmwareLayout, UpdatePolicy,
};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::programmer::SiliconId;

/// Upper bound on recovery attempts per trigger
pub const MAX_RECOVERY_ATTEMPTS: u8 = 3;

/// Timing of the autonomous recovery sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryConfig {
    /// Delay between scheduling and running the recovery task
    pub delay_ms: u64,
    /// Pause after the reset to let the dependent subsystem settle
    pub settle_ms: u64,
    /// Reset attempts per trigger
    pub attempts: u8,
}

impl RecoveryConfig {
    /// Scheduling delay
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Settle pause
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Check the recovery settings.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `attempts` is outside `1..=3`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_RECOVERY_ATTEMPTS).contains(&self.attempts) {
            return Err(ConfigError::Invalid(format!(
                "recovery attempts must be between 1 and {MAX_RECOVERY_ATTEMPTS}"
            )));
        }
        Ok(())
    }
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            delay_ms: 10,
            settle_ms: 500,
            attempts: 1,
        }
    }
}

/// Complete description of an attached ISSP controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsspConfig {
    /// Name of the firmware file to load
    pub firmware_name: String,
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
    /// Reprogram whenever versions differ, including downgrades
    pub force_update: bool,
    /// Expected silicon identity
    pub silicon_id: SiliconId,
    /// Recovery timing
    pub recovery: RecoveryConfig,
}

impl Default for IsspConfig {
    fn default() -> Self {
        Self {
            firmware_name: "issp.fw".to_string(),
            block_size: 64,
            blocks: 128,
            version_address: 0x1fc2,
            security_address: DEFAULT_SECURITY_ADDRESS,
            checksum_address: DEFAULT_CHECKSUM_ADDRESS,
            force_update: false,
            silicon_id: SiliconId::default(),
            recovery: RecoveryConfig::default(),
        }
    }
}

impl IsspConfig {
    /// Create a configuration builder.
    pub fn builder() -> IsspConfigBuilder {
        IsspConfigBuilder::default()
    }

    /// Decode and validate a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Malformed`] for undecodable input and
    /// [`ConfigError::Invalid`] for unusable values.
    pub fn from_json(input: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Layout the firmware validator checks images against
    pub fn layout(&self) -> FirmwareLayout {
        FirmwareLayout {
            block_size: self.block_size,
            blocks: self.blocks,
            version_address: self.version_address,
            security_address: self.security_address,
            checksum_address: self.checksum_address,
        }
    }

    /// Update policy derived from the configuration
    pub fn policy(&self) -> UpdatePolicy {
        UpdatePolicy {
            force_update: self.force_update,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.firmware_name.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "firmware_name must not be empty".to_string(),
            ));
        }
        self.layout()
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        self.recovery.validate()
    }
}

/// Builder for [`IsspConfig`].
#[derive(Debug, Default)]
pub struct IsspConfigBuilder {
    config: IsspConfig,
}

impl IsspConfigBuilder {
    /// Set the firmware file name.
    #[must_use]
    pub fn firmware_name(mut self, name: impl Into<String>) -> Self {
        self.config.firmware_name = name.into();
        self
    }

    /// Set the flash geometry.
    #[must_use]
    pub fn geometry(mut self, block_size: u32, blocks: u32) -> Self {
        self.config.block_size = block_size;
        self.config.blocks = blocks;
        self
    }

    /// Set the version byte address.
    #[must_use]
    pub fn version_address(mut self, address: u32) -> Self {
        self.config.version_address = address;
        self
    }

    /// Override the reserved record addresses.
    #[must_use]
    pub fn reserved_addresses(mut self, security: u32, checksum: u32) -> Self {
        self.config.security_address = security;
        self.config.checksum_address = checksum;
        self
    }

    /// Enable or disable forced updates.
    #[must_use]
    pub fn force_update(mut self, force: bool) -> Self {
        self.config.force_update = force;
        self
    }

    /// Set the expected silicon identity.
    #[must_use]
    pub fn silicon_id(mut self, id: impl Into<SiliconId>) -> Self {
        self.config.silicon_id = id.into();
        self
    }

    /// Set recovery timing.
    #[must_use]
    pub fn recovery(mut self, recovery: RecoveryConfig) -> Self {
        self.config.recovery = recovery;
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn build(self) -> Result<IsspConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

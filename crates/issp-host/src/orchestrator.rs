//! Attach-time programming sequence
//!
//! Enter programming mode, confirm the silicon identity, read the device's
//! version byte, decide, program if needed. Whatever happens, the controller
//! is told to run and the signal lines are released before returning.

use issp_firmware::{
    DeviceVersion, FirmwareImage, FirmwareLayout, UpdateDecision, UpdatePolicy, ValidationResult,
    decide,
};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::error::{HostError, HostResult, ProgrammerError};
use crate::programmer::{Hardware, SiliconId};

/// What the programming sequence did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum UpdateOutcome {
    /// No programming was needed
    UpToDate {
        /// Version on the device
        version: u8,
    },
    /// The device was reprogrammed
    Updated {
        /// Version found before programming
        from: DeviceVersion,
        /// Version programmed
        to: u8,
    },
    /// Programming was attempted and failed; the controller was still
    /// returned to run mode
    ProgrammingFailed {
        /// Version found before programming
        from: DeviceVersion,
        /// Version that was being programmed
        to: u8,
        /// Programmer error text
        error: String,
    },
}

impl UpdateOutcome {
    /// Whether the device now runs the image's version
    pub fn is_current(&self) -> bool {
        matches!(self, Self::UpToDate { .. } | Self::Updated { .. })
    }
}

/// Full account of one programming sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    /// Metadata extracted from the image
    pub validation: ValidationResult,
    /// Update decision
    pub decision: UpdateDecision,
    /// Result of the sequence
    pub outcome: UpdateOutcome,
}

/// Sequences identity check, version read, decision and programming.
#[derive(Debug, Clone)]
pub struct UpdateOrchestrator {
    expected_id: SiliconId,
    layout: FirmwareLayout,
    policy: UpdatePolicy,
}

impl UpdateOrchestrator {
    /// Create an orchestrator for a part with the given identity and layout
    pub fn new(expected_id: SiliconId, layout: FirmwareLayout, policy: UpdatePolicy) -> Self {
        Self {
            expected_id,
            layout,
            policy,
        }
    }

    /// Run the sequence against `hw`, consuming `image`.
    ///
    /// `hw` must already be held exclusively by the caller. The controller is
    /// returned to run mode and the lines are released on every path, after
    /// which the image is dropped.
    ///
    /// # Errors
    ///
    /// - [`HostError::IdentityMismatch`] if the part is not the expected one
    /// - [`HostError::Programmer`] if the version read fails for any reason
    ///   other than protection, or if cleanup fails after an otherwise
    ///   successful sequence
    ///
    /// A failed `program` call is not an error; it is reported as
    /// [`UpdateOutcome::ProgrammingFailed`].
    pub fn execute(
        &self,
        hw: &mut Hardware,
        mut image: FirmwareImage,
        validation: &ValidationResult,
    ) -> HostResult<UpdateReport> {
        let result = self.program_if_needed(hw, &mut image, validation);
        let cleanup = Self::leave_programming(hw);

        drop(image);
        match (result, cleanup) {
            (Ok(report), Ok(())) => Ok(report),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), _) => Err(e),
        }
    }

    fn program_if_needed(
        &self,
        hw: &mut Hardware,
        image: &mut FirmwareImage,
        validation: &ValidationResult,
    ) -> HostResult<UpdateReport> {
        let found = hw.programmer.enter_programming()?;
        if found != self.expected_id {
            error!(expected = %self.expected_id, %found, "silicon ID check failed");
            return Err(HostError::IdentityMismatch {
                expected: self.expected_id,
                found,
            });
        }

        let device = self.read_device_version(hw)?;
        let decision = decide(device, validation.device_version, self.policy);

        let outcome = if decision.update {
            image.rewind();
            match hw.programmer.program(image, validation) {
                Ok(()) => {
                    info!(version = validation.device_version, "firmware programmed");
                    UpdateOutcome::Updated {
                        from: device,
                        to: validation.device_version,
                    }
                }
                Err(e) => {
                    error!(error = %e, "firmware programming failed");
                    UpdateOutcome::ProgrammingFailed {
                        from: device,
                        to: validation.device_version,
                        error: e.to_string(),
                    }
                }
            }
        } else {
            UpdateOutcome::UpToDate {
                version: validation.device_version,
            }
        };

        Ok(UpdateReport {
            validation: *validation,
            decision,
            outcome,
        })
    }

    fn read_device_version(&self, hw: &mut Hardware) -> HostResult<DeviceVersion> {
        let loc = self.layout.version_location()?;
        match hw.programmer.read_block(loc.block, loc.offset, 1) {
            Ok(bytes) => match bytes.first() {
                Some(&version) => Ok(DeviceVersion::Known(version)),
                None => Err(ProgrammerError::ShortRead {
                    expected: 1,
                    actual: 0,
                }
                .into()),
            },
            Err(ProgrammerError::Protected { block }) => {
                warn!(block, "version block is read-protected");
                Ok(DeviceVersion::Protected)
            }
            Err(e) => {
                error!(block = loc.block, error = %e, "reading device version failed");
                Err(e.into())
            }
        }
    }

    fn leave_programming(hw: &mut Hardware) -> HostResult<()> {
        let run = hw.programmer.run();
        if let Err(e) = &run {
            error!(error = %e, "failed to return controller to run mode");
        }
        let release = hw.lines.release();
        if let Err(e) = &release {
            error!(error = %e, "failed to release signal lines");
        }
        run.and(release).map_err(HostError::from)
    }
}

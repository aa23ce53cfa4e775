//! Update decision
//!
//! Compares the version embedded in a validated image with the version byte
//! read back from the device.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// What reading the device's version byte produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceVersion {
    /// The version byte was read
    Known(u8),
    /// The block holding the version is read-protected
    Protected,
}

/// Update policy knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UpdatePolicy {
    /// Reprogram whenever versions differ, including downgrades
    pub force_update: bool,
}

/// Why the decision came out the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionReason {
    /// Protected memory is always replaced
    ProtectedBlock,
    /// Image is newer than the device
    NewerImage,
    /// Versions differ and the policy forces an update
    Forced,
    /// Device already runs this version, or a newer one without force
    UpToDate,
}

/// Outcome of the update decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateDecision {
    /// Whether programming should proceed
    pub update: bool,
    /// Version found on the device
    pub device: DeviceVersion,
    /// Version embedded in the image
    pub image_version: u8,
    /// Reason for the decision
    pub reason: DecisionReason,
}

/// Decide whether the device must be reprogrammed.
pub fn decide(device: DeviceVersion, image_version: u8, policy: UpdatePolicy) -> UpdateDecision {
    let reason = match device {
        DeviceVersion::Protected => {
            warn!("version block is protected, forcing upgrade");
            DecisionReason::ProtectedBlock
        }
        DeviceVersion::Known(current) if current < image_version => DecisionReason::NewerImage,
        DeviceVersion::Known(current) if current != image_version && policy.force_update => {
            DecisionReason::Forced
        }
        DeviceVersion::Known(_) => DecisionReason::UpToDate,
    };

    let update = reason != DecisionReason::UpToDate;
    match device {
        DeviceVersion::Known(current) if update => {
            info!(
                from = current,
                to = image_version,
                forced = reason == DecisionReason::Forced,
                "firmware needs upgrade"
            );
        }
        DeviceVersion::Known(current) => {
            info!(version = current, "firmware version is latest");
        }
        DeviceVersion::Protected => {}
    }

    UpdateDecision {
        update,
        device,
        image_version,
        reason,
    }
}

//! Attach and detach
//!
//! [`IsspHost`] is the explicit context for one attached controller. It is
//! created by [`IsspHost::attach`], which validates the image, programs the
//! device if needed and sets up recovery, and torn down by
//! [`IsspHost::detach`].

use std::sync::Arc;

use issp_firmware::{FirmwareImage, ValidationResult, validate};
use tracing::{error, info};

use crate::config::IsspConfig;
use crate::control::ControlSurface;
use crate::error::{HostError, HostResult};
use crate::orchestrator::{UpdateOrchestrator, UpdateOutcome, UpdateReport};
use crate::programmer::{Hardware, Programmer, SignalLines};
use crate::recovery::{DependentSubsystem, RecoveryCoordinator};
use crate::scheduler::{RECOVERY_RUNNER_NAME, Scheduler, TaskHandle, TaskRunner};
use crate::suspend::SuspendInhibitor;

/// Capabilities handed to [`IsspHost::attach`].
pub struct HostParts {
    /// ISSP programmer
    pub programmer: Box<dyn Programmer>,
    /// Data and clock lines
    pub lines: Box<dyn SignalLines>,
    /// Subsystem torn down around resets
    pub subsystem: Arc<dyn DependentSubsystem>,
    /// Suspend inhibitor held across recovery
    pub inhibitor: Arc<dyn SuspendInhibitor>,
}

impl std::fmt::Debug for HostParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostParts")
            .field("subsystem", &self.subsystem.name())
            .field("inhibitor", &self.inhibitor.name())
            .finish_non_exhaustive()
    }
}

/// What attach found and did.
pub type AttachReport = UpdateReport;

/// One attached ISSP controller.
pub struct IsspHost {
    config: IsspConfig,
    coordinator: RecoveryCoordinator,
}

impl IsspHost {
    /// Attach using a dedicated task runner for recovery.
    ///
    /// # Errors
    ///
    /// See [`IsspHost::attach_with_scheduler`]. Additionally returns
    /// [`HostError::ResourceExhausted`] if the runner cannot be started.
    pub fn attach(
        config: IsspConfig,
        image_bytes: &[u8],
        parts: HostParts,
    ) -> HostResult<(Self, AttachReport)> {
        Self::attach_inner(config, image_bytes, parts, || {
            let runner: Arc<dyn Scheduler> = Arc::new(TaskRunner::spawn(RECOVERY_RUNNER_NAME)?);
            Ok(runner)
        })
    }

    /// Attach, scheduling recovery on `scheduler`.
    ///
    /// # Errors
    ///
    /// - [`HostError::Config`] for an invalid configuration
    /// - [`HostError::Firmware`] for an unparsable or invalid image; the
    ///   lines are released and the device is not touched
    /// - [`HostError::IdentityMismatch`] or [`HostError::Programmer`] from the
    ///   programming sequence; the controller is left running
    pub fn attach_with_scheduler(
        config: IsspConfig,
        image_bytes: &[u8],
        parts: HostParts,
        scheduler: Arc<dyn Scheduler>,
    ) -> HostResult<(Self, AttachReport)> {
        Self::attach_inner(config, image_bytes, parts, move || Ok(scheduler))
    }

    fn attach_inner(
        config: IsspConfig,
        image_bytes: &[u8],
        mut parts: HostParts,
        scheduler: impl FnOnce() -> HostResult<Arc<dyn Scheduler>>,
    ) -> HostResult<(Self, AttachReport)> {
        let prepared = config
            .validate()
            .map_err(HostError::from)
            .and_then(|()| load_image(&config, image_bytes));
        let (image, validation) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(firmware = %config.firmware_name, error = %e, "firmware invalid");
                release_lines(parts.lines.as_mut());
                return Err(e);
            }
        };

        let scheduler = match scheduler() {
            Ok(scheduler) => scheduler,
            Err(e) => {
                error!(error = %e, "cannot create recovery task runner");
                drop(image);
                release_lines(parts.lines.as_mut());
                return Err(e);
            }
        };

        let coordinator = RecoveryCoordinator::new(
            Hardware::new(parts.programmer, parts.lines),
            parts.subsystem,
            parts.inhibitor,
            scheduler,
            config.recovery,
        );

        let orchestrator =
            UpdateOrchestrator::new(config.silicon_id, config.layout(), config.policy());
        let report =
            coordinator.with_hardware(|hw| orchestrator.execute(hw, image, &validation))?;

        match &report.outcome {
            UpdateOutcome::Updated { .. } => info!("firmware update successful"),
            UpdateOutcome::ProgrammingFailed { .. } => error!("firmware update failed"),
            UpdateOutcome::UpToDate { .. } => {}
        }
        info!(firmware = %config.firmware_name, "issp host attached");

        let host = Self {
            config,
            coordinator,
        };
        Ok((host, report))
    }

    /// Configuration in use
    pub fn config(&self) -> &IsspConfig {
        &self.config
    }

    /// Recovery coordinator
    pub fn coordinator(&self) -> &RecoveryCoordinator {
        &self.coordinator
    }

    /// Operator control surface
    pub fn control(&self) -> ControlSurface<'_> {
        ControlSurface::new(&self.coordinator)
    }

    /// Trigger autonomous recovery, for example after a failed resume of the
    /// dependent subsystem.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::SchedulerStopped`] if recovery cannot be queued.
    pub fn start_recovery(&self) -> HostResult<TaskHandle> {
        self.coordinator.start_recovery()
    }

    /// Tear down the host. Pending recoveries are discarded; one already
    /// running finishes first.
    pub fn detach(self) {
        info!(firmware = %self.config.firmware_name, "issp host detached");
        drop(self);
    }
}

impl std::fmt::Debug for IsspHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IsspHost")
            .field("firmware", &self.config.firmware_name)
            .field("coordinator", &self.coordinator)
            .finish()
    }
}

fn load_image(
    config: &IsspConfig,
    image_bytes: &[u8],
) -> HostResult<(FirmwareImage, ValidationResult)> {
    let image = FirmwareImage::parse(image_bytes)?;
    let validation = validate(&image, &config.layout())?;
    Ok((image, validation))
}

fn release_lines(lines: &mut dyn SignalLines) {
    if let Err(e) = lines.release() {
        error!(error = %e, "failed to release signal lines");
    }
}

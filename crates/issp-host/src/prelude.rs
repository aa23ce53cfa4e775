//! Common imports for host users

pub use crate::config::{IsspConfig, RecoveryConfig};
pub use crate::control::{ControlCommand, ControlResponse, ControlSurface, Line};
pub use crate::error::{ConfigError, HostError, HostResult, ProgrammerError};
pub use crate::host::{AttachReport, HostParts, IsspHost};
pub use crate::orchestrator::{UpdateOutcome, UpdateReport};
pub use crate::programmer::{Level, Programmer, SignalLines, SiliconId};
pub use crate::recovery::{CoordinatorState, DependentSubsystem, RecoveryCoordinator};
pub use crate::scheduler::{Scheduler, TaskHandle, TaskRunner};
pub use crate::suspend::{CountingInhibitor, SuspendGuard, SuspendInhibitor};

//! # issp-host
//!
//! Host side of ISSP firmware management: attach-time programming and
//! lock-serialized controller recovery.
//!
//! - [`programmer`]: the opaque programming capability and the raw signal lines
//! - [`orchestrator`]: identity check, version read, decision, programming, cleanup
//! - [`recovery`]: pin reset, full reset and delayed autonomous recovery behind one lock
//! - [`suspend`]: suspend inhibition with an RAII guard
//! - [`scheduler`]: the dedicated delayed-task runner
//! - [`control`]: operator commands
//! - [`host`]: attach/detach context
//!
//! ## Lifecycle
//!
//! ```text
//! attach ──► validate config ──► parse + validate image ──► start task runner
//!                                     │ invalid                   │
//!                                     ▼                           ▼
//!                               release lines            lock ─ program if needed
//!                               return error                  ─ run ─ release lines
//!                                                                 │
//!                                                                 ▼
//!                                                     IsspHost (control, recovery)
//!                                                                 │
//!                                                              detach
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use issp_host::prelude::*;
//!
//! fn attach(parts: HostParts, image: &[u8]) -> HostResult<()> {
//!     let config = IsspConfig::builder()
//!         .firmware_name("js.fw")
//!         .geometry(64, 128)
//!         .version_address(0x1fc2)
//!         .silicon_id([0x00, 0x5f, 0x52, 0x21])
//!         .build()?;
//!
//!     let (host, report) = IsspHost::attach(config, image, parts)?;
//!     println!("{:?}", report.outcome);
//!
//!     host.control().dispatch(ControlCommand::PinReset)?;
//!     host.start_recovery()?;
//!     host.detach();
//!     Ok(())
//! }
//! ```

#![deny(
    unsafe_op_in_unsafe_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    missing_docs
)]
#![warn(missing_debug_implementations, rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod control;
pub mod error;
pub mod host;
pub mod orchestrator;
pub mod prelude;
pub mod programmer;
pub mod recovery;
pub mod scheduler;
pub mod suspend;

pub use config::{IsspConfig, IsspConfigBuilder, MAX_RECOVERY_ATTEMPTS, RecoveryConfig};
pub use control::{ControlCommand, ControlResponse, ControlSurface, Line};
pub use error::{ConfigError, HostError, HostResult, ProgrammerError};
pub use host::{AttachReport, HostParts, IsspHost};
pub use orchestrator::{UpdateOrchestrator, UpdateOutcome, UpdateReport};
pub use programmer::{Hardware, Level, Programmer, SignalLines, SiliconId};
pub use recovery::{CoordinatorState, DependentSubsystem, RecoveryCoordinator, RecoveryMetrics};
pub use scheduler::{RECOVERY_RUNNER_NAME, Scheduler, Task, TaskHandle, TaskRunner};
pub use suspend::{CountingInhibitor, RECOVERY_INHIBITOR_NAME, SuspendGuard, SuspendInhibitor};

//! Controller reset and recovery coordination
//!
//! Every path that touches the reset pin or the programmer goes through one
//! exclusive lock:
//!
//! - manual pin reset: toggle the controller reset
//! - manual full reset: unload the dependent subsystem, toggle reset, reload
//! - autonomous recovery: the same sequence, run on the task runner after a
//!   short delay while a suspend guard is held
//!
//! ```text
//! start_recovery()            task runner (after delay)
//!   acquire SuspendGuard  ──►   guard held? ── no ──► log, skip
//!   schedule_after(delay)        │ yes
//!                                ▼
//!                              lock ─ unload ─ reset ─ reload ─ unlock
//!                                ▼
//!                              settle pause
//!                                ▼
//!                              release SuspendGuard
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

use parking_lot::{Mutex, MutexGuard};
use tracing::{error, info, warn};

use crate::config::RecoveryConfig;
use crate::error::{HostError, HostResult};
use crate::programmer::Hardware;
use crate::scheduler::{Scheduler, TaskHandle};
use crate::suspend::{SuspendGuard, SuspendInhibitor};

/// An external bus or service that must be torn down around a controller reset.
pub trait DependentSubsystem: Send + Sync {
    /// Subsystem name, for logs
    fn name(&self) -> &str;

    /// Tear the subsystem down before the reset.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Subsystem`] if it cannot be unloaded.
    fn unload(&self) -> HostResult<()>;

    /// Bring the subsystem back after the reset.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::Subsystem`] if it cannot be reloaded.
    fn reload(&self) -> HostResult<()>;
}

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum CoordinatorState {
    /// No reset sequence running
    #[default]
    Idle = 0,
    /// A reset sequence holds the lock
    Recovering = 1,
}

impl CoordinatorState {
    fn from_raw(value: u8) -> Self {
        match value {
            1 => Self::Recovering,
            _ => Self::Idle,
        }
    }
}

impl std::fmt::Display for CoordinatorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Recovering => write!(f, "Recovering"),
        }
    }
}

/// Snapshot of the coordinator counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoveryMetrics {
    /// Completed manual pin resets
    pub pin_resets: u32,
    /// Completed manual full resets
    pub full_resets: u32,
    /// Autonomous recoveries whose reset sequence succeeded
    pub recoveries: u32,
    /// Autonomous recoveries where every attempt failed
    pub failed_recoveries: u32,
    /// Autonomous recoveries skipped because no guard was held
    pub skipped_recoveries: u32,
    /// Reset sequences that reported an error
    pub failed_sequences: u32,
}

#[derive(Debug, Default)]
struct Counters {
    pin_resets: AtomicU32,
    full_resets: AtomicU32,
    recoveries: AtomicU32,
    failed_recoveries: AtomicU32,
    skipped_recoveries: AtomicU32,
    failed_sequences: AtomicU32,
}

impl Counters {
    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> RecoveryMetrics {
        RecoveryMetrics {
            pin_resets: self.pin_resets.load(Ordering::Relaxed),
            full_resets: self.full_resets.load(Ordering::Relaxed),
            recoveries: self.recoveries.load(Ordering::Relaxed),
            failed_recoveries: self.failed_recoveries.load(Ordering::Relaxed),
            skipped_recoveries: self.skipped_recoveries.load(Ordering::Relaxed),
            failed_sequences: self.failed_sequences.load(Ordering::Relaxed),
        }
    }
}

struct Shared {
    hardware: Mutex<Hardware>,
    subsystem: Arc<dyn DependentSubsystem>,
    inhibitor: Arc<dyn SuspendInhibitor>,
    config: RecoveryConfig,
    state: AtomicU8,
    counters: Counters,
}

/// Marks the coordinator as recovering while a reset sequence holds the lock.
struct Recovering<'a> {
    state: &'a AtomicU8,
}

impl<'a> Recovering<'a> {
    fn enter(state: &'a AtomicU8) -> Self {
        state.store(CoordinatorState::Recovering as u8, Ordering::Release);
        Self { state }
    }
}

impl Drop for Recovering<'_> {
    fn drop(&mut self) {
        self.state
            .store(CoordinatorState::Idle as u8, Ordering::Release);
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Hardware> {
        self.hardware.lock()
    }

    fn pin_reset_locked(hw: &mut Hardware) -> HostResult<()> {
        hw.programmer.reset().map_err(|e| {
            error!(error = %e, "controller reset failed");
            HostError::from(e)
        })
    }

    /// Unload, reset, reload. Every step runs even if an earlier one failed;
    /// the first error is returned.
    fn reset_with_subsystem_locked(&self, hw: &mut Hardware) -> HostResult<()> {
        let subsystem = self.subsystem.name();

        let unloaded = self.subsystem.unload();
        if let Err(e) = &unloaded {
            warn!(subsystem, error = %e, "subsystem unload failed, resetting anyway");
        }
        let reset = Self::pin_reset_locked(hw);
        let reloaded = self.subsystem.reload();
        if let Err(e) = &reloaded {
            error!(subsystem, error = %e, "subsystem reload failed");
        }

        let result = unloaded.and(reset).and(reloaded);
        if result.is_err() {
            Counters::bump(&self.counters.failed_sequences);
        }
        result
    }

    fn run_recovery(&self, guard: Option<SuspendGuard>) {
        info!("recovery work started");
        let guard = match guard {
            Some(guard) if guard.is_held() => guard,
            Some(guard) => {
                error!(
                    inhibitor = self.inhibitor.name(),
                    "suspend guard no longer held, skipping recovery"
                );
                guard.disarm();
                Counters::bump(&self.counters.skipped_recoveries);
                return;
            }
            None => {
                error!(
                    inhibitor = self.inhibitor.name(),
                    "recovery scheduled without a suspend guard, skipping"
                );
                Counters::bump(&self.counters.skipped_recoveries);
                return;
            }
        };

        let mut recovered = false;
        for attempt in 0..self.config.attempts {
            info!(attempt, "recovery attempt");
            let result = {
                let mut hw = self.lock();
                let _recovering = Recovering::enter(&self.state);
                self.reset_with_subsystem_locked(&mut hw)
            };
            std::thread::sleep(self.config.settle());

            match result {
                Ok(()) => {
                    recovered = true;
                    break;
                }
                Err(e) => warn!(attempt, error = %e, "recovery attempt failed"),
            }
        }

        guard.release();
        if recovered {
            Counters::bump(&self.counters.recoveries);
            info!("recovery complete, suspend guard released");
        } else {
            Counters::bump(&self.counters.failed_recoveries);
            error!(
                attempts = self.config.attempts,
                "recovery failed on every attempt, suspend guard released"
            );
        }
    }
}

/// Serializes every reset-affecting sequence behind one exclusive lock.
pub struct RecoveryCoordinator {
    shared: Arc<Shared>,
    scheduler: Arc<dyn Scheduler>,
}

impl RecoveryCoordinator {
    /// Build a coordinator that owns `hardware`.
    pub fn new(
        hardware: Hardware,
        subsystem: Arc<dyn DependentSubsystem>,
        inhibitor: Arc<dyn SuspendInhibitor>,
        scheduler: Arc<dyn Scheduler>,
        config: RecoveryConfig,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                hardware: Mutex::new(hardware),
                subsystem,
                inhibitor,
                config,
                state: AtomicU8::new(CoordinatorState::Idle as u8),
                counters: Counters::default(),
            }),
            scheduler,
        }
    }

    /// Current state
    pub fn state(&self) -> CoordinatorState {
        CoordinatorState::from_raw(self.shared.state.load(Ordering::Acquire))
    }

    /// Whether the exclusive lock is currently held
    pub fn is_busy(&self) -> bool {
        self.shared.hardware.is_locked()
    }

    /// Counter snapshot
    pub fn metrics(&self) -> RecoveryMetrics {
        self.shared.counters.snapshot()
    }

    /// Recovery timing in use
    pub fn config(&self) -> &RecoveryConfig {
        &self.shared.config
    }

    /// Run `f` with exclusive access to the hardware.
    pub fn with_hardware<R>(&self, f: impl FnOnce(&mut Hardware) -> R) -> R {
        let mut hw = self.shared.lock();
        f(&mut hw)
    }

    /// Toggle the controller reset pin.
    ///
    /// # Errors
    ///
    /// Returns the programmer's error if the reset could not be driven.
    pub fn pin_reset(&self) -> HostResult<()> {
        {
            let mut hw = self.shared.lock();
            let _recovering = Recovering::enter(&self.shared.state);
            Shared::pin_reset_locked(&mut hw)?;
        }
        Counters::bump(&self.shared.counters.pin_resets);
        info!("toggled reset pin on controller");
        Ok(())
    }

    /// Unload the dependent subsystem, reset the controller and reload.
    ///
    /// Suspend is inhibited for the duration.
    ///
    /// # Errors
    ///
    /// Returns the first error from unload, reset or reload; the remaining
    /// steps still run.
    pub fn full_reset(&self) -> HostResult<()> {
        let guard = SuspendGuard::acquire(self.shared.inhibitor.clone());
        let result = {
            let mut hw = self.shared.lock();
            let _recovering = Recovering::enter(&self.shared.state);
            self.shared.reset_with_subsystem_locked(&mut hw)
        };
        guard.release();

        result?;
        Counters::bump(&self.shared.counters.full_resets);
        info!(
            subsystem = self.shared.subsystem.name(),
            "reset both subsystem and controller"
        );
        Ok(())
    }

    /// Acquire a suspend guard and schedule autonomous recovery.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::SchedulerStopped`] if the task runner is gone;
    /// the guard is released in that case.
    pub fn start_recovery(&self) -> HostResult<TaskHandle> {
        info!("starting controller recovery");
        let guard = SuspendGuard::acquire(self.shared.inhibitor.clone());
        self.schedule_recovery(Some(guard))
    }

    /// Schedule autonomous recovery, handing over an already held guard.
    ///
    /// When the task fires without a held guard it logs an error and does
    /// nothing: no reset, no release.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::SchedulerStopped`] if the task runner is gone.
    pub fn schedule_recovery(&self, guard: Option<SuspendGuard>) -> HostResult<TaskHandle> {
        let shared = Arc::clone(&self.shared);
        self.scheduler
            .schedule_after(
                self.shared.config.delay(),
                Box::new(move || shared.run_recovery(guard)),
            )
            .inspect_err(|e| error!(error = %e, "cannot schedule recovery"))
    }
}

impl std::fmt::Debug for RecoveryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryCoordinator")
            .field("state", &self.state())
            .field("metrics", &self.metrics())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProgrammerError;
    use crate::programmer::{Level, Programmer, SignalLines, SiliconId};
    use crate::scheduler::Task;
    use crate::suspend::CountingInhibitor;
    use issp_firmware::{FirmwareImage, ValidationResult};
    use std::time::Duration;

    type Log = Arc<parking_lot::Mutex<Vec<&'static str>>>;

    struct LoggingProgrammer(Log);

    impl Programmer for LoggingProgrammer {
        fn enter_programming(&mut self) -> Result<SiliconId, ProgrammerError> {
            Ok(SiliconId::default())
        }
        fn reset(&mut self) -> Result<(), ProgrammerError> {
            self.0.lock().push("reset");
            Ok(())
        }
        fn run(&mut self) -> Result<(), ProgrammerError> {
            Ok(())
        }
        fn read_block(&mut self, _: u32, _: u32, len: usize) -> Result<Vec<u8>, ProgrammerError> {
            Ok(vec![0; len])
        }
        fn program(
            &mut self,
            _: &mut FirmwareImage,
            _: &ValidationResult,
        ) -> Result<(), ProgrammerError> {
            Ok(())
        }
    }

    struct NullLines;

    impl SignalLines for NullLines {
        fn data(&self) -> Result<Level, ProgrammerError> {
            Ok(Level::Low)
        }
        fn set_data(&mut self, _: Level) -> Result<(), ProgrammerError> {
            Ok(())
        }
        fn clock(&self) -> Result<Level, ProgrammerError> {
            Ok(Level::Low)
        }
        fn set_clock(&mut self, _: Level) -> Result<(), ProgrammerError> {
            Ok(())
        }
        fn release(&mut self) -> Result<(), ProgrammerError> {
            Ok(())
        }
    }

    struct LoggingSubsystem {
        log: Log,
        fail_unload: bool,
    }

    impl DependentSubsystem for LoggingSubsystem {
        fn name(&self) -> &str {
            "usb"
        }
        fn unload(&self) -> HostResult<()> {
            self.log.lock().push("unload");
            if self.fail_unload {
                return Err(HostError::Subsystem("busy".to_string()));
            }
            Ok(())
        }
        fn reload(&self) -> HostResult<()> {
            self.log.lock().push("reload");
            Ok(())
        }
    }

    /// Runs tasks only when asked.
    #[derive(Default)]
    struct QueueScheduler {
        tasks: parking_lot::Mutex<Vec<Task>>,
    }

    impl QueueScheduler {
        fn run_all(&self) {
            let tasks: Vec<Task> = std::mem::take(&mut *self.tasks.lock());
            for task in tasks {
                task();
            }
        }
    }

    impl Scheduler for QueueScheduler {
        fn schedule_after(&self, _: Duration, task: Task) -> HostResult<TaskHandle> {
            self.tasks.lock().push(task);
            Ok(TaskHandle::new())
        }
    }

    struct Fixture {
        coordinator: RecoveryCoordinator,
        log: Log,
        inhibitor: Arc<CountingInhibitor>,
        scheduler: Arc<QueueScheduler>,
    }

    fn fixture(fail_unload: bool) -> Fixture {
        let log: Log = Arc::default();
        let inhibitor = Arc::new(CountingInhibitor::default());
        let scheduler = Arc::new(QueueScheduler::default());
        let coordinator = RecoveryCoordinator::new(
            Hardware::new(Box::new(LoggingProgrammer(log.clone())), Box::new(NullLines)),
            Arc::new(LoggingSubsystem {
                log: log.clone(),
                fail_unload,
            }),
            inhibitor.clone(),
            scheduler.clone(),
            RecoveryConfig {
                delay_ms: 0,
                settle_ms: 0,
                attempts: 1,
            },
        );
        Fixture {
            coordinator,
            log,
            inhibitor,
            scheduler,
        }
    }

    #[test]
    fn test_pin_reset() -> HostResult<()> {
        let f = fixture(false);
        f.coordinator.pin_reset()?;
        assert_eq!(*f.log.lock(), vec!["reset"]);
        assert_eq!(f.coordinator.metrics().pin_resets, 1);
        assert_eq!(f.inhibitor.acquisitions(), 0);
        assert_eq!(f.coordinator.state(), CoordinatorState::Idle);
        Ok(())
    }

    #[test]
    fn test_full_reset_sequence() -> HostResult<()> {
        let f = fixture(false);
        f.coordinator.full_reset()?;
        assert_eq!(*f.log.lock(), vec!["unload", "reset", "reload"]);
        assert_eq!(f.inhibitor.acquisitions(), 1);
        assert_eq!(f.inhibitor.releases(), 1);
        Ok(())
    }

    #[test]
    fn test_full_reset_continues_after_unload_failure() {
        let f = fixture(true);
        let result = f.coordinator.full_reset();
        assert!(matches!(result, Err(HostError::Subsystem(_))));
        assert_eq!(*f.log.lock(), vec!["unload", "reset", "reload"]);
        assert_eq!(f.coordinator.metrics().failed_sequences, 1);
        assert!(!f.inhibitor.is_inhibited());
    }

    #[test]
    fn test_recovery_holds_guard_until_complete() -> HostResult<()> {
        let f = fixture(false);
        f.coordinator.start_recovery()?;
        assert!(f.inhibitor.is_inhibited());
        assert!(f.log.lock().is_empty());

        f.scheduler.run_all();
        assert_eq!(*f.log.lock(), vec!["unload", "reset", "reload"]);
        assert!(!f.inhibitor.is_inhibited());
        assert_eq!(f.inhibitor.releases(), 1);
        assert_eq!(f.coordinator.metrics().recoveries, 1);
        Ok(())
    }

    #[test]
    fn test_failed_recovery_is_not_counted_as_recovered() -> HostResult<()> {
        let f = fixture(true);
        f.coordinator.start_recovery()?;
        f.scheduler.run_all();

        let metrics = f.coordinator.metrics();
        assert_eq!(metrics.recoveries, 0);
        assert_eq!(metrics.failed_recoveries, 1);
        assert_eq!(metrics.failed_sequences, 1);
        assert!(!f.inhibitor.is_inhibited());
        Ok(())
    }

    #[test]
    fn test_recovery_without_guard_is_skipped() -> HostResult<()> {
        let f = fixture(false);
        f.coordinator.schedule_recovery(None)?;
        f.scheduler.run_all();

        assert!(f.log.lock().is_empty());
        assert_eq!(f.inhibitor.releases(), 0);
        assert_eq!(f.coordinator.metrics().skipped_recoveries, 1);
        assert_eq!(f.coordinator.metrics().recoveries, 0);
        Ok(())
    }

    #[test]
    fn test_stale_guard_is_not_released() -> HostResult<()> {
        let f = fixture(false);
        let guard = SuspendGuard::acquire(f.inhibitor.clone());
        // inhibitor reset behind the guard's back
        f.inhibitor.allow();
        f.coordinator.schedule_recovery(Some(guard))?;
        f.scheduler.run_all();

        assert!(f.log.lock().is_empty());
        assert_eq!(f.inhibitor.releases(), 1);
        assert_eq!(f.coordinator.metrics().skipped_recoveries, 1);
        Ok(())
    }
}

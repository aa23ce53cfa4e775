//! Suspend inhibition
//!
//! While the dependent subsystem is torn down the system must not enter
//! low-power suspend. A [`SuspendGuard`] holds one inhibition on a
//! [`SuspendInhibitor`] and gives it back exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use tracing::trace;

/// Name of the inhibitor held across controller recovery
pub const RECOVERY_INHIBITOR_NAME: &str = "issp-js-recovery";

/// Platform hook that blocks system suspend while inhibited.
pub trait SuspendInhibitor: Send + Sync {
    /// Inhibitor name, for logs
    fn name(&self) -> &str;

    /// Add one inhibition.
    fn inhibit(&self);

    /// Drop one inhibition.
    fn allow(&self);

    /// Whether suspend is currently blocked
    fn is_inhibited(&self) -> bool;
}

/// In-process inhibitor that counts outstanding inhibitions.
#[derive(Debug)]
pub struct CountingInhibitor {
    name: String,
    active: AtomicU32,
    acquisitions: AtomicU32,
    releases: AtomicU32,
}

impl CountingInhibitor {
    /// Create an inhibitor with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            active: AtomicU32::new(0),
            acquisitions: AtomicU32::new(0),
            releases: AtomicU32::new(0),
        }
    }

    /// Outstanding inhibitions
    pub fn active(&self) -> u32 {
        self.active.load(Ordering::Acquire)
    }

    /// Total `inhibit` calls
    pub fn acquisitions(&self) -> u32 {
        self.acquisitions.load(Ordering::Acquire)
    }

    /// Total `allow` calls
    pub fn releases(&self) -> u32 {
        self.releases.load(Ordering::Acquire)
    }
}

impl Default for CountingInhibitor {
    fn default() -> Self {
        Self::new(RECOVERY_INHIBITOR_NAME)
    }
}

impl SuspendInhibitor for CountingInhibitor {
    fn name(&self) -> &str {
        &self.name
    }

    fn inhibit(&self) {
        self.active.fetch_add(1, Ordering::AcqRel);
        self.acquisitions.fetch_add(1, Ordering::Relaxed);
    }

    fn allow(&self) {
        let previous = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
        if previous.is_ok() {
            self.releases.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn is_inhibited(&self) -> bool {
        self.active() > 0
    }
}

/// One held inhibition. Released on [`SuspendGuard::release`] or drop.
pub struct SuspendGuard {
    inhibitor: Arc<dyn SuspendInhibitor>,
    held: bool,
}

impl SuspendGuard {
    /// Inhibit suspend until the guard is released.
    pub fn acquire(inhibitor: Arc<dyn SuspendInhibitor>) -> Self {
        inhibitor.inhibit();
        trace!(inhibitor = inhibitor.name(), "suspend inhibited");
        Self {
            inhibitor,
            held: true,
        }
    }

    /// Whether this guard still holds an inhibition the inhibitor knows about
    pub fn is_held(&self) -> bool {
        self.held && self.inhibitor.is_inhibited()
    }

    /// Give the inhibition back.
    pub fn release(mut self) {
        self.release_inner();
    }

    /// Drop the guard without calling `allow`.
    ///
    /// Used when the inhibitor no longer accounts for this guard, so a
    /// release would unbalance it.
    pub fn disarm(mut self) {
        self.held = false;
    }

    fn release_inner(&mut self) {
        if self.held {
            self.held = false;
            self.inhibitor.allow();
            trace!(inhibitor = self.inhibitor.name(), "suspend allowed");
        }
    }
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

impl std::fmt::Debug for SuspendGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SuspendGuard")
            .field("inhibitor", &self.inhibitor.name())
            .field("held", &self.held)
            .finish()
    }
}

//! Delayed task execution
//!
//! [`TaskRunner`] owns one dedicated thread that runs tasks once their delay
//! has elapsed. Tasks run to completion on that thread; dropping the runner
//! discards everything still pending and waits for the running task.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace, warn};

use crate::error::{HostError, HostResult};

/// Name of the thread that runs controller recovery
pub const RECOVERY_RUNNER_NAME: &str = "issp_recovery_wq";

/// A unit of deferred work
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Runs tasks after a delay.
pub trait Scheduler: Send + Sync {
    /// Queue `task` to run once `delay` has elapsed.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::SchedulerStopped`] if the scheduler no longer
    /// accepts work.
    fn schedule_after(&self, delay: Duration, task: Task) -> HostResult<TaskHandle>;
}

const TASK_PENDING: u8 = 0;
const TASK_STARTED: u8 = 1;
const TASK_CANCELLED: u8 = 2;

/// Handle to a queued task.
///
/// A task leaves the pending state exactly once, either by starting or by
/// being cancelled.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle {
    state: Arc<AtomicU8>,
}

impl TaskHandle {
    /// Fresh handle for a task that has not started
    pub fn new() -> Self {
        Self::default()
    }

    /// Prevent the task from starting. Has no effect once it has started.
    ///
    /// Returns whether the task was stopped before it started.
    pub fn cancel(&self) -> bool {
        match self.state.compare_exchange(
            TASK_PENDING,
            TASK_CANCELLED,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => true,
            Err(current) => current == TASK_CANCELLED,
        }
    }

    /// Whether `cancel` won before the task started
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::Acquire) == TASK_CANCELLED
    }

    /// Whether the task has begun executing
    pub fn has_started(&self) -> bool {
        self.state.load(Ordering::Acquire) == TASK_STARTED
    }

    /// Mark the task as started unless it was cancelled first.
    ///
    /// Returns `true` if the caller should run the task.
    pub fn begin(&self) -> bool {
        self.state
            .compare_exchange(
                TASK_PENDING,
                TASK_STARTED,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

struct Job {
    due: Instant,
    handle: TaskHandle,
    task: Task,
}

/// Dedicated thread executing delayed tasks in due-time order.
pub struct TaskRunner {
    name: String,
    tx: Option<Sender<Job>>,
    thread: Option<JoinHandle<()>>,
}

impl TaskRunner {
    /// Start a runner thread named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`HostError::ResourceExhausted`] if the thread cannot be spawned.
    pub fn spawn(name: impl Into<String>) -> HostResult<Self> {
        let name = name.into();
        let (tx, rx) = channel::unbounded();
        let thread = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || run_loop(&rx))
            .map_err(|e| HostError::ResourceExhausted(format!("task runner thread: {e}")))?;

        debug!(runner = %name, "task runner started");
        Ok(Self {
            name,
            tx: Some(tx),
            thread: Some(thread),
        })
    }

    /// Runner name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Scheduler for TaskRunner {
    fn schedule_after(&self, delay: Duration, task: Task) -> HostResult<TaskHandle> {
        let tx = self.tx.as_ref().ok_or(HostError::SchedulerStopped)?;
        let handle = TaskHandle::new();
        let job = Job {
            due: Instant::now() + delay,
            handle: handle.clone(),
            task,
        };
        tx.send(job).map_err(|_| HostError::SchedulerStopped)?;
        trace!(runner = %self.name, ?delay, "task queued");
        Ok(handle)
    }
}

impl Drop for TaskRunner {
    fn drop(&mut self) {
        // closing the channel stops the loop after the running task
        self.tx.take();
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() == std::thread::current().id() {
                return;
            }
            if thread.join().is_err() {
                warn!(runner = %self.name, "task runner thread panicked");
            }
        }
        debug!(runner = %self.name, "task runner stopped");
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("name", &self.name)
            .field("running", &self.tx.is_some())
            .finish()
    }
}

fn run_loop(rx: &Receiver<Job>) {
    let mut pending: Vec<Job> = Vec::new();

    loop {
        let next_due = pending.iter().map(|job| job.due).min();
        let received = match next_due {
            Some(due) => rx.recv_timeout(due.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(job) => pending.push(job),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                if !pending.is_empty() {
                    debug!(discarded = pending.len(), "dropping pending tasks");
                }
                return;
            }
        }

        let now = Instant::now();
        let (due, waiting): (Vec<Job>, Vec<Job>) =
            pending.drain(..).partition(|job| job.due <= now);
        pending = waiting;

        let mut due = due;
        due.sort_by_key(|job| job.due);
        for job in due {
            if job.handle.begin() {
                (job.task)();
            } else {
                trace!("skipping cancelled task");
            }
        }
    }
}

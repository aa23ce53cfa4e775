//! Mock implementations for testing.
//!
//! Every mock is `Clone` and shares its state between clones: box one clone
//! into the host and keep another to inspect what happened.

use std::sync::Arc;
use std::time::Duration;

use issp_firmware::{FirmwareImage, ValidationResult};
use issp_host::{
    DependentSubsystem, HostError, HostResult, Level, Programmer, ProgrammerError, Scheduler,
    SignalLines, SiliconId, Task, TaskHandle,
};
use parking_lot::Mutex;

/// Ordered log of hardware-affecting events shared between mocks.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.lock().iter().filter(|e| *e == event).count()
    }
}

/// One call made on [`MockProgrammer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgrammerCall {
    EnterProgramming,
    Reset,
    Run,
    ReadBlock { block: u32, offset: u32, len: usize },
    Program { streamed: usize },
}

#[derive(Debug)]
struct ProgrammerState {
    silicon_id: SiliconId,
    device_version: Result<u8, ProgrammerError>,
    program_result: Result<(), ProgrammerError>,
    reset_delay: Duration,
    calls: Vec<ProgrammerCall>,
    streamed: Vec<u8>,
}

/// Recording [`Programmer`].
#[derive(Debug, Clone)]
pub struct MockProgrammer {
    state: Arc<Mutex<ProgrammerState>>,
    log: EventLog,
}

impl MockProgrammer {
    pub fn new(silicon_id: impl Into<SiliconId>, device_version: u8) -> Self {
        Self {
            state: Arc::new(Mutex::new(ProgrammerState {
                silicon_id: silicon_id.into(),
                device_version: Ok(device_version),
                program_result: Ok(()),
                reset_delay: Duration::ZERO,
                calls: Vec::new(),
                streamed: Vec::new(),
            })),
            log: EventLog::new(),
        }
    }

    /// Record `reset` into a shared log as well
    pub fn with_log(mut self, log: EventLog) -> Self {
        self.log = log;
        self
    }

    /// The version block reads back as protected
    pub fn with_protected_version(self) -> Self {
        self.state.lock().device_version = Err(ProgrammerError::Protected { block: 0 });
        self
    }

    /// The version read fails with `error`
    pub fn with_read_error(self, error: ProgrammerError) -> Self {
        self.state.lock().device_version = Err(error);
        self
    }

    /// `program` fails with `error`
    pub fn with_program_error(self, error: ProgrammerError) -> Self {
        self.state.lock().program_result = Err(error);
        self
    }

    /// `reset` takes this long
    pub fn with_reset_delay(self, delay: Duration) -> Self {
        self.state.lock().reset_delay = delay;
        self
    }

    pub fn calls(&self) -> Vec<ProgrammerCall> {
        self.state.lock().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&ProgrammerCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn program_calls(&self) -> usize {
        self.count(|c| matches!(c, ProgrammerCall::Program { .. }))
    }

    pub fn run_calls(&self) -> usize {
        self.count(|c| matches!(c, ProgrammerCall::Run))
    }

    pub fn reset_calls(&self) -> usize {
        self.count(|c| matches!(c, ProgrammerCall::Reset))
    }

    /// Bytes pulled from the image by the last `program` call
    pub fn streamed(&self) -> Vec<u8> {
        self.state.lock().streamed.clone()
    }
}

impl Programmer for MockProgrammer {
    fn enter_programming(&mut self) -> Result<SiliconId, ProgrammerError> {
        let mut state = self.state.lock();
        state.calls.push(ProgrammerCall::EnterProgramming);
        Ok(state.silicon_id)
    }

    fn reset(&mut self) -> Result<(), ProgrammerError> {
        let delay = {
            let mut state = self.state.lock();
            state.calls.push(ProgrammerCall::Reset);
            state.reset_delay
        };
        self.log.record("reset:begin");
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.log.record("reset:end");
        Ok(())
    }

    fn run(&mut self) -> Result<(), ProgrammerError> {
        self.state.lock().calls.push(ProgrammerCall::Run);
        Ok(())
    }

    fn read_block(
        &mut self,
        block: u32,
        offset: u32,
        len: usize,
    ) -> Result<Vec<u8>, ProgrammerError> {
        let mut state = self.state.lock();
        state
            .calls
            .push(ProgrammerCall::ReadBlock { block, offset, len });
        state.device_version.clone().map(|v| vec![v; len])
    }

    fn program(
        &mut self,
        image: &mut FirmwareImage,
        _meta: &ValidationResult,
    ) -> Result<(), ProgrammerError> {
        let mut streamed = vec![0; image.total_data_len()];
        let n = image.fill(&mut streamed);
        streamed.truncate(n);

        let mut state = self.state.lock();
        state.calls.push(ProgrammerCall::Program { streamed: n });
        state.streamed = streamed;
        state.program_result.clone()
    }
}

#[derive(Debug)]
struct LineState {
    data: Level,
    clock: Level,
    writes: Vec<(&'static str, Level)>,
    releases: usize,
}

/// Latching [`SignalLines`] that counts releases.
#[derive(Debug, Clone)]
pub struct MockLines {
    state: Arc<Mutex<LineState>>,
}

impl MockLines {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(LineState {
                data: Level::Low,
                clock: Level::Low,
                writes: Vec::new(),
                releases: 0,
            })),
        }
    }

    pub fn releases(&self) -> usize {
        self.state.lock().releases
    }

    pub fn writes(&self) -> Vec<(&'static str, Level)> {
        self.state.lock().writes.clone()
    }

    pub fn levels(&self) -> (Level, Level) {
        let state = self.state.lock();
        (state.data, state.clock)
    }
}

impl Default for MockLines {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalLines for MockLines {
    fn data(&self) -> Result<Level, ProgrammerError> {
        Ok(self.state.lock().data)
    }

    fn set_data(&mut self, level: Level) -> Result<(), ProgrammerError> {
        let mut state = self.state.lock();
        state.data = level;
        state.writes.push(("data", level));
        Ok(())
    }

    fn clock(&self) -> Result<Level, ProgrammerError> {
        Ok(self.state.lock().clock)
    }

    fn set_clock(&mut self, level: Level) -> Result<(), ProgrammerError> {
        let mut state = self.state.lock();
        state.clock = level;
        state.writes.push(("clock", level));
        Ok(())
    }

    fn release(&mut self) -> Result<(), ProgrammerError> {
        self.state.lock().releases += 1;
        Ok(())
    }
}

/// [`DependentSubsystem`] that records unload/reload into an [`EventLog`].
#[derive(Debug, Clone)]
pub struct MockSubsystem {
    name: String,
    log: EventLog,
    unload_delay: Duration,
    fail_reload: bool,
}

impl MockSubsystem {
    pub fn new(name: impl Into<String>, log: EventLog) -> Self {
        Self {
            name: name.into(),
            log,
            unload_delay: Duration::ZERO,
            fail_reload: false,
        }
    }

    /// `unload` takes this long
    pub fn with_unload_delay(mut self, delay: Duration) -> Self {
        self.unload_delay = delay;
        self
    }

    /// `reload` reports an error
    pub fn with_reload_failure(mut self) -> Self {
        self.fail_reload = true;
        self
    }
}

impl DependentSubsystem for MockSubsystem {
    fn name(&self) -> &str {
        &self.name
    }

    fn unload(&self) -> HostResult<()> {
        self.log.record("unload:begin");
        if !self.unload_delay.is_zero() {
            std::thread::sleep(self.unload_delay);
        }
        self.log.record("unload:end");
        Ok(())
    }

    fn reload(&self) -> HostResult<()> {
        self.log.record("reload");
        if self.fail_reload {
            return Err(HostError::Subsystem(format!("{} did not come back", self.name)));
        }
        Ok(())
    }
}

struct Queued {
    delay: Duration,
    handle: TaskHandle,
    task: Task,
}

/// [`Scheduler`] that only runs tasks when told to.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    queue: Arc<Mutex<Vec<Queued>>>,
    stopped: Arc<Mutex<bool>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse all further work
    pub fn stop(&self) {
        *self.stopped.lock() = true;
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Delays of the queued tasks, in queue order
    pub fn delays(&self) -> Vec<Duration> {
        self.queue.lock().iter().map(|q| q.delay).collect()
    }

    /// Run every queued, uncancelled task on the calling thread.
    ///
    /// Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let queued: Vec<Queued> = std::mem::take(&mut *self.queue.lock());
        let mut ran = 0;
        for q in queued {
            if q.handle.begin() {
                (q.task)();
                ran += 1;
            }
        }
        ran
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_after(&self, delay: Duration, task: Task) -> HostResult<TaskHandle> {
        if *self.stopped.lock() {
            return Err(HostError::SchedulerStopped);
        }
        let handle = TaskHandle::new();
        self.queue.lock().push(Queued {
            delay,
            handle: handle.clone(),
            task,
        });
        Ok(handle)
    }
}

impl std::fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualScheduler")
            .field("pending", &self.pending())
            .finish()
    }
}

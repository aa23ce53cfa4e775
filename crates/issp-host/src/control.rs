//! Operator control surface
//!
//! Each command runs to completion on the caller's thread. Reset commands go
//! through the recovery coordinator; line reads and writes take the same
//! exclusive lock so they never interleave with a reset sequence.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::HostResult;
use crate::programmer::Level;
use crate::recovery::RecoveryCoordinator;

/// Raw ISSP signal line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Line {
    /// ISSP data line
    Data,
    /// ISSP clock line
    Clock,
}

impl std::fmt::Display for Line {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Line::Data => write!(f, "data"),
            Line::Clock => write!(f, "clock"),
        }
    }
}

/// Operator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlCommand {
    /// Toggle the controller reset pin
    PinReset,
    /// Unload the dependent subsystem, reset, reload
    FullReset,
    /// Sample a line
    ReadLine(Line),
    /// Drive a line
    WriteLine(Line, Level),
}

/// Reply to a [`ControlCommand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ControlResponse {
    /// The command completed
    Done,
    /// Sampled line level
    Level(Level),
}

/// Single dispatch point for operator commands.
#[derive(Debug, Clone, Copy)]
pub struct ControlSurface<'a> {
    coordinator: &'a RecoveryCoordinator,
}

impl<'a> ControlSurface<'a> {
    /// Wrap a coordinator
    pub fn new(coordinator: &'a RecoveryCoordinator) -> Self {
        Self { coordinator }
    }

    /// Execute `command`.
    ///
    /// # Errors
    ///
    /// Propagates the coordinator's or the signal lines' error.
    pub fn dispatch(&self, command: ControlCommand) -> HostResult<ControlResponse> {
        match command {
            ControlCommand::PinReset => {
                self.coordinator.pin_reset()?;
                Ok(ControlResponse::Done)
            }
            ControlCommand::FullReset => {
                self.coordinator.full_reset()?;
                Ok(ControlResponse::Done)
            }
            ControlCommand::ReadLine(line) => {
                let level = self.coordinator.with_hardware(|hw| match line {
                    Line::Data => hw.lines.data(),
                    Line::Clock => hw.lines.clock(),
                })?;
                Ok(ControlResponse::Level(level))
            }
            ControlCommand::WriteLine(line, level) => {
                self.coordinator.with_hardware(|hw| match line {
                    Line::Data => hw.lines.set_data(level),
                    Line::Clock => hw.lines.set_clock(level),
                })?;
                info!(%line, %level, "line written");
                Ok(ControlResponse::Done)
            }
        }
    }

    /// Parse a text level and drive `line` with it.
    ///
    /// # Errors
    ///
    /// Returns [`crate::HostError::InvalidLevel`] for anything but `"0"` or
    /// `"1"`; the line is left untouched in that case.
    pub fn write_line_str(&self, line: Line, input: &str) -> HostResult<ControlResponse> {
        let level = Level::parse(input)?;
        self.dispatch(ControlCommand::WriteLine(line, level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecoveryConfig;
    use crate::error::{HostError, ProgrammerError};
    use crate::programmer::{Hardware, Programmer, SignalLines, SiliconId};
    use crate::recovery::DependentSubsystem;
    use crate::scheduler::{Scheduler, Task, TaskHandle};
    use crate::suspend::CountingInhibitor;
    use issp_firmware::{FirmwareImage, ValidationResult};
    use std::sync::Arc;
    use std::time::Duration;

    struct IdleProgrammer;

    impl Programmer for IdleProgrammer {
        fn enter_programming(&mut self) -> Result<SiliconId, ProgrammerError> {
            Ok(SiliconId::default())
        }
        fn reset(&mut self) -> Result<(), ProgrammerError> {
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

    struct Latches {
        data: Level,
        clock: Level,
    }

    impl SignalLines for Latches {
        fn data(&self) -> Result<Level, ProgrammerError> {
            Ok(self.data)
        }
        fn set_data(&mut self, level: Level) -> Result<(), ProgrammerError> {
            self.data = level;
            Ok(())
        }
        fn clock(&self) -> Result<Level, ProgrammerError> {
            Ok(self.clock)
        }
        fn set_clock(&mut self, level: Level) -> Result<(), ProgrammerError> {
            self.clock = level;
            Ok(())
        }
        fn release(&mut self) -> Result<(), ProgrammerError> {
            Ok(())
        }
    }

    struct NoSubsystem;

    impl DependentSubsystem for NoSubsystem {
        fn name(&self) -> &str {
            "none"
        }
        fn unload(&self) -> HostResult<()> {
            Ok(())
        }
        fn reload(&self) -> HostResult<()> {
            Ok(())
        }
    }

    struct Never;

    impl Scheduler for Never {
        fn schedule_after(&self, _: Duration, _: Task) -> HostResult<TaskHandle> {
            Err(HostError::SchedulerStopped)
        }
    }

    fn coordinator() -> RecoveryCoordinator {
        RecoveryCoordinator::new(
            Hardware::new(
                Box::new(IdleProgrammer),
                Box::new(Latches {
                    data: Level::Low,
                    clock: Level::Low,
                }),
            ),
            Arc::new(NoSubsystem),
            Arc::new(CountingInhibitor::default()),
            Arc::new(Never),
            RecoveryConfig::default(),
        )
    }

    #[test]
    fn test_line_write_then_read() -> HostResult<()> {
        let coordinator = coordinator();
        let control = ControlSurface::new(&coordinator);

        control.dispatch(ControlCommand::WriteLine(Line::Clock, Level::High))?;
        assert_eq!(
            control.dispatch(ControlCommand::ReadLine(Line::Clock))?,
            ControlResponse::Level(Level::High)
        );
        assert_eq!(
            control.dispatch(ControlCommand::ReadLine(Line::Data))?,
            ControlResponse::Level(Level::Low)
        );
        Ok(())
    }

    #[test]
    fn test_write_line_rejects_bad_text() -> HostResult<()> {
        let coordinator = coordinator();
        let control = ControlSurface::new(&coordinator);

        assert!(matches!(
            control.write_line_str(Line::Data, "high"),
            Err(HostError::InvalidLevel(_))
        ));
        assert_eq!(
            control.dispatch(ControlCommand::ReadLine(Line::Data))?,
            ControlResponse::Level(Level::Low)
        );
        control.write_line_str(Line::Data, "1\n")?;
        assert_eq!(
            control.dispatch(ControlCommand::ReadLine(Line::Data))?,
            ControlResponse::Level(Level::High)
        );
        Ok(())
    }

    #[test]
    fn test_reset_commands_route_through_coordinator() -> HostResult<()> {
        let coordinator = coordinator();
        let control = ControlSurface::new(&coordinator);

        assert_eq!(control.dispatch(ControlCommand::PinReset)?, ControlResponse::Done);
        assert_eq!(control.dispatch(ControlCommand::FullReset)?, ControlResponse::Done);
        let metrics = coordinator.metrics();
        assert_eq!((metrics.pin_resets, metrics.full_resets), (1, 1));
        Ok(())
    }
}

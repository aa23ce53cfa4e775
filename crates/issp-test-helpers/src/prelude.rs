//! Convenience re-exports for tests.

pub use crate::must::{must, must_err, must_some, wait_until};

#[cfg(feature = "mock")]
pub use crate::mock::{
    EventLog, ManualScheduler, MockLines, MockProgrammer, MockSubsystem, ProgrammerCall,
};

#[cfg(feature = "fixtures")]
pub use crate::fixtures::{FIXTURE_SILICON_ID, ImageBuilder, Marker};

pub use issp_host::CountingInhibitor;

//! Process exit status.

use std::fmt;
use std::process::ExitCode;

/// How a run ended, as reported to the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    /// The run failed after starting; an error log was written.
    PipelineFailed,
    /// Settings were rejected before anything ran.
    ConfigInvalid,
}

impl ExitStatus {
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::PipelineFailed => 1,
            Self::ConfigInvalid => 2,
        }
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("success"),
            Self::PipelineFailed => f.write_str("pipeline failed"),
            Self::ConfigInvalid => f.write_str("configuration invalid"),
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

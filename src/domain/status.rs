//! Run lifecycle status.

use std::fmt;

use super::ParseStatusError;

/// Lifecycle status of a task run.
///
/// Statuses form a DAG: `Pending -> Running -> {Succeeded, Failed}`.
/// `Succeeded` and `Failed` are terminal; no further transitions are
/// accepted once a run reaches either.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    /// Run has been created but work has not started.
    Pending,
    /// Run is being advanced by an executor.
    Running,
    /// Run finished unsuccessfully.
    Failed,
    /// Run finished successfully.
    Succeeded,
}

impl RunStatus {
    /// Returns the canonical wire representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Failed => "FAILED",
            Self::Succeeded => "SUCCEEDED",
        }
    }

    /// Returns `true` when no further status writes are accepted.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Succeeded)
    }

    /// Returns `true` when a write from `self` to `to` does not regress
    /// the lifecycle.
    ///
    /// Any write from a terminal status is rejected, as is any write that
    /// would move the run backwards (for example `Running -> Pending`).
    /// Re-asserting the current non-terminal status is accepted.
    #[must_use]
    pub const fn can_transition_to(self, to: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        to.rank() >= self.rank()
    }

    const fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Failed | Self::Succeeded => 2,
        }
    }
}

impl TryFrom<&str> for RunStatus {
    type Error = ParseStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "FAILED" => Ok(Self::Failed),
            "SUCCEEDED" => Ok(Self::Succeeded),
            _ => Err(ParseStatusError(value.to_owned())),
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

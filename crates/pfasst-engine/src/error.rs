//! Engine-wide error types.

use std::error::Error;
use std::fmt;

use pfasst_core::{DataError, ProblemError};

use crate::comm::CommError;
use crate::config::ConfigError;
use crate::fault::FaultError;
use crate::scheduler::ScheduleConfigError;

/// Failure of a single level operation (sweep, transfer, residual).
///
/// [`Step`](crate::step::Step) attaches slot, step and iteration context
/// and turns it into an [`EngineError`].
#[derive(Clone, Debug, PartialEq)]
pub enum SweepError {
    /// The problem's `eval_f`/`solve_system` or state arithmetic failed.
    Problem(ProblemError),
    /// A node value, right-hand side or residual became NaN or infinite.
    NonFinite {
        /// First offending node.
        node: usize,
    },
}

impl fmt::Display for SweepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Problem(e) => write!(f, "problem: {e}"),
            Self::NonFinite { node } => write!(f, "non-finite value at node {node}"),
        }
    }
}

impl Error for SweepError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Problem(e) => Some(e),
            Self::NonFinite { .. } => None,
        }
    }
}

impl From<ProblemError> for SweepError {
    fn from(e: ProblemError) -> Self {
        Self::Problem(e)
    }
}

impl From<DataError> for SweepError {
    fn from(e: DataError) -> Self {
        Self::Problem(ProblemError::Data(e))
    }
}

/// Errors that abort a run.
#[derive(Debug, PartialEq)]
pub enum EngineError {
    /// The problem description is malformed.
    Config(ConfigError),
    /// The run parameters are malformed.
    Schedule(ScheduleConfigError),
    /// The fault configuration is malformed.
    Fault(FaultError),
    /// A sweep produced non-finite values. The step's successors in the
    /// block abort with it; predecessors finish normally.
    SweeperDivergence {
        /// Process slot of the diverging step.
        slot: usize,
        /// Global index of the diverging step.
        step: usize,
        /// Iteration at which the divergence was detected.
        iteration: usize,
        /// Level whose sweep diverged (0 = finest).
        level: usize,
    },
    /// The problem failed on one level of a step.
    Problem {
        /// Process slot.
        slot: usize,
        /// Global step index.
        step: usize,
        /// Level index.
        level: usize,
        /// The underlying failure.
        source: ProblemError,
    },
    /// Messaging with a neighbour failed (e.g. the predecessor aborted).
    Comm {
        /// Process slot that observed the failure.
        slot: usize,
        /// The underlying failure.
        source: CommError,
    },
    /// A worker thread could not be spawned.
    ThreadSpawnFailed {
        /// Description of the failure.
        reason: String,
    },
    /// A worker thread panicked.
    WorkerPanicked {
        /// Process slot of the worker.
        slot: usize,
    },
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Schedule(e) => write!(f, "schedule: {e}"),
            Self::Fault(e) => write!(f, "fault: {e}"),
            Self::SweeperDivergence {
                slot,
                step,
                iteration,
                level,
            } => write!(
                f,
                "sweeper diverged on slot {slot}, step {step}, iteration {iteration}, level {level}"
            ),
            Self::Problem {
                slot,
                step,
                level,
                source,
            } => write!(f, "slot {slot}, step {step}, level {level}: {source}"),
            Self::Comm { slot, source } => write!(f, "slot {slot}: {source}"),
            Self::ThreadSpawnFailed { reason } => write!(f, "thread spawn failed: {reason}"),
            Self::WorkerPanicked { slot } => write!(f, "worker for slot {slot} panicked"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Schedule(e) => Some(e),
            Self::Fault(e) => Some(e),
            Self::Problem { source, .. } => Some(source),
            Self::Comm { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ConfigError> for EngineError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<ScheduleConfigError> for EngineError {
    fn from(e: ScheduleConfigError) -> Self {
        Self::Schedule(e)
    }
}

impl From<FaultError> for EngineError {
    fn from(e: FaultError) -> Self {
        Self::Fault(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divergence_message_names_location() {
        let e = EngineError::SweeperDivergence {
            slot: 2,
            step: 6,
            iteration: 3,
            level: 1,
        };
        let msg = e.to_string();
        assert!(msg.contains("slot 2"));
        assert!(msg.contains("step 6"));
        assert!(msg.contains("level 1"));
    }

    #[test]
    fn problem_error_is_chained() {
        let e = EngineError::Problem {
            slot: 0,
            step: 0,
            level: 0,
            source: ProblemError::SolveFailed {
                reason: "singular".into(),
            },
        };
        assert!(e.source().is_some());
    }

    #[test]
    fn data_error_becomes_problem_failure() {
        let e: SweepError = DataError::TypeMismatch {
            operation: "add",
            expected: "Mesh(3)".into(),
            found: "Mesh(4)".into(),
        }
        .into();
        assert!(matches!(e, SweepError::Problem(ProblemError::Data(_))));
    }
}

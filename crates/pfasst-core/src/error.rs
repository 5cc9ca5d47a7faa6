//! Error types shared by state vectors and problem classes.

use std::error::Error;
use std::fmt;

/// Errors from [`StateVector`](crate::StateVector) arithmetic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DataError {
    /// The operands of a binary operation do not share a representation
    /// (e.g. meshes of different length).
    TypeMismatch {
        /// The operation that was attempted (`"add"`, `"sub"`, ...).
        operation: &'static str,
        /// Description of the left-hand operand.
        expected: String,
        /// Description of the right-hand operand.
        found: String,
    },
}

impl fmt::Display for DataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TypeMismatch {
                operation,
                expected,
                found,
            } => write!(f, "type mismatch in {operation}: expected {expected}, found {found}"),
        }
    }
}

impl Error for DataError {}

/// Errors raised by a [`Problem`](crate::Problem) implementation.
#[derive(Clone, Debug, PartialEq)]
pub enum ProblemError {
    /// A required entry of the problem parameters is absent.
    MissingParameter {
        /// The parameter key.
        key: String,
    },
    /// A parameter is present but unusable.
    InvalidParameter {
        /// The parameter key.
        key: String,
        /// Why the value was rejected.
        reason: String,
    },
    /// The implicit solve `u - factor * f(u) = rhs` failed.
    SolveFailed {
        /// Human-readable description of the failure.
        reason: String,
    },
    /// State-vector arithmetic failed inside the problem.
    Data(DataError),
}

impl fmt::Display for ProblemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingParameter { key } => write!(f, "missing problem parameter '{key}'"),
            Self::InvalidParameter { key, reason } => {
                write!(f, "invalid problem parameter '{key}': {reason}")
            }
            Self::SolveFailed { reason } => write!(f, "implicit solve failed: {reason}"),
            Self::Data(e) => write!(f, "data: {e}"),
        }
    }
}

impl Error for ProblemError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Data(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DataError> for ProblemError {
    fn from(e: DataError) -> Self {
        Self::Data(e)
    }
}

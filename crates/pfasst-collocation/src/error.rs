//! Collocation construction errors.

use std::error::Error;
use std::fmt;

use crate::nodes::NodeType;

/// Errors from building a [`CollocationRule`](crate::CollocationRule).
#[derive(Clone, Debug, PartialEq)]
pub enum CollocationError {
    /// The requested node count is outside `[min, MAX_NODES]` for the family.
    UnsupportedNodeCount {
        /// Node family.
        node_type: NodeType,
        /// The requested count.
        requested: usize,
        /// Smallest count the family supports.
        min: usize,
    },
    /// Root finding did not produce the expected number of nodes.
    RootFinding {
        /// Node family.
        node_type: NodeType,
        /// Roots expected.
        expected: usize,
        /// Roots found.
        found: usize,
    },
    /// Nodes are not strictly increasing or leave `[0, 1]`.
    InvalidNodes {
        /// Description of the violation.
        reason: String,
    },
    /// The LU preconditioner hit a zero pivot (e.g. a node at `t = 0`).
    SingularLu {
        /// Index of the zero pivot.
        pivot: usize,
    },
}

impl fmt::Display for CollocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedNodeCount {
                node_type,
                requested,
                min,
            } => write!(
                f,
                "{node_type:?} supports {min}..={} nodes, got {requested}",
                crate::MAX_NODES
            ),
            Self::RootFinding {
                node_type,
                expected,
                found,
            } => write!(
                f,
                "{node_type:?}: expected {expected} interior roots, found {found}"
            ),
            Self::InvalidNodes { reason } => write!(f, "invalid nodes: {reason}"),
            Self::SingularLu { pivot } => write!(f, "LU preconditioner has zero pivot {pivot}"),
        }
    }
}

impl Error for CollocationError {}

//! Collocation node families on the unit interval.

use crate::error::CollocationError;
use crate::poly::{find_roots, legendre, legendre_derivative};
use crate::MAX_NODES;

/// Bracketing resolution for the root search on `[-1, 1]`.
const SCAN_INTERVALS: usize = 4096;

/// Which quadrature family a rule's nodes come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeType {
    /// Gauss–Radau nodes including the right endpoint (the SDC default).
    GaussRadauRight,
    /// Gauss–Lobatto nodes including both endpoints.
    GaussLobatto,
    /// Gauss–Legendre nodes, interior only.
    GaussLegendre,
    /// `i / M` for `i = 1..=M`: equidistant without the left endpoint.
    Equidistant,
}

impl NodeType {
    /// Smallest supported node count.
    pub fn min_nodes(self) -> usize {
        match self {
            Self::GaussLobatto => 2,
            _ => 1,
        }
    }

    /// Whether the right endpoint `1` is a node.
    pub fn includes_right(self) -> bool {
        !matches!(self, Self::GaussLegendre)
    }

    /// Whether the left endpoint `0` is a node.
    pub fn includes_left(self) -> bool {
        matches!(self, Self::GaussLobatto)
    }

    /// The `num_nodes` nodes of this family, strictly increasing in `[0, 1]`.
    pub fn nodes(self, num_nodes: usize) -> Result<Vec<f64>, CollocationError> {
        if num_nodes < self.min_nodes() || num_nodes > MAX_NODES {
            return Err(CollocationError::UnsupportedNodeCount {
                node_type: self,
                requested: num_nodes,
                min: self.min_nodes(),
            });
        }
        let m = num_nodes;
        let on_reference = match self {
            Self::Equidistant => {
                return Ok((1..=m).map(|i| i as f64 / m as f64).collect());
            }
            Self::GaussLegendre => {
                let roots = find_roots(|x| legendre(m, x), -1.0, 1.0, SCAN_INTERVALS);
                self.expect_roots(roots, m)?
            }
            Self::GaussRadauRight => {
                let mut roots = find_roots(
                    |x| legendre(m - 1, x) - legendre(m, x),
                    -1.0,
                    1.0,
                    SCAN_INTERVALS,
                );
                roots = self.expect_roots(roots, m - 1)?;
                roots.push(1.0);
                roots
            }
            Self::GaussLobatto => {
                let interior = find_roots(
                    |x| legendre_derivative(m - 1, x),
                    -1.0,
                    1.0,
                    SCAN_INTERVALS,
                );
                let mut roots = vec![-1.0];
                roots.extend(self.expect_roots(interior, m - 2)?);
                roots.push(1.0);
                roots
            }
        };
        let nodes: Vec<f64> = on_reference.iter().map(|x| 0.5 * (x + 1.0)).collect();
        validate_nodes(&nodes)?;
        Ok(nodes)
    }

    fn expect_roots(self, roots: Vec<f64>, expected: usize) -> Result<Vec<f64>, CollocationError> {
        if roots.len() != expected {
            return Err(CollocationError::RootFinding {
                node_type: self,
                expected,
                found: roots.len(),
            });
        }
        Ok(roots)
    }
}

/// Check that `nodes` is strictly increasing inside `[0, 1]`.
pub fn validate_nodes(nodes: &[f64]) -> Result<(), CollocationError> {
    if nodes.is_empty() {
        return Err(CollocationError::InvalidNodes {
            reason: "no nodes".to_string(),
        });
    }
    if nodes.iter().any(|x| !(0.0..=1.0).contains(x)) {
        return Err(CollocationError::InvalidNodes {
            reason: format!("nodes outside [0, 1]: {nodes:?}"),
        });
    }
    if nodes.windows(2).any(|w| w[0] >= w[1]) {
        return Err(CollocationError::InvalidNodes {
            reason: format!("nodes not strictly increasing: {nodes:?}"),
        });
    }
    Ok(())
}

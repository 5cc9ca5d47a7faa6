//! The [`CollocationRule`]: nodes, integration matrix and weights.

use nalgebra::DMatrix;

use crate::error::CollocationError;
use crate::nodes::NodeType;
use crate::poly::{integrate, lagrange_coefficients};

/// Immutable quadrature data for one collocation problem on `[0, 1]`.
///
/// Indices follow the level storage convention: entry `0` belongs to the
/// step's initial value (not a collocation node), entries `1..=M` to the
/// nodes. `q` is therefore `(M + 1) × (M + 1)` with a zero first row and
/// column, and `weights` has a zero first entry.
///
/// # Examples
///
/// ```
/// use pfasst_collocation::{CollocationRule, NodeType};
///
/// let rule = CollocationRule::new(NodeType::GaussLobatto, 3).unwrap();
/// // Simpson weights.
/// let w = rule.weights();
/// assert!((w[1] - 1.0 / 6.0).abs() < 1e-14);
/// assert!((w[2] - 4.0 / 6.0).abs() < 1e-14);
/// assert!((w[3] - 1.0 / 6.0).abs() < 1e-14);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct CollocationRule {
    node_type: NodeType,
    nodes: Vec<f64>,
    q: DMatrix<f64>,
    weights: Vec<f64>,
    delta: Vec<f64>,
}

impl CollocationRule {
    /// Build the rule with `num_nodes` nodes of the given family.
    pub fn new(node_type: NodeType, num_nodes: usize) -> Result<Self, CollocationError> {
        let nodes = node_type.nodes(num_nodes)?;
        let m = nodes.len();

        let basis: Vec<Vec<f64>> = (0..m).map(|j| lagrange_coefficients(&nodes, j)).collect();

        let mut q = DMatrix::zeros(m + 1, m + 1);
        for (row, tau) in nodes.iter().enumerate() {
            for (col, coeffs) in basis.iter().enumerate() {
                q[(row + 1, col + 1)] = integrate(coeffs, 0.0, *tau);
            }
        }

        let mut weights = vec![0.0; m + 1];
        for (col, coeffs) in basis.iter().enumerate() {
            weights[col + 1] = integrate(coeffs, 0.0, 1.0);
        }
        // The last row of Q is the full-interval rule when 1 is a node.
        if node_type.includes_right() {
            for (j, w) in weights.iter_mut().enumerate().skip(1) {
                *w = q[(m, j)];
            }
        }

        let delta = nodes
            .iter()
            .scan(0.0, |prev, tau| {
                let d = tau - *prev;
                *prev = *tau;
                Some(d)
            })
            .collect();

        Ok(Self {
            node_type,
            nodes,
            q,
            weights,
            delta,
        })
    }

    /// The node family.
    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    /// Number of collocation nodes `M`.
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Node positions as fractions of the step, strictly increasing.
    pub fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    /// Integration matrix: `q[m][j] = ∫_0^{τ_m} ℓ_j`.
    pub fn q(&self) -> &DMatrix<f64> {
        &self.q
    }

    /// Full-interval weights `w[j] = ∫_0^1 ℓ_j` (entry 0 is zero).
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Node spacings `τ_m - τ_{m-1}` with `τ_0 = 0`.
    pub fn delta(&self) -> &[f64] {
        &self.delta
    }

    /// Whether the step's right endpoint is a node, so that the terminal
    /// value is simply the last node value.
    pub fn right_is_node(&self) -> bool {
        self.node_type.includes_right()
    }
}

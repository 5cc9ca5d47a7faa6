//! Lower-triangular `QΔ` preconditioners.
//!
//! A sweep replaces the full integration matrix `Q` by an approximation
//! `QΔ` that can be inverted node by node. The choice decides whether each
//! node needs an implicit solve (nonzero diagonal) or not.

use nalgebra::DMatrix;

use crate::error::CollocationError;
use crate::rule::CollocationRule;

/// Pivots below this magnitude count as zero in the LU factorization.
const PIVOT_TOL: f64 = 1e-14;

/// Which `QΔ` approximation a sweeper uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum QDelta {
    /// Backward Euler between consecutive nodes: `QΔ[m][j] = Δτ_j`, `j ≤ m`.
    #[default]
    ImplicitEuler,
    /// Forward Euler between consecutive nodes: `QΔ[m][j] = Δτ_{j+1}`,
    /// `j < m`. Strictly lower triangular, so no solves are needed.
    ExplicitEuler,
    /// `Uᵀ` from the partially pivoted factorization `P Qᵀ = L U`.
    /// Converges much faster on stiff problems; requires a nonzero first
    /// node.
    Lu,
}

impl QDelta {
    /// Build the `(M + 1) × (M + 1)` preconditioner for `rule`.
    pub fn matrix(self, rule: &CollocationRule) -> Result<DMatrix<f64>, CollocationError> {
        let m = rule.num_nodes();
        let delta = rule.delta();
        let mut qd = DMatrix::zeros(m + 1, m + 1);
        match self {
            Self::ImplicitEuler => {
                for row in 1..=m {
                    for col in 1..=row {
                        qd[(row, col)] = delta[col - 1];
                    }
                }
            }
            Self::ExplicitEuler => {
                for row in 1..=m {
                    for col in 0..row {
                        qd[(row, col)] = delta[col];
                    }
                }
            }
            Self::Lu => {
                let qt = rule.q().view((1, 1), (m, m)).transpose();
                let upper = lu_upper(qt)?;
                qd.view_mut((1, 1), (m, m)).copy_from(&upper.transpose());
            }
        }
        Ok(qd)
    }

    /// Whether the preconditioner has a nonzero diagonal, i.e. the sweep
    /// calls `solve_system` at every node.
    pub fn is_implicit(self) -> bool {
        !matches!(self, Self::ExplicitEuler)
    }
}

/// Upper factor of `P A = L U`; a vanishing pivot is an error.
fn lu_upper(a: DMatrix<f64>) -> Result<DMatrix<f64>, CollocationError> {
    let upper = a.lu().u();
    match upper.diagonal().iter().position(|d| d.abs() < PIVOT_TOL) {
        Some(pivot) => Err(CollocationError::SingularLu { pivot }),
        None => Ok(upper),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NodeType;

    fn radau(m: usize) -> CollocationRule {
        CollocationRule::new(NodeType::GaussRadauRight, m).unwrap()
    }

    #[test]
    fn implicit_euler_rows_sum_to_nodes() {
        let rule = radau(3);
        let qd = QDelta::ImplicitEuler.matrix(&rule).unwrap();
        for m in 1..=3 {
            let sum: f64 = qd.row(m).sum();
            assert!((sum - rule.nodes()[m - 1]).abs() < 1e-15);
        }
        assert_eq!(qd[(2, 3)], 0.0);
    }

    #[test]
    fn explicit_euler_is_strictly_lower() {
        let rule = radau(4);
        let qd = QDelta::ExplicitEuler.matrix(&rule).unwrap();
        for i in 0..=4 {
            for j in i..=4 {
                assert_eq!(qd[(i, j)], 0.0);
            }
        }
        assert_eq!(qd[(1, 0)], rule.delta()[0]);
        assert!(!QDelta::ExplicitEuler.is_implicit());
    }

    #[test]
    fn lu_single_node_matches_q() {
        let rule = radau(1);
        let qd = QDelta::Lu.matrix(&rule).unwrap();
        assert_eq!(qd, *rule.q());
    }

    #[test]
    fn lu_factors_reproduce_q_transpose() {
        let rule = radau(4);
        let qt = rule.q().view((1, 1), (4, 4)).transpose();
        let (p, l, u) = qt.clone().lu().unpack();
        let mut product = l * u;
        p.inv_permute_rows(&mut product);
        assert!((product - qt).amax() < 1e-13);
    }

    #[test]
    fn lu_is_lower_triangular_with_positive_diagonal() {
        let qd = QDelta::Lu.matrix(&radau(5)).unwrap();
        for i in 1..=5 {
            assert!(qd[(i, i)] > 0.0);
            for j in i + 1..=5 {
                assert_eq!(qd[(i, j)], 0.0);
            }
        }
    }

    #[test]
    fn lu_with_left_endpoint_is_singular() {
        let rule = CollocationRule::new(NodeType::GaussLobatto, 3).unwrap();
        assert_eq!(
            QDelta::Lu.matrix(&rule),
            Err(CollocationError::SingularLu { pivot: 0 })
        );
    }
}

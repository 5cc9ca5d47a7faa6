//! Polynomial interpolation between node sets.

use nalgebra::DMatrix;

use crate::poly::lagrange_eval;

/// Matrix that maps values on `from` nodes to values on `to` nodes by
/// evaluating the Lagrange interpolant through `from`.
///
/// The result is `to.len() × from.len()`. When the node sets coincide the
/// matrix is exactly the identity, so transfers between levels with equal
/// rules do not perturb the data.
///
/// ```
/// use pfasst_collocation::interpolation_matrix;
///
/// let p = interpolation_matrix(&[0.5, 1.0], &[0.25, 0.5, 0.75, 1.0]);
/// // Linear interpolant through (0.5, a), (1.0, b) evaluated at 0.75.
/// assert!((p[(2, 0)] - 0.5).abs() < 1e-15);
/// assert!((p[(2, 1)] - 0.5).abs() < 1e-15);
/// ```
pub fn interpolation_matrix(from: &[f64], to: &[f64]) -> DMatrix<f64> {
    DMatrix::from_fn(to.len(), from.len(), |i, j| lagrange_eval(from, j, to[i]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CollocationRule, NodeType};

    #[test]
    fn same_nodes_give_identity() {
        let rule = CollocationRule::new(NodeType::GaussRadauRight, 5).unwrap();
        let p = interpolation_matrix(rule.nodes(), rule.nodes());
        assert_eq!(p, DMatrix::identity(5, 5));
    }

    #[test]
    fn rows_sum_to_one() {
        let fine = CollocationRule::new(NodeType::GaussRadauRight, 5).unwrap();
        let coarse = CollocationRule::new(NodeType::GaussRadauRight, 3).unwrap();
        for m in [
            interpolation_matrix(coarse.nodes(), fine.nodes()),
            interpolation_matrix(fine.nodes(), coarse.nodes()),
        ] {
            for i in 0..m.nrows() {
                let sum: f64 = m.row(i).sum();
                assert!((sum - 1.0).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn reproduces_quadratics_from_three_nodes() {
        let from = [0.2, 0.6, 1.0];
        let to = [0.1, 0.45, 0.9];
        let p = interpolation_matrix(&from, &to);
        let f = |x: f64| 1.0 - 2.0 * x + 3.0 * x * x;
        for (i, x) in to.iter().enumerate() {
            let approx: f64 = (0..3).map(|j| p[(i, j)] * f(from[j])).sum();
            assert!((approx - f(*x)).abs() < 1e-13);
        }
    }

    #[test]
    fn single_node_is_constant() {
        let p = interpolation_matrix(&[1.0], &[0.3, 0.7]);
        assert_eq!(p[(0, 0)], 1.0);
        assert_eq!(p[(1, 0)], 1.0);
    }
}

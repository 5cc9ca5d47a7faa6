//! The generic implicit SDC sweeper.
//!
//! One sweep updates the node values in order. With `Q` the collocation
//! integration matrix and `QΔ` the lower-triangular preconditioner, node
//! `m` solves
//!
//! ```text
//! u_m - dt·QΔ[m][m]·f(u_m) = u_0 + dt·Σ_j (Q - QΔ)[m][j]·f_j^old
//!                               + dt·Σ_{j<m} QΔ[m][j]·f_j^new + τ_m
//! ```
//!
//! where `τ` is the FAS correction of a coarse level (absent on the finest
//! level). A diagonal entry of exactly zero skips the implicit solve.

use std::sync::Arc;

use nalgebra::DMatrix;
use pfasst_collocation::{CollocationError, CollocationRule, QDelta};
use pfasst_core::{linear_combination, Problem, ProblemError, StateVector};

/// Sweep operator for one level: a rule and its preconditioner.
#[derive(Clone, Debug)]
pub struct Sweeper {
    kind: QDelta,
    rule: Arc<CollocationRule>,
    qdelta: DMatrix<f64>,
    q_minus_qdelta: DMatrix<f64>,
}

impl Sweeper {
    /// Build the sweeper for `rule` with the `kind` preconditioner.
    pub fn new(rule: Arc<CollocationRule>, kind: QDelta) -> Result<Self, CollocationError> {
        let qdelta = kind.matrix(&rule)?;
        let q_minus_qdelta = rule.q() - &qdelta;
        Ok(Self {
            kind,
            rule,
            qdelta,
            q_minus_qdelta,
        })
    }

    /// The preconditioner kind.
    pub fn kind(&self) -> QDelta {
        self.kind
    }

    /// The collocation rule.
    pub fn rule(&self) -> &Arc<CollocationRule> {
        &self.rule
    }

    /// Number of collocation nodes.
    pub fn num_nodes(&self) -> usize {
        self.rule.num_nodes()
    }

    /// Absolute time of node `m` (`m = 0` is the step start).
    pub fn node_time(&self, t: f64, dt: f64, m: usize) -> f64 {
        if m == 0 {
            t
        } else {
            t + dt * self.rule.nodes()[m - 1]
        }
    }

    /// One sweep over `u[1..=M]`, updating `f` alongside.
    pub fn sweep<P: Problem>(
        &self,
        problem: &P,
        u: &mut [P::U],
        f: &mut [P::U],
        tau: Option<&[P::U]>,
        t: f64,
        dt: f64,
    ) -> Result<(), ProblemError> {
        let m_nodes = self.num_nodes();

        // Integral terms use f from the previous sweep.
        let mut integral = Vec::with_capacity(m_nodes);
        for m in 1..=m_nodes {
            let mut acc = weighted_sum(self.q_minus_qdelta.row(m).iter(), dt, f)?;
            if let Some(tau) = tau {
                acc = acc.add(&tau[m])?;
            }
            integral.push(acc);
        }

        for (m, integral_m) in (1..=m_nodes).zip(integral) {
            let mut rhs = u[0].add(&integral_m)?;
            for (j, fj) in f.iter().enumerate().take(m) {
                let c = dt * self.qdelta[(m, j)];
                if c != 0.0 {
                    rhs = rhs.axpy(c, fj)?;
                }
            }
            let tm = self.node_time(t, dt, m);
            let factor = dt * self.qdelta[(m, m)];
            u[m] = if factor == 0.0 {
                rhs
            } else {
                problem.solve_system(&rhs, factor, &u[m], tm)?
            };
            f[m] = problem.eval_f(&u[m], tm)?;
        }
        Ok(())
    }

    /// `dt·(Q f)_m` for `m = 0..=M` (entry 0 is zero).
    pub fn integrate<U: StateVector>(&self, f: &[U], dt: f64) -> Result<Vec<U>, ProblemError> {
        (0..=self.num_nodes())
            .map(|m| weighted_sum(self.rule.q().row(m).iter(), dt, f))
            .collect()
    }

    /// Collocation residual `max_m ‖u_0 + dt·(Q f)_m + τ_m − u_m‖`.
    pub fn residual<U: StateVector>(
        &self,
        u: &[U],
        f: &[U],
        tau: Option<&[U]>,
        dt: f64,
    ) -> Result<f64, ProblemError> {
        let integral = self.integrate(f, dt)?;
        let mut res: f64 = 0.0;
        for m in 1..=self.num_nodes() {
            let mut r = u[0].add(&integral[m])?;
            if let Some(tau) = tau {
                r = r.add(&tau[m])?;
            }
            let norm = r.sub(&u[m])?.norm();
            // NaN must not hide behind max().
            if norm.is_nan() {
                return Ok(f64::NAN);
            }
            res = res.max(norm);
        }
        Ok(res)
    }

    /// Value at the end of the step.
    pub fn terminal<U: StateVector>(
        &self,
        u: &[U],
        f: &[U],
        tau: Option<&[U]>,
        dt: f64,
    ) -> Result<U, ProblemError> {
        let m_nodes = self.num_nodes();
        if self.rule.right_is_node() {
            return Ok(u[m_nodes].clone());
        }
        let mut end = u[0].add(&weighted_sum(self.rule.weights().iter(), dt, f)?)?;
        if let Some(tau) = tau {
            end = end.add(&tau[m_nodes])?;
        }
        Ok(end)
    }
}

/// `dt · Σ_j coeffs[j] · values[j]`.
fn weighted_sum<'a, U: StateVector>(
    coeffs: impl Iterator<Item = &'a f64>,
    dt: f64,
    values: &[U],
) -> Result<U, ProblemError> {
    let scaled: Vec<f64> = coeffs.map(|c| dt * c).collect();
    let sum = linear_combination(&scaled, values)?;
    sum.ok_or_else(|| ProblemError::SolveFailed {
        reason: "empty node set".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pfasst_collocation::NodeType;
    use pfasst_core::Mesh;
    use pfasst_problems::Dahlquist;

    fn sweeper(ty: NodeType, m: usize, kind: QDelta) -> Sweeper {
        Sweeper::new(Arc::new(CollocationRule::new(ty, m).unwrap()), kind).unwrap()
    }

    fn spread(problem: &Dahlquist, m: usize, u0: f64) -> (Vec<f64>, Vec<f64>) {
        let f0 = problem.eval_f(&u0, 0.0).unwrap();
        (vec![u0; m + 1], vec![f0; m + 1])
    }

    #[test]
    fn residual_drops_with_sweeps() {
        let s = sweeper(NodeType::GaussRadauRight, 3, QDelta::ImplicitEuler);
        let p = Dahlquist::new(-1.0, 1.0);
        let (mut u, mut f) = spread(&p, 3, 1.0);
        let mut last = s.residual(&u, &f, None, 0.1).unwrap();
        for _ in 0..6 {
            s.sweep(&p, &mut u, &mut f, None, 0.0, 0.1).unwrap();
            let res = s.residual(&u, &f, None, 0.1).unwrap();
            assert!(res < last, "{res} !< {last}");
            last = res;
        }
    }

    #[test]
    fn converged_sweep_matches_exact_solution() {
        let s = sweeper(NodeType::GaussRadauRight, 3, QDelta::Lu);
        let p = Dahlquist::new(-1.0, 1.0);
        let (mut u, mut f) = spread(&p, 3, 1.0);
        for _ in 0..30 {
            s.sweep(&p, &mut u, &mut f, None, 0.0, 0.1).unwrap();
        }
        assert!(s.residual(&u, &f, None, 0.1).unwrap() < 1e-14);
        let end = s.terminal(&u, &f, None, 0.1).unwrap();
        // Radau IIA with 3 nodes is order 5.
        assert!((end - (-0.1_f64).exp()).abs() < 1e-9);
    }

    #[test]
    fn explicit_sweeper_never_solves() {
        struct NoSolve;
        impl Problem for NoSolve {
            type U = f64;
            fn name(&self) -> &str {
                "NoSolve"
            }
            fn u_exact(&self, _t: f64) -> Result<f64, ProblemError> {
                Ok(1.0)
            }
            fn eval_f(&self, u: &f64, _t: f64) -> Result<f64, ProblemError> {
                Ok(-u)
            }
            fn solve_system(&self, _: &f64, _: f64, _: &f64, _: f64) -> Result<f64, ProblemError> {
                Err(ProblemError::SolveFailed {
                    reason: "explicit sweeper called solve".into(),
                })
            }
        }
        let s = sweeper(NodeType::GaussRadauRight, 3, QDelta::ExplicitEuler);
        let (mut u, mut f) = (vec![1.0; 4], vec![-1.0; 4]);
        s.sweep(&NoSolve, &mut u, &mut f, None, 0.0, 0.1).unwrap();
    }

    #[test]
    fn gauss_terminal_uses_weights() {
        let s = sweeper(NodeType::GaussLegendre, 2, QDelta::ImplicitEuler);
        // Constant f = 2: end value is u0 + 2 dt.
        let u = vec![1.0; 3];
        let f = vec![2.0; 3];
        let end = s.terminal(&u, &f, None, 0.5).unwrap();
        assert!((end - 2.0).abs() < 1e-14);
    }

    #[test]
    fn tau_shifts_the_fixed_point() {
        let s = sweeper(NodeType::GaussRadauRight, 2, QDelta::ImplicitEuler);
        let p = Dahlquist::new(0.0, 1.0);
        let (mut u, mut f) = spread(&p, 2, 1.0);
        let tau = vec![0.0, 0.25, 0.5];
        s.sweep(&p, &mut u, &mut f, Some(&tau), 0.0, 1.0).unwrap();
        assert_eq!(u, vec![1.0, 1.25, 1.5]);
        assert_eq!(s.residual(&u, &f, Some(&tau), 1.0).unwrap(), 0.0);
    }

    #[test]
    fn nan_node_value_gives_nan_residual() {
        let s = sweeper(NodeType::GaussRadauRight, 2, QDelta::ImplicitEuler);
        let u = vec![
            Mesh::new(vec![1.0, 1.0]),
            Mesh::new(vec![f64::NAN, 1.0]),
            Mesh::new(vec![1.0, 1.0]),
        ];
        let f = vec![Mesh::zeros(2); 3];
        assert!(s.residual(&u, &f, None, 0.1).unwrap().is_nan());
    }

    #[test]
    fn node_times() {
        let s = sweeper(NodeType::Equidistant, 4, QDelta::ImplicitEuler);
        assert_eq!(s.node_time(1.0, 2.0, 0), 1.0);
        assert_eq!(s.node_time(1.0, 2.0, 2), 2.0);
        assert_eq!(s.node_time(1.0, 2.0, 4), 3.0);
    }
}

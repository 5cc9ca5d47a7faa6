//! The [`Problem`] contract consumed by the sweepers.

use crate::error::ProblemError;
use crate::params::ProblemParams;
use crate::state::StateVector;

/// Right-hand side of `u'(t) = f(u, t)` on one discretization level.
///
/// # Contract
///
/// - `eval_f` and `solve_system` MUST be deterministic.
/// - `solve_system(rhs, factor, u0, t)` returns `u` with
///   `u - factor * f(u, t) = rhs`; `u0` is an initial guess for iterative
///   solvers and may be ignored by direct ones.
/// - A `factor` of exactly `0.0` means "no implicit part"; the sweeper
///   short-circuits that case and never calls `solve_system` for it.
pub trait Problem: Send + 'static {
    /// State-vector (and right-hand-side) representation.
    type U: StateVector;

    /// Human-readable name for diagnostics.
    fn name(&self) -> &str;

    /// Exact (or reference) solution at time `t`; used for initial values.
    fn u_exact(&self, t: f64) -> Result<Self::U, ProblemError>;

    /// Evaluate the right-hand side at `(u, t)`.
    fn eval_f(&self, u: &Self::U, t: f64) -> Result<Self::U, ProblemError>;

    /// Solve `u - factor * f(u, t) = rhs` for `u`.
    fn solve_system(
        &self,
        rhs: &Self::U,
        factor: f64,
        u0: &Self::U,
        t: f64,
    ) -> Result<Self::U, ProblemError>;
}

/// A [`Problem`] that can be instantiated per level from [`ProblemParams`].
pub trait ProblemClass: Problem + Sized {
    /// Build the problem for hierarchy level `level` (0 = finest).
    fn from_params(params: &ProblemParams, level: usize) -> Result<Self, ProblemError>;
}

//! `u' = c` on scalars.

use pfasst_core::{Problem, ProblemClass, ProblemError, ProblemParams};

/// Constant right-hand side `f(u, t) = c`.
///
/// Parameters: `c` (default `0.0`) and `u0` (default `1.0`), the value at
/// `t = 0`. With `c = 0` every iterate equals the initial value, which
/// makes the problem a convenient check for the communication pattern.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstantRhs {
    /// The constant slope.
    pub c: f64,
    /// Value at `t = 0`.
    pub u0: f64,
}

impl ConstantRhs {
    /// Slope `c`, starting from `u0`.
    pub fn new(c: f64, u0: f64) -> Self {
        Self { c, u0 }
    }
}

impl Problem for ConstantRhs {
    type U = f64;

    fn name(&self) -> &str {
        "ConstantRhs"
    }

    fn u_exact(&self, t: f64) -> Result<f64, ProblemError> {
        Ok(self.u0 + self.c * t)
    }

    fn eval_f(&self, _u: &f64, _t: f64) -> Result<f64, ProblemError> {
        Ok(self.c)
    }

    fn solve_system(&self, rhs: &f64, factor: f64, _u0: &f64, _t: f64) -> Result<f64, ProblemError> {
        Ok(rhs + factor * self.c)
    }
}

impl ProblemClass for ConstantRhs {
    fn from_params(params: &ProblemParams, level: usize) -> Result<Self, ProblemError> {
        Ok(Self {
            c: params.get_f64_or("c", level, 0.0)?,
            u0: params.get_f64_or("u0", level, 1.0)?,
        })
    }
}

//! The Dahlquist test equation `u' = λ u`.

use pfasst_core::{Problem, ProblemClass, ProblemError, ProblemParams};

/// Linear scalar test problem with exact solution `u0 · exp(λ t)`.
///
/// Parameters: `lambda` (required) and `u0` (default `1.0`).
#[derive(Clone, Debug, PartialEq)]
pub struct Dahlquist {
    /// Decay (negative) or growth rate.
    pub lambda: f64,
    /// Value at `t = 0`.
    pub u0: f64,
}

impl Dahlquist {
    /// `u' = lambda · u` with `u(0) = u0`.
    pub fn new(lambda: f64, u0: f64) -> Self {
        Self { lambda, u0 }
    }
}

impl Problem for Dahlquist {
    type U = f64;

    fn name(&self) -> &str {
        "Dahlquist"
    }

    fn u_exact(&self, t: f64) -> Result<f64, ProblemError> {
        Ok(self.u0 * (self.lambda * t).exp())
    }

    fn eval_f(&self, u: &f64, _t: f64) -> Result<f64, ProblemError> {
        Ok(self.lambda * u)
    }

    fn solve_system(&self, rhs: &f64, factor: f64, _u0: &f64, _t: f64) -> Result<f64, ProblemError> {
        let denom = 1.0 - factor * self.lambda;
        if denom == 0.0 {
            return Err(ProblemError::SolveFailed {
                reason: format!("1 - {factor} * {} is singular", self.lambda),
            });
        }
        Ok(rhs / denom)
    }
}

impl ProblemClass for Dahlquist {
    fn from_params(params: &ProblemParams, level: usize) -> Result<Self, ProblemError> {
        let lambda = params.get_f64("lambda", level)?;
        if !lambda.is_finite() {
            return Err(ProblemError::InvalidParameter {
                key: "lambda".to_string(),
                reason: format!("must be finite, got {lambda}"),
            });
        }
        Ok(Self {
            lambda,
            u0: params.get_f64_or("u0", level, 1.0)?,
        })
    }
}

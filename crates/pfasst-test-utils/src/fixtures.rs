//! Mock problems for failure-path testing.
//!
//! - [`NanAfter`]: `u' = λu` whose implicit solve returns NaN past a
//!   configured time.
//! - [`FailingSolve`]: `u' = λu` whose implicit solve fails after N calls.

use std::sync::atomic::{AtomicUsize, Ordering};

use pfasst_core::{Problem, ProblemClass, ProblemError, ProblemParams};

/// Linear decay whose implicit solve returns NaN at node times past
/// `t_fail`.
///
/// Lets a test make exactly one time-slice of a run diverge.
#[derive(Clone, Debug)]
pub struct NanAfter {
    pub lambda: f64,
    pub t_fail: f64,
}

impl Problem for NanAfter {
    type U = f64;

    fn name(&self) -> &str {
        "NanAfter"
    }

    fn u_exact(&self, t: f64) -> Result<f64, ProblemError> {
        Ok((self.lambda * t).exp())
    }

    fn eval_f(&self, u: &f64, _t: f64) -> Result<f64, ProblemError> {
        Ok(self.lambda * u)
    }

    fn solve_system(
        &self,
        rhs: &f64,
        factor: f64,
        _u0: &f64,
        t: f64,
    ) -> Result<f64, ProblemError> {
        if t > self.t_fail {
            return Ok(f64::NAN);
        }
        Ok(rhs / (1.0 - factor * self.lambda))
    }
}

impl ProblemClass for NanAfter {
    fn from_params(params: &ProblemParams, level: usize) -> Result<Self, ProblemError> {
        Ok(Self {
            lambda: params.get_f64_or("lambda", level, -1.0)?,
            t_fail: params.get_f64("t_fail", level)?,
        })
    }
}

/// Linear decay whose implicit solve fails once `succeed_count` solves
/// have been done.
#[derive(Debug)]
pub struct FailingSolve {
    pub lambda: f64,
    pub succeed_count: usize,
    calls: AtomicUsize,
}

impl FailingSolve {
    pub fn new(lambda: f64, succeed_count: usize) -> Self {
        Self {
            lambda,
            succeed_count,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::Relaxed)
    }
}

impl Problem for FailingSolve {
    type U = f64;

    fn name(&self) -> &str {
        "FailingSolve"
    }

    fn u_exact(&self, t: f64) -> Result<f64, ProblemError> {
        Ok((self.lambda * t).exp())
    }

    fn eval_f(&self, u: &f64, _t: f64) -> Result<f64, ProblemError> {
        Ok(self.lambda * u)
    }

    fn solve_system(
        &self,
        rhs: &f64,
        factor: f64,
        _u0: &f64,
        _t: f64,
    ) -> Result<f64, ProblemError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        if n >= self.succeed_count {
            return Err(ProblemError::SolveFailed {
                reason: format!("solve {n} refused"),
            });
        }
        Ok(rhs / (1.0 - factor * self.lambda))
    }
}

impl ProblemClass for FailingSolve {
    fn from_params(params: &ProblemParams, level: usize) -> Result<Self, ProblemError> {
        Ok(Self::new(
            params.get_f64_or("lambda", level, -1.0)?,
            params.get_usize("succeed_count", level)?,
        ))
    }
}

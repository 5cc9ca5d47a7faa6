//! One-dimensional heat equation with homogeneous Dirichlet boundaries.
//!
//! `u_t = ν u_xx` on `(0, 1)`, `u(0) = u(1) = 0`. The grid holds `nvars`
//! interior points `x_i = (i + 1) / (nvars + 1)`; the Laplacian is the
//! standard three-point stencil, and implicit solves use the Thomas
//! algorithm on the resulting tridiagonal system.

use std::f64::consts::PI;

use pfasst_core::{Mesh, Problem, ProblemClass, ProblemError, ProblemParams, StateVector};

/// Heat equation on one level of the hierarchy.
///
/// Parameters: `nvars` (interior points, per-level list allowed), `nu`
/// (diffusivity, must be positive) and `freq` (sine mode of the initial
/// value, default `1`).
#[derive(Clone, Debug, PartialEq)]
pub struct Heat1D {
    nvars: usize,
    nu: f64,
    freq: f64,
    dx: f64,
}

impl Heat1D {
    /// `nvars` interior points, diffusivity `nu`, initial sine mode `freq`.
    pub fn new(nvars: usize, nu: f64, freq: f64) -> Result<Self, ProblemError> {
        if nvars == 0 {
            return Err(ProblemError::InvalidParameter {
                key: "nvars".to_string(),
                reason: "need at least one interior point".to_string(),
            });
        }
        if !(nu.is_finite() && nu > 0.0) {
            return Err(ProblemError::InvalidParameter {
                key: "nu".to_string(),
                reason: format!("must be finite and positive, got {nu}"),
            });
        }
        Ok(Self {
            nvars,
            nu,
            freq,
            dx: 1.0 / (nvars + 1) as f64,
        })
    }

    /// Number of interior grid points.
    pub fn nvars(&self) -> usize {
        self.nvars
    }

    /// Grid spacing.
    pub fn dx(&self) -> f64 {
        self.dx
    }

    fn check(&self, u: &Mesh, operation: &'static str) -> Result<(), ProblemError> {
        if u.len() != self.nvars {
            return Err(pfasst_core::DataError::TypeMismatch {
                operation,
                expected: format!("Mesh({})", self.nvars),
                found: format!("Mesh({})", u.len()),
            }
            .into());
        }
        Ok(())
    }
}

impl Problem for Heat1D {
    type U = Mesh;

    fn name(&self) -> &str {
        "Heat1D"
    }

    fn u_exact(&self, t: f64) -> Result<Mesh, ProblemError> {
        let k = PI * self.freq;
        let decay = (-self.nu * k * k * t).exp();
        Ok(Mesh::from_fn(self.nvars, |i| {
            (k * (i + 1) as f64 * self.dx).sin() * decay
        }))
    }

    fn eval_f(&self, u: &Mesh, _t: f64) -> Result<Mesh, ProblemError> {
        self.check(u, "eval_f")?;
        let v = u.values();
        let n = v.len();
        let c = self.nu / (self.dx * self.dx);
        Ok(Mesh::from_fn(n, |i| {
            let left = if i > 0 { v[i - 1] } else { 0.0 };
            let right = if i + 1 < n { v[i + 1] } else { 0.0 };
            c * (left - 2.0 * v[i] + right)
        }))
    }

    fn solve_system(
        &self,
        rhs: &Mesh,
        factor: f64,
        _u0: &Mesh,
        _t: f64,
    ) -> Result<Mesh, ProblemError> {
        self.check(rhs, "solve_system")?;
        let c = factor * self.nu / (self.dx * self.dx);
        let solution = thomas(-c, 1.0 + 2.0 * c, -c, rhs.values())?;
        let out = Mesh::new(solution);
        if !out.is_finite() {
            return Err(ProblemError::SolveFailed {
                reason: format!("non-finite solution for factor {factor}"),
            });
        }
        Ok(out)
    }
}

impl ProblemClass for Heat1D {
    fn from_params(params: &ProblemParams, level: usize) -> Result<Self, ProblemError> {
        Self::new(
            params.get_usize("nvars", level)?,
            params.get_f64("nu", level)?,
            params.get_f64_or("freq", level, 1.0)?,
        )
    }
}

/// Solve the constant-coefficient tridiagonal system
/// `lower · x[i-1] + diag · x[i] + upper · x[i+1] = d[i]`.
fn thomas(lower: f64, diag: f64, upper: f64, d: &[f64]) -> Result<Vec<f64>, ProblemError> {
    let n = d.len();
    let mut c_prime = vec![0.0; n];
    let mut x = vec![0.0; n];
    let mut denom = diag;
    for i in 0..n {
        if i > 0 {
            denom = diag - lower * c_prime[i - 1];
        }
        if denom == 0.0 {
            return Err(ProblemError::SolveFailed {
                reason: format!("zero pivot at row {i}"),
            });
        }
        c_prime[i] = upper / denom;
        let prev = if i > 0 { x[i - 1] } else { 0.0 };
        x[i] = (d[i] - lower * prev) / denom;
    }
    for i in (0..n.saturating_sub(1)).rev() {
        x[i] -= c_prime[i] * x[i + 1];
    }
    Ok(x)
}

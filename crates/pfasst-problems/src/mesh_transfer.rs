//! Transfer between nested homogeneous-Dirichlet grids.
//!
//! A coarse grid with `n_c` interior points nests in a fine grid with
//! `n_f = 2 n_c + 1`: coarse point `j` sits on fine point `2 j + 1`.
//! Equal sizes make both maps the identity.

use pfasst_core::{Mesh, ProblemError, ProblemParams, SpaceTransfer, TransferClass};

/// How fine values are mapped onto the coarse grid.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Restriction {
    /// Take the coincident fine value.
    Injection,
    /// `[1/4, 1/2, 1/4]` weighting around the coincident fine point.
    FullWeighting,
}

/// [`SpaceTransfer`] for [`Mesh`] values of [`Heat1D`](crate::Heat1D).
///
/// Prolongation is linear interpolation with zero boundary values.
/// Transfer parameters: `rorder` = `0` (injection, default) or `2` (full
/// weighting).
#[derive(Clone, Debug, PartialEq)]
pub struct MeshTransfer {
    fine: usize,
    coarse: usize,
    restriction: Restriction,
}

impl MeshTransfer {
    /// Transfer between `fine` and `coarse` interior points.
    pub fn new(fine: usize, coarse: usize, restriction: Restriction) -> Result<Self, ProblemError> {
        if fine != coarse && fine != 2 * coarse + 1 {
            return Err(ProblemError::InvalidParameter {
                key: "nvars".to_string(),
                reason: format!(
                    "grids do not nest: fine {fine} must equal coarse {coarse} or 2 * {coarse} + 1"
                ),
            });
        }
        Ok(Self {
            fine,
            coarse,
            restriction,
        })
    }

    fn check(&self, u: &Mesh, expected: usize, operation: &'static str) -> Result<(), ProblemError> {
        if u.len() != expected {
            return Err(pfasst_core::DataError::TypeMismatch {
                operation,
                expected: format!("Mesh({expected})"),
                found: format!("Mesh({})", u.len()),
            }
            .into());
        }
        Ok(())
    }
}

impl SpaceTransfer<Mesh> for MeshTransfer {
    fn restrict(&self, fine: &Mesh) -> Result<Mesh, ProblemError> {
        self.check(fine, self.fine, "restrict")?;
        if self.fine == self.coarse {
            return Ok(fine.clone());
        }
        let v = fine.values();
        Ok(match self.restriction {
            Restriction::Injection => Mesh::from_fn(self.coarse, |j| v[2 * j + 1]),
            Restriction::FullWeighting => Mesh::from_fn(self.coarse, |j| {
                0.25 * v[2 * j] + 0.5 * v[2 * j + 1] + 0.25 * v[2 * j + 2]
            }),
        })
    }

    fn prolong(&self, coarse: &Mesh) -> Result<Mesh, ProblemError> {
        self.check(coarse, self.coarse, "prolong")?;
        if self.fine == self.coarse {
            return Ok(coarse.clone());
        }
        let c = coarse.values();
        let at = |j: isize| -> f64 {
            if j < 0 || j as usize >= c.len() {
                0.0
            } else {
                c[j as usize]
            }
        };
        Ok(Mesh::from_fn(self.fine, |i| {
            let j = (i / 2) as isize;
            if i % 2 == 1 {
                c[i / 2]
            } else {
                0.5 * (at(j - 1) + at(j))
            }
        }))
    }
}

impl TransferClass<Mesh> for MeshTransfer {
    fn from_params(
        problem_params: &ProblemParams,
        transfer_params: &ProblemParams,
        fine_level: usize,
    ) -> Result<Self, ProblemError> {
        let fine = problem_params.get_usize("nvars", fine_level)?;
        let coarse = problem_params.get_usize("nvars", fine_level + 1)?;
        let restriction = if transfer_params.contains("rorder") {
            match transfer_params.get_usize("rorder", fine_level)? {
                0 => Restriction::Injection,
                2 => Restriction::FullWeighting,
                other => {
                    return Err(ProblemError::InvalidParameter {
                        key: "rorder".to_string(),
                        reason: format!("supported orders are 0 and 2, got {other}"),
                    })
                }
            }
        } else {
            Restriction::Injection
        };
        Self::new(fine, coarse, restriction)
    }
}

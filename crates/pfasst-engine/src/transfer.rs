//! FAS transfer between adjacent levels.
//!
//! [`LevelTransfer`] combines a spatial [`SpaceTransfer`] with Lagrange
//! interpolation between the two levels' collocation nodes. Restriction
//! moves `u` down, re-evaluates the coarse right-hand sides and builds the
//! FAS correction
//!
//! ```text
//! τ_c = R·I_f(Q f_f) + R·τ_f − I_c(Q f_c)
//! ```
//!
//! so that the coarse collocation problem is consistent with the fine
//! one. Prolongation interpolates the coarse change since restriction
//! back up and adds it to the fine values.

use nalgebra::DMatrix;
use pfasst_collocation::{interpolation_matrix, CollocationRule};
use pfasst_core::{linear_combination, Problem, SpaceTransfer, StateVector};

use crate::error::SweepError;
use crate::level::Level;

/// Transfer operators between level `l` and level `l + 1`.
pub struct LevelTransfer<U> {
    space: Box<dyn SpaceTransfer<U>>,
    /// Fine-to-coarse node interpolation; `None` when the node sets match.
    restrict_nodes: Option<DMatrix<f64>>,
    /// Coarse-to-fine node interpolation; `None` when the node sets match.
    prolong_nodes: Option<DMatrix<f64>>,
}

impl<U> std::fmt::Debug for LevelTransfer<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LevelTransfer")
            .field("restrict_nodes", &self.restrict_nodes)
            .field("prolong_nodes", &self.prolong_nodes)
            .finish_non_exhaustive()
    }
}

impl<U: StateVector> LevelTransfer<U> {
    /// Transfer between levels using `fine` and `coarse` rules.
    pub fn new(
        space: Box<dyn SpaceTransfer<U>>,
        fine: &CollocationRule,
        coarse: &CollocationRule,
    ) -> Self {
        let same_nodes = fine.nodes() == coarse.nodes();
        Self {
            space,
            restrict_nodes: (!same_nodes)
                .then(|| interpolation_matrix(fine.nodes(), coarse.nodes())),
            prolong_nodes: (!same_nodes)
                .then(|| interpolation_matrix(coarse.nodes(), fine.nodes())),
        }
    }

    fn space_restrict(&self, values: &[U]) -> Result<Vec<U>, SweepError> {
        values
            .iter()
            .map(|v| self.space.restrict(v).map_err(SweepError::from))
            .collect()
    }

    fn space_prolong(&self, values: &[U]) -> Result<Vec<U>, SweepError> {
        values
            .iter()
            .map(|v| self.space.prolong(v).map_err(SweepError::from))
            .collect()
    }

    /// Apply a node interpolation to entries `1..` and keep entry 0.
    fn in_time(matrix: Option<&DMatrix<f64>>, values: Vec<U>) -> Result<Vec<U>, SweepError> {
        let Some(matrix) = matrix else {
            return Ok(values);
        };
        let mut out = Vec::with_capacity(matrix.nrows() + 1);
        let mut iter = values.into_iter();
        let Some(first) = iter.next() else {
            return Ok(out);
        };
        let rest: Vec<U> = iter.collect();
        out.push(first);
        for (i, row) in matrix.row_iter().enumerate() {
            let coeffs: Vec<f64> = row.iter().copied().collect();
            let value = linear_combination(&coeffs, &rest)?
                .ok_or(SweepError::NonFinite { node: i + 1 })?;
            out.push(value);
        }
        Ok(out)
    }

    /// Move `fine` down to `coarse` and set up the coarse FAS problem.
    pub fn restrict<P>(&self, fine: &Level<P>, coarse: &mut Level<P>) -> Result<(), SweepError>
    where
        P: Problem<U = U>,
    {
        let u = Self::in_time(self.restrict_nodes.as_ref(), self.space_restrict(fine.u())?)?;
        coarse.u = u;
        coarse.evaluate_all()?;

        let fine_int = Self::in_time(
            self.restrict_nodes.as_ref(),
            self.space_restrict(&fine.integrate()?)?,
        )?;
        let fine_tau = match fine.tau() {
            Some(tau) => Some(Self::in_time(
                self.restrict_nodes.as_ref(),
                self.space_restrict(tau)?,
            )?),
            None => None,
        };
        let coarse_int = coarse.integrate()?;

        let mut tau = Vec::with_capacity(coarse_int.len());
        for (m, (fi, ci)) in fine_int.iter().zip(&coarse_int).enumerate() {
            let mut t = fi.sub(ci)?;
            if let Some(ft) = &fine_tau {
                t = t.add(&ft[m])?;
            }
            tau.push(t);
        }
        coarse.tau = Some(tau);
        coarse.uold = coarse.u.clone();
        Ok(())
    }

    /// Interpolate the coarse change since [`restrict`](Self::restrict)
    /// and add it to `fine`.
    pub fn prolong<P>(&self, fine: &mut Level<P>, coarse: &Level<P>) -> Result<(), SweepError>
    where
        P: Problem<U = U>,
    {
        let delta = coarse
            .u
            .iter()
            .zip(&coarse.uold)
            .map(|(u, old)| u.sub(old))
            .collect::<Result<Vec<U>, _>>()?;
        let correction = Self::in_time(self.prolong_nodes.as_ref(), self.space_prolong(&delta)?)?;
        fine.prolong(&correction)
    }

    /// Space-restrict a single value (used to seed coarse levels).
    pub fn restrict_value(&self, value: &U) -> Result<U, SweepError> {
        Ok(self.space.restrict(value)?)
    }
}

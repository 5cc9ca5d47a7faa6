//! One-dimensional grid state vector.

use crate::error::DataError;
use crate::state::StateVector;

/// Values of a scalar unknown on a structured 1-D grid.
///
/// The norm is the absolute maximum over all grid points.
#[derive(Clone, Debug, PartialEq)]
pub struct Mesh {
    values: Vec<f64>,
}

impl Mesh {
    /// Wrap an existing vector of grid values.
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// A mesh of `len` zeros.
    pub fn zeros(len: usize) -> Self {
        Self {
            values: vec![0.0; len],
        }
    }

    /// Build a mesh by evaluating `f` at every index.
    pub fn from_fn(len: usize, f: impl FnMut(usize) -> f64) -> Self {
        Self {
            values: (0..len).map(f).collect(),
        }
    }

    /// Number of grid points.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the mesh has no grid points.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Read access to the grid values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Consume the mesh, returning its values.
    pub fn into_values(self) -> Vec<f64> {
        self.values
    }

    fn check_len(&self, other: &Self, operation: &'static str) -> Result<(), DataError> {
        if self.values.len() != other.values.len() {
            return Err(DataError::TypeMismatch {
                operation,
                expected: format!("Mesh({})", self.values.len()),
                found: format!("Mesh({})", other.values.len()),
            });
        }
        Ok(())
    }

    fn zip_with(&self, other: &Self, op: impl Fn(f64, f64) -> f64) -> Self {
        Self {
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| op(*a, *b))
                .collect(),
        }
    }
}

impl StateVector for Mesh {
    fn add(&self, other: &Self) -> Result<Self, DataError> {
        self.check_len(other, "add")?;
        Ok(self.zip_with(other, |a, b| a + b))
    }

    fn sub(&self, other: &Self) -> Result<Self, DataError> {
        self.check_len(other, "sub")?;
        Ok(self.zip_with(other, |a, b| a - b))
    }

    fn scale(&self, factor: f64) -> Self {
        Self {
            values: self.values.iter().map(|v| factor * v).collect(),
        }
    }

    fn norm(&self) -> f64 {
        let mut norm: f64 = 0.0;
        for v in &self.values {
            if v.is_nan() {
                return f64::NAN;
            }
            norm = norm.max(v.abs());
        }
        norm
    }

    fn zeros_like(&self) -> Self {
        Self::zeros(self.values.len())
    }

    fn is_finite(&self) -> bool {
        self.values.iter().all(|v| v.is_finite())
    }

    fn axpy(&self, a: f64, x: &Self) -> Result<Self, DataError> {
        self.check_len(x, "axpy")?;
        Ok(self.zip_with(x, |s, xv| s + a * xv))
    }
}

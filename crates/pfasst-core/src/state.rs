//! The [`StateVector`] capability set.
//!
//! The engine never relies on a concrete representation: it only needs to
//! add, subtract, scale and measure values. Every operation returns a fresh
//! owned value, so iterates held by different levels or steps can never
//! alias each other.

use std::fmt;

use crate::error::DataError;

/// A vector-space value the engine can iterate on.
///
/// Implementations must be cheap to [`Clone`] relative to one right-hand
/// side evaluation, and must be [`Send`] so they can travel between
/// process slots through the messaging substrate.
///
/// # Examples
///
/// ```
/// use pfasst_core::StateVector;
///
/// let a = 2.0_f64;
/// let b = a.axpy(0.5, &4.0).unwrap();
/// assert_eq!(b, 4.0);
/// assert_eq!(b.sub(&a).unwrap().norm(), 2.0);
/// ```
pub trait StateVector: Clone + fmt::Debug + Send + Sync + 'static {
    /// `self + other`. Fails with [`DataError::TypeMismatch`] when the
    /// operands do not share a representation.
    fn add(&self, other: &Self) -> Result<Self, DataError>;

    /// `self - other`. Fails with [`DataError::TypeMismatch`] when the
    /// operands do not share a representation.
    fn sub(&self, other: &Self) -> Result<Self, DataError>;

    /// `factor * self`.
    fn scale(&self, factor: f64) -> Self;

    /// Magnitude used for residuals and convergence checks.
    fn norm(&self) -> f64;

    /// A value of the same representation with every entry set to zero.
    fn zeros_like(&self) -> Self;

    /// Whether every entry is finite (no NaN or infinity).
    fn is_finite(&self) -> bool;

    /// `self + a * x`.
    fn axpy(&self, a: f64, x: &Self) -> Result<Self, DataError> {
        self.add(&x.scale(a))
    }
}

impl StateVector for f64 {
    fn add(&self, other: &Self) -> Result<Self, DataError> {
        Ok(self + other)
    }

    fn sub(&self, other: &Self) -> Result<Self, DataError> {
        Ok(self - other)
    }

    fn scale(&self, factor: f64) -> Self {
        factor * self
    }

    fn norm(&self) -> f64 {
        self.abs()
    }

    fn zeros_like(&self) -> Self {
        0.0
    }

    fn is_finite(&self) -> bool {
        f64::is_finite(*self)
    }
}

/// Linear combination `Σ coeffs[j] * values[j]`.
///
/// Zero coefficients are skipped so that an exact identity matrix row
/// reproduces its source value bit for bit. Returns `None` when
/// `values` is empty.
pub fn linear_combination<U: StateVector>(
    coeffs: &[f64],
    values: &[U],
) -> Result<Option<U>, DataError> {
    let Some(first) = values.first() else {
        return Ok(None);
    };
    let mut acc: Option<U> = None;
    for (c, v) in coeffs.iter().zip(values) {
        if *c == 0.0 {
            continue;
        }
        let term = if *c == 1.0 { v.clone() } else { v.scale(*c) };
        acc = Some(match acc {
            Some(a) => a.add(&term)?,
            None => term,
        });
    }
    Ok(Some(acc.unwrap_or_else(|| first.zeros_like())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_arithmetic_returns_fresh_values() {
        let a = 3.0_f64;
        let b = StateVector::add(&a, &1.5).unwrap();
        assert_eq!(a, 3.0);
        assert_eq!(b, 4.5);
        assert_eq!(StateVector::sub(&b, &a).unwrap(), 1.5);
        assert_eq!(a.scale(-2.0), -6.0);
        assert_eq!((-7.0_f64).norm(), 7.0);
    }

    #[test]
    fn scalar_finiteness() {
        assert!(StateVector::is_finite(&1.0_f64));
        assert!(!StateVector::is_finite(&f64::NAN));
        assert!(!StateVector::is_finite(&f64::INFINITY));
    }

    #[test]
    fn linear_combination_identity_row_is_exact() {
        let values = [0.1_f64, 0.2, 0.3];
        let out = linear_combination(&[0.0, 1.0, 0.0], &values)
            .unwrap()
            .unwrap();
        assert_eq!(out, 0.2);
    }

    #[test]
    fn linear_combination_all_zero_gives_zero() {
        let values = [5.0_f64, 6.0];
        let out = linear_combination(&[0.0, 0.0], &values).unwrap().unwrap();
        assert_eq!(out, 0.0);
    }

    #[test]
    fn linear_combination_empty_is_none() {
        let values: [f64; 0] = [];
        assert!(linear_combination(&[], &values).unwrap().is_none());
    }
}

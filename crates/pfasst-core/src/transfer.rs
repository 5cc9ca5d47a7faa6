//! Spatial transfer between discretization levels.
//!
//! Levels of a hierarchy may use different spatial resolutions. A
//! [`SpaceTransfer`] moves a single state vector between the resolution of
//! one level and that of the next-coarser level. Moving whole node sets
//! (including the time interpolation and the FAS correction) is the
//! engine's job; this trait only covers one value at a time.

use crate::error::ProblemError;
use crate::params::ProblemParams;
use crate::state::StateVector;

/// Restriction and prolongation of one value between a fine level and the
/// next-coarser level.
///
/// Both maps must be linear, and `restrict(prolong(c))` should return `c`
/// for the multi-level scheme to be consistent.
pub trait SpaceTransfer<U>: Send {
    /// Map a fine-level value to the coarse resolution.
    fn restrict(&self, fine: &U) -> Result<U, ProblemError>;

    /// Map a coarse-level value to the fine resolution.
    fn prolong(&self, coarse: &U) -> Result<U, ProblemError>;
}

/// A [`SpaceTransfer`] that can be built from the problem and transfer
/// parameters for the level pair `(fine_level, fine_level + 1)`.
pub trait TransferClass<U>: SpaceTransfer<U> + Sized + 'static {
    /// Build the transfer between `fine_level` and `fine_level + 1`.
    fn from_params(
        problem_params: &ProblemParams,
        transfer_params: &ProblemParams,
        fine_level: usize,
    ) -> Result<Self, ProblemError>;
}

/// Transfer between levels that share a spatial resolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IdentityTransfer;

impl<U: StateVector> SpaceTransfer<U> for IdentityTransfer {
    fn restrict(&self, fine: &U) -> Result<U, ProblemError> {
        Ok(fine.clone())
    }

    fn prolong(&self, coarse: &U) -> Result<U, ProblemError> {
        Ok(coarse.clone())
    }
}

impl<U: StateVector> TransferClass<U> for IdentityTransfer {
    fn from_params(
        _problem_params: &ProblemParams,
        _transfer_params: &ProblemParams,
        _fine_level: usize,
    ) -> Result<Self, ProblemError> {
        Ok(Self)
    }
}

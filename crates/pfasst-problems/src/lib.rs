//! Reference problem classes for the PFASST engine.
//!
//! Small, well-understood right-hand sides used by the test suite, the
//! benchmarks and the demos:
//!
//! - [`ConstantRhs`]: `u' = c` on scalars (`c = 0` gives the trivial
//!   steady problem).
//! - [`Dahlquist`]: `u' = λ u` on scalars, with exact solution.
//! - [`Heat1D`]: `u_t = ν u_xx` on `(0, 1)` with homogeneous Dirichlet
//!   boundaries, second-order finite differences on a [`Mesh`](pfasst_core::Mesh).
//!
//! [`MeshTransfer`] moves [`Mesh`](pfasst_core::Mesh) values between nested
//! grids for multi-level runs of [`Heat1D`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod constant;
pub mod dahlquist;
pub mod heat;
pub mod mesh_transfer;

pub use constant::ConstantRhs;
pub use dahlquist::Dahlquist;
pub use heat::Heat1D;
pub use mesh_transfer::{MeshTransfer, Restriction};

//! Collocation rules for spectral deferred corrections.
//!
//! A [`CollocationRule`] bundles the quadrature nodes of one time-step
//! (fractions of the step in `[0, 1]`), the node-to-node integration
//! matrix `Q` and the full-interval weights. [`QDelta`] builds the
//! lower-triangular preconditioners a sweeper uses in place of `Q`, and
//! [`interpolation_matrix`] moves node values between rules of different
//! order when levels use different node counts.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod interp;
pub mod nodes;
pub mod poly;
pub mod qdelta;
pub mod rule;

pub use error::CollocationError;
pub use interp::interpolation_matrix;
pub use nalgebra::DMatrix;
pub use nodes::NodeType;
pub use qdelta::QDelta;
pub use rule::CollocationRule;

/// Largest supported number of nodes per rule.
///
/// Beyond this the monomial Lagrange integration loses too much precision
/// to keep `Q` exact for polynomials of degree `M - 1`.
pub const MAX_NODES: usize = 16;

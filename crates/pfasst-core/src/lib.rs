//! Core types and traits for the PFASST time-stepping engine.
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! narrow interfaces the engine consumes: the [`StateVector`] capability
//! set, the [`Problem`] right-hand-side contract, problem parameters, the
//! spatial [`SpaceTransfer`] seam between levels, the
//! statistics sink, and the shared error types.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod error;
pub mod mesh;
pub mod params;
pub mod problem;
pub mod state;
pub mod stats;
pub mod transfer;

pub use error::{DataError, ProblemError};
pub use mesh::Mesh;
pub use params::{ParamValue, ProblemParams};
pub use problem::{Problem, ProblemClass};
pub use state::{linear_combination, StateVector};
pub use stats::{StatEntry, StatFilter, StatKind, Stats};
pub use transfer::{IdentityTransfer, SpaceTransfer, TransferClass};

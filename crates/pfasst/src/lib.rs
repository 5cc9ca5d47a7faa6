//! PFASST: parallel-in-time integration with spectral deferred corrections.
//!
//! This is the top-level facade crate that re-exports the public API of the
//! PFASST sub-crates. For most users, adding `pfasst` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use pfasst::prelude::*;
//! use pfasst::problems::Dahlquist;
//!
//! let description = Description::<Dahlquist>::builder()
//!     .problem_params(ProblemParams::new().with("lambda", -1.0))
//!     .collocation_class(NodeType::GaussRadauRight)
//!     .num_nodes(vec![3])
//!     .sweeper_class(QDelta::Lu)
//!     .level_params(LevelParams::default())
//!     .build()
//!     .unwrap();
//! let mut steps = generate_steps(4, &StepParams::default(), &description).unwrap();
//!
//! let (u, stats) = run(&mut steps, 1.0, 0.0, 0.25, 1.0).unwrap();
//! assert!((u - (-1.0_f64).exp()).abs() < 1e-6);
//! assert_eq!(stats.count(&StatFilter::new().kind(StatKind::Niter)), 4);
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `pfasst-core` | State vectors, problems, parameters, statistics |
//! | [`collocation`] | `pfasst-collocation` | Quadrature nodes, `Q` matrices, `QΔ` variants |
//! | [`engine`] | `pfasst-engine` | Levels, steps, block scheduling, fault recovery |
//! | [`problems`] | `pfasst-problems` | Reference problems and spatial transfers |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// State vectors, problem traits, parameters and statistics (`pfasst-core`).
pub use pfasst_core as types;

/// Collocation rules and preconditioners (`pfasst-collocation`).
pub use pfasst_collocation as collocation;

/// Levels, steps, scheduling and fault recovery (`pfasst-engine`).
///
/// [`engine::run`] for fault-free runs, [`engine::run_with_faults`] with a
/// [`engine::FaultSpec`].
pub use pfasst_engine as engine;

/// Reference problems (`pfasst-problems`).
///
/// [`problems::Dahlquist`], [`problems::ConstantRhs`] and
/// [`problems::Heat1D`] with its [`problems::MeshTransfer`].
pub use pfasst_problems as problems;

/// Common imports for typical PFASST usage.
///
/// ```rust
/// use pfasst::prelude::*;
/// ```
pub mod prelude {
    // Core types and traits
    pub use pfasst_core::{
        Mesh, Problem, ProblemClass, ProblemParams, StatEntry, StatFilter, StatKind, StateVector,
        Stats, TransferClass,
    };

    // Errors
    pub use pfasst_core::{DataError, ProblemError};
    pub use pfasst_engine::{ConfigError, EngineError, FaultError, ScheduleConfigError};

    // Collocation
    pub use pfasst_collocation::{NodeType, QDelta};

    // Engine
    pub use pfasst_engine::{
        generate_steps, run, run_with_faults, Description, FaultSpec, HookEvent, Hooks,
        LevelParams, Predictor, Rearm, Step, StepParams, Strategy,
    };
}

//! Multi-level SDC sweeps composed into a PFASST pipeline over process
//! slots, with optional fault injection and recovery.
//!
//! Control flows top-down: the [`scheduler`] runs blocks of [`Step`]s, one
//! per process slot and thread; each step runs V-cycles over its
//! [`Level`]s; each level sweeps with its [`Sweeper`]. Values flow forward
//! in time through the [`comm`] substrate and down/up the hierarchy through
//! [`LevelTransfer`]. The [`fault`] controller may corrupt and repair a
//! step's terminal value before it leaves the step.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod comm;
pub mod config;
pub mod error;
pub mod fault;
pub mod hooks;
pub mod level;
pub mod scheduler;
pub mod step;
pub mod sweeper;
pub mod transfer;

pub use comm::{ChannelWorld, CommError, Communicator, Endpoint, Packet, SendHandle, Tag};
pub use config::{
    ConfigError, Description, DescriptionBuilder, LevelParams, Predictor, StepParams,
    TransferFactory,
};
pub use error::{EngineError, SweepError};
pub use fault::{
    interpolate, recover, FaultController, FaultError, FaultSpec, NeighborBoard, Rearm, Strategy,
};
pub use hooks::{HookContext, HookEvent, Hooks, Observer};
pub use level::Level;
pub use scheduler::{generate_steps, num_steps, run, run_with_faults, ScheduleConfigError};
pub use step::{ResidualRecord, Step, StepContext, StepStatus};
pub use sweeper::Sweeper;
pub use transfer::LevelTransfer;

//! Benchmark profiles for the PFASST engine.
//!
//! - [`heat_profile`]: 1D heat equation on 127 points, two levels
//!   (63-point coarse grid, 5/3 Radau nodes)
//! - [`dahlquist_profile`]: scalar decay, one level
//! - [`heat_u0`]: initial value matching [`heat_profile`]

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use pfasst_collocation::{NodeType, QDelta};
use pfasst_core::{Mesh, Problem, ProblemClass, ProblemError, ProblemParams};
use pfasst_engine::{ConfigError, Description, LevelParams, StepParams};
use pfasst_problems::{Dahlquist, Heat1D, MeshTransfer};

/// Fine grid size of [`heat_profile`].
pub const HEAT_NVARS: i64 = 127;

fn heat_params() -> ProblemParams {
    ProblemParams::new()
        .with("nvars", vec![HEAT_NVARS, (HEAT_NVARS - 1) / 2])
        .with("nu", 0.1)
        .with("freq", 4.0)
}

/// Two-level heat equation description.
///
/// Fine level: 127 points, 5 Radau-right nodes. Coarse level: 63 points,
/// 3 nodes, full-weighting restriction. LU sweeps with tolerance 1e-10.
pub fn heat_profile() -> Result<Description<Heat1D>, ConfigError> {
    Description::<Heat1D>::builder()
        .problem_params(heat_params())
        .collocation_class(NodeType::GaussRadauRight)
        .num_nodes(vec![5, 3])
        .sweeper_class(QDelta::Lu)
        .level_params(LevelParams {
            restol: 1e-10,
            nsweeps: 1,
        })
        .transfer_class::<MeshTransfer>()
        .transfer_params(ProblemParams::new().with("rorder", 2_i64))
        .build()
}

/// The exact solution of [`heat_profile`] at `t = 0`.
pub fn heat_u0() -> Result<Mesh, ProblemError> {
    Heat1D::from_params(&heat_params(), 0)?.u_exact(0.0)
}

/// Single-level `u' = -u` description with `num_nodes` Radau-right nodes.
pub fn dahlquist_profile(num_nodes: usize) -> Result<Description<Dahlquist>, ConfigError> {
    Description::<Dahlquist>::builder()
        .problem_params(ProblemParams::new().with("lambda", -1.0).with("u0", 1.0))
        .collocation_class(NodeType::GaussRadauRight)
        .num_nodes(vec![num_nodes])
        .sweeper_class(QDelta::Lu)
        .level_params(LevelParams {
            restol: 1e-12,
            nsweeps: 1,
        })
        .build()
}

/// Step parameters with an iteration cap of `maxiter`.
pub fn step_params(maxiter: usize) -> StepParams {
    StepParams {
        maxiter,
        ..StepParams::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_build() {
        let heat = heat_profile().unwrap();
        assert_eq!(heat.num_levels(), 2);
        assert_eq!(heat_u0().unwrap().len(), HEAT_NVARS as usize);
        assert_eq!(dahlquist_profile(3).unwrap().num_levels(), 1);
    }
}

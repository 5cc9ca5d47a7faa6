//! Property tests: FAS transfer between a fine and a coarse heat level.

use std::sync::Arc;

use pfasst_collocation::{CollocationRule, NodeType, QDelta};
use pfasst_core::{Problem, SpaceTransfer};
use pfasst_engine::{Level, LevelParams, LevelTransfer, Sweeper};
use pfasst_problems::{Heat1D, MeshTransfer, Restriction};
use proptest::prelude::*;

const FINE: usize = 15;
const COARSE: usize = 7;

fn heat_level(index: usize, nvars: usize, nodes: usize, freq: f64) -> Level<Heat1D> {
    let rule = Arc::new(CollocationRule::new(NodeType::GaussRadauRight, nodes).unwrap());
    let sweeper = Sweeper::new(rule, QDelta::Lu).unwrap();
    Level::new(
        index,
        Heat1D::new(nvars, 0.1, freq).unwrap(),
        sweeper,
        LevelParams::default(),
    )
}

fn restriction() -> impl Strategy<Value = Restriction> {
    prop_oneof![Just(Restriction::Injection), Just(Restriction::FullWeighting)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ── Null correction ────────────────────────────────────────────

    #[test]
    fn restrict_then_prolong_leaves_fine_unchanged(
        fine_nodes in 2usize..=5,
        coarse_nodes in 1usize..=3,
        sweeps in 0usize..3,
        freq in 1.0f64..4.0,
        dt in 0.01f64..0.2,
        restriction in restriction(),
    ) {
        let mut fine = heat_level(0, FINE, fine_nodes, freq);
        let mut coarse = heat_level(1, COARSE, coarse_nodes, freq);
        let space = MeshTransfer::new(FINE, COARSE, restriction).unwrap();
        let u0 = fine.problem().u_exact(0.0).unwrap();
        let coarse_u0 = space.restrict(&u0).unwrap();
        fine.init(u0, 0.0, dt).unwrap();
        coarse.init(coarse_u0, 0.0, dt).unwrap();
        for _ in 0..sweeps {
            fine.sweep().unwrap();
        }

        let transfer = LevelTransfer::new(
            Box::new(space),
            fine.sweeper().rule(),
            coarse.sweeper().rule(),
        );
        let before: Vec<Vec<f64>> = fine.u().iter().map(|u| u.values().to_vec()).collect();

        transfer.restrict(&fine, &mut coarse).unwrap();
        prop_assert_eq!(coarse.u().len(), coarse_nodes + 1);
        prop_assert!(coarse.u().iter().all(|u| u.len() == COARSE));

        transfer.prolong(&mut fine, &coarse).unwrap();
        let after: Vec<Vec<f64>> = fine.u().iter().map(|u| u.values().to_vec()).collect();
        prop_assert_eq!(after, before);
    }

    // ── FAS consistency ────────────────────────────────────────────

    #[test]
    fn coarse_tau_vanishes_for_matching_levels(
        nodes in 1usize..=4,
        sweeps in 1usize..3,
        freq in 1.0f64..4.0,
    ) {
        // Same grid and same nodes: the coarse problem is the fine one.
        let mut fine = heat_level(0, FINE, nodes, freq);
        let mut coarse = heat_level(1, FINE, nodes, freq);
        let space = MeshTransfer::new(FINE, FINE, Restriction::Injection).unwrap();
        let u0 = fine.problem().u_exact(0.0).unwrap();
        fine.init(u0.clone(), 0.0, 0.05).unwrap();
        coarse.init(u0, 0.0, 0.05).unwrap();
        for _ in 0..sweeps {
            fine.sweep().unwrap();
        }

        let transfer = LevelTransfer::new(
            Box::new(space),
            fine.sweeper().rule(),
            coarse.sweeper().rule(),
        );
        transfer.restrict(&fine, &mut coarse).unwrap();

        let tau = coarse.tau().unwrap();
        prop_assert!(tau.iter().all(|t| t.values().iter().all(|v| *v == 0.0)));
    }
}

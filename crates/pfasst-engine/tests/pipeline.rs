//! Integration tests: block scheduling, convergence and multi-level runs.
//!
//! Every run here is fault-free. Parallel results are compared against a
//! single-slot run of the same description, which integrates the same
//! collocation problem one step at a time.

use pfasst_collocation::{NodeType, QDelta};
use pfasst_core::{Mesh, Problem, ProblemClass, StatKind, StateVector};
use pfasst_engine::{
    generate_steps, run, Description, HookEvent, Hooks, LevelParams, Predictor, Step, StepParams,
};
use pfasst_problems::{ConstantRhs, Dahlquist, Heat1D, MeshTransfer};
use pfasst_test_utils::{
    count_kind, dahlquist_params, heat_params, max_niter, zero_rhs_params, EventLog,
};

fn step_params(maxiter: usize) -> StepParams {
    StepParams {
        maxiter,
        ..StepParams::default()
    }
}

fn dahlquist_steps(num_procs: usize, nodes: usize, maxiter: usize) -> Vec<Step<Dahlquist>> {
    let description = Description::<Dahlquist>::builder()
        .problem_params(dahlquist_params(-1.0))
        .collocation_class(NodeType::GaussRadauRight)
        .num_nodes(vec![nodes])
        .sweeper_class(QDelta::Lu)
        .level_params(LevelParams {
            restol: 1e-12,
            nsweeps: 1,
        })
        .build()
        .unwrap();
    generate_steps(num_procs, &step_params(maxiter), &description).unwrap()
}

// ── Trivial problem ────────────────────────────────────────────────

#[test]
fn zero_rhs_converges_in_one_iteration() {
    let description = Description::<ConstantRhs>::builder()
        .problem_params(zero_rhs_params())
        .collocation_class(NodeType::GaussRadauRight)
        .num_nodes(vec![3])
        .sweeper_class(QDelta::ImplicitEuler)
        .level_params(LevelParams::default())
        .build()
        .unwrap();
    let mut steps = generate_steps(4, &step_params(10), &description).unwrap();

    let (uend, stats) = run(&mut steps, 1.0, 0.0, 1.0, 4.0).unwrap();

    assert_eq!(uend, 1.0);
    for step in &steps {
        assert!(step.levels()[0].u().iter().all(|v| *v == 1.0));
        assert_eq!(step.records().len(), 1);
        assert_eq!(step.records()[0].residual, 0.0);
        assert!(step.records()[0].converged);
    }
    assert_eq!(count_kind(&stats, StatKind::Niter), 4);
    assert_eq!(max_niter(&stats), 1);
    assert_eq!(count_kind(&stats, StatKind::ConvergenceFailure), 0);
    assert_eq!(count_kind(&stats, StatKind::TimingRun), 1);
}

#[test]
fn empty_interval_returns_initial_value() {
    let mut steps = dahlquist_steps(2, 3, 10);
    let (uend, stats) = run(&mut steps, 0.7, 1.0, 0.5, 1.0).unwrap();
    assert_eq!(uend, 0.7);
    assert_eq!(count_kind(&stats, StatKind::Niter), 0);
}

// ── Linear test problem ────────────────────────────────────────────

#[test]
fn parallel_matches_serial_collocation_solution() {
    let mut parallel = dahlquist_steps(4, 3, 50);
    let mut serial = dahlquist_steps(1, 3, 50);

    let (up, stats) = run(&mut parallel, 1.0, 0.0, 0.25, 1.0).unwrap();
    let (us, _) = run(&mut serial, 1.0, 0.0, 0.25, 1.0).unwrap();

    assert!((up - us).abs() < 1e-9, "{up} vs {us}");
    assert!((up - (-1.0_f64).exp()).abs() < 1e-6);
    assert_eq!(count_kind(&stats, StatKind::ConvergenceFailure), 0);
    for step in &parallel {
        assert!(step.status().converged);
        assert!(step.records().last().unwrap().residual <= 1e-12);
    }
}

#[test]
fn later_slots_never_need_fewer_iterations() {
    let mut steps = dahlquist_steps(4, 3, 50);
    run(&mut steps, 1.0, 0.0, 0.25, 1.0).unwrap();
    let iterations: Vec<usize> = steps.iter().map(|s| s.status().iteration).collect();
    assert!(iterations.windows(2).all(|w| w[0] <= w[1]), "{iterations:?}");
}

#[test]
fn more_nodes_reduce_the_error() {
    let exact = (-1.0_f64).exp();
    let errors: Vec<f64> = (1..=4)
        .map(|m| {
            let mut steps = dahlquist_steps(1, m, 50);
            let (u, _) = run(&mut steps, 1.0, 0.0, 1.0, 1.0).unwrap();
            (u - exact).abs()
        })
        .collect();
    assert!(
        errors.windows(2).all(|w| w[1] < w[0]),
        "errors not decreasing: {errors:?}"
    );
}

#[test]
fn more_iterations_reduce_the_error() {
    let mut reference = dahlquist_steps(4, 3, 50);
    let (converged, _) = run(&mut reference, 1.0, 0.0, 0.25, 1.0).unwrap();
    let errors: Vec<f64> = (1..=6)
        .map(|k| {
            let mut steps = dahlquist_steps(4, 3, k);
            let (u, _) = run(&mut steps, 1.0, 0.0, 0.25, 1.0).unwrap();
            (u - converged).abs()
        })
        .collect();
    assert!(
        errors.windows(2).all(|w| w[1] <= w[0] + 1e-15),
        "errors not decreasing: {errors:?}"
    );
    assert!(errors[5] < errors[0]);
}

#[test]
fn iteration_cap_is_a_recorded_diagnostic() {
    let mut steps = dahlquist_steps(2, 3, 1);
    let (_, stats) = run(&mut steps, 1.0, 0.0, 0.5, 1.0).unwrap();
    assert_eq!(count_kind(&stats, StatKind::ConvergenceFailure), 2);
    assert_eq!(max_niter(&stats), 1);
    assert!(steps.iter().all(|s| s.is_done() && !s.status().converged));
}

// ── Blocks ─────────────────────────────────────────────────────────

#[test]
fn final_partial_block_uses_fewer_slots() {
    let mut parallel = dahlquist_steps(3, 3, 50);
    let mut serial = dahlquist_steps(1, 3, 50);

    let (up, stats) = run(&mut parallel, 1.0, 0.0, 0.2, 1.0).unwrap();
    let (us, _) = run(&mut serial, 1.0, 0.0, 0.2, 1.0).unwrap();

    assert!((up - us).abs() < 1e-9);
    let slots: Vec<usize> = stats
        .sorted_by_time(&pfasst_core::StatFilter::new().kind(StatKind::Niter))
        .iter()
        .map(|e| e.process)
        .collect();
    assert_eq!(slots, vec![0, 1, 2, 0, 1]);
    // The third slot sat out the second block and still holds step 2.
    assert_eq!(parallel[2].status().index, 2);
    assert_eq!(parallel[1].status().index, 4);
}

#[test]
fn check_values_are_consumed_before_the_block_ends() {
    let mut steps = dahlquist_steps(4, 3, 50);
    run(&mut steps, 1.0, 0.0, 0.25, 2.0).unwrap();
    assert!(steps.iter().all(|s| s.pending_sends() == 0));
}

#[test]
fn hooks_fire_per_run_step_and_iteration() {
    let log = EventLog::new();
    let mut hooks = Hooks::standard();
    for event in [
        HookEvent::PreRun,
        HookEvent::PreStep,
        HookEvent::PreIteration,
        HookEvent::PostIteration,
        HookEvent::PostStep,
        HookEvent::PostRun,
    ] {
        let log = log.clone();
        hooks.register(event, move |ctx| log.push(format!("{:?}", ctx.event)));
    }
    let description = Description::<Dahlquist>::builder()
        .problem_params(dahlquist_params(-1.0))
        .collocation_class(NodeType::GaussRadauRight)
        .num_nodes(vec![3])
        .sweeper_class(QDelta::Lu)
        .level_params(LevelParams::default())
        .hooks(hooks)
        .build()
        .unwrap();
    let mut steps = generate_steps(2, &step_params(30), &description).unwrap();

    let (_, stats) = run(&mut steps, 1.0, 0.0, 0.25, 1.0).unwrap();

    assert_eq!(log.count("PreRun"), 1);
    assert_eq!(log.count("PostRun"), 1);
    assert_eq!(log.count("PreStep"), 4);
    assert_eq!(log.count("PostStep"), 4);
    let total_iterations: f64 = pfasst_test_utils::values_of(&stats, StatKind::Niter)
        .into_iter()
        .sum();
    assert_eq!(log.count("PreIteration") as f64, total_iterations);
    assert_eq!(log.count("PostIteration") as f64, total_iterations);
    assert_eq!(
        count_kind(&stats, StatKind::ResidualPostIteration) as f64,
        total_iterations
    );
}

// ── Multi-level ────────────────────────────────────────────────────

fn heat_description(levels: usize, nodes: Vec<usize>) -> Description<Heat1D> {
    let builder = Description::<Heat1D>::builder()
        .problem_params(heat_params(15, 0.1, levels))
        .collocation_class(NodeType::GaussRadauRight)
        .num_nodes(nodes)
        .sweeper_class(QDelta::Lu)
        .level_params(LevelParams {
            restol: 1e-9,
            nsweeps: 1,
        });
    if levels > 1 {
        builder.transfer_class::<MeshTransfer>().build().unwrap()
    } else {
        builder.build().unwrap()
    }
}

fn heat_u0() -> Mesh {
    Heat1D::from_params(&heat_params(15, 0.1, 1), 0)
        .unwrap()
        .u_exact(0.0)
        .unwrap()
}

#[test]
fn two_level_heat_matches_single_level() {
    let fine_only = heat_description(1, vec![3]);
    let two_level = heat_description(2, vec![3, 2]);
    let mut serial = generate_steps(1, &step_params(50), &fine_only).unwrap();
    let mut parallel = generate_steps(4, &step_params(50), &two_level).unwrap();

    let (us, _) = run(&mut serial, heat_u0(), 0.0, 0.05, 0.2).unwrap();
    let (up, stats) = run(&mut parallel, heat_u0(), 0.0, 0.05, 0.2).unwrap();

    assert_eq!(count_kind(&stats, StatKind::ConvergenceFailure), 0);
    assert!(up.sub(&us).unwrap().norm() < 1e-7);
    assert_eq!(parallel[0].levels().len(), 2);
    assert_eq!(parallel[0].levels()[1].u()[0].len(), 7);
}

#[test]
fn coarse_pipeline_predictor_converges_to_same_solution() {
    let description = Description::<Dahlquist>::builder()
        .problem_params(dahlquist_params(-1.0))
        .collocation_class(NodeType::GaussRadauRight)
        .num_nodes(vec![5, 3])
        .sweeper_class(QDelta::Lu)
        .level_params(LevelParams {
            restol: 1e-12,
            nsweeps: 1,
        })
        .transfer_class::<pfasst_core::IdentityTransfer>()
        .build()
        .unwrap();
    let pipelined = StepParams {
        maxiter: 50,
        predictor: Predictor::CoarsePipeline,
    };
    let mut steps = generate_steps(4, &pipelined, &description).unwrap();
    let mut spread = generate_steps(4, &step_params(50), &description).unwrap();

    let (u_pipe, stats) = run(&mut steps, 1.0, 0.0, 0.25, 1.0).unwrap();
    let (u_spread, _) = run(&mut spread, 1.0, 0.0, 0.25, 1.0).unwrap();

    assert_eq!(count_kind(&stats, StatKind::ConvergenceFailure), 0);
    assert!((u_pipe - u_spread).abs() < 1e-9);
}

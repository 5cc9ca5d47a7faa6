//! Integration tests: rejected configurations and failing runs.

use pfasst_collocation::{NodeType, QDelta};
use pfasst_core::{ProblemError, ProblemParams};
use pfasst_engine::{
    generate_steps, run, run_with_faults, ConfigError, Description, EngineError, FaultError,
    FaultSpec, HookEvent, Hooks, LevelParams, ScheduleConfigError, StepParams, Strategy,
};
use pfasst_problems::Dahlquist;
use pfasst_test_utils::fixtures::{FailingSolve, NanAfter};
use pfasst_test_utils::{dahlquist_params, EventLog};

fn dahlquist(num_procs: usize) -> Vec<pfasst_engine::Step<Dahlquist>> {
    let description = Description::<Dahlquist>::builder()
        .problem_params(dahlquist_params(-1.0))
        .collocation_class(NodeType::GaussRadauRight)
        .num_nodes(vec![3])
        .sweeper_class(QDelta::Lu)
        .level_params(LevelParams::default())
        .build()
        .unwrap();
    generate_steps(num_procs, &StepParams::default(), &description).unwrap()
}

// ── Configuration ──────────────────────────────────────────────────

#[test]
fn missing_sweeper_class_is_rejected_before_anything_runs() {
    let log = EventLog::new();
    let observer_log = log.clone();
    let hooks = Hooks::standard().on(HookEvent::PreRun, move |_| observer_log.push("PreRun"));

    let err = Description::<Dahlquist>::builder()
        .problem_params(dahlquist_params(-1.0))
        .collocation_class(NodeType::GaussRadauRight)
        .num_nodes(vec![3])
        .level_params(LevelParams::default())
        .hooks(hooks)
        .build()
        .unwrap_err();

    assert_eq!(err, ConfigError::MissingKey("sweeper_class"));
    assert!(log.events().is_empty());
}

#[test]
fn zero_processes_rejected() {
    let description = Description::<Dahlquist>::builder()
        .problem_params(dahlquist_params(-1.0))
        .collocation_class(NodeType::GaussLobatto)
        .num_nodes(vec![3])
        .sweeper_class(QDelta::Lu)
        .level_params(LevelParams::default())
        .build()
        .unwrap();
    let err = generate_steps(0, &StepParams::default(), &description).unwrap_err();
    assert_eq!(err, EngineError::Schedule(ScheduleConfigError::NoProcesses));

    let mut none: Vec<pfasst_engine::Step<Dahlquist>> = Vec::new();
    let err = run(&mut none, 1.0, 0.0, 0.5, 1.0).unwrap_err();
    assert_eq!(err, EngineError::Schedule(ScheduleConfigError::NoProcesses));
}

#[test]
fn problem_rejecting_its_params_is_a_config_error() {
    // NanAfter has no default for t_fail.
    let description = Description::<NanAfter>::builder()
        .problem_params(ProblemParams::new().with("lambda", -1.0))
        .collocation_class(NodeType::GaussRadauRight)
        .num_nodes(vec![3])
        .sweeper_class(QDelta::Lu)
        .level_params(LevelParams::default())
        .build()
        .unwrap();
    let err = generate_steps(2, &StepParams::default(), &description).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Config(ConfigError::Problem { level: 0, .. })
    ));
}

// ── Run parameters ─────────────────────────────────────────────────

#[test]
fn zero_dt_rejected() {
    let mut steps = dahlquist(2);
    let err = run(&mut steps, 1.0, 0.0, 0.0, 1.0).unwrap_err();
    assert_eq!(
        err,
        EngineError::Schedule(ScheduleConfigError::NonPositiveDt { dt: 0.0 })
    );
}

#[test]
fn fractional_step_count_rejected() {
    let mut steps = dahlquist(2);
    let err = run(&mut steps, 1.0, 0.0, 0.3, 1.0).unwrap_err();
    assert!(matches!(
        err,
        EngineError::Schedule(ScheduleConfigError::NonIntegralSteps { .. })
    ));
}

#[test]
fn invalid_fault_probability_rejected() {
    let mut steps = dahlquist(2);
    let spec = FaultSpec::new(1, 1, Strategy::Spread, -0.1);
    let err = run_with_faults(&mut steps, 1.0, 0.0, 0.5, 1.0, &spec).unwrap_err();
    assert_eq!(
        err,
        EngineError::Fault(FaultError::InvalidProbability { probability: -0.1 })
    );
}

// ── Failing runs ───────────────────────────────────────────────────

#[test]
fn diverging_slice_reports_its_lineage() {
    let description = Description::<NanAfter>::builder()
        .problem_params(
            ProblemParams::new()
                .with("lambda", -1.0)
                .with("t_fail", 1.0),
        )
        .collocation_class(NodeType::GaussRadauRight)
        .num_nodes(vec![3])
        .sweeper_class(QDelta::Lu)
        .level_params(LevelParams::default())
        .build()
        .unwrap();
    let mut steps = generate_steps(4, &StepParams::default(), &description).unwrap();

    let err = run(&mut steps, 1.0, 0.0, 0.5, 2.0).unwrap_err();

    assert_eq!(
        err,
        EngineError::SweeperDivergence {
            slot: 2,
            step: 2,
            iteration: 1,
            level: 0,
        }
    );
}

#[test]
fn failing_solve_surfaces_problem_error() {
    // Three implicit solves per sweep: the second sweep of slot 0 fails.
    let description = Description::<FailingSolve>::builder()
        .problem_params(
            ProblemParams::new()
                .with("lambda", -1.0)
                .with("succeed_count", 4_i64),
        )
        .collocation_class(NodeType::GaussRadauRight)
        .num_nodes(vec![3])
        .sweeper_class(QDelta::Lu)
        .level_params(LevelParams {
            restol: 1e-14,
            nsweeps: 1,
        })
        .build()
        .unwrap();
    let mut steps = generate_steps(2, &StepParams::default(), &description).unwrap();

    let err = run(&mut steps, 1.0, 0.0, 0.5, 1.0).unwrap_err();

    match err {
        EngineError::Problem {
            slot,
            step,
            level,
            source: ProblemError::SolveFailed { .. },
        } => {
            assert_eq!((slot, step, level), (0, 0, 0));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(steps[0].levels()[0].problem().calls() >= 5);
}

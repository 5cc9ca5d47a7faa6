//! Block scheduling of steps over process slots.
//!
//! [`generate_steps`] builds one [`Step`] per process slot from a shared
//! [`Description`]. [`run`] then covers `[t0, tend)` in blocks of
//! `steps.len()` consecutive time-steps: every block spawns one scoped
//! worker thread per active slot, connects them with a fresh
//! [`ChannelWorld`], and joins them before the next block starts. The
//! last slot's terminal value seeds the next block; a final partial block
//! uses the first slots only.

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use pfasst_core::{Problem, ProblemClass, Stats};

use crate::comm::{ChannelWorld, Packet};
use crate::config::{ConfigError, Description, StepParams};
use crate::error::EngineError;
use crate::fault::{FaultController, FaultSpec, NeighborBoard};
use crate::hooks::{HookContext, HookEvent};
use crate::level::Level;
use crate::step::{Step, StepContext};
use crate::sweeper::Sweeper;
use crate::transfer::LevelTransfer;

/// Relative tolerance on `(tend - t0) / dt` being a whole number.
const STEP_COUNT_TOLERANCE: f64 = 1e-9;

// ── ScheduleConfigError ────────────────────────────────────────────

/// Malformed run parameters.
#[derive(Clone, Debug, PartialEq)]
pub enum ScheduleConfigError {
    /// At least one process slot is required.
    NoProcesses,
    /// The step size must be positive and finite.
    NonPositiveDt {
        /// The rejected step size.
        dt: f64,
    },
    /// The end time lies before the start time.
    EndBeforeStart {
        /// Start time.
        t0: f64,
        /// End time.
        tend: f64,
    },
    /// The interval is not a whole number of steps.
    NonIntegralSteps {
        /// `tend - t0`.
        span: f64,
        /// The step size.
        dt: f64,
    },
}

impl fmt::Display for ScheduleConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoProcesses => write!(f, "at least one process slot is required"),
            Self::NonPositiveDt { dt } => write!(f, "dt must be positive, got {dt}"),
            Self::EndBeforeStart { t0, tend } => {
                write!(f, "end time {tend} lies before start time {t0}")
            }
            Self::NonIntegralSteps { span, dt } => {
                write!(f, "interval {span} is not a whole number of steps of {dt}")
            }
        }
    }
}

impl Error for ScheduleConfigError {}

/// Number of steps of size `dt` in `[t0, tend)`.
pub fn num_steps(t0: f64, dt: f64, tend: f64) -> Result<usize, ScheduleConfigError> {
    if !(dt > 0.0 && dt.is_finite()) {
        return Err(ScheduleConfigError::NonPositiveDt { dt });
    }
    if !(tend >= t0) {
        return Err(ScheduleConfigError::EndBeforeStart { t0, tend });
    }
    let span = tend - t0;
    let n = span / dt;
    let rounded = n.round();
    if !n.is_finite() || (n - rounded).abs() > STEP_COUNT_TOLERANCE * rounded.max(1.0) {
        return Err(ScheduleConfigError::NonIntegralSteps { span, dt });
    }
    Ok(rounded as usize)
}

// ── Step generation ────────────────────────────────────────────────

/// One step per process slot, each with its own level hierarchy.
///
/// # Errors
///
/// [`ScheduleConfigError::NoProcesses`] if `num_procs < 1`;
/// [`ConfigError`] if the step parameters are invalid or the problem or
/// transfer class rejects its parameters on some level.
pub fn generate_steps<P: ProblemClass>(
    num_procs: usize,
    params: &StepParams,
    description: &Description<P>,
) -> Result<Vec<Step<P>>, EngineError> {
    if num_procs < 1 {
        return Err(ScheduleConfigError::NoProcesses.into());
    }
    params.validate()?;
    (0..num_procs)
        .map(|slot| build_step(slot, params, description))
        .collect()
}

fn build_step<P: ProblemClass>(
    slot: usize,
    params: &StepParams,
    description: &Description<P>,
) -> Result<Step<P>, EngineError> {
    let rules = description.rules();
    let mut levels = Vec::with_capacity(rules.len());
    for (level, rule) in rules.iter().enumerate() {
        let problem = P::from_params(description.problem_params(), level)
            .map_err(|source| ConfigError::Problem { level, source })?;
        let sweeper = Sweeper::new(Arc::clone(rule), description.sweeper_class())
            .map_err(|source| ConfigError::Collocation { level, source })?;
        levels.push(Level::new(
            level,
            problem,
            sweeper,
            description.level_params().clone(),
        ));
    }
    let mut transfers = Vec::with_capacity(rules.len().saturating_sub(1));
    for (level, pair) in rules.windows(2).enumerate() {
        let space = description.space_transfer(level)?;
        transfers.push(LevelTransfer::new(space, &pair[0], &pair[1]));
    }
    Ok(Step::new(
        slot,
        levels,
        transfers,
        params.clone(),
        Arc::clone(description.hooks()),
    ))
}

// ── Run ────────────────────────────────────────────────────────────

/// Integrate from `u0` at `t0` to `tend` with steps of `dt`.
///
/// Returns the value at `tend` and the run's statistics.
///
/// # Errors
///
/// [`ScheduleConfigError`] for malformed run parameters; the first
/// failing slot's error (by slot order) if a block fails.
pub fn run<P: Problem>(
    steps: &mut [Step<P>],
    u0: P::U,
    t0: f64,
    dt: f64,
    tend: f64,
) -> Result<(P::U, Stats), EngineError> {
    drive(steps, u0, t0, dt, tend, None)
}

/// [`run`] with fault injection configured by `fault`.
pub fn run_with_faults<P: Problem>(
    steps: &mut [Step<P>],
    u0: P::U,
    t0: f64,
    dt: f64,
    tend: f64,
    fault: &FaultSpec,
) -> Result<(P::U, Stats), EngineError> {
    drive(steps, u0, t0, dt, tend, Some(fault))
}

fn drive<P: Problem>(
    steps: &mut [Step<P>],
    u0: P::U,
    t0: f64,
    dt: f64,
    tend: f64,
    fault: Option<&FaultSpec>,
) -> Result<(P::U, Stats), EngineError> {
    let num_procs = steps.len();
    if num_procs < 1 {
        return Err(ScheduleConfigError::NoProcesses.into());
    }
    let total = num_steps(t0, dt, tend)?;
    if let Some(spec) = fault {
        spec.validate(num_procs)?;
    }

    let stats = Stats::new();
    let hooks = Arc::clone(steps[0].hooks());
    let started = Instant::now();
    hooks.fire(&run_context(&stats, HookEvent::PreRun, t0, dt, None));

    let mut controllers: Vec<Option<FaultController>> = (0..num_procs)
        .map(|slot| fault.and_then(|spec| FaultController::for_slot(spec, slot)))
        .collect();

    tracing::info!(
        target: "pfasst.run",
        num_procs,
        total_steps = total,
        t0,
        dt,
        tend,
        faults = fault.is_some(),
        "run started"
    );

    let mut u = u0;
    let mut first = 0;
    while first < total {
        let active = num_procs.min(total - first);
        let _block = tracing::info_span!(
            target: "pfasst.run",
            "block",
            block = first / num_procs,
            first_step = first,
            active
        )
        .entered();
        for controller in controllers.iter_mut().flatten() {
            controller.begin_block();
        }
        u = run_window(
            &mut steps[..active],
            &mut controllers[..active],
            &stats,
            &u,
            first,
            t0,
            dt,
            fault.is_some(),
        )?;
        first += active;
    }

    let elapsed = started.elapsed();
    hooks.fire(&run_context(&stats, HookEvent::PostRun, tend, dt, Some(elapsed)));
    tracing::info!(
        target: "pfasst.run",
        total_steps = total,
        elapsed_ms = elapsed.as_secs_f64() * 1e3,
        "run finished"
    );
    Ok((u, stats))
}

fn run_context(
    stats: &Stats,
    event: HookEvent,
    time: f64,
    dt: f64,
    elapsed: Option<Duration>,
) -> HookContext<'_> {
    HookContext {
        event,
        slot: 0,
        step: 0,
        time,
        dt,
        iteration: 0,
        sweep: 0,
        level: None,
        residual: None,
        elapsed,
        stats,
    }
}

/// Closes a slot's board entry even if its worker unwinds.
struct BoardGuard<'a, U: Clone> {
    board: Option<&'a NeighborBoard<U>>,
    slot: usize,
}

impl<U: Clone> Drop for BoardGuard<'_, U> {
    fn drop(&mut self) {
        if let Some(board) = self.board {
            board.close(self.slot);
        }
    }
}

/// Run one block on `steps.len()` slots starting at global step `first`.
#[allow(clippy::too_many_arguments)]
fn run_window<P: Problem>(
    steps: &mut [Step<P>],
    controllers: &mut [Option<FaultController>],
    stats: &Stats,
    u0: &P::U,
    first: usize,
    t0: f64,
    dt: f64,
    with_board: bool,
) -> Result<P::U, EngineError> {
    let active = steps.len();
    let endpoints = ChannelWorld::connect::<Packet<P::U>>(active);
    let board = with_board.then(|| NeighborBoard::new(active));
    let board = board.as_ref();

    thread::scope(|s| {
        let mut handles = Vec::with_capacity(active);
        let mut spawn_error = None;
        for (slot, ((step, controller), mut endpoint)) in steps
            .iter_mut()
            .zip(controllers.iter_mut())
            .zip(endpoints)
            .enumerate()
        {
            let index = first + slot;
            let time = t0 + index as f64 * dt;
            let seed = (slot == 0).then(|| u0.clone());
            let spawned = thread::Builder::new()
                .name(format!("pfasst-slot-{slot}"))
                .spawn_scoped(s, move || {
                    let _guard = BoardGuard { board, slot };
                    let mut ctx = StepContext {
                        comm: &mut endpoint,
                        stats,
                        fault: controller.as_mut(),
                        board,
                    };
                    step.run_block(seed, index, time, dt, &mut ctx)
                });
            match spawned {
                Ok(handle) => handles.push((slot, handle)),
                Err(e) => {
                    spawn_error = Some(EngineError::ThreadSpawnFailed {
                        reason: e.to_string(),
                    });
                    break;
                }
            }
        }

        let mut failure = None;
        let mut last = None;
        for (slot, handle) in handles {
            match handle.join() {
                Ok(Ok(value)) => last = Some(value),
                Ok(Err(e)) => {
                    failure.get_or_insert(e);
                }
                Err(_) => {
                    failure.get_or_insert(EngineError::WorkerPanicked { slot });
                }
            }
        }
        if let Some(e) = failure.or(spawn_error) {
            tracing::warn!(target: "pfasst.run", first_step = first, error = %e, "block failed");
            return Err(e);
        }
        last.ok_or_else(|| EngineError::ThreadSpawnFailed {
            reason: "block has no workers".to_string(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_step_counts() {
        assert_eq!(num_steps(0.0, 1.0, 4.0), Ok(4));
        assert_eq!(num_steps(0.0, 0.1, 1.0), Ok(10));
        assert_eq!(num_steps(1.0, 0.5, 1.0), Ok(0));
    }

    #[test]
    fn invalid_dt_rejected() {
        assert_eq!(
            num_steps(0.0, 0.0, 1.0),
            Err(ScheduleConfigError::NonPositiveDt { dt: 0.0 })
        );
        assert_eq!(
            num_steps(0.0, -0.5, 1.0),
            Err(ScheduleConfigError::NonPositiveDt { dt: -0.5 })
        );
        assert!(matches!(
            num_steps(0.0, f64::NAN, 1.0),
            Err(ScheduleConfigError::NonPositiveDt { .. })
        ));
    }

    #[test]
    fn end_before_start_rejected() {
        assert_eq!(
            num_steps(1.0, 0.5, 0.0),
            Err(ScheduleConfigError::EndBeforeStart { t0: 1.0, tend: 0.0 })
        );
    }

    #[test]
    fn fractional_step_count_rejected() {
        assert!(matches!(
            num_steps(0.0, 0.3, 1.0),
            Err(ScheduleConfigError::NonIntegralSteps { .. })
        ));
    }
}

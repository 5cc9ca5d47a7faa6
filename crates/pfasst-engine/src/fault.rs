//! Fault injection and recovery.
//!
//! A [`FaultSpec`] names one process slot and one iteration. When a step
//! running on that slot reaches the check point of that iteration, its
//! fine terminal value is lost (replaced by a zero placeholder) with the
//! configured probability, and then repaired before it is sent downstream:
//!
//! - [`Strategy::Interp`]: Lagrange interpolation in time through the
//!   predecessor's terminal value (at the step start) and the successor's
//!   most recent terminal value (one step past the lost value).
//! - [`Strategy::Spread`]: the predecessor's terminal value.
//! - [`Strategy::NoCorrection`]: the placeholder propagates.
//!
//! Rolls are deterministic: each slot's controller draws from a ChaCha8
//! stream seeded with `seed ^ slot`, so identical specs replay the same
//! faults.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard};

use pfasst_core::{DataError, StateVector};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ── FaultSpec ──────────────────────────────────────────────────────

/// How a lost terminal value is reconstructed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// Polynomial interpolation through the neighbouring terminal values.
    Interp,
    /// Zero-order hold of the predecessor's terminal value.
    Spread,
    /// No recovery.
    NoCorrection,
}

/// When a controller may fire again after it fired once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rearm {
    /// At most one fault per run.
    #[default]
    OncePerRun,
    /// Roll again in every block.
    EveryBlock,
}

/// Immutable fault configuration for one run.
#[derive(Clone, Debug, PartialEq)]
pub struct FaultSpec {
    /// Process slot whose step is hit.
    pub target_step: usize,
    /// Iteration (1-based) at whose check point the value is lost.
    pub target_iteration: usize,
    /// Recovery strategy.
    pub strategy: Strategy,
    /// Probability of a fault per eligible event, in `[0, 1]`.
    pub probability: f64,
    /// Re-arm policy. Default: [`Rearm::OncePerRun`].
    pub rearm: Rearm,
    /// Seed of the fault rolls. Default: 0.
    pub seed: u64,
}

impl FaultSpec {
    /// A spec with the default re-arm policy and seed.
    pub fn new(
        target_step: usize,
        target_iteration: usize,
        strategy: Strategy,
        probability: f64,
    ) -> Self {
        Self {
            target_step,
            target_iteration,
            strategy,
            probability,
            rearm: Rearm::default(),
            seed: 0,
        }
    }

    /// Replace the re-arm policy.
    pub fn with_rearm(mut self, rearm: Rearm) -> Self {
        self.rearm = rearm;
        self
    }

    /// Replace the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Check the spec against a run with `num_procs` process slots.
    pub fn validate(&self, num_procs: usize) -> Result<(), FaultError> {
        if !(0.0..=1.0).contains(&self.probability) {
            return Err(FaultError::InvalidProbability {
                probability: self.probability,
            });
        }
        if self.target_iteration == 0 {
            return Err(FaultError::InvalidIteration);
        }
        if self.target_step >= num_procs {
            return Err(FaultError::TargetOutOfRange {
                target_step: self.target_step,
                num_procs,
            });
        }
        Ok(())
    }
}

// ── FaultError ─────────────────────────────────────────────────────

/// Errors of the fault layer.
#[derive(Clone, Debug, PartialEq)]
pub enum FaultError {
    /// Probability outside `[0, 1]` or NaN.
    InvalidProbability {
        /// The rejected value.
        probability: f64,
    },
    /// `target_iteration` must be at least 1.
    InvalidIteration,
    /// `target_step` names a slot the run does not have.
    TargetOutOfRange {
        /// The configured slot.
        target_step: usize,
        /// Number of slots in the run.
        num_procs: usize,
    },
    /// Interpolation needs at least two neighbour values.
    InsufficientNeighbors {
        /// Number of neighbour values that were available.
        available: usize,
    },
    /// Neighbour values could not be combined.
    Data(DataError),
}

impl fmt::Display for FaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidProbability { probability } => {
                write!(f, "probability must be in [0, 1], got {probability}")
            }
            Self::InvalidIteration => write!(f, "target_iteration must be at least 1"),
            Self::TargetOutOfRange {
                target_step,
                num_procs,
            } => write!(
                f,
                "target_step {target_step} out of range for {num_procs} process slots"
            ),
            Self::InsufficientNeighbors { available } => write!(
                f,
                "interpolation needs two neighbour values, {available} available"
            ),
            Self::Data(e) => write!(f, "{e}"),
        }
    }
}

impl Error for FaultError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Data(e) => Some(e),
            _ => None,
        }
    }
}

impl From<DataError> for FaultError {
    fn from(e: DataError) -> Self {
        Self::Data(e)
    }
}

// ── Recovery ───────────────────────────────────────────────────────

/// Lagrange interpolation through `samples` (time, value), evaluated at `t`.
///
/// # Errors
///
/// [`FaultError::InsufficientNeighbors`] with fewer than two samples.
///
/// ```
/// use pfasst_engine::fault::interpolate;
///
/// let v = interpolate(&[(0.0, 2.0), (2.0, 4.0)], 1.0).unwrap();
/// assert_eq!(v, 3.0);
/// ```
pub fn interpolate<U: StateVector>(samples: &[(f64, U)], t: f64) -> Result<U, FaultError> {
    if samples.len() < 2 {
        return Err(FaultError::InsufficientNeighbors {
            available: samples.len(),
        });
    }
    let mut acc: Option<U> = None;
    for (j, (tj, vj)) in samples.iter().enumerate() {
        let weight: f64 = samples
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != j)
            .map(|(_, (ti, _))| (t - ti) / (tj - ti))
            .product();
        acc = Some(match acc {
            Some(a) => a.axpy(weight, vj)?,
            None => vj.scale(weight),
        });
    }
    acc.ok_or(FaultError::InsufficientNeighbors { available: 0 })
}

/// Reconstruct a lost value at time `t`.
///
/// `spread` is the predecessor's terminal value and `samples` the
/// neighbour values available to interpolation. Returns `Ok(None)` for
/// [`Strategy::NoCorrection`].
pub fn recover<U: StateVector>(
    strategy: Strategy,
    spread: &U,
    samples: &[(f64, U)],
    t: f64,
) -> Result<Option<U>, FaultError> {
    match strategy {
        Strategy::Interp => interpolate(samples, t).map(Some),
        Strategy::Spread => Ok(Some(spread.clone())),
        Strategy::NoCorrection => Ok(None),
    }
}

// ── FaultController ────────────────────────────────────────────────

/// Per-slot fault roller.
#[derive(Debug)]
pub struct FaultController {
    spec: FaultSpec,
    slot: usize,
    rng: ChaCha8Rng,
    armed: bool,
    fired: usize,
}

impl FaultController {
    /// The controller for `slot`, or `None` if the spec targets another slot.
    pub fn for_slot(spec: &FaultSpec, slot: usize) -> Option<Self> {
        (spec.target_step == slot).then(|| Self {
            spec: spec.clone(),
            slot,
            rng: ChaCha8Rng::seed_from_u64(spec.seed ^ slot as u64),
            armed: true,
            fired: 0,
        })
    }

    /// The configuration.
    pub fn spec(&self) -> &FaultSpec {
        &self.spec
    }

    /// Process slot this controller watches.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Number of faults injected so far.
    pub fn fired(&self) -> usize {
        self.fired
    }

    /// Whether a roll can still fire.
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    /// Called at the start of every block.
    pub fn begin_block(&mut self) {
        if self.spec.rearm == Rearm::EveryBlock {
            self.armed = true;
        }
    }

    /// Roll for a fault at the check point of `iteration`.
    ///
    /// The stream only advances on eligible events, so a probability of
    /// zero never perturbs anything else.
    pub fn should_inject(&mut self, iteration: usize) -> bool {
        if !self.armed || iteration != self.spec.target_iteration {
            return false;
        }
        if !self.rng.random_bool(self.spec.probability) {
            return false;
        }
        self.armed = false;
        self.fired += 1;
        true
    }
}

// ── NeighborBoard ──────────────────────────────────────────────────

#[derive(Debug)]
struct SlotValues<U> {
    published: HashMap<usize, U>,
    closed: bool,
}

/// Terminal values published by every slot of a block, by iteration.
///
/// Recovery of a lost value reads the successor's value from here. A slot
/// closes its entry when it finishes or fails; waiting on a closed slot
/// for a value it never published returns `None` instead of blocking.
#[derive(Debug)]
pub struct NeighborBoard<U> {
    slots: Mutex<Vec<SlotValues<U>>>,
    changed: Condvar,
}

impl<U: Clone> NeighborBoard<U> {
    /// A board for `size` slots.
    pub fn new(size: usize) -> Self {
        Self {
            slots: Mutex::new(
                (0..size)
                    .map(|_| SlotValues {
                        published: HashMap::new(),
                        closed: false,
                    })
                    .collect(),
            ),
            changed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SlotValues<U>>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Publish `slot`'s terminal value of `iteration`.
    pub fn publish(&self, slot: usize, iteration: usize, value: U) {
        if let Some(entry) = self.lock().get_mut(slot) {
            entry.published.insert(iteration, value);
        }
        self.changed.notify_all();
    }

    /// Mark `slot` as finished; it publishes nothing more.
    pub fn close(&self, slot: usize) {
        if let Some(entry) = self.lock().get_mut(slot) {
            entry.closed = true;
        }
        self.changed.notify_all();
    }

    /// Block until `slot` publishes `iteration` or closes.
    pub fn wait(&self, slot: usize, iteration: usize) -> Option<U> {
        let mut slots = self.lock();
        loop {
            let entry = slots.get(slot)?;
            if let Some(v) = entry.published.get(&iteration) {
                return Some(v.clone());
            }
            if entry.closed {
                return None;
            }
            slots = self
                .changed
                .wait(slots)
                .unwrap_or_else(|e| e.into_inner());
        }
    }
}

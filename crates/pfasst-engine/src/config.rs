//! Problem description, run parameters, validation, and error types.
//!
//! A [`Description`] is everything needed to build the level hierarchy of
//! one step: the problem class and its parameters, the collocation rule
//! per level, the sweeper kind, level tolerances, the spatial transfer
//! between levels and the lifecycle hooks. It is assembled with
//! [`DescriptionBuilder`], whose [`build()`](DescriptionBuilder::build)
//! rejects missing or malformed keys before any step exists.

use std::error::Error;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use pfasst_collocation::{CollocationError, CollocationRule, NodeType, QDelta};
use pfasst_core::{ProblemClass, ProblemError, ProblemParams, SpaceTransfer, TransferClass};

use crate::hooks::Hooks;

// ── LevelParams ────────────────────────────────────────────────────

/// Per-level iteration controls.
#[derive(Clone, Debug, PartialEq)]
pub struct LevelParams {
    /// Residual tolerance for convergence. Default: `1e-10`.
    pub restol: f64,
    /// Sweeps per visit of a level in one iteration. Default: 1.
    pub nsweeps: usize,
}

impl Default for LevelParams {
    fn default() -> Self {
        Self {
            restol: 1e-10,
            nsweeps: 1,
        }
    }
}

impl LevelParams {
    /// Check that the tolerance is usable and at least one sweep is done.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.restol.is_finite() && self.restol >= 0.0) {
            return Err(ConfigError::InvalidLevelParams {
                reason: format!("restol must be finite and >= 0, got {}", self.restol),
            });
        }
        if self.nsweeps == 0 {
            return Err(ConfigError::InvalidLevelParams {
                reason: "nsweeps must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ── StepParams ─────────────────────────────────────────────────────

/// How a step builds its initial iterate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Predictor {
    /// Copy the initial value to every node.
    #[default]
    Spread,
    /// Pipelined coarse sweeps: slot `p` runs `p + 1` coarse sweeps, each
    /// after receiving its predecessor's previous coarse value, then the
    /// result is prolonged to the finer levels.
    CoarsePipeline,
}

/// Step-wide iteration controls.
#[derive(Clone, Debug, PartialEq)]
pub struct StepParams {
    /// Iteration cap. Default: 20.
    pub maxiter: usize,
    /// Initial-guess strategy. Default: [`Predictor::Spread`].
    pub predictor: Predictor,
}

impl Default for StepParams {
    fn default() -> Self {
        Self {
            maxiter: 20,
            predictor: Predictor::Spread,
        }
    }
}

impl StepParams {
    /// Check that at least one iteration is allowed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.maxiter == 0 {
            return Err(ConfigError::InvalidStepParams {
                reason: "maxiter must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ── ConfigError ────────────────────────────────────────────────────

/// Errors detected while validating a description or building a hierarchy.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// A required description key was not supplied.
    MissingKey(&'static str),
    /// A description key has an unusable value.
    InvalidKey {
        /// The key.
        key: &'static str,
        /// Why it was rejected.
        reason: String,
    },
    /// `LevelParams` invariant violated.
    InvalidLevelParams {
        /// Description of the violation.
        reason: String,
    },
    /// `StepParams` invariant violated.
    InvalidStepParams {
        /// Description of the violation.
        reason: String,
    },
    /// The collocation rule or preconditioner of a level cannot be built.
    Collocation {
        /// Level index.
        level: usize,
        /// The underlying failure.
        source: CollocationError,
    },
    /// The problem class rejected its parameters on a level.
    Problem {
        /// Level index.
        level: usize,
        /// The underlying failure.
        source: ProblemError,
    },
    /// The transfer class rejected its parameters between `level` and
    /// `level + 1`.
    Transfer {
        /// Fine level of the pair.
        level: usize,
        /// The underlying failure.
        source: ProblemError,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKey(key) => write!(f, "description is missing '{key}'"),
            Self::InvalidKey { key, reason } => write!(f, "invalid '{key}': {reason}"),
            Self::InvalidLevelParams { reason } => write!(f, "invalid level_params: {reason}"),
            Self::InvalidStepParams { reason } => write!(f, "invalid step params: {reason}"),
            Self::Collocation { level, source } => write!(f, "level {level}: {source}"),
            Self::Problem { level, source } => write!(f, "problem on level {level}: {source}"),
            Self::Transfer { level, source } => {
                write!(f, "transfer between levels {level} and {}: {source}", level + 1)
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Collocation { source, .. } => Some(source),
            Self::Problem { source, .. } => Some(source),
            Self::Transfer { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ── Description ────────────────────────────────────────────────────

/// Builds the spatial transfer between `fine_level` and `fine_level + 1`
/// from the problem and transfer parameters.
pub type TransferFactory<U> = Arc<
    dyn Fn(&ProblemParams, &ProblemParams, usize) -> Result<Box<dyn SpaceTransfer<U>>, ProblemError>
        + Send
        + Sync,
>;

/// Validated problem description shared by every step of a run.
pub struct Description<P: ProblemClass> {
    problem_params: ProblemParams,
    rules: Vec<Arc<CollocationRule>>,
    sweeper_class: QDelta,
    level_params: LevelParams,
    transfer_class: Option<TransferFactory<P::U>>,
    transfer_params: ProblemParams,
    hooks: Arc<Hooks>,
    _problem: PhantomData<fn() -> P>,
}

impl<P: ProblemClass> Clone for Description<P> {
    fn clone(&self) -> Self {
        Self {
            problem_params: self.problem_params.clone(),
            rules: self.rules.clone(),
            sweeper_class: self.sweeper_class,
            level_params: self.level_params.clone(),
            transfer_class: self.transfer_class.clone(),
            transfer_params: self.transfer_params.clone(),
            hooks: Arc::clone(&self.hooks),
            _problem: PhantomData,
        }
    }
}

impl<P: ProblemClass> fmt::Debug for Description<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Description")
            .field("problem_params", &self.problem_params)
            .field("num_levels", &self.rules.len())
            .field("sweeper_class", &self.sweeper_class)
            .field("level_params", &self.level_params)
            .field("transfer_params", &self.transfer_params)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl<P: ProblemClass> Description<P> {
    /// Start a new builder.
    pub fn builder() -> DescriptionBuilder<P> {
        DescriptionBuilder::new()
    }

    /// Number of levels in the hierarchy.
    pub fn num_levels(&self) -> usize {
        self.rules.len()
    }

    /// Problem parameters.
    pub fn problem_params(&self) -> &ProblemParams {
        &self.problem_params
    }

    /// The collocation rules, finest level first.
    pub fn rules(&self) -> &[Arc<CollocationRule>] {
        &self.rules
    }

    /// The collocation rule of `level`.
    pub fn rule(&self, level: usize) -> Option<&Arc<CollocationRule>> {
        self.rules.get(level)
    }

    /// The sweeper's preconditioner kind.
    pub fn sweeper_class(&self) -> QDelta {
        self.sweeper_class
    }

    /// Level tolerances.
    pub fn level_params(&self) -> &LevelParams {
        &self.level_params
    }

    /// Transfer parameters.
    pub fn transfer_params(&self) -> &ProblemParams {
        &self.transfer_params
    }

    /// Lifecycle hooks.
    pub fn hooks(&self) -> &Arc<Hooks> {
        &self.hooks
    }

    /// Build the spatial transfer between `level` and `level + 1`.
    pub(crate) fn space_transfer(
        &self,
        level: usize,
    ) -> Result<Box<dyn SpaceTransfer<P::U>>, ConfigError> {
        let factory = self
            .transfer_class
            .as_ref()
            .ok_or(ConfigError::MissingKey("transfer_class"))?;
        factory(&self.problem_params, &self.transfer_params, level)
            .map_err(|source| ConfigError::Transfer { level, source })
    }
}

// ── DescriptionBuilder ─────────────────────────────────────────────

/// Builder for [`Description`]. Every setter corresponds to one
/// description key; [`build()`](Self::build) reports the first missing
/// required key.
///
/// Required: `problem_params`, `collocation_class`, `num_nodes`,
/// `sweeper_class`, `level_params`, and `transfer_class` when the
/// hierarchy has more than one level. Optional: `transfer_params`
/// (empty), `hooks` ([`Hooks::standard`]).
///
/// ```
/// use pfasst_collocation::{NodeType, QDelta};
/// use pfasst_core::ProblemParams;
/// use pfasst_engine::config::{ConfigError, Description, LevelParams};
/// use pfasst_problems::Dahlquist;
///
/// let result = Description::<Dahlquist>::builder()
///     .problem_params(ProblemParams::new().with("lambda", -1.0))
///     .collocation_class(NodeType::GaussRadauRight)
///     .num_nodes(vec![3])
///     .level_params(LevelParams::default())
///     .build();
/// assert_eq!(result.unwrap_err(), ConfigError::MissingKey("sweeper_class"));
/// ```
pub struct DescriptionBuilder<P: ProblemClass> {
    problem_params: Option<ProblemParams>,
    collocation_class: Option<NodeType>,
    num_nodes: Option<Vec<usize>>,
    sweeper_class: Option<QDelta>,
    level_params: Option<LevelParams>,
    transfer_class: Option<TransferFactory<P::U>>,
    transfer_params: Option<ProblemParams>,
    hooks: Option<Hooks>,
}

impl<P: ProblemClass> Default for DescriptionBuilder<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: ProblemClass> DescriptionBuilder<P> {
    /// A builder with nothing set.
    pub fn new() -> Self {
        Self {
            problem_params: None,
            collocation_class: None,
            num_nodes: None,
            sweeper_class: None,
            level_params: None,
            transfer_class: None,
            transfer_params: None,
            hooks: None,
        }
    }

    /// Parameters passed to `P::from_params` for every level.
    pub fn problem_params(mut self, params: ProblemParams) -> Self {
        self.problem_params = Some(params);
        self
    }

    /// Node family used on every level.
    pub fn collocation_class(mut self, node_type: NodeType) -> Self {
        self.collocation_class = Some(node_type);
        self
    }

    /// Node count per level, finest first. Shorter than the level count
    /// repeats the last entry.
    pub fn num_nodes(mut self, num_nodes: Vec<usize>) -> Self {
        self.num_nodes = Some(num_nodes);
        self
    }

    /// Preconditioner of the sweeper.
    pub fn sweeper_class(mut self, kind: QDelta) -> Self {
        self.sweeper_class = Some(kind);
        self
    }

    /// Tolerance and sweep count.
    pub fn level_params(mut self, params: LevelParams) -> Self {
        self.level_params = Some(params);
        self
    }

    /// Spatial transfer class between adjacent levels.
    pub fn transfer_class<T: TransferClass<P::U>>(mut self) -> Self {
        let factory: TransferFactory<P::U> = Arc::new(
            |problem: &ProblemParams,
             transfer: &ProblemParams,
             level: usize|
             -> Result<Box<dyn SpaceTransfer<P::U>>, ProblemError> {
                let t = T::from_params(problem, transfer, level)?;
                Ok(Box::new(t))
            },
        );
        self.transfer_class = Some(factory);
        self
    }

    /// Spatial transfer from an explicit factory.
    pub fn transfer_factory(mut self, factory: TransferFactory<P::U>) -> Self {
        self.transfer_class = Some(factory);
        self
    }

    /// Parameters passed to the transfer class.
    pub fn transfer_params(mut self, params: ProblemParams) -> Self {
        self.transfer_params = Some(params);
        self
    }

    /// Lifecycle hooks (replaces the standard statistics observer).
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Validate every key and build the shared collocation rules.
    pub fn build(self) -> Result<Description<P>, ConfigError> {
        let problem_params = self
            .problem_params
            .ok_or(ConfigError::MissingKey("problem_params"))?;
        let collocation_class = self
            .collocation_class
            .ok_or(ConfigError::MissingKey("collocation_class"))?;
        let num_nodes = self.num_nodes.ok_or(ConfigError::MissingKey("num_nodes"))?;
        let sweeper_class = self
            .sweeper_class
            .ok_or(ConfigError::MissingKey("sweeper_class"))?;
        let level_params = self
            .level_params
            .ok_or(ConfigError::MissingKey("level_params"))?;
        level_params.validate()?;

        let Some(&last_nodes) = num_nodes.last() else {
            return Err(ConfigError::InvalidKey {
                key: "num_nodes",
                reason: "empty list".to_string(),
            });
        };
        let num_levels = num_nodes.len().max(problem_params.levels());
        if num_levels > 1 && self.transfer_class.is_none() {
            return Err(ConfigError::MissingKey("transfer_class"));
        }

        let mut rules = Vec::with_capacity(num_levels);
        for level in 0..num_levels {
            let m = num_nodes.get(level).copied().unwrap_or(last_nodes);
            let rule = CollocationRule::new(collocation_class, m)
                .map_err(|source| ConfigError::Collocation { level, source })?;
            sweeper_class
                .matrix(&rule)
                .map_err(|source| ConfigError::Collocation { level, source })?;
            rules.push(Arc::new(rule));
        }

        Ok(Description {
            problem_params,
            rules,
            sweeper_class,
            level_params,
            transfer_class: self.transfer_class,
            transfer_params: self.transfer_params.unwrap_or_default(),
            hooks: Arc::new(self.hooks.unwrap_or_else(Hooks::standard)),
            _problem: PhantomData,
        })
    }
}

//! Lifecycle observers.
//!
//! A [`Hooks`] registry maps each [`HookEvent`] to the observers that want
//! it. Observers are invoked synchronously, in registration order, on the
//! thread of the step that raised the event, so they must be `Send + Sync`.
//! [`Hooks::standard`] pre-registers the statistics observer that records
//! residuals, iteration counts and step timings.

use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use pfasst_core::{StatEntry, StatKind, Stats};

/// Points in the run at which observers are invoked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookEvent {
    /// Before the first block.
    PreRun,
    /// After a step received its initial value, before the predictor.
    PreStep,
    /// At the start of every iteration.
    PreIteration,
    /// After every sweep on any level.
    PostSweep,
    /// After the convergence check of an iteration.
    PostIteration,
    /// When a step is done.
    PostStep,
    /// After the last block.
    PostRun,
}

/// What an observer sees.
#[derive(Clone, Copy, Debug)]
pub struct HookContext<'a> {
    /// The event being raised.
    pub event: HookEvent,
    /// Process slot (0 for run-wide events).
    pub slot: usize,
    /// Global step index.
    pub step: usize,
    /// Start time of the step (end time of the run for `PostRun`).
    pub time: f64,
    /// Step size.
    pub dt: f64,
    /// Iteration counter.
    pub iteration: usize,
    /// Sweep counter of the fine level.
    pub sweep: usize,
    /// Level index for level-specific events.
    pub level: Option<usize>,
    /// Residual of the level (or the fine level), when one is known.
    pub residual: Option<f64>,
    /// Wall-clock duration of the step (`PostStep`) or run (`PostRun`).
    pub elapsed: Option<Duration>,
    /// The run's statistics sink.
    pub stats: &'a Stats,
}

/// A registered observer.
pub type Observer = Box<dyn Fn(&HookContext<'_>) + Send + Sync>;

/// Registry of observers keyed by [`HookEvent`].
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use pfasst_engine::hooks::{HookEvent, Hooks};
///
/// let calls = Arc::new(AtomicUsize::new(0));
/// let seen = Arc::clone(&calls);
/// let hooks = Hooks::new().on(HookEvent::PostStep, move |_| {
///     seen.fetch_add(1, Ordering::Relaxed);
/// });
/// assert_eq!(hooks.count(HookEvent::PostStep), 1);
/// ```
#[derive(Default)]
pub struct Hooks {
    observers: IndexMap<HookEvent, Vec<Observer>>,
}

impl fmt::Debug for Hooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: Vec<(HookEvent, usize)> =
            self.observers.iter().map(|(e, v)| (*e, v.len())).collect();
        f.debug_struct("Hooks").field("observers", &counts).finish()
    }
}

impl Hooks {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the statistics observer installed.
    pub fn standard() -> Self {
        let mut hooks = Self::new();
        install_stats_observer(&mut hooks);
        hooks
    }

    /// Builder-style [`register`](Self::register).
    pub fn on(
        mut self,
        event: HookEvent,
        observer: impl Fn(&HookContext<'_>) + Send + Sync + 'static,
    ) -> Self {
        self.register(event, observer);
        self
    }

    /// Add `observer` for `event`, after any already registered.
    pub fn register(
        &mut self,
        event: HookEvent,
        observer: impl Fn(&HookContext<'_>) + Send + Sync + 'static,
    ) {
        self.observers
            .entry(event)
            .or_default()
            .push(Box::new(observer));
    }

    /// Number of observers registered for `event`.
    pub fn count(&self, event: HookEvent) -> usize {
        self.observers.get(&event).map_or(0, Vec::len)
    }

    /// Invoke every observer of `ctx.event`.
    pub fn fire(&self, ctx: &HookContext<'_>) {
        if let Some(list) = self.observers.get(&ctx.event) {
            for observer in list {
                observer(ctx);
            }
        }
    }
}

fn install_stats_observer(hooks: &mut Hooks) {
    fn entry(ctx: &HookContext<'_>, kind: StatKind, value: f64) -> StatEntry {
        StatEntry {
            process: ctx.slot,
            time: ctx.time,
            level: ctx.level,
            iteration: ctx.iteration,
            sweep: ctx.sweep,
            kind,
            value,
        }
    }

    hooks.register(HookEvent::PostSweep, |ctx| {
        if let Some(res) = ctx.residual {
            ctx.stats.record(entry(ctx, StatKind::ResidualPostSweep, res));
        }
    });
    hooks.register(HookEvent::PostIteration, |ctx| {
        if let Some(res) = ctx.residual {
            ctx.stats
                .record(entry(ctx, StatKind::ResidualPostIteration, res));
        }
    });
    hooks.register(HookEvent::PostStep, |ctx| {
        ctx.stats
            .record(entry(ctx, StatKind::Niter, ctx.iteration as f64));
        if let Some(res) = ctx.residual {
            ctx.stats.record(entry(ctx, StatKind::ResidualPostStep, res));
        }
        if let Some(elapsed) = ctx.elapsed {
            ctx.stats
                .record(entry(ctx, StatKind::TimingStep, elapsed.as_secs_f64()));
        }
    });
    hooks.register(HookEvent::PostRun, |ctx| {
        if let Some(elapsed) = ctx.elapsed {
            ctx.stats
                .record(entry(ctx, StatKind::TimingRun, elapsed.as_secs_f64()));
        }
    });
}

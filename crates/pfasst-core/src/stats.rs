//! Append-only statistics sink.
//!
//! Every diagnostic the engine produces (residuals, iteration counts,
//! timings, fault events, non-fatal convergence failures) is recorded as a
//! [`StatEntry`] keyed by process slot, time, level, iteration, sweep and
//! [`StatKind`]. [`Stats`] is a cheaply clonable handle; all clones append
//! to the same buffer, so it can be shared by every worker thread of a run.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// What a [`StatEntry`] measures.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum StatKind {
    /// Residual after one sweep on a level.
    ResidualPostSweep,
    /// Fine-level residual after a full iteration.
    ResidualPostIteration,
    /// Fine-level residual when a step finishes.
    ResidualPostStep,
    /// Number of iterations a step needed.
    Niter,
    /// Wall-clock seconds spent on one step (all iterations).
    TimingStep,
    /// Wall-clock seconds spent on the whole run.
    TimingRun,
    /// The iteration cap was reached without meeting the tolerance.
    ConvergenceFailure,
    /// A fault overwrote a step's terminal value.
    FaultInjected,
    /// A corrupted terminal value was repaired (value: norm of the repair).
    FaultRecovered,
    /// Interpolation recovery lacked neighbours and fell back to spreading.
    DegradedRecovery,
    /// User-defined kind recorded by an observer.
    Custom(String),
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ResidualPostSweep => write!(f, "residual_post_sweep"),
            Self::ResidualPostIteration => write!(f, "residual_post_iteration"),
            Self::ResidualPostStep => write!(f, "residual_post_step"),
            Self::Niter => write!(f, "niter"),
            Self::TimingStep => write!(f, "timing_step"),
            Self::TimingRun => write!(f, "timing_run"),
            Self::ConvergenceFailure => write!(f, "convergence_failure"),
            Self::FaultInjected => write!(f, "fault_injected"),
            Self::FaultRecovered => write!(f, "fault_recovered"),
            Self::DegradedRecovery => write!(f, "degraded_recovery"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// One recorded diagnostic.
#[derive(Clone, Debug, PartialEq)]
pub struct StatEntry {
    /// Process slot that produced the entry.
    pub process: usize,
    /// Simulation time the entry refers to.
    pub time: f64,
    /// Level index (0 = finest); `None` for step-wide entries.
    pub level: Option<usize>,
    /// Iteration counter at recording time.
    pub iteration: usize,
    /// Sweep counter at recording time.
    pub sweep: usize,
    /// What was measured.
    pub kind: StatKind,
    /// The measured value.
    pub value: f64,
}

/// Selection criteria for [`Stats::filter`]. Unset fields match anything.
///
/// ```
/// use pfasst_core::{StatEntry, StatFilter, StatKind, Stats};
///
/// let stats = Stats::new();
/// stats.record(StatEntry {
///     process: 1,
///     time: 0.5,
///     level: None,
///     iteration: 3,
///     sweep: 3,
///     kind: StatKind::Niter,
///     value: 3.0,
/// });
/// let hits = stats.filter(&StatFilter::new().kind(StatKind::Niter).process(1));
/// assert_eq!(hits.len(), 1);
/// ```
#[derive(Clone, Debug, Default)]
pub struct StatFilter {
    process: Option<usize>,
    time: Option<f64>,
    level: Option<Option<usize>>,
    iteration: Option<usize>,
    kind: Option<StatKind>,
}

impl StatFilter {
    /// A filter matching every entry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Match only this process slot.
    pub fn process(mut self, process: usize) -> Self {
        self.process = Some(process);
        self
    }

    /// Match only entries at this time (within `1e-12`).
    pub fn time(mut self, time: f64) -> Self {
        self.time = Some(time);
        self
    }

    /// Match only this level (`None` selects step-wide entries).
    pub fn level(mut self, level: Option<usize>) -> Self {
        self.level = Some(level);
        self
    }

    /// Match only this iteration.
    pub fn iteration(mut self, iteration: usize) -> Self {
        self.iteration = Some(iteration);
        self
    }

    /// Match only this kind.
    pub fn kind(mut self, kind: StatKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Whether `entry` satisfies every set criterion.
    pub fn matches(&self, entry: &StatEntry) -> bool {
        self.process.is_none_or(|p| p == entry.process)
            && self.time.is_none_or(|t| (t - entry.time).abs() <= 1e-12)
            && self.level.is_none_or(|l| l == entry.level)
            && self.iteration.is_none_or(|i| i == entry.iteration)
            && self.kind.as_ref().is_none_or(|k| *k == entry.kind)
    }
}

/// Shared, append-only statistics buffer.
#[derive(Clone, Debug, Default)]
pub struct Stats {
    entries: Arc<Mutex<Vec<StatEntry>>>,
}

impl Stats {
    /// An empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StatEntry>> {
        // A poisoned buffer still holds valid entries; appends are atomic.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append one entry.
    pub fn record(&self, entry: StatEntry) {
        self.lock().push(entry);
    }

    /// Number of recorded entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of all entries in recording order.
    pub fn entries(&self) -> Vec<StatEntry> {
        self.lock().clone()
    }

    /// Entries matching `filter`, in recording order.
    pub fn filter(&self, filter: &StatFilter) -> Vec<StatEntry> {
        self.lock()
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect()
    }

    /// Number of entries matching `filter`.
    pub fn count(&self, filter: &StatFilter) -> usize {
        self.lock().iter().filter(|e| filter.matches(e)).count()
    }

    /// Entries matching `filter`, stably sorted by time then process slot.
    pub fn sorted_by_time(&self, filter: &StatFilter) -> Vec<StatEntry> {
        let mut out = self.filter(filter);
        out.sort_by(|a, b| a.time.total_cmp(&b.time).then(a.process.cmp(&b.process)));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(process: usize, time: f64, kind: StatKind, value: f64) -> StatEntry {
        StatEntry {
            process,
            time,
            level: Some(0),
            iteration: 1,
            sweep: 1,
            kind,
            value,
        }
    }

    #[test]
    fn clones_share_one_buffer() {
        let a = Stats::new();
        let b = a.clone();
        b.record(entry(0, 0.0, StatKind::Niter, 2.0));
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn filter_by_kind_and_process() {
        let s = Stats::new();
        s.record(entry(0, 0.0, StatKind::Niter, 2.0));
        s.record(entry(1, 1.0, StatKind::Niter, 3.0));
        s.record(entry(1, 1.0, StatKind::ResidualPostIteration, 1e-3));
        let f = StatFilter::new().kind(StatKind::Niter).process(1);
        let hits = s.filter(&f);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].value, 3.0);
    }

    #[test]
    fn filter_by_step_level() {
        let s = Stats::new();
        let mut e = entry(0, 0.0, StatKind::Niter, 1.0);
        e.level = None;
        s.record(e);
        s.record(entry(0, 0.0, StatKind::Niter, 1.0));
        assert_eq!(s.count(&StatFilter::new().level(None)), 1);
        assert_eq!(s.count(&StatFilter::new().level(Some(0))), 1);
    }

    #[test]
    fn sorted_by_time_orders_entries() {
        let s = Stats::new();
        s.record(entry(2, 2.0, StatKind::Niter, 0.0));
        s.record(entry(0, 0.0, StatKind::Niter, 0.0));
        s.record(entry(1, 1.0, StatKind::Niter, 0.0));
        let times: Vec<f64> = s
            .sorted_by_time(&StatFilter::new())
            .iter()
            .map(|e| e.time)
            .collect();
        assert_eq!(times, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn custom_kind_display() {
        assert_eq!(StatKind::Custom("radius".into()).to_string(), "radius");
        assert_eq!(StatKind::DegradedRecovery.to_string(), "degraded_recovery");
    }

    #[test]
    fn concurrent_appends_are_all_kept() {
        let s = Stats::new();
        std::thread::scope(|scope| {
            for p in 0..4 {
                let s = s.clone();
                scope.spawn(move || {
                    for i in 0..100 {
                        s.record(entry(p, i as f64, StatKind::Niter, 0.0));
                    }
                });
            }
        });
        assert_eq!(s.len(), 400);
    }
}

//! Test utilities for PFASST development.
//!
//! Parameter fixtures for the reference problems, mock problems that fail
//! on demand ([`fixtures`]), an [`EventLog`] for recording observer calls
//! across worker threads, and helpers to read the statistics sink.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

use std::sync::{Arc, Mutex};

use pfasst_core::{ProblemParams, StatFilter, StatKind, Stats};

// ── Parameter fixtures ─────────────────────────────────────────────

/// `u' = 0` with `u(0) = 1`.
pub fn zero_rhs_params() -> ProblemParams {
    ProblemParams::new().with("c", 0.0).with("u0", 1.0)
}

/// `u' = λu` with `u(0) = 1`.
pub fn dahlquist_params(lambda: f64) -> ProblemParams {
    ProblemParams::new().with("lambda", lambda).with("u0", 1.0)
}

/// 1-D heat equation on `levels` levels: `nvars` interior points on the
/// finest, `(n - 1) / 2` on each coarser one.
pub fn heat_params(nvars: usize, nu: f64, levels: usize) -> ProblemParams {
    let mut n = nvars as i64;
    let mut per_level = Vec::with_capacity(levels);
    for _ in 0..levels.max(1) {
        per_level.push(n);
        n = (n - 1) / 2;
    }
    ProblemParams::new()
        .with("nvars", per_level)
        .with("nu", nu)
        .with("freq", 1.0)
}

// ── EventLog ───────────────────────────────────────────────────────

/// Thread-safe, clonable list of recorded event names.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|e| *e == event)
            .count()
    }
}

// ── Stats helpers ──────────────────────────────────────────────────

/// Number of entries of `kind`.
pub fn count_kind(stats: &Stats, kind: StatKind) -> usize {
    stats.count(&StatFilter::new().kind(kind))
}

/// Values of `kind`, sorted by time then process.
pub fn values_of(stats: &Stats, kind: StatKind) -> Vec<f64> {
    stats
        .sorted_by_time(&StatFilter::new().kind(kind))
        .into_iter()
        .map(|e| e.value)
        .collect()
}

/// Largest iteration count any step needed.
pub fn max_niter(stats: &Stats) -> usize {
    values_of(stats, StatKind::Niter)
        .into_iter()
        .fold(0.0, f64::max) as usize
}

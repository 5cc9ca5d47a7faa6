//! One discretization level of a step.
//!
//! A [`Level`] owns the node values `u[0..=M]` and right-hand sides
//! `f[0..=M]` of one spatial/temporal resolution. Node 0 holds the step's
//! initial value. Coarse levels additionally carry the FAS correction
//! `tau` and a copy of `u` taken at restriction time, from which the
//! coarse correction is formed on the way back up.

use pfasst_core::{Problem, StateVector};

use crate::config::LevelParams;
use crate::error::SweepError;
use crate::sweeper::Sweeper;

/// Node values and sweep state of one level.
#[derive(Debug)]
pub struct Level<P: Problem> {
    index: usize,
    problem: P,
    sweeper: Sweeper,
    params: LevelParams,
    pub(crate) u: Vec<P::U>,
    pub(crate) f: Vec<P::U>,
    pub(crate) tau: Option<Vec<P::U>>,
    pub(crate) uold: Vec<P::U>,
    time: f64,
    dt: f64,
    residual: f64,
    sweeps: usize,
}

impl<P: Problem> Level<P> {
    /// A level with no node data yet; call [`init`](Self::init) before use.
    pub fn new(index: usize, problem: P, sweeper: Sweeper, params: LevelParams) -> Self {
        Self {
            index,
            problem,
            sweeper,
            params,
            u: Vec::new(),
            f: Vec::new(),
            tau: None,
            uold: Vec::new(),
            time: 0.0,
            dt: 0.0,
            residual: f64::INFINITY,
            sweeps: 0,
        }
    }

    /// Level index (0 = finest).
    pub fn index(&self) -> usize {
        self.index
    }

    /// The problem discretized on this level.
    pub fn problem(&self) -> &P {
        &self.problem
    }

    /// The level's sweeper.
    pub fn sweeper(&self) -> &Sweeper {
        &self.sweeper
    }

    /// Tolerance and sweep count.
    pub fn params(&self) -> &LevelParams {
        &self.params
    }

    /// Node values, `u[0]` being the initial value.
    pub fn u(&self) -> &[P::U] {
        &self.u
    }

    /// Right-hand sides at the nodes.
    pub fn f(&self) -> &[P::U] {
        &self.f
    }

    /// FAS correction, present on coarse levels after a restriction.
    pub fn tau(&self) -> Option<&[P::U]> {
        self.tau.as_deref()
    }

    /// Step start time.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Step size.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Last computed residual.
    pub fn residual(&self) -> f64 {
        self.residual
    }

    /// Sweeps performed since the last [`init`](Self::init).
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Number of collocation nodes.
    pub fn num_nodes(&self) -> usize {
        self.sweeper.num_nodes()
    }

    /// Reset for a new step: every node holds `u0`, `f` is evaluated at
    /// every node, the FAS state is cleared.
    pub fn init(&mut self, u0: P::U, time: f64, dt: f64) -> Result<(), SweepError> {
        self.time = time;
        self.dt = dt;
        self.tau = None;
        self.uold.clear();
        self.residual = f64::INFINITY;
        self.sweeps = 0;
        self.u = vec![u0; self.num_nodes() + 1];
        self.f = Vec::with_capacity(self.u.len());
        for m in 0..self.u.len() {
            let tm = self.sweeper.node_time(time, dt, m);
            self.f.push(self.problem.eval_f(&self.u[m], tm)?);
        }
        self.check_finite()
    }

    /// Copy `u[0]` to every node and re-evaluate `f` (the spread predictor).
    pub fn spread(&mut self) -> Result<(), SweepError> {
        for m in 1..self.u.len() {
            self.u[m] = self.u[0].clone();
            let tm = self.sweeper.node_time(self.time, self.dt, m);
            self.f[m] = self.problem.eval_f(&self.u[m], tm)?;
        }
        self.check_finite()
    }

    /// Replace the initial value and its right-hand side.
    pub fn set_initial(&mut self, u0: P::U) -> Result<(), SweepError> {
        self.f[0] = self.problem.eval_f(&u0, self.time)?;
        self.u[0] = u0;
        if !(self.u[0].is_finite() && self.f[0].is_finite()) {
            return Err(SweepError::NonFinite { node: 0 });
        }
        Ok(())
    }

    /// Replace the value at node `m` (used by fault recovery).
    pub(crate) fn set_node(&mut self, m: usize, value: P::U) -> Result<(), SweepError> {
        let tm = self.sweeper.node_time(self.time, self.dt, m);
        self.f[m] = self.problem.eval_f(&value, tm)?;
        self.u[m] = value;
        Ok(())
    }

    /// One SDC sweep over the nodes.
    pub fn sweep(&mut self) -> Result<(), SweepError> {
        self.sweeper.sweep(
            &self.problem,
            &mut self.u,
            &mut self.f,
            self.tau.as_deref(),
            self.time,
            self.dt,
        )?;
        self.sweeps += 1;
        self.check_finite()
    }

    /// Recompute and store the collocation residual.
    pub fn compute_residual(&mut self) -> Result<f64, SweepError> {
        let res = self
            .sweeper
            .residual(&self.u, &self.f, self.tau.as_deref(), self.dt)?;
        if !res.is_finite() {
            return Err(SweepError::NonFinite { node: self.num_nodes() });
        }
        self.residual = res;
        Ok(res)
    }

    /// Value at the end of the step.
    pub fn terminal(&self) -> Result<P::U, SweepError> {
        Ok(self
            .sweeper
            .terminal(&self.u, &self.f, self.tau.as_deref(), self.dt)?)
    }

    /// `dt·(Q f)_m` at every node (without `tau`).
    pub fn integrate(&self) -> Result<Vec<P::U>, SweepError> {
        Ok(self.sweeper.integrate(&self.f, self.dt)?)
    }

    /// Add `correction[m]` to every node (including node 0) and
    /// re-evaluate `f`.
    pub fn prolong(&mut self, correction: &[P::U]) -> Result<(), SweepError> {
        for (m, c) in correction.iter().enumerate().take(self.u.len()) {
            self.u[m] = self.u[m].add(c)?;
            let tm = self.sweeper.node_time(self.time, self.dt, m);
            self.f[m] = self.problem.eval_f(&self.u[m], tm)?;
        }
        self.check_finite()
    }

    /// Re-evaluate `f` at every node from the current `u`.
    pub(crate) fn evaluate_all(&mut self) -> Result<(), SweepError> {
        for m in 0..self.u.len() {
            let tm = self.sweeper.node_time(self.time, self.dt, m);
            self.f[m] = self.problem.eval_f(&self.u[m], tm)?;
        }
        self.check_finite()
    }

    fn check_finite(&self) -> Result<(), SweepError> {
        match self
            .u
            .iter()
            .zip(&self.f)
            .position(|(u, f)| !(u.is_finite() && f.is_finite()))
        {
            Some(node) => Err(SweepError::NonFinite { node }),
            None => Ok(()),
        }
    }
}

//! One time-slice of a block.
//!
//! A [`Step`] owns its level hierarchy (finest first), the transfers
//! between adjacent levels and its iteration status. Per block it is
//! driven through [`run_block`](Step::run_block): receive the block's
//! initial value, predict, then [`iterate`](Step::iterate) until done.
//!
//! # Protocol
//!
//! Every message to the successor is tagged with its phase, iteration and
//! level (see [`Tag`]), and every message the successor waits for is sent
//! unless this step has already told it that it is done:
//!
//! 1. Predictor: with [`Predictor::CoarsePipeline`] slot `p` runs `p + 1`
//!    coarsest-level sweeps, receiving `predict(r - 1)` before round `r`
//!    and sending `predict(r)` after it.
//! 2. Each iteration `k` is a V-cycle. Only the coarsest level talks to
//!    its neighbours: `coarse(k, L - 1)` in, coarsest sweep,
//!    `coarse(k, L - 1)` out.
//! 3. The check point receives `check(k)` (the predecessor's fine terminal
//!    value and done flag), applies any fault, computes the residual and
//!    sends `check(k)` downstream without waiting for delivery.

use std::sync::Arc;
use std::time::{Duration, Instant};

use pfasst_core::{Problem, StatEntry, StatKind, StateVector, Stats};
use smallvec::SmallVec;

use crate::comm::{CommError, Communicator, Packet, SendHandle, Tag};
use crate::config::{Predictor, StepParams};
use crate::error::{EngineError, SweepError};
use crate::fault::{recover, FaultController, FaultError, NeighborBoard};
use crate::hooks::{HookContext, HookEvent, Hooks};
use crate::level::Level;
use crate::transfer::LevelTransfer;

/// Iteration status of a step within the current block.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StepStatus {
    /// Process slot.
    pub slot: usize,
    /// Global step index.
    pub index: usize,
    /// Iterations done in this block.
    pub iteration: usize,
    /// Sweeps done on the fine level in this block.
    pub sweeps: usize,
    /// Step start time.
    pub time: f64,
    /// Step size.
    pub dt: f64,
    /// No more iterations will run in this block.
    pub done: bool,
    /// The residual met the tolerance (with the predecessor done).
    pub converged: bool,
    /// The predecessor is done (always true on slot 0).
    pub prev_done: bool,
}

impl StepStatus {
    fn lineage_error(&self, level: usize, e: SweepError) -> EngineError {
        match e {
            SweepError::NonFinite { .. } => EngineError::SweeperDivergence {
                slot: self.slot,
                step: self.index,
                iteration: self.iteration,
                level,
            },
            SweepError::Problem(source) => EngineError::Problem {
                slot: self.slot,
                step: self.index,
                level,
                source,
            },
        }
    }

    fn comm_error(&self, source: CommError) -> EngineError {
        EngineError::Comm {
            slot: self.slot,
            source,
        }
    }

    fn entry(&self, kind: StatKind, value: f64) -> StatEntry {
        StatEntry {
            process: self.slot,
            time: self.time,
            level: Some(0),
            iteration: self.iteration,
            sweep: self.sweeps,
            kind,
            value,
        }
    }
}

/// One entry per [`Step::iterate`] call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResidualRecord {
    /// Iteration counter after the call.
    pub iteration: usize,
    /// Fine-level residual at the check point.
    pub residual: f64,
    /// Whether the step converged at this iteration.
    pub converged: bool,
}

/// Everything a step needs from its surroundings during one block.
pub struct StepContext<'a, C, U> {
    /// Messaging with the other slots of the block.
    pub comm: &'a mut C,
    /// The run's statistics sink.
    pub stats: &'a Stats,
    /// Fault roller of this slot, when faults target it.
    pub fault: Option<&'a mut FaultController>,
    /// Terminal values of the whole block, when faults are enabled.
    pub board: Option<&'a NeighborBoard<U>>,
}

/// A time-slice with its level hierarchy.
pub struct Step<P: Problem> {
    levels: Vec<Level<P>>,
    transfers: Vec<LevelTransfer<P::U>>,
    params: StepParams,
    hooks: Arc<Hooks>,
    status: StepStatus,
    records: Vec<ResidualRecord>,
    terminal: Option<P::U>,
    pending: Vec<SendHandle>,
    successor_gone: bool,
}

impl<P: Problem> std::fmt::Debug for Step<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Step")
            .field("levels", &self.levels.len())
            .field("params", &self.params)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<P: Problem> Step<P> {
    /// Assemble a step. `transfers[l]` connects `levels[l]` and
    /// `levels[l + 1]`.
    pub(crate) fn new(
        slot: usize,
        levels: Vec<Level<P>>,
        transfers: Vec<LevelTransfer<P::U>>,
        params: StepParams,
        hooks: Arc<Hooks>,
    ) -> Self {
        debug_assert_eq!(transfers.len() + 1, levels.len());
        Self {
            levels,
            transfers,
            params,
            hooks,
            status: StepStatus {
                slot,
                prev_done: slot == 0,
                ..StepStatus::default()
            },
            records: Vec::new(),
            terminal: None,
            pending: Vec::new(),
            successor_gone: false,
        }
    }

    /// Current status.
    pub fn status(&self) -> &StepStatus {
        &self.status
    }

    /// Levels, finest first.
    pub fn levels(&self) -> &[Level<P>] {
        &self.levels
    }

    /// Iteration controls.
    pub fn params(&self) -> &StepParams {
        &self.params
    }

    /// Lifecycle hooks.
    pub fn hooks(&self) -> &Arc<Hooks> {
        &self.hooks
    }

    /// Residual records of the current block.
    pub fn records(&self) -> &[ResidualRecord] {
        &self.records
    }

    /// Check values of this block the successor has not consumed yet.
    pub fn pending_sends(&self) -> usize {
        self.pending.len()
    }

    /// Whether the step stopped iterating in this block.
    pub fn is_done(&self) -> bool {
        self.status.done
    }

    /// Reset for step `index` of the run starting at `time`.
    pub fn begin(&mut self, index: usize, time: f64, dt: f64) {
        let slot = self.status.slot;
        self.status = StepStatus {
            slot,
            index,
            time,
            dt,
            prev_done: slot == 0,
            ..StepStatus::default()
        };
        self.records.clear();
        self.terminal = None;
        self.pending.clear();
        self.successor_gone = false;
    }

    /// Load `u0` on every level and build the initial iterate.
    pub fn predict<C>(
        &mut self,
        u0: P::U,
        ctx: &mut StepContext<'_, C, P::U>,
    ) -> Result<(), EngineError>
    where
        C: Communicator<Packet<P::U>>,
    {
        let (time, dt) = (self.status.time, self.status.dt);
        let mut value = u0;
        for l in 0..self.levels.len() {
            if l > 0 {
                value = self.transfers[l - 1]
                    .restrict_value(&value)
                    .map_err(|e| self.status.lineage_error(l, e))?;
            }
            self.levels[l]
                .init(value.clone(), time, dt)
                .map_err(|e| self.status.lineage_error(l, e))?;
        }

        if self.params.predictor == Predictor::CoarsePipeline {
            self.coarse_pipeline(ctx)?;
        }

        let terminal = self.fine_terminal()?;
        if let Some(board) = ctx.board {
            board.publish(self.status.slot, 0, terminal.clone());
        }
        self.terminal = Some(terminal);
        Ok(())
    }

    fn coarse_pipeline<C>(&mut self, ctx: &mut StepContext<'_, C, P::U>) -> Result<(), EngineError>
    where
        C: Communicator<Packet<P::U>>,
    {
        let slot = self.status.slot;
        let coarsest = self.levels.len() - 1;
        for l in 0..coarsest {
            self.restrict(l)?;
        }
        for round in 0..=slot {
            if round > 0 {
                let packet = ctx
                    .comm
                    .recv(slot - 1, Tag::predict(round - 1))
                    .map_err(|e| self.status.comm_error(e))?;
                self.levels[coarsest]
                    .set_initial(packet.value)
                    .map_err(|e| self.status.lineage_error(coarsest, e))?;
            }
            self.levels[coarsest]
                .sweep()
                .map_err(|e| self.status.lineage_error(coarsest, e))?;
            let value = self.levels[coarsest]
                .terminal()
                .map_err(|e| self.status.lineage_error(coarsest, e))?;
            self.send_next(ctx, Tag::predict(round), Packet::pending(value))?;
        }
        for l in (0..coarsest).rev() {
            self.prolong(l)?;
        }
        tracing::debug!(
            target: "pfasst.step",
            slot,
            step = self.status.index,
            rounds = slot + 1,
            "coarse pipeline predictor done"
        );
        Ok(())
    }

    /// One V-cycle followed by the convergence check.
    pub fn iterate<C>(&mut self, ctx: &mut StepContext<'_, C, P::U>) -> Result<(), EngineError>
    where
        C: Communicator<Packet<P::U>>,
    {
        self.status.iteration += 1;
        let k = self.status.iteration;
        let slot = self.status.slot;
        let _span = tracing::debug_span!(
            target: "pfasst.step",
            "iterate",
            slot,
            step = self.status.index,
            iteration = k
        )
        .entered();
        self.fire(HookEvent::PreIteration, None, None, None, ctx.stats);

        let coarsest = self.levels.len() - 1;
        for l in 0..coarsest {
            for _ in 0..self.levels[l].params().nsweeps {
                self.sweep_level(l, ctx.stats)?;
            }
            self.restrict(l)?;
        }

        if !self.status.prev_done {
            let packet = ctx
                .comm
                .recv(slot - 1, Tag::coarse(k, coarsest))
                .map_err(|e| self.status.comm_error(e))?;
            self.levels[coarsest]
                .set_initial(packet.value)
                .map_err(|e| self.status.lineage_error(coarsest, e))?;
        }
        for _ in 0..self.levels[coarsest].params().nsweeps {
            self.sweep_level(coarsest, ctx.stats)?;
        }
        let value = self.levels[coarsest]
            .terminal()
            .map_err(|e| self.status.lineage_error(coarsest, e))?;
        self.send_next(ctx, Tag::coarse(k, coarsest), Packet::pending(value))?;

        for l in (0..coarsest).rev() {
            self.prolong(l)?;
            if l > 0 {
                for _ in 0..self.levels[l].params().nsweeps {
                    self.sweep_level(l, ctx.stats)?;
                }
            }
        }

        self.check(ctx)
    }

    fn check<C>(&mut self, ctx: &mut StepContext<'_, C, P::U>) -> Result<(), EngineError>
    where
        C: Communicator<Packet<P::U>>,
    {
        let k = self.status.iteration;
        let slot = self.status.slot;
        let size = ctx.comm.size();

        if !self.status.prev_done {
            let packet = ctx
                .comm
                .recv(slot - 1, Tag::check(k))
                .map_err(|e| self.status.comm_error(e))?;
            self.levels[0]
                .set_initial(packet.value)
                .map_err(|e| self.status.lineage_error(0, e))?;
            self.status.prev_done = packet.done;
        }

        let mut terminal = self.fine_terminal()?;
        let mut faulted = false;
        if let Some(fault) = ctx.fault.as_deref_mut() {
            if fault.should_inject(k) {
                terminal = self.lose_and_recover(terminal, fault, ctx.stats, ctx.board, size)?;
                faulted = true;
            }
        }

        let residual = self.levels[0]
            .compute_residual()
            .map_err(|e| self.status.lineage_error(0, e))?;
        // An iteration that lost its value never converges.
        let converged =
            !faulted && residual <= self.levels[0].params().restol && self.status.prev_done;
        let done = converged || k >= self.params.maxiter;
        if done && !converged {
            ctx.stats
                .record(self.status.entry(StatKind::ConvergenceFailure, residual));
            tracing::warn!(
                target: "pfasst.step",
                slot,
                step = self.status.index,
                iteration = k,
                residual,
                "iteration cap reached without convergence"
            );
        }
        self.status.converged = converged;
        self.status.done = done;

        if let Some(board) = ctx.board {
            board.publish(slot, k, terminal.clone());
        }
        if !self.successor_gone && slot + 1 < size {
            match ctx
                .comm
                .isend(slot + 1, Tag::check(k), Packet { value: terminal.clone(), done })
            {
                Ok(handle) => self.pending.push(handle),
                Err(e) => self.successor_lost(e)?,
            }
        }
        self.pending.retain_mut(|h| !h.test());
        self.terminal = Some(terminal);

        self.records.push(ResidualRecord {
            iteration: k,
            residual,
            converged,
        });
        tracing::debug!(
            target: "pfasst.step",
            slot,
            step = self.status.index,
            iteration = k,
            residual,
            done,
            "check point"
        );
        self.fire(
            HookEvent::PostIteration,
            Some(0),
            Some(residual),
            None,
            ctx.stats,
        );
        Ok(())
    }

    /// Replace the fine terminal value by a placeholder and repair it.
    fn lose_and_recover(
        &mut self,
        lost: P::U,
        fault: &mut FaultController,
        stats: &Stats,
        board: Option<&NeighborBoard<P::U>>,
        size: usize,
    ) -> Result<P::U, EngineError> {
        let status = self.status.clone();
        let strategy = fault.spec().strategy;
        let placeholder = lost.zeros_like();
        stats.record(status.entry(StatKind::FaultInjected, lost.norm()));
        tracing::warn!(
            target: "pfasst.fault",
            slot = status.slot,
            step = status.index,
            iteration = status.iteration,
            ?strategy,
            "terminal value lost"
        );

        let spread = self.levels[0].u()[0].clone();
        let mut samples: SmallVec<[(f64, P::U); 2]> = SmallVec::new();
        if status.index > 0 {
            samples.push((status.time, spread.clone()));
        }
        if status.slot + 1 < size {
            if let Some(value) =
                board.and_then(|b| b.wait(status.slot + 1, status.iteration - 1))
            {
                samples.push((status.time + 2.0 * status.dt, value));
            }
        }

        let repaired = match recover(strategy, &spread, &samples, status.time + status.dt) {
            Ok(repaired) => repaired,
            Err(FaultError::InsufficientNeighbors { available }) => {
                stats.record(status.entry(StatKind::DegradedRecovery, available as f64));
                tracing::warn!(
                    target: "pfasst.fault",
                    slot = status.slot,
                    step = status.index,
                    available,
                    "too few neighbours to interpolate, spreading predecessor value"
                );
                Some(spread)
            }
            Err(e) => return Err(e.into()),
        };

        let value = match repaired {
            Some(value) => {
                let repair = value
                    .sub(&placeholder)
                    .map_err(|e| status.lineage_error(0, e.into()))?;
                stats.record(status.entry(StatKind::FaultRecovered, repair.norm()));
                value
            }
            None => placeholder,
        };
        if self.levels[0].sweeper().rule().right_is_node() {
            let m = self.levels[0].num_nodes();
            self.levels[0]
                .set_node(m, value.clone())
                .map_err(|e| status.lineage_error(0, e))?;
        }
        Ok(value)
    }

    /// The fine terminal value of the last check point (the next step's
    /// initial value).
    pub fn advance(&self) -> Result<P::U, EngineError> {
        match &self.terminal {
            Some(value) => Ok(value.clone()),
            None => self.fine_terminal(),
        }
    }

    /// Run this step's part of a block: receive the block's initial value
    /// (slot 0 passes `Some`), predict and iterate until done. Returns the
    /// fine terminal value.
    ///
    /// On failure the successor is told to abort. The neighbour board
    /// entry of the slot is closed either way.
    pub fn run_block<C>(
        &mut self,
        u0: Option<P::U>,
        index: usize,
        time: f64,
        dt: f64,
        ctx: &mut StepContext<'_, C, P::U>,
    ) -> Result<P::U, EngineError>
    where
        C: Communicator<Packet<P::U>>,
    {
        let result = self.drive(u0, index, time, dt, ctx);
        let slot = self.status.slot;
        if let Err(e) = &result {
            tracing::debug!(target: "pfasst.step", slot, step = index, error = %e, "step failed");
            if slot + 1 < ctx.comm.size() {
                let _ = ctx.comm.abort(slot + 1);
            }
        }
        if let Some(board) = ctx.board {
            board.close(slot);
        }
        result
    }

    fn drive<C>(
        &mut self,
        u0: Option<P::U>,
        index: usize,
        time: f64,
        dt: f64,
        ctx: &mut StepContext<'_, C, P::U>,
    ) -> Result<P::U, EngineError>
    where
        C: Communicator<Packet<P::U>>,
    {
        let started = Instant::now();
        self.begin(index, time, dt);
        let packet = ctx
            .comm
            .bcast(0, u0.map(Packet::pending))
            .map_err(|e| self.status.comm_error(e))?;
        self.fire(HookEvent::PreStep, None, None, None, ctx.stats);

        self.predict(packet.value, ctx)?;
        while !self.status.done {
            self.iterate(ctx)?;
        }

        self.flush_sends()?;

        let residual = self.records.last().map(|r| r.residual);
        self.fire(
            HookEvent::PostStep,
            None,
            residual,
            Some(started.elapsed()),
            ctx.stats,
        );
        self.advance()
    }

    // ── Internals ──────────────────────────────────────────────────

    fn fine_terminal(&self) -> Result<P::U, EngineError> {
        self.levels[0]
            .terminal()
            .map_err(|e| self.status.lineage_error(0, e))
    }

    fn sweep_level(&mut self, l: usize, stats: &Stats) -> Result<(), EngineError> {
        self.levels[l]
            .sweep()
            .map_err(|e| self.status.lineage_error(l, e))?;
        let residual = self.levels[l]
            .compute_residual()
            .map_err(|e| self.status.lineage_error(l, e))?;
        if l == 0 {
            self.status.sweeps += 1;
        }
        self.fire(HookEvent::PostSweep, Some(l), Some(residual), None, stats);
        Ok(())
    }

    fn restrict(&mut self, l: usize) -> Result<(), EngineError> {
        let (fine, coarse) = self.levels.split_at_mut(l + 1);
        self.transfers[l]
            .restrict(&fine[l], &mut coarse[0])
            .map_err(|e| self.status.lineage_error(l + 1, e))
    }

    fn prolong(&mut self, l: usize) -> Result<(), EngineError> {
        let (fine, coarse) = self.levels.split_at_mut(l + 1);
        self.transfers[l]
            .prolong(&mut fine[l], &coarse[0])
            .map_err(|e| self.status.lineage_error(l, e))
    }

    fn send_next<C>(
        &mut self,
        ctx: &mut StepContext<'_, C, P::U>,
        tag: Tag,
        packet: Packet<P::U>,
    ) -> Result<(), EngineError>
    where
        C: Communicator<Packet<P::U>>,
    {
        let next = self.status.slot + 1;
        if self.successor_gone || next >= ctx.comm.size() {
            return Ok(());
        }
        match ctx.comm.send(next, tag, packet) {
            Ok(()) => Ok(()),
            Err(e) => self.successor_lost(e),
        }
    }

    /// Wait until the successor consumed every check value sent in this
    /// block.
    fn flush_sends(&mut self) -> Result<(), EngineError> {
        for handle in std::mem::take(&mut self.pending) {
            if let Err(e) = handle.wait() {
                self.successor_lost(e)?;
            }
        }
        Ok(())
    }

    /// A successor that already exited needs nothing more from this step.
    fn successor_lost(&mut self, e: CommError) -> Result<(), EngineError> {
        match e {
            CommError::Disconnected { .. } => {
                self.successor_gone = true;
                Ok(())
            }
            other => Err(self.status.comm_error(other)),
        }
    }

    fn fire(
        &self,
        event: HookEvent,
        level: Option<usize>,
        residual: Option<f64>,
        elapsed: Option<Duration>,
        stats: &Stats,
    ) {
        self.hooks.fire(&HookContext {
            event,
            slot: self.status.slot,
            step: self.status.index,
            time: self.status.time,
            dt: self.status.dt,
            iteration: self.status.iteration,
            sweep: self.status.sweeps,
            level,
            residual,
            elapsed,
            stats,
        });
    }
}

/*
 * SPDX-FileCopyrightText: 2026 The pregel contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Vertex workers.
//!
//! A [`Worker`] is an execution unit owning a contiguous range of vertices:
//! their values, their [states](VertexState) and a _current_ buffer in which
//! their messages are read. Workers run concurrently and synchronize only
//! through the [`SuperstepBarrier`], which they cross twice per superstep:
//!
//! 1. _Read phase_: for each vertex, a non-empty next buffer reactivates it
//!    (removing it from the convergence set); an empty next buffer makes an
//!    active vertex vote to halt. Active vertices then swap their next buffer
//!    into the current one and compute their new value.
//! 2. Barrier (the publish point): after it, all next buffers have been
//!    drained, so new sends cannot be read during the same superstep.
//! 3. _Write phase_: at superstep 0, every vertex sends its initial value,
//!    split evenly among its neighbors. Later, every vertex that computed
//!    sends its new value in the same way, and votes to halt if the value
//!    changed by less than the tolerance.
//! 4. Barrier with decision: the last worker to arrive decides whether the
//!    computation is over, and all workers receive the same answer.

use crate::barrier::SuperstepBarrier;
use crate::compute::Compute;
use crate::convergence::{ConvergenceTracker, Termination};
use crate::error::{BreakReason, BrokenBarrier};
use crate::graph::NeighborMap;
use crate::inbox::Inboxes;
use dsi_progress_logger::ConcurrentProgressLog;
use std::ops::Range;

/// The state of a vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexState {
    /// The vertex has not sent its initial value yet.
    Init,
    /// The vertex computes at each superstep.
    Active,
    /// The vertex voted to halt, and it will not compute unless it receives
    /// a message.
    Halted,
    /// The computation is over.
    Done,
}

/// The structures shared by all workers of a run.
#[derive(Debug)]
pub struct Context<'a, C: Compute> {
    pub graph: &'a NeighborMap,
    pub compute: &'a C,
    pub inboxes: &'a Inboxes,
    pub tracker: &'a ConvergenceTracker,
    pub barrier: &'a SuperstepBarrier,
    pub tolerance: f64,
}

/// An execution unit processing sequentially a range of vertices at each
/// superstep.
#[derive(Debug)]
pub struct Worker<'a, C: Compute> {
    index: usize,
    range: Range<usize>,
    ctx: &'a Context<'a, C>,
    values: Vec<f64>,
    states: Vec<VertexState>,
    /// The value before the last compute call, for vertices that computed
    /// during the current superstep.
    previous: Vec<Option<f64>>,
    current: Vec<f64>,
}

impl<'a, C: Compute> Worker<'a, C> {
    /// Creates a worker for the vertices in `range`, all having value
    /// `init_value`.
    pub fn new(index: usize, range: Range<usize>, init_value: f64, ctx: &'a Context<'a, C>) -> Self {
        let len = range.len();
        Self {
            index,
            range,
            ctx,
            values: vec![init_value; len],
            states: vec![VertexState::Init; len],
            previous: vec![None; len],
            current: Vec::new(),
        }
    }

    /// Returns the index of this worker.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Returns the range of vertices of this worker.
    pub fn range(&self) -> Range<usize> {
        self.range.clone()
    }

    /// Returns the current values of the vertices of this worker.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Returns the current states of the vertices of this worker.
    pub fn states(&self) -> &[VertexState] {
        &self.states
    }

    /// Runs supersteps until the decision taken at the end of a superstep is
    /// to stop, and returns the final values of the vertices of this worker.
    ///
    /// `decide` is called with the index of the superstep just completed, by
    /// exactly one worker, when all workers have completed it.
    ///
    /// If the barrier breaks, the error is returned after publishing a
    /// [failed](Termination::Failed) outcome.
    pub fn run(
        mut self,
        decide: &(impl Fn(usize) -> bool + Sync),
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<Vec<f64>, BrokenBarrier> {
        let result = self.supersteps(decide, cpl);
        if result.is_err() {
            self.ctx.tracker.finish(Termination::Failed);
        }
        result?;
        Ok(self.values)
    }

    fn supersteps(
        &mut self,
        decide: &(impl Fn(usize) -> bool + Sync),
        cpl: &mut impl ConcurrentProgressLog,
    ) -> Result<(), BrokenBarrier> {
        let mut superstep = 0;
        loop {
            let mut computed = 0;
            for i in 0..self.range.len() {
                computed += self.read(superstep, i) as usize;
            }

            self.ctx.barrier.wait()?;

            for i in 0..self.range.len() {
                self.write(superstep, i);
            }
            cpl.update_with_count(computed);

            if self.ctx.barrier.wait_and_decide(|| decide(superstep))? {
                break;
            }
            superstep += 1;
        }

        self.states.fill(VertexState::Done);
        log::trace!(
            "Worker {} done after {} superstep(s)",
            self.index,
            superstep + 1
        );
        Ok(())
    }

    /// The read phase of the vertex of offset `i`. Returns true if the vertex
    /// computed a new value.
    fn read(&mut self, superstep: usize, i: usize) -> bool {
        let vertex = self.range.start + i;
        let ctx = self.ctx;

        if ctx.inboxes.has_pending(vertex) {
            if self.states[i] == VertexState::Halted {
                log::trace!("Vertex {vertex} reactivated at superstep {superstep}");
            }
            self.states[i] = VertexState::Active;
            ctx.tracker.remove(vertex);
        } else if superstep > 0 && self.states[i] == VertexState::Active {
            self.vote_to_halt(i);
        }

        if superstep == 0 || self.states[i] != VertexState::Active {
            return false;
        }

        ctx.inboxes.swap(vertex, &mut self.current);
        self.previous[i] = Some(self.values[i]);
        self.values[i] = ctx.compute.compute(&self.current);
        true
    }

    /// The write phase of the vertex of offset `i`.
    fn write(&mut self, superstep: usize, i: usize) {
        if superstep == 0 {
            self.states[i] = VertexState::Active;
            self.send(i);
        } else if let Some(previous) = self.previous[i].take() {
            self.send(i);
            if (previous - self.values[i]).abs() < self.ctx.tolerance {
                self.vote_to_halt(i);
            }
        }
    }

    /// Splits the value of the vertex of offset `i` evenly among its
    /// neighbors.
    fn send(&self, i: usize) {
        let vertex = self.range.start + i;
        let neighbors = self.ctx.graph.successors(vertex);
        debug_assert!(!neighbors.is_empty(), "Node {vertex} has no neighbors");
        let share = self.values[i] / neighbors.len() as f64;
        for &neighbor in neighbors {
            self.ctx.inboxes.send(neighbor, share);
        }
    }

    fn vote_to_halt(&mut self, i: usize) {
        self.states[i] = VertexState::Halted;
        self.ctx.tracker.add(self.range.start + i);
    }
}

/// Breaks the barrier and publishes a [failed](Termination::Failed) outcome
/// if dropped while its thread is panicking.
///
/// An instance must be kept alive for the whole life of a worker thread, so
/// that the other workers are released if it panics.
#[derive(Debug)]
pub struct BreakOnPanic<'a> {
    pub worker: usize,
    pub barrier: &'a SuperstepBarrier,
    pub tracker: &'a ConvergenceTracker,
}

impl Drop for BreakOnPanic<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            log::error!("Worker {} panicked", self.worker);
            self.barrier
                .break_barrier(BreakReason::Panicked(self.worker));
            self.tracker.finish(Termination::Failed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::PageRank;
    use dsi_progress_logger::no_logging;

    #[test]
    fn test_single_worker_states() -> anyhow::Result<()> {
        // 0 ⇄ 1: values never change, so everybody halts at superstep 1
        let graph = NeighborMap::from_arcs(2, &[0, 1], &[1, 0])?;
        let compute = PageRank::new(2);
        let inboxes = Inboxes::new(2);
        let tracker = ConvergenceTracker::new(2);
        let barrier = SuperstepBarrier::new(1);
        let ctx = Context {
            graph: &graph,
            compute: &compute,
            inboxes: &inboxes,
            tracker: &tracker,
            barrier: &barrier,
            tolerance: 1E-4,
        };

        let mut worker = Worker::new(0, 0..2, 0.5, &ctx);
        assert_eq!(worker.states(), &[VertexState::Init; 2]);

        // Superstep 0: no compute, initial values sent
        assert!(!worker.read(0, 0));
        worker.write(0, 0);
        worker.write(0, 1);
        assert_eq!(worker.states(), &[VertexState::Active; 2]);
        assert_eq!(inboxes.num_pending(0), 1);
        assert_eq!(inboxes.num_pending(1), 1);

        // Superstep 1: compute, the value does not change
        assert!(worker.read(1, 0));
        assert!(worker.read(1, 1));
        assert!(!inboxes.has_pending(0));
        worker.write(1, 0);
        worker.write(1, 1);
        assert!(worker.values().iter().all(|v| (v - 0.5).abs() < 1E-12));
        assert_eq!(worker.states(), &[VertexState::Halted; 2]);
        assert!(tracker.is_full());

        // Superstep 2: messages reactivate both vertices
        assert!(worker.read(2, 0));
        assert_eq!(worker.states()[0], VertexState::Active);
        assert!(!tracker.contains(0));
        assert!(tracker.contains(1));
        Ok(())
    }

    #[test]
    fn test_halt_on_silence() -> anyhow::Result<()> {
        // Nobody sends to 0, so it halts at superstep 1 without computing
        let graph = NeighborMap::from_arcs(2, &[0, 1], &[1, 1])?;
        let compute = PageRank::new(2);
        let inboxes = Inboxes::new(2);
        let tracker = ConvergenceTracker::new(2);
        let barrier = SuperstepBarrier::new(1);
        let ctx = Context {
            graph: &graph,
            compute: &compute,
            inboxes: &inboxes,
            tracker: &tracker,
            barrier: &barrier,
            tolerance: 1E-4,
        };

        let mut worker = Worker::new(0, 0..2, 0.5, &ctx);
        worker.read(0, 0);
        worker.read(0, 1);
        worker.write(0, 0);
        worker.write(0, 1);
        assert!(!worker.read(1, 0));
        assert_eq!(worker.states()[0], VertexState::Halted);
        assert!(tracker.contains(0));
        assert_eq!(worker.values()[0], 0.5);
        Ok(())
    }

    #[test]
    fn test_run_stops_on_decision() -> anyhow::Result<()> {
        let graph = NeighborMap::from_arcs(2, &[0, 1], &[1, 0])?;
        let compute = PageRank::new(2);
        let inboxes = Inboxes::new(2);
        let tracker = ConvergenceTracker::new(2);
        let barrier = SuperstepBarrier::new(1);
        let ctx = Context {
            graph: &graph,
            compute: &compute,
            inboxes: &inboxes,
            tracker: &tracker,
            barrier: &barrier,
            tolerance: 1E-4,
        };

        let worker = Worker::new(0, 0..2, 0.5, &ctx);
        let values = worker.run(&|superstep| superstep == 3, no_logging![])?;
        assert_eq!(values.len(), 2);
        assert!(values.iter().all(|v| (v - 0.5).abs() < 1E-12));
        Ok(())
    }
}

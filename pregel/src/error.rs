/*
 * SPDX-FileCopyrightText: 2026 The pregel contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Error types.
//!
//! Errors are split in two families, following the two phases of a run:
//! [`GraphError`] is returned while building the [neighbor
//! map](crate::graph::NeighborMap), before any thread is started, whereas
//! [`RunError`] is returned by the [coordinator](crate::engine::Pregel) when
//! the parallel phase fails. A run never returns more than one [`RunError`]:
//! secondary failures of the other workers (which just observe a [broken
//! barrier](BrokenBarrier)) are folded into the root cause.

use std::time::Duration;
use thiserror::Error;

/// Errors detected while building a neighbor map.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The source and target sequences have different lengths.
    #[error("Different number of sources and targets: {sources} != {targets}")]
    LengthMismatch { sources: usize, targets: usize },

    /// An arc references a vertex outside `0..num_nodes`.
    #[error("Arc {arc} references node {node}, but the graph has {num_nodes} nodes")]
    NodeOutOfRange {
        arc: usize,
        node: usize,
        num_nodes: usize,
    },

    /// A single vertex cannot be given any synthetic neighbor, as self loops
    /// are excluded by sink patching.
    #[error("A graph with {num_nodes} node(s) cannot be patched: at least two nodes are needed")]
    TooFewNodes { num_nodes: usize },

    /// A vertex still has no neighbors after sink patching.
    #[error("Node {node} has no neighbors after sink patching")]
    NoNeighbors { node: usize },
}

/// The reason why a [barrier](crate::barrier::SuperstepBarrier) was broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakReason {
    /// A participant waited longer than the barrier timeout.
    Timeout(Duration),
    /// The computation was interrupted from the outside.
    Interrupted,
    /// The worker with the given index panicked.
    Panicked(usize),
}

impl std::fmt::Display for BreakReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakReason::Timeout(timeout) => write!(f, "timeout after {timeout:?}"),
            BreakReason::Interrupted => f.write_str("interrupted"),
            BreakReason::Panicked(worker) => write!(f, "worker {worker} panicked"),
        }
    }
}

/// A participant of a barrier will never arrive.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Broken barrier ({0})")]
pub struct BrokenBarrier(pub BreakReason);

/// Errors happening during a run.
#[derive(Error, Debug)]
pub enum RunError {
    /// The graph cannot be processed.
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A worker thread could not be started.
    #[error("Cannot spawn a worker thread")]
    Spawn(#[source] std::io::Error),

    /// A worker waited at the superstep barrier longer than the configured
    /// timeout.
    #[error("Timed out after {0:?} waiting at the superstep barrier")]
    BarrierTimeout(Duration),

    /// The coordinator waited for global termination longer than the
    /// configured timeout.
    #[error("Timed out after {0:?} waiting for global termination")]
    TerminationTimeout(Duration),

    /// The computation was interrupted through an
    /// [`InterruptHandle`](crate::engine::InterruptHandle).
    #[error("The computation was interrupted")]
    Interrupted,

    /// A worker panicked (usually, inside the compute function).
    #[error("Worker {0} panicked")]
    WorkerPanicked(usize),
}

impl From<BrokenBarrier> for RunError {
    fn from(BrokenBarrier(reason): BrokenBarrier) -> Self {
        match reason {
            BreakReason::Timeout(timeout) => RunError::BarrierTimeout(timeout),
            BreakReason::Interrupted => RunError::Interrupted,
            BreakReason::Panicked(worker) => RunError::WorkerPanicked(worker),
        }
    }
}

/*
 * SPDX-FileCopyrightText: 2026 The pregel contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

#![doc = include_str!("../README.md")]
#![deny(unstable_features)]
#![deny(trivial_casts)]
#![deny(unconditional_recursion)]
#![deny(clippy::empty_loop)]
#![deny(unreachable_code)]
#![deny(unreachable_pub)]
#![deny(unreachable_patterns)]
#![deny(unused_macro_rules)]
#![deny(unused_doc_comments)]

pub mod barrier;
pub mod compute;
pub mod convergence;
pub mod engine;
pub mod error;
pub mod graph;
pub mod inbox;
pub mod worker;

use compute::PageRank;
use engine::{Pregel, preds};
use error::RunError;
use graph::NeighborMap;

/// Computes PageRank on the graph with `n` nodes and arcs `from[k]` →
/// `to[k]`, using the default damping factor and tolerance.
///
/// Sinks are patched before starting the computation. The result contains
/// the final value of each vertex, in increasing order of vertex.
///
/// # Examples
///
/// ```
/// let rank = pregel::pagerank(5, &[1, 2, 3, 4], &[0, 0, 0, 0])?;
/// assert_eq!(rank.len(), 5);
/// assert!(rank[0] > rank[1]);
/// # Ok::<(), pregel::error::RunError>(())
/// ```
pub fn pagerank(n: usize, from: &[usize], to: &[usize]) -> Result<Box<[f64]>, RunError> {
    let mut graph = NeighborMap::from_arcs(n, from, to)?;
    graph.patch_sinks()?;
    let compute = PageRank::new(n);
    let mut pregel = Pregel::new(&graph, &compute);
    pregel.run(preds::MaxSupersteps::default())?;
    Ok(pregel.values().into())
}

/// Prelude module to import everything from this crate.
pub mod prelude {
    pub use crate::barrier::SuperstepBarrier;
    pub use crate::compute::{Compute, PageRank};
    pub use crate::convergence::{ConvergenceTracker, Termination};
    pub use crate::engine::{InterruptHandle, Pregel, preds};
    pub use crate::error::{BreakReason, BrokenBarrier, GraphError, RunError};
    pub use crate::graph::NeighborMap;
    pub use crate::inbox::Inboxes;
    pub use crate::worker::{VertexState, Worker};
}

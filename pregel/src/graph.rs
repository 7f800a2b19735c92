/*
 * SPDX-FileCopyrightText: 2026 The pregel contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Neighbor maps built from arc lists.
//!
//! A [`NeighborMap`] stores, for each vertex in `0..n`, the ordered list of
//! its successors. Arcs are kept in the order they are given, duplicates and
//! self loops included.
//!
//! Vertices without successors (_sinks_) would make the BSP computation
//! divide by zero when splitting their value among neighbors, so before a
//! run they are [patched](NeighborMap::patch_sinks) with synthetic arcs
//! towards every other vertex.

use crate::error::GraphError;
use dsi_progress_logger::{ProgressLog, no_logging};
use rayon::prelude::*;

/// The successor lists of a graph with vertices `0..n`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighborMap {
    /// The number of arcs in the graph, synthetic arcs included.
    num_arcs: u64,
    /// For each node, its list of successors.
    succ: Vec<Vec<usize>>,
}

impl NeighborMap {
    /// Creates a new graph with `n` nodes and no arcs.
    pub fn empty(n: usize) -> Self {
        Self {
            num_arcs: 0,
            succ: Vec::from_iter((0..n).map(|_| Vec::new())),
        }
    }

    /// Builds the neighbor map of a graph with `n` nodes and arcs
    /// `from[k]` → `to[k]`.
    ///
    /// Input is validated before anything is built: the two sequences must
    /// have the same length and all nodes must be smaller than `n`.
    ///
    /// Sinks are _not_ patched: see [`patch_sinks`](Self::patch_sinks).
    pub fn from_arcs(n: usize, from: &[usize], to: &[usize]) -> Result<Self, GraphError> {
        Self::from_arcs_with_logging(n, from, to, no_logging![])
    }

    /// Like [`from_arcs`](Self::from_arcs), but logging progress on `pl`.
    pub fn from_arcs_with_logging(
        n: usize,
        from: &[usize],
        to: &[usize],
        pl: &mut impl ProgressLog,
    ) -> Result<Self, GraphError> {
        if from.len() != to.len() {
            return Err(GraphError::LengthMismatch {
                sources: from.len(),
                targets: to.len(),
            });
        }

        // Reject everything before allocating the lists
        for (arc, (&u, &v)) in from.iter().zip(to).enumerate() {
            for node in [u, v] {
                if node >= n {
                    return Err(GraphError::NodeOutOfRange {
                        arc,
                        node,
                        num_nodes: n,
                    });
                }
            }
        }

        let mut graph = Self::empty(n);
        pl.item_name("arc");
        pl.expected_updates(Some(from.len()));
        pl.start("Building neighbor lists...");
        for (&u, &v) in from.iter().zip(to) {
            graph.succ[u].push(v);
            pl.light_update();
        }
        pl.done();
        graph.num_arcs = from.len() as u64;

        Ok(graph)
    }

    /// Returns the number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.succ.len()
    }

    /// Returns the number of arcs.
    pub fn num_arcs(&self) -> u64 {
        self.num_arcs
    }

    /// Returns the successors of `node`, in insertion order.
    ///
    /// # Panics
    ///
    /// Panics if `node` is not smaller than the number of nodes.
    pub fn successors(&self, node: usize) -> &[usize] {
        &self.succ[node]
    }

    /// Returns the outdegree of `node`.
    pub fn outdegree(&self, node: usize) -> usize {
        self.succ[node].len()
    }

    /// Returns the number of nodes without successors.
    pub fn num_sinks(&self) -> usize {
        self.succ.par_iter().filter(|s| s.is_empty()).count()
    }

    /// Gives every sink a synthetic arc towards every other node, returning
    /// the number of patched sinks.
    ///
    /// Patching is idempotent: after the first call there are no sinks left,
    /// so further calls do not change the map.
    ///
    /// A graph with a single node cannot be patched, as self loops are
    /// excluded, and it is rejected as malformed. The empty graph is left
    /// untouched.
    pub fn patch_sinks(&mut self) -> Result<usize, GraphError> {
        let n = self.num_nodes();
        if n == 1 {
            return Err(GraphError::TooFewNodes { num_nodes: n });
        }

        let patched = self
            .succ
            .par_iter_mut()
            .enumerate()
            .filter(|(_, succ)| succ.is_empty())
            .map(|(node, succ)| {
                succ.extend((0..n).filter(|&other| other != node));
            })
            .count();

        self.num_arcs += (patched as u64) * (n as u64 - 1);
        if patched != 0 {
            log::info!("Patched {} sink(s) with {} arcs each", patched, n - 1);
        }
        Ok(patched)
    }

    /// Checks that every node has at least one successor.
    ///
    /// After [`patch_sinks`](Self::patch_sinks) this check cannot fail, so a
    /// failure denotes an internal error.
    pub fn check_no_sinks(&self) -> Result<(), GraphError> {
        match self.succ.iter().position(|s| s.is_empty()) {
            Some(node) => Err(GraphError::NoNeighbors { node }),
            None => Ok(()),
        }
    }
}

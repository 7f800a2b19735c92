/*
 * SPDX-FileCopyrightText: 2026 The pregel contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Per-vertex compute functions.
//!
//! The engine is agnostic with respect to the update rule: at each superstep
//! an active vertex passes all the payloads it received to a [`Compute`]
//! implementation and takes the result as its new value. Since the arrival
//! order of messages from different senders is unspecified, implementations
//! must be insensitive to the order of `received` (e.g., a commutative
//! reduction such as a sum).
//!
//! Any `Fn(&[f64]) -> f64 + Sync` closure is a [`Compute`], and
//! [`PageRank`] provides the classical PageRank update.

use kahan::KahanSum;

/// The compute capability of a vertex.
pub trait Compute: Sync {
    /// Returns the new value of a vertex given the payloads it received
    /// during the previous superstep.
    fn compute(&self, received: &[f64]) -> f64;
}

impl<F: Fn(&[f64]) -> f64 + Sync> Compute for F {
    fn compute(&self, received: &[f64]) -> f64 {
        self(received)
    }
}

/// The PageRank update rule
///
/// > *x* = (1 − α) / *n* + α ∑ *m*,
///
/// where α is the damping factor, *n* the number of vertices and the sum
/// ranges over the received payloads.
///
/// # Examples
///
/// ```
/// use pregel::compute::{Compute, PageRank};
///
/// let mut pr = PageRank::new(4);
/// pr.damping(0.5);
/// assert_eq!(pr.compute(&[0.25, 0.25]), 0.5 / 4.0 + 0.5 * 0.5);
/// ```
#[derive(Debug, Clone)]
pub struct PageRank {
    num_nodes: usize,
    damping: f64,
}

impl PageRank {
    pub const DEFAULT_DAMPING: f64 = 0.85;

    /// Creates a PageRank update rule for a graph with `num_nodes` nodes and
    /// damping factor [`DEFAULT_DAMPING`](Self::DEFAULT_DAMPING).
    pub fn new(num_nodes: usize) -> Self {
        Self {
            num_nodes,
            damping: Self::DEFAULT_DAMPING,
        }
    }

    /// Sets the damping factor α.
    ///
    /// # Panics
    ///
    /// Panics if `damping` is not in the interval [0 . . 1).
    pub fn damping(&mut self, damping: f64) -> &mut Self {
        assert!(
            // Note that 0.0..1.0 is [0.0..1.0) in mathematical notation
            (0.0..1.0).contains(&damping),
            "The damping factor must be in [0 . . 1), got {damping}"
        );
        self.damping = damping;
        self
    }

    /// Returns the damping factor.
    pub fn get_damping(&self) -> f64 {
        self.damping
    }

    /// Returns the teleport term (1 − α) / *n*.
    pub fn teleport(&self) -> f64 {
        (1.0 - self.damping) / self.num_nodes as f64
    }
}

impl Compute for PageRank {
    fn compute(&self, received: &[f64]) -> f64 {
        let mut sigma: KahanSum<f64> = KahanSum::new();
        for &m in received {
            sigma += m;
        }
        self.teleport() + self.damping * sigma.sum()
    }
}

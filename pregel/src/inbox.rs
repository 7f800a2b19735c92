/*
 * SPDX-FileCopyrightText: 2026 The pregel contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! Double-buffered message delivery.
//!
//! Each vertex has a pair of buffers: the _next_ buffer, which accumulates
//! payloads sent during the current superstep, and the _current_ buffer,
//! which contains the payloads to be read during the current superstep.
//!
//! Next buffers are the only structure written by several workers, so they
//! are stored here, one mutex-guarded vector per vertex; current buffers are
//! owned by the worker processing the vertex, which moves the content of the
//! next buffer into its current buffer using [`Inboxes::swap`]. Since the
//! allocations are exchanged rather than copied, after warmup no superstep
//! allocates.
//!
//! The visibility boundary is provided by the superstep barrier: a worker
//! reads and swaps the next buffers of its vertices only before the
//! mid-superstep barrier, and other workers append to them only after it.
//! Thus, a payload sent during superstep *S* is read during superstep *S* + 1.

use crossbeam_utils::CachePadded;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The next buffers of all vertices.
#[derive(Debug)]
pub struct Inboxes {
    next: Box<[CachePadded<Mutex<Vec<f64>>>]>,
}

impl Inboxes {
    /// Creates empty inboxes for `n` vertices.
    pub fn new(n: usize) -> Self {
        Self {
            next: (0..n)
                .map(|_| CachePadded::new(Mutex::new(Vec::new())))
                .collect(),
        }
    }

    /// Returns the number of vertices.
    pub fn len(&self) -> usize {
        self.next.len()
    }

    /// Returns true if there are no vertices.
    pub fn is_empty(&self) -> bool {
        self.next.is_empty()
    }

    // A panicking worker never leaves a buffer in an inconsistent state,
    // as the only operations are pushes and swaps.
    fn lock(&self, vertex: usize) -> MutexGuard<'_, Vec<f64>> {
        self.next[vertex]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a payload to the next buffer of `target`.
    pub fn send(&self, target: usize, payload: f64) {
        self.lock(target).push(payload);
    }

    /// Returns true if the next buffer of `vertex` contains some payload.
    pub fn has_pending(&self, vertex: usize) -> bool {
        !self.lock(vertex).is_empty()
    }

    /// Returns the number of payloads in the next buffer of `vertex`.
    pub fn num_pending(&self, vertex: usize) -> usize {
        self.lock(vertex).len()
    }

    /// Moves the content of the next buffer of `vertex` into `current`.
    ///
    /// The previous content of `current` is discarded, and the next buffer is
    /// left empty, ready for the sends of this superstep.
    pub fn swap(&self, vertex: usize, current: &mut Vec<f64>) {
        current.clear();
        std::mem::swap(&mut *self.lock(vertex), current);
    }
}

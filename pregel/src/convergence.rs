/*
 * SPDX-FileCopyrightText: 2026 The pregel contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The set of halted vertices.
//!
//! [`ConvergenceTracker`] records which vertices voted to halt. Workers add
//! and remove only the vertices they own; the set is full if and only if the
//! whole computation is quiescent.
//!
//! The tracker is also the place where the outcome of a run is published:
//! the coordinator blocks on a condition variable in
//! [`wait_for_termination`](ConvergenceTracker::wait_for_termination) until
//! a worker calls [`finish`](ConvergenceTracker::finish).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// All vertices voted to halt.
    Quiescent,
    /// The stopping predicate was satisfied before quiescence.
    Stopped,
    /// The run failed; the cause is recorded by the barrier.
    Failed,
}

#[derive(Debug)]
struct State {
    halted: Box<[bool]>,
    count: usize,
    outcome: Option<Termination>,
}

/// A concurrent set of halted vertices.
#[derive(Debug)]
pub struct ConvergenceTracker {
    state: Mutex<State>,
    cvar: Condvar,
}

impl ConvergenceTracker {
    /// The maximum time the coordinator sleeps before checking for an
    /// interruption.
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Creates an empty tracker for `n` vertices.
    pub fn new(n: usize) -> Self {
        Self {
            state: Mutex::new(State {
                halted: vec![false; n].into_boxed_slice(),
                count: 0,
                outcome: None,
            }),
            cvar: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds `vertex` to the set, returning true if it was not present.
    pub fn add(&self, vertex: usize) -> bool {
        let mut state = self.lock();
        let added = !std::mem::replace(&mut state.halted[vertex], true);
        state.count += added as usize;
        added
    }

    /// Removes `vertex` from the set, returning true if it was present.
    pub fn remove(&self, vertex: usize) -> bool {
        let mut state = self.lock();
        let removed = std::mem::replace(&mut state.halted[vertex], false);
        state.count -= removed as usize;
        removed
    }

    /// Returns true if `vertex` is in the set.
    pub fn contains(&self, vertex: usize) -> bool {
        self.lock().halted[vertex]
    }

    /// Returns the number of halted vertices.
    pub fn len(&self) -> usize {
        self.lock().count
    }

    /// Returns true if no vertex is halted.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.lock().halted.len()
    }

    /// Returns true if all vertices are halted.
    pub fn is_full(&self) -> bool {
        let state = self.lock();
        state.count == state.halted.len()
    }

    /// Publishes the outcome of the run and wakes up the coordinator.
    ///
    /// Only the first outcome is recorded.
    pub fn finish(&self, outcome: Termination) {
        let mut state = self.lock();
        state.outcome.get_or_insert(outcome);
        drop(state);
        self.cvar.notify_all();
    }

    /// Returns the outcome of the run, if already published.
    pub fn outcome(&self) -> Option<Termination> {
        self.lock().outcome
    }

    /// Blocks until an outcome is published.
    ///
    /// Returns `None` if `timeout` elapses first, or if `interrupted` is set
    /// (it is checked at least every [`POLL_INTERVAL`](Self::POLL_INTERVAL)).
    pub fn wait_for_termination(
        &self,
        timeout: Option<Duration>,
        interrupted: &AtomicBool,
    ) -> Option<Termination> {
        let deadline = timeout.map(|timeout| Instant::now() + timeout);
        let mut state = self.lock();
        loop {
            if let Some(outcome) = state.outcome {
                return Some(outcome);
            }
            if interrupted.load(Ordering::Acquire) {
                return None;
            }
            let mut sleep = Self::POLL_INTERVAL;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return None;
                }
                sleep = sleep.min(deadline - now);
            }
            state = self
                .cvar
                .wait_timeout(state, sleep)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

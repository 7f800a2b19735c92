/*
 * SPDX-FileCopyrightText: 2026 The pregel contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! A reusable, breakable barrier.
//!
//! [`SuperstepBarrier`] works like [`std::sync::Barrier`], but
//!
//! - the last participant to arrive can compute a decision that is returned
//!   to all participants ([`wait_and_decide`](SuperstepBarrier::wait_and_decide));
//! - waits can have a deadline;
//! - the barrier can be [broken](SuperstepBarrier::break_barrier): all
//!   current and future waiters are released with a [`BrokenBarrier`] error
//!   carrying the reason of the first break.
//!
//! A participant that times out breaks the barrier, so a missing participant
//! never makes the others hang forever.

use crate::error::{BreakReason, BrokenBarrier};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct State {
    /// Participants arrived in the current generation.
    arrived: usize,
    /// Incremented each time the participants are released.
    generation: u64,
    /// The decision taken by the last participant of the previous generation.
    decision: bool,
    broken: Option<BreakReason>,
}

/// A barrier for a fixed number of participants that can be reused, broken,
/// and waited upon with a deadline.
///
/// # Examples
///
/// ```
/// use pregel::barrier::SuperstepBarrier;
///
/// let barrier = SuperstepBarrier::new(4);
/// std::thread::scope(|s| {
///     for _ in 0..4 {
///         s.spawn(|| {
///             for round in 0..3 {
///                 let last = barrier.wait_and_decide(|| round == 2).unwrap();
///                 assert_eq!(last, round == 2);
///             }
///         });
///     }
/// });
/// ```
#[derive(Debug)]
pub struct SuperstepBarrier {
    num_parties: usize,
    timeout: Option<Duration>,
    state: Mutex<State>,
    cvar: Condvar,
}

impl SuperstepBarrier {
    /// Creates a barrier for `num_parties` participants without timeout.
    ///
    /// # Panics
    ///
    /// Panics if `num_parties` is zero.
    pub fn new(num_parties: usize) -> Self {
        assert!(num_parties > 0, "A barrier needs at least one participant");
        Self {
            num_parties,
            timeout: None,
            state: Mutex::new(State {
                arrived: 0,
                generation: 0,
                decision: false,
                broken: None,
            }),
            cvar: Condvar::new(),
        }
    }

    /// Sets the maximum time a participant can wait for the others.
    ///
    /// `None` means waiting forever.
    pub fn timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.timeout = timeout;
        self
    }

    /// Returns the number of participants.
    pub fn num_parties(&self) -> usize {
        self.num_parties
    }

    // The state is consistent at every unlock, so poisoning (which can only
    // happen if a decision closure panics) is ignored.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the reason of the break, if the barrier is broken.
    pub fn broken(&self) -> Option<BreakReason> {
        self.lock().broken
    }

    /// Breaks the barrier, releasing all waiters.
    ///
    /// Only the reason of the first break is recorded; further calls have no
    /// effect.
    pub fn break_barrier(&self, reason: BreakReason) {
        let mut state = self.lock();
        if state.broken.is_none() {
            log::debug!("Breaking barrier: {}", reason);
            state.broken = Some(reason);
        }
        drop(state);
        self.cvar.notify_all();
    }

    /// Blocks until all participants have called this method.
    pub fn wait(&self) -> Result<(), BrokenBarrier> {
        self.wait_and_decide(|| false).map(|_| ())
    }

    /// Blocks until all participants have called this method, and returns to
    /// all of them the value computed by `decide`.
    ///
    /// `decide` is invoked exactly once per generation, by the last
    /// participant to arrive, while holding the barrier lock: no participant
    /// can proceed while the decision is being taken.
    pub fn wait_and_decide(&self, decide: impl FnOnce() -> bool) -> Result<bool, BrokenBarrier> {
        let mut state = self.lock();
        if let Some(reason) = state.broken {
            return Err(BrokenBarrier(reason));
        }

        state.arrived += 1;
        if state.arrived == self.num_parties {
            state.decision = decide();
            state.arrived = 0;
            state.generation += 1;
            let decision = state.decision;
            drop(state);
            self.cvar.notify_all();
            return Ok(decision);
        }

        let generation = state.generation;
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        loop {
            state = match deadline {
                None => self.cvar.wait(state).unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        // The timeout is not spurious: break for everybody
                        if state.generation == generation && state.broken.is_none() {
                            let reason =
                                BreakReason::Timeout(self.timeout.unwrap_or_default());
                            log::debug!("Breaking barrier: {}", reason);
                            state.broken = Some(reason);
                            self.cvar.notify_all();
                        }
                    } else {
                        state = self
                            .cvar
                            .wait_timeout(state, deadline - now)
                            .unwrap_or_else(PoisonError::into_inner)
                            .0;
                    }
                    state
                }
            };

            if state.generation != generation {
                return Ok(state.decision);
            }
            if let Some(reason) = state.broken {
                return Err(BrokenBarrier(reason));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_single_party() {
        let barrier = SuperstepBarrier::new(1);
        for _ in 0..3 {
            barrier.wait().unwrap();
        }
        assert!(barrier.wait_and_decide(|| true).unwrap());
    }

    #[test]
    fn test_decide_once_per_generation() {
        let barrier = SuperstepBarrier::new(8);
        let calls = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..100 {
                        barrier
                            .wait_and_decide(|| {
                                calls.fetch_add(1, Ordering::Relaxed);
                                false
                            })
                            .unwrap();
                    }
                });
            }
        });
        assert_eq!(calls.load(Ordering::Relaxed), 100);
    }

    #[test]
    fn test_lock_step() {
        // No participant can see a counter from a different round
        let barrier = SuperstepBarrier::new(4);
        let counter = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    for round in 0..50 {
                        counter.fetch_add(1, Ordering::SeqCst);
                        barrier.wait().unwrap();
                        assert_eq!(counter.load(Ordering::SeqCst), 4 * (round + 1));
                        barrier.wait().unwrap();
                    }
                });
            }
        });
    }

    #[test]
    fn test_timeout_breaks() {
        let mut barrier = SuperstepBarrier::new(3);
        barrier.timeout(Some(Duration::from_millis(50)));
        let timeout = BreakReason::Timeout(Duration::from_millis(50));
        std::thread::scope(|s| {
            let handles: Vec<_> = (0..2).map(|_| s.spawn(|| barrier.wait())).collect();
            for handle in handles {
                assert_eq!(handle.join().unwrap(), Err(BrokenBarrier(timeout)));
            }
        });
        // Late participants are rejected, too
        assert_eq!(barrier.wait(), Err(BrokenBarrier(timeout)));
    }

    #[test]
    fn test_break_releases_waiters() {
        let barrier = SuperstepBarrier::new(3);
        std::thread::scope(|s| {
            let handle = s.spawn(|| barrier.wait());
            std::thread::sleep(Duration::from_millis(20));
            barrier.break_barrier(BreakReason::Panicked(7));
            barrier.break_barrier(BreakReason::Interrupted);
            assert_eq!(
                handle.join().unwrap(),
                Err(BrokenBarrier(BreakReason::Panicked(7)))
            );
        });
        assert_eq!(barrier.broken(), Some(BreakReason::Panicked(7)));
    }
}

/*
 * SPDX-FileCopyrightText: 2026 The pregel contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

//! The coordinator of a BSP computation.
//!
//! [`Pregel`] spawns the [workers](crate::worker::Worker), waits for the
//! computation to terminate and collects the final values. Vertices are
//! partitioned in contiguous ranges among a fixed number of workers (by
//! default, the number of threads of the current Rayon pool); setting the
//! number of workers to the number of vertices yields the classical
//! thread-per-vertex model.
//!
//! # Termination
//!
//! A computation terminates when all vertices have voted to halt, or when
//! the stopping [predicate](preds) passed to [`run`](Pregel::run) is
//! satisfied. The condition is evaluated by exactly one worker, inside the
//! barrier that closes each superstep, so no worker can observe a
//! transiently full [convergence set](crate::convergence::ConvergenceTracker)
//! while other workers are still reactivating vertices, and all workers
//! agree on the superstep at which the computation ends.
//!
//! # Failures
//!
//! A run fails with a single [`RunError`]:
//!
//! - if a worker waits at the barrier longer than the [barrier
//!   timeout](Pregel::barrier_timeout);
//! - if the whole computation takes longer than the [termination
//!   timeout](Pregel::termination_timeout);
//! - if it is [interrupted](InterruptHandle::interrupt);
//! - if the compute function panics.
//!
//! In all cases the barrier is broken, so all workers stop, and they are
//! joined before returning.

pub mod preds {
    //! Predicates implementing additional stopping conditions.
    //!
    //! Besides quiescence, a [computation](super::Pregel) can be stopped by a
    //! [predicate](Predicate), which is evaluated at the end of each
    //! superstep. You can combine predicates using the `and` and `or`
    //! methods provided by the [`Predicate`] trait.
    //!
    //! # Examples
    //! ```
    //! # fn main() -> Result<(), Box<dyn std::error::Error>> {
    //! use predicates::prelude::*;
    //! use pregel::engine::preds::{MaxSupersteps, MinHalted};
    //!
    //! let mut predicate = MinHalted::try_from(0.99)?.boxed();
    //! predicate = predicate.or(MaxSupersteps::from(100)).boxed();
    //! #     Ok(())
    //! # }
    //! ```

    use anyhow::ensure;
    use predicates::{Predicate, reflection::PredicateReflection};
    use std::fmt::Display;

    #[doc(hidden)]
    /// This structure is passed to stopping predicates to provide the
    /// information that is needed to evaluate them.
    #[derive(Debug)]
    pub struct PredParams {
        /// The number of completed supersteps.
        pub supersteps: usize,
        /// The number of halted vertices.
        pub halted: usize,
        pub num_vertices: usize,
    }

    /// Stops after at most the provided number of supersteps.
    #[derive(Debug, Clone)]
    pub struct MaxSupersteps {
        max_supersteps: usize,
    }

    impl MaxSupersteps {
        pub const DEFAULT_MAX_SUPERSTEPS: usize = usize::MAX;
    }

    impl From<usize> for MaxSupersteps {
        fn from(max_supersteps: usize) -> Self {
            MaxSupersteps { max_supersteps }
        }
    }

    impl Default for MaxSupersteps {
        fn default() -> Self {
            Self::from(Self::DEFAULT_MAX_SUPERSTEPS)
        }
    }

    impl Display for MaxSupersteps {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_fmt(format_args!("(max supersteps: {})", self.max_supersteps))
        }
    }

    impl PredicateReflection for MaxSupersteps {}

    impl Predicate<PredParams> for MaxSupersteps {
        fn eval(&self, pred_params: &PredParams) -> bool {
            pred_params.supersteps >= self.max_supersteps
        }
    }

    /// Stops when the fraction of halted vertices is at least the given
    /// threshold.
    #[derive(Debug, Clone)]
    pub struct MinHalted {
        fraction: f64,
    }

    impl TryFrom<f64> for MinHalted {
        type Error = anyhow::Error;
        fn try_from(fraction: f64) -> anyhow::Result<Self> {
            ensure!(!fraction.is_nan());
            ensure!(
                (0.0..=1.0).contains(&fraction),
                "The fraction of halted vertices must be in [0 . . 1], got {fraction}"
            );
            Ok(MinHalted { fraction })
        }
    }

    impl Display for MinHalted {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_fmt(format_args!("(min halted: {})", self.fraction))
        }
    }

    impl PredicateReflection for MinHalted {}

    impl Predicate<PredParams> for MinHalted {
        fn eval(&self, pred_params: &PredParams) -> bool {
            pred_params.halted as f64 >= self.fraction * pred_params.num_vertices as f64
        }
    }
}

use crate::barrier::SuperstepBarrier;
use crate::compute::Compute;
use crate::convergence::{ConvergenceTracker, Termination};
use crate::error::{BreakReason, RunError};
use crate::graph::NeighborMap;
use crate::inbox::Inboxes;
use crate::worker::{BreakOnPanic, Context, Worker};
use dsi_progress_logger::{ConcurrentProgressLog, ProgressLog, no_logging};
use predicates::Predicate;
use std::ops::Range;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// A handle that can interrupt a running [computation](Pregel).
///
/// Handles are cheap to clone and can be moved to other threads (e.g., to a
/// signal handler).
#[derive(Debug, Clone)]
pub struct InterruptHandle(Arc<AtomicBool>);

impl InterruptHandle {
    /// Asks the computation to stop.
    ///
    /// The coordinator notices the request within
    /// [`ConvergenceTracker::POLL_INTERVAL`], breaks the barrier and returns
    /// [`RunError::Interrupted`].
    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Returns true if an interruption was requested.
    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Runs a vertex-centric BSP computation.
///
/// The struct is configured via setters and then executed via
/// [`run`](Self::run). After completion the final values are available via
/// the [`values`](Self::values) method.
///
/// Every vertex starts with value 1/*n*; vertices that never compute (e.g.,
/// vertices without predecessors) keep it.
///
/// # Examples
///
/// PageRank on a star whose leaves are sinks:
///
/// ```
/// use pregel::compute::PageRank;
/// use pregel::engine::{Pregel, preds};
/// use pregel::graph::NeighborMap;
///
/// let mut graph = NeighborMap::from_arcs(5, &[1, 2, 3, 4], &[0, 0, 0, 0])?;
/// graph.patch_sinks()?;
///
/// let compute = PageRank::new(5);
/// let mut pregel = Pregel::new(&graph, &compute);
/// pregel.tolerance(1E-4).num_workers(Some(2));
/// pregel.run(preds::MaxSupersteps::default())?;
///
/// assert!(pregel.converged());
/// assert_eq!(pregel.values().len(), 5);
/// # Ok::<(), anyhow::Error>(())
/// ```
pub struct Pregel<'a, C: Compute> {
    graph: &'a NeighborMap,
    compute: &'a C,
    tolerance: f64,
    num_workers: Option<usize>,
    barrier_timeout: Option<Duration>,
    termination_timeout: Option<Duration>,
    interrupted: Arc<AtomicBool>,

    values: Box<[f64]>,
    supersteps: usize,
    outcome: Option<Termination>,
}

impl<C: Compute> std::fmt::Debug for Pregel<'_, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pregel")
            .field("tolerance", &self.tolerance)
            .field("num_workers", &self.num_workers)
            .field("barrier_timeout", &self.barrier_timeout)
            .field("termination_timeout", &self.termination_timeout)
            .field("supersteps", &self.supersteps)
            .field("outcome", &self.outcome)
            .finish_non_exhaustive()
    }
}

impl<'a, C: Compute> Pregel<'a, C> {
    pub const DEFAULT_TOLERANCE: f64 = 1E-4;

    /// Creates a new computation on `graph` using the given compute function.
    ///
    /// The graph must have no sinks (see
    /// [`NeighborMap::patch_sinks`]).
    pub fn new(graph: &'a NeighborMap, compute: &'a C) -> Self {
        let n = graph.num_nodes();
        Self {
            graph,
            compute,
            tolerance: Self::DEFAULT_TOLERANCE,
            num_workers: None,
            barrier_timeout: None,
            termination_timeout: None,
            interrupted: Arc::new(AtomicBool::new(false)),
            values: vec![Self::init_value(n); n].into_boxed_slice(),
            supersteps: 0,
            outcome: None,
        }
    }

    fn init_value(n: usize) -> f64 {
        1.0 / n as f64
    }

    /// Sets the convergence tolerance: a vertex votes to halt when its value
    /// changes by less than this amount.
    ///
    /// # Panics
    ///
    /// Panics if `tolerance` is not positive.
    pub fn tolerance(&mut self, tolerance: f64) -> &mut Self {
        assert!(
            tolerance > 0.0,
            "The tolerance must be positive, got {tolerance}"
        );
        self.tolerance = tolerance;
        self
    }

    /// Sets the number of workers.
    ///
    /// `None` means the number of threads of the current Rayon pool. In any
    /// case, the number of workers is at most the number of vertices.
    ///
    /// # Panics
    ///
    /// Panics if the number of workers is zero.
    pub fn num_workers(&mut self, num_workers: Option<usize>) -> &mut Self {
        assert_ne!(num_workers, Some(0), "The number of workers must be positive");
        self.num_workers = num_workers;
        self
    }

    /// Sets the maximum time a worker can wait for the others at the end of
    /// a phase. `None` (the default) means waiting forever.
    pub fn barrier_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.barrier_timeout = timeout;
        self
    }

    /// Sets the maximum duration of the whole computation. `None` (the
    /// default) means waiting forever.
    pub fn termination_timeout(&mut self, timeout: Option<Duration>) -> &mut Self {
        self.termination_timeout = timeout;
        self
    }

    /// Returns a handle that can be used to interrupt the computation from
    /// another thread.
    ///
    /// Requests are sticky: once interrupted, all further calls to
    /// [`run`](Self::run) fail with [`RunError::Interrupted`].
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle(self.interrupted.clone())
    }

    /// Returns the final values, indexed by vertex.
    ///
    /// Before a successful call to [`run`](Self::run), all values are 1/*n*.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Returns the number of supersteps performed by the last call to
    /// [`run`](Self::run).
    pub fn supersteps(&self) -> usize {
        self.supersteps
    }

    /// Returns true if the last call to [`run`](Self::run) ended because all
    /// vertices voted to halt.
    pub fn converged(&self) -> bool {
        self.outcome == Some(Termination::Quiescent)
    }

    /// Returns the effective number of workers.
    pub fn effective_num_workers(&self) -> usize {
        let n = self.graph.num_nodes();
        self.num_workers
            .unwrap_or_else(rayon::current_num_threads)
            .min(n)
            .max(1)
    }

    /// Runs the computation until quiescence or until the given predicate is
    /// satisfied.
    pub fn run(
        &mut self,
        predicate: impl Predicate<preds::PredParams> + Sync,
    ) -> Result<(), RunError> {
        self.run_with_logging(predicate, no_logging![], no_logging![])
    }

    /// Runs the computation until quiescence or until the given predicate is
    /// satisfied, logging progress.
    ///
    /// `pl` is a sequential [`ProgressLog`] used to count supersteps once the
    /// computation is over. `cpl` is a [`ConcurrentProgressLog`] cloned into
    /// each worker and updated with the number of vertices computed at each
    /// superstep. Their options will be preserved, making thus possible to
    /// customize the logs.
    pub fn run_with_logging(
        &mut self,
        predicate: impl Predicate<preds::PredParams> + Sync,
        pl: &mut impl ProgressLog,
        cpl: &mut (impl ConcurrentProgressLog + Send),
    ) -> Result<(), RunError> {
        let n = self.graph.num_nodes();
        self.supersteps = 0;
        self.outcome = None;
        self.values.fill(Self::init_value(n));
        if n == 0 {
            self.outcome = Some(Termination::Quiescent);
            return Ok(());
        }
        self.graph.check_no_sinks()?;

        let num_workers = self.effective_num_workers();
        log::info!("Vertices: {}", n);
        log::info!("Arcs: {}", self.graph.num_arcs());
        log::info!("Workers: {}", num_workers);
        log::info!("Tolerance: {}", self.tolerance);
        log::info!("Stopping criterion: {}", predicate);

        let inboxes = Inboxes::new(n);
        let tracker = ConvergenceTracker::new(n);
        let mut barrier = SuperstepBarrier::new(num_workers);
        barrier.timeout(self.barrier_timeout);
        let ctx = Context {
            graph: self.graph,
            compute: self.compute,
            inboxes: &inboxes,
            tracker: &tracker,
            barrier: &barrier,
            tolerance: self.tolerance,
        };

        let supersteps = AtomicUsize::new(0);
        let decide = |superstep: usize| {
            let halted = tracker.len();
            log::debug!("Superstep {}: {}/{} vertices halted", superstep, halted, n);
            let outcome = if halted == n {
                Some(Termination::Quiescent)
            } else if predicate.eval(&preds::PredParams {
                supersteps: superstep + 1,
                halted,
                num_vertices: n,
            }) {
                Some(Termination::Stopped)
            } else {
                None
            };
            match outcome {
                Some(outcome) => {
                    supersteps.store(superstep + 1, Ordering::Relaxed);
                    tracker.finish(outcome);
                    true
                }
                None => false,
            }
        };

        cpl.item_name("vertex");
        cpl.expected_updates(None);
        cpl.start("Running supersteps...");

        let (results, failure) = std::thread::scope(|s| {
            let mut failure = None;
            let mut handles = Vec::with_capacity(num_workers);
            for (index, range) in partition(n, num_workers).enumerate() {
                let worker = Worker::new(index, range, Self::init_value(n), &ctx);
                let mut local_cpl = cpl.clone();
                let (barrier, tracker, decide) = (&barrier, &tracker, &decide);
                let spawned = std::thread::Builder::new()
                    .name(format!("pregel-worker-{index}"))
                    .spawn_scoped(s, move || {
                        let _guard = BreakOnPanic {
                            worker: index,
                            barrier,
                            tracker,
                        };
                        worker.run(decide, &mut local_cpl)
                    });
                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        log::error!("Cannot spawn worker {}: {}", index, e);
                        barrier.break_barrier(BreakReason::Interrupted);
                        failure = Some(RunError::Spawn(e));
                        break;
                    }
                }
            }

            if failure.is_none()
                && tracker
                    .wait_for_termination(self.termination_timeout, &self.interrupted)
                    .is_none()
            {
                // The workers will notice at their next barrier crossing
                barrier.break_barrier(BreakReason::Interrupted);
                failure = Some(if self.interrupted.load(Ordering::Acquire) {
                    RunError::Interrupted
                } else {
                    RunError::TerminationTimeout(self.termination_timeout.unwrap_or_default())
                });
            }

            let results = handles
                .into_iter()
                .enumerate()
                .map(|(index, handle)| match handle.join() {
                    Ok(result) => result.map_err(RunError::from),
                    Err(_) => Err(RunError::WorkerPanicked(index)),
                })
                .collect::<Vec<_>>();
            (results, failure)
        });

        cpl.done();

        // Secondary failures carry the same root cause, so the first one
        // is enough
        let mut values = Vec::with_capacity(n);
        let mut first_error = failure;
        for result in results {
            match result {
                Ok(partial) => values.extend(partial),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            log::error!("Computation failed: {}", e);
            return Err(e);
        }

        debug_assert_eq!(values.len(), n);
        self.values = values.into_boxed_slice();
        self.supersteps = supersteps.load(Ordering::Relaxed);
        self.outcome = tracker.outcome();

        pl.item_name("superstep");
        pl.expected_updates(Some(self.supersteps));
        pl.start("Counting supersteps...");
        pl.update_with_count(self.supersteps);
        pl.done();

        if self.converged() {
            log::info!("Converged after {} superstep(s)", self.supersteps);
        } else {
            log::warn!(
                "Stopped after {} superstep(s) with {}/{} vertices halted",
                self.supersteps,
                tracker.len(),
                n
            );
        }
        Ok(())
    }
}

/// Splits `0..n` into `parts` contiguous nonempty ranges of almost equal
/// length.
fn partition(n: usize, parts: usize) -> impl Iterator<Item = Range<usize>> {
    debug_assert!(0 < parts && parts <= n);
    (0..parts).map(move |i| i * n / parts..(i + 1) * n / parts)
}

/*
 * SPDX-FileCopyrightText: 2026 The pregel contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use pregel::compute::PageRank;
use pregel::engine::{Pregel, preds};
use pregel::error::RunError;
use pregel::graph::NeighborMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// A ring with a chord, whose PageRank needs many supersteps at small
/// tolerances.
fn ring(n: usize) -> Result<NeighborMap> {
    let from = (0..n).chain([0]).collect::<Vec<_>>();
    let to = (0..n).map(|u| (u + 1) % n).chain([n / 2]).collect::<Vec<_>>();
    Ok(NeighborMap::from_arcs(n, &from, &to)?)
}

#[test]
fn test_panicking_compute() -> Result<()> {
    let graph = ring(16)?;
    let compute = |_: &[f64]| -> f64 { panic!("compute failed") };
    let mut pregel = Pregel::new(&graph, &compute);
    pregel.num_workers(Some(4));
    let result = pregel.run(preds::MaxSupersteps::default());
    assert!(
        matches!(result, Err(RunError::WorkerPanicked(w)) if w < 4),
        "{result:?}"
    );
    Ok(())
}

#[test]
fn test_barrier_timeout() -> Result<()> {
    let graph = ring(16)?;
    // The first call stalls its worker; the others give up at the barrier
    let stalled = AtomicBool::new(false);
    let compute = PageRank::new(16);
    let slow = |received: &[f64]| {
        if !stalled.swap(true, Ordering::Relaxed) {
            std::thread::sleep(Duration::from_millis(500));
        }
        pregel::compute::Compute::compute(&compute, received)
    };
    let mut pregel = Pregel::new(&graph, &slow);
    pregel
        .num_workers(Some(2))
        .barrier_timeout(Some(Duration::from_millis(50)));
    let result = pregel.run(preds::MaxSupersteps::default());
    assert!(
        matches!(result, Err(RunError::BarrierTimeout(t)) if t == Duration::from_millis(50)),
        "{result:?}"
    );
    Ok(())
}

#[test]
fn test_termination_timeout() -> Result<()> {
    let graph = ring(8)?;
    let compute = PageRank::new(8);
    let slow = |received: &[f64]| {
        std::thread::sleep(Duration::from_millis(5));
        pregel::compute::Compute::compute(&compute, received)
    };
    let mut pregel = Pregel::new(&graph, &slow);
    pregel
        .num_workers(Some(2))
        .tolerance(1E-15)
        .termination_timeout(Some(Duration::from_millis(100)));
    let result = pregel.run(preds::MaxSupersteps::default());
    assert!(
        matches!(result, Err(RunError::TerminationTimeout(t)) if t == Duration::from_millis(100)),
        "{result:?}"
    );
    Ok(())
}

#[test]
fn test_interrupt() -> Result<()> {
    let graph = ring(8)?;
    let compute = PageRank::new(8);
    let slow = |received: &[f64]| {
        std::thread::sleep(Duration::from_millis(5));
        pregel::compute::Compute::compute(&compute, received)
    };
    let mut pregel = Pregel::new(&graph, &slow);
    pregel.num_workers(Some(8)).tolerance(1E-15);
    let handle = pregel.interrupt_handle();
    let result = std::thread::scope(|s| {
        s.spawn(|| {
            std::thread::sleep(Duration::from_millis(100));
            handle.interrupt();
        });
        pregel.run(preds::MaxSupersteps::default())
    });
    assert!(handle.is_interrupted());
    assert!(matches!(result, Err(RunError::Interrupted)), "{result:?}");
    Ok(())
}

#[test]
fn test_rerun_after_success() -> Result<()> {
    let graph = ring(10)?;
    let compute = PageRank::new(10);
    let mut pregel = Pregel::new(&graph, &compute);
    pregel.run(preds::MaxSupersteps::from(2))?;
    assert_eq!(pregel.supersteps(), 2);
    pregel.run(preds::MaxSupersteps::default())?;
    assert!(pregel.converged());
    Ok(())
}

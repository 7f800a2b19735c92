/*
 * SPDX-FileCopyrightText: 2026 The pregel contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use anyhow::Result;
use dsi_progress_logger::{concurrent_progress_logger, progress_logger};
use pregel::compute::PageRank;
use pregel::engine::{Pregel, preds};
use pregel::error::{GraphError, RunError};
use pregel::graph::NeighborMap;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Builds a random graph with `n` nodes and about `n * avg_deg` arcs, plus a
/// cycle through all nodes, so that every node has a predecessor.
fn random_graph(n: usize, avg_deg: usize, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut from = Vec::new();
    let mut to = Vec::new();
    for u in 0..n {
        from.push(u);
        to.push((u + 1) % n);
    }
    for _ in 0..n * avg_deg {
        from.push(rng.random_range(0..n));
        to.push(rng.random_range(0..n));
    }
    (from, to)
}

/// Returns the ℓ-∞ distance between `rank` and one PageRank step applied to
/// `rank`.
fn fixed_point_error(graph: &NeighborMap, damping: f64, rank: &[f64]) -> f64 {
    let n = graph.num_nodes();
    let mut next = vec![(1.0 - damping) / n as f64; n];
    for u in 0..n {
        let share = rank[u] / graph.outdegree(u) as f64;
        for &v in graph.successors(u) {
            next[v] += damping * share;
        }
    }
    next.iter()
        .zip(rank)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

#[test]
fn test_star() -> Result<()> {
    // All leaves point to the center, which is a sink
    let n = 5;
    let mut graph = NeighborMap::from_arcs(n, &[1, 2, 3, 4], &[0, 0, 0, 0])?;
    assert_eq!(graph.patch_sinks()?, 1);
    assert_eq!(graph.successors(0), &[1, 2, 3, 4]);

    let compute = PageRank::new(n);
    let mut pregel = Pregel::new(&graph, &compute);
    pregel.num_workers(Some(n));
    assert_eq!(pregel.values(), &[0.2; 5]);
    pregel.run(preds::MaxSupersteps::default())?;

    assert!(pregel.converged());
    assert!(pregel.supersteps() < 100);

    // x₀ = 0.03 + 0.85 ∑ xᵢ, xᵢ = 0.03 + 0.85 x₀ / 4
    let center = 0.132 / 0.2775;
    let leaf = 0.03 + 0.85 * center / 4.0;
    let rank = pregel.values();
    assert!((rank[0] - center).abs() < 1E-3, "{}", rank[0]);
    for &r in &rank[1..] {
        assert!((r - leaf).abs() < 1E-3, "{}", r);
    }
    let sum: f64 = rank.iter().sum();
    assert!((sum - 1.0).abs() < 1E-2, "{}", sum);
    Ok(())
}

#[test]
fn test_with_logging() -> Result<()> {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Debug)
        .try_init();

    let n = 200;
    let (from, to) = random_graph(n, 4, 11);
    let mut pl = progress_logger![];
    let mut graph = NeighborMap::from_arcs_with_logging(n, &from, &to, &mut pl)?;
    graph.patch_sinks()?;
    let compute = PageRank::new(n);
    let mut pregel = Pregel::new(&graph, &compute);
    pregel.num_workers(Some(3));
    let mut cpl = concurrent_progress_logger![];
    pregel.run_with_logging(preds::MaxSupersteps::default(), &mut pl, &mut cpl)?;
    assert!(pregel.converged());
    assert_eq!(pregel.values().len(), n);
    Ok(())
}

#[test]
fn test_pagerank_fn() -> Result<()> {
    let rank = pregel::pagerank(5, &[1, 2, 3, 4], &[0, 0, 0, 0])?;
    assert_eq!(rank.len(), 5);
    assert!(rank[0] > rank[1]);
    assert!(rank[1..].iter().all(|&r| (r - rank[1]).abs() < 1E-3));
    Ok(())
}

#[test]
fn test_fixed_point() -> Result<()> {
    for &(n, avg_deg, seed) in &[(10, 2, 0), (100, 3, 1), (500, 5, 2), (1000, 1, 3)] {
        let (from, to) = random_graph(n, avg_deg, seed);
        let mut graph = NeighborMap::from_arcs(n, &from, &to)?;
        graph.patch_sinks()?;
        let compute = PageRank::new(n);
        let mut pregel = Pregel::new(&graph, &compute);
        pregel.tolerance(1E-10).num_workers(Some(4));
        pregel.run(preds::MaxSupersteps::from(10_000))?;

        assert!(pregel.converged(), "n={n} did not converge");
        let error = fixed_point_error(&graph, 0.85, pregel.values());
        assert!(error < 1E-8, "n={n} avg_deg={avg_deg}: error {error}");
    }
    Ok(())
}

#[test]
fn test_workers_agree() -> Result<()> {
    let n = 64;
    let (from, to) = random_graph(n, 3, 42);
    let mut graph = NeighborMap::from_arcs(n, &from, &to)?;
    graph.patch_sinks()?;
    let compute = PageRank::new(n);

    let mut ranks = Vec::new();
    for num_workers in [1, 3, 8, n] {
        let mut pregel = Pregel::new(&graph, &compute);
        pregel.tolerance(1E-9).num_workers(Some(num_workers));
        pregel.run(preds::MaxSupersteps::default())?;
        assert!(pregel.converged());
        ranks.push(pregel.values().to_vec());
    }
    for rank in &ranks[1..] {
        for (x, y) in rank.iter().zip(&ranks[0]) {
            assert!((x - y).abs() < 1E-7, "{x} != {y}");
        }
    }
    Ok(())
}

#[test]
fn test_no_predecessors_keep_initial_value() -> Result<()> {
    // Nobody points to 0, so it halts at superstep 1 without computing
    let n = 4;
    let mut graph = NeighborMap::from_arcs(n, &[0, 1, 2, 3], &[1, 2, 3, 1])?;
    graph.patch_sinks()?;
    let compute = PageRank::new(n);
    let mut pregel = Pregel::new(&graph, &compute);
    pregel.run(preds::MaxSupersteps::default())?;
    assert!(pregel.converged());
    assert_eq!(pregel.values()[0], 0.25);
    Ok(())
}

#[test]
fn test_max_supersteps() -> Result<()> {
    let n = 100;
    let (from, to) = random_graph(n, 2, 7);
    let mut graph = NeighborMap::from_arcs(n, &from, &to)?;
    graph.patch_sinks()?;
    let compute = PageRank::new(n);
    let mut pregel = Pregel::new(&graph, &compute);
    pregel.tolerance(1E-12);
    pregel.run(preds::MaxSupersteps::from(3))?;
    assert_eq!(pregel.supersteps(), 3);
    assert!(!pregel.converged());
    Ok(())
}

#[test]
fn test_custom_compute() -> Result<()> {
    // A compute function that keeps the maximum received value
    let n = 6;
    let mut graph = NeighborMap::from_arcs(n, &[0, 1, 2, 3, 4, 5], &[1, 2, 3, 4, 5, 0])?;
    graph.patch_sinks()?;
    let max = |received: &[f64]| received.iter().copied().fold(0.0, f64::max);
    let mut pregel = Pregel::new(&graph, &max);
    pregel.num_workers(Some(2));
    pregel.run(preds::MaxSupersteps::default())?;
    assert!(pregel.converged());
    assert!(pregel.values().iter().all(|&v| v == 1.0 / n as f64));
    Ok(())
}

#[test]
fn test_sink_patching_idempotent() -> Result<()> {
    let (from, to) = random_graph(50, 1, 5);
    let mut graph = NeighborMap::from_arcs(60, &from, &to)?;
    assert!(graph.num_sinks() >= 10);
    graph.patch_sinks()?;
    let once = graph.clone();
    assert_eq!(graph.patch_sinks()?, 0);
    assert_eq!(graph, once);
    assert_eq!(graph.num_sinks(), 0);
    Ok(())
}

#[test]
fn test_single_node_rejected() {
    assert!(matches!(
        pregel::pagerank(1, &[], &[]),
        Err(RunError::Graph(GraphError::TooFewNodes { num_nodes: 1 }))
    ));
    assert!(matches!(
        pregel::pagerank(1, &[0], &[0]),
        Err(RunError::Graph(GraphError::TooFewNodes { num_nodes: 1 }))
    ));
}

#[test]
fn test_malformed_input() {
    assert!(matches!(
        pregel::pagerank(3, &[0, 5], &[1, 2]),
        Err(RunError::Graph(GraphError::NodeOutOfRange {
            arc: 1,
            node: 5,
            num_nodes: 3
        }))
    ));
}

#[test]
fn test_unpatched_sinks() -> Result<()> {
    let graph = NeighborMap::from_arcs(3, &[0, 1], &[1, 0])?;
    let compute = PageRank::new(3);
    let mut pregel = Pregel::new(&graph, &compute);
    assert!(matches!(
        pregel.run(preds::MaxSupersteps::default()),
        Err(RunError::Graph(GraphError::NoNeighbors { node: 2 }))
    ));
    Ok(())
}

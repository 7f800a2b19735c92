/*
 * SPDX-FileCopyrightText: 2026 The pregel contributors
 *
 * SPDX-License-Identifier: Apache-2.0 OR LGPL-2.1-or-later
 */

use crate::{
    ArcsArgs, GlobalArgs, NumThreadsArg, create_parent_dir, get_thread_pool, num_threads_parser,
    parse_duration, read_arcs, write_values,
};
use anyhow::{Context, Result, ensure};
use clap::Parser;
use dsi_progress_logger::{ProgressLog, concurrent_progress_logger, progress_logger};
use predicates::prelude::*;
use pregel::compute::PageRank;
use pregel::engine::Pregel;
use pregel::engine::preds::{MaxSupersteps, MinHalted};
use pregel::graph::NeighborMap;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(
    name = "pagerank",
    about = "Compute PageRank with a vertex-centric bulk-synchronous-parallel engine. Arcs are read from a file, or from standard input, one per line, as pairs of node identifiers separated by a TAB (but the format is customizable). Final values are printed one per line in increasing order of node.",
    long_about = None
)]
pub struct CliArgs {
    /// The file containing the arcs; if missing, arcs are read from standard
    /// input.
    pub arcs: Option<PathBuf>,

    #[arg(short, long)]
    /// The number of nodes in the graph; if missing, the largest node
    /// identifier plus one.
    pub num_nodes: Option<usize>,

    #[arg(short, long)]
    /// Where to store the values; if missing, they are printed on standard
    /// output.
    pub output: Option<PathBuf>,

    #[arg(short, long, default_value_t = PageRank::DEFAULT_DAMPING)]
    /// The damping factor (must be in the interval [0 . . 1)).
    pub damping: f64,

    #[arg(short, long, default_value_t = Pregel::<PageRank>::DEFAULT_TOLERANCE)]
    /// A vertex votes to halt when its value changes by less than this
    /// amount.
    pub tolerance: f64,

    #[arg(long)]
    /// Maximum number of supersteps.
    pub max_supersteps: Option<usize>,

    #[arg(long)]
    /// Stop when at least this fraction of vertices has voted to halt.
    pub min_halted: Option<f64>,

    #[arg(short, long, value_parser = num_threads_parser)]
    /// The number of workers; if missing, the number of threads. Use the
    /// number of nodes for one worker per vertex.
    pub workers: Option<usize>,

    #[arg(long, value_parser = parse_duration)]
    /// Fail if a worker waits longer than this at a barrier (same syntax as
    /// --log-interval).
    pub barrier_timeout: Option<Duration>,

    #[arg(long, value_parser = parse_duration)]
    /// Fail if the computation takes longer than this (same syntax as
    /// --log-interval).
    pub timeout: Option<Duration>,

    #[arg(long)]
    /// Decimal digits of the output values.
    pub precision: Option<usize>,

    #[clap(flatten)]
    pub arcs_args: ArcsArgs,

    #[clap(flatten)]
    pub num_threads: NumThreadsArg,
}

pub fn main(global_args: GlobalArgs, args: CliArgs) -> Result<()> {
    ensure!(
        // Note that 0.0..1.0 is [0.0..1.0) in mathematical notation
        (0.0..1.0).contains(&args.damping),
        "The damping factor must be in [0 . . 1), got {}",
        args.damping
    );
    ensure!(
        args.tolerance > 0.0,
        "The tolerance must be positive, got {}",
        args.tolerance
    );

    let mut pl = progress_logger![];
    pl.display_memory(true);
    if let Some(log_interval) = global_args.log_interval {
        pl.log_interval(log_interval);
    }

    let mut cpl = concurrent_progress_logger![];
    cpl.display_memory(true);
    if let Some(log_interval) = global_args.log_interval {
        cpl.log_interval(log_interval);
    }

    let thread_pool = get_thread_pool(args.num_threads.num_threads)?;

    let (from, to) = match &args.arcs {
        Some(path) => {
            log::info!("Reading arcs from {}", path.display());
            let file = std::fs::File::open(path)
                .with_context(|| format!("Could not open {}", path.display()))?;
            read_arcs(BufReader::new(file), &args.arcs_args, &mut pl)?
        }
        None => {
            log::info!("Reading arcs from stdin...");
            read_arcs(std::io::stdin().lock(), &args.arcs_args, &mut pl)?
        }
    };

    let num_nodes = args.num_nodes.unwrap_or_else(|| {
        from.iter()
            .chain(&to)
            .max()
            .map_or(0, |&max_node| max_node + 1)
    });
    log::info!("Arcs read: {} Nodes: {}", from.len(), num_nodes);

    let graph = thread_pool.install(|| -> Result<NeighborMap> {
        let mut graph = NeighborMap::from_arcs_with_logging(num_nodes, &from, &to, &mut pl)?;
        graph.patch_sinks()?;
        Ok(graph)
    })?;
    drop((from, to));

    let mut predicate = MaxSupersteps::from(
        args.max_supersteps
            .unwrap_or(MaxSupersteps::DEFAULT_MAX_SUPERSTEPS),
    )
    .boxed();
    if let Some(min_halted) = args.min_halted {
        predicate = predicate.or(MinHalted::try_from(min_halted)?).boxed();
    }

    let mut compute = PageRank::new(num_nodes);
    compute.damping(args.damping);
    let mut pregel = Pregel::new(&graph, &compute);
    pregel
        .tolerance(args.tolerance)
        .num_workers(args.workers)
        .barrier_timeout(args.barrier_timeout)
        .termination_timeout(args.timeout);

    thread_pool.install(|| pregel.run_with_logging(predicate, &mut pl, &mut cpl))?;

    log::info!(
        "Completed after {} superstep(s), converged: {}",
        pregel.supersteps(),
        pregel.converged()
    );

    match &args.output {
        Some(path) => {
            create_parent_dir(path)?;
            let file = std::fs::File::create(path)
                .with_context(|| format!("Could not create {}", path.display()))?;
            log::info!("Storing values at {}", path.display());
            write_values(BufWriter::new(file), pregel.values(), args.precision)
        }
        None => write_values(
            BufWriter::new(std::io::stdout().lock()),
            pregel.values(),
            args.precision,
        ),
    }
}

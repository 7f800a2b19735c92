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

use anyhow::{Context, Result, anyhow, bail, ensure};
use clap::{Args, Parser, Subcommand};
use dsi_progress_logger::ProgressLog;
use std::io::{BufRead, Write};
use std::path::Path;
use std::time::{Duration, SystemTime};

pub mod pagerank;

#[derive(Args, Debug)]
/// Shared CLI arguments for reading files containing arcs.
pub struct ArcsArgs {
    #[arg(long, default_value_t = '#')]
    /// Ignore lines that start with this symbol.
    pub line_comment_symbol: char,

    #[arg(long, default_value_t = 0)]
    /// How many lines to skip at the start of the input.
    pub lines_to_skip: usize,

    #[arg(long)]
    /// How many arcs to parse, after skipping the first lines_to_skip and
    /// ignoring comment lines.
    pub max_arcs: Option<usize>,

    #[arg(long, default_value_t = '\t')]
    /// The column separator.
    pub separator: char,

    #[arg(long, default_value_t = 0)]
    /// The index of the column containing the source node of an arc.
    pub source_column: usize,

    #[arg(long, default_value_t = 1)]
    /// The index of the column containing the target node of an arc.
    pub target_column: usize,
}

impl Default for ArcsArgs {
    fn default() -> Self {
        Self {
            line_comment_symbol: '#',
            lines_to_skip: 0,
            max_arcs: None,
            separator: '\t',
            source_column: 0,
            target_column: 1,
        }
    }
}

/// Reads a list of arcs, one per line, returning the sources and the
/// targets.
///
/// Empty lines and lines starting with the comment symbol are ignored. Lines
/// with too few columns are logged and skipped; a column that is not a node
/// identifier is an error.
pub fn read_arcs(
    reader: impl BufRead,
    args: &ArcsArgs,
    pl: &mut impl ProgressLog,
) -> Result<(Vec<usize>, Vec<usize>)> {
    let mut from = Vec::new();
    let mut to = Vec::new();
    let biggest_idx = args.source_column.max(args.target_column);

    pl.item_name("arc");
    pl.expected_updates(args.max_arcs);
    pl.start("Reading arcs...");

    for (line_num, line) in reader.lines().enumerate().skip(args.lines_to_skip) {
        if args.max_arcs.is_some_and(|max_arcs| from.len() >= max_arcs) {
            break;
        }
        let line = line.with_context(|| format!("Could not read line {}", line_num + 1))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with(args.line_comment_symbol) {
            continue;
        }

        let vals = line.split(args.separator).collect::<Vec<_>>();
        if vals.len() <= biggest_idx {
            log::warn!(
                "Line {}: {:?} does not have enough columns: got {} columns but expected at least {} columns separated by {:?} (you can change the separator using the --separator option)",
                line_num + 1,
                line,
                vals.len(),
                biggest_idx + 1,
                args.separator,
            );
            continue;
        }

        let parse = |column: usize, what: &str| {
            vals[column].trim().parse::<usize>().with_context(|| {
                format!(
                    "Could not parse {} {:?} at line {} as a node identifier",
                    what,
                    vals[column],
                    line_num + 1
                )
            })
        };
        from.push(parse(args.source_column, "source")?);
        to.push(parse(args.target_column, "target")?);
        pl.light_update();
    }
    pl.done();

    if from.is_empty() {
        log::warn!(
            "No arcs read! Check that the --separator={:?} value is correct and that the --source-column={:?} and --target-column={:?} values are correct.",
            args.separator,
            args.source_column,
            args.target_column
        );
    }
    Ok((from, to))
}

/// Writes values, one per line, in the order of the slice.
///
/// If `precision` is `None`, values are written with the shortest
/// representation that reads back exactly.
pub fn write_values(mut writer: impl Write, values: &[f64], precision: Option<usize>) -> Result<()> {
    for value in values {
        match precision {
            None => writeln!(writer, "{value}"),
            Some(precision) => writeln!(writer, "{value:.precision$}"),
        }
        .context("Could not write values")?;
    }
    writer.flush().context("Could not flush values")?;
    Ok(())
}

/// Parses a positive number (of threads, or workers) from a string.
///
/// This function is meant to be used with `#[arg(...,  value_parser =
/// num_threads_parser)]`.
pub fn num_threads_parser(arg: &str) -> Result<usize> {
    let num_threads = arg.parse::<usize>()?;
    ensure!(num_threads > 0, "Number of threads must be greater than 0");
    Ok(num_threads)
}

/// Shared CLI arguments for commands that specify a number of threads.
#[derive(Args, Debug)]
pub struct NumThreadsArg {
    #[arg(short = 'j', long, default_value_t = rayon::current_num_threads().max(1), value_parser = num_threads_parser)]
    /// The number of threads of the pool used for graph preparation; unless
    /// --workers is given, it is also the number of workers.
    pub num_threads: usize,
}

/// Creates a [`ThreadPool`](rayon::ThreadPool) with the given number of threads.
pub fn get_thread_pool(num_threads: usize) -> Result<rayon::ThreadPool> {
    let thread_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .context("Failed to create thread pool")?;
    log::info!("Using {} threads", thread_pool.current_num_threads());
    Ok(thread_pool)
}

/// Creates all parent directories of the given file path.
pub fn create_parent_dir(file_path: impl AsRef<Path>) -> Result<()> {
    if let Some(parent_dir) = file_path.as_ref().parent() {
        std::fs::create_dir_all(parent_dir).with_context(|| {
            format!(
                "Failed to create the directory {:?}",
                parent_dir.to_string_lossy()
            )
        })?;
    }
    Ok(())
}

/// Parses a duration from a string.
///
/// If no suffix is given, the number is assumed to be in milliseconds.
/// The available suffixes are:
/// - `s` for seconds
/// - `m` for minutes
/// - `h` for hours
/// - `d` for days
///
/// Example: `1d2h3m4s567` is parsed as 1 day, 2 hours, 3 minutes, 4 seconds,
/// and 567 milliseconds.
pub fn parse_duration(value: &str) -> Result<Duration> {
    if value.is_empty() {
        bail!("Empty duration string, if you want every 0 milliseconds use `0`.");
    }
    let mut duration = Duration::from_secs(0);
    let mut acc = String::new();
    for c in value.chars() {
        if c.is_ascii_digit() {
            acc.push(c);
        } else if c.is_whitespace() {
            continue;
        } else {
            let dur = acc
                .parse::<u64>()
                .with_context(|| format!("Missing number before suffix {c:?}"))?;
            match c {
                's' => duration += Duration::from_secs(dur),
                'm' => duration += Duration::from_secs(dur * 60),
                'h' => duration += Duration::from_secs(dur * 60 * 60),
                'd' => duration += Duration::from_secs(dur * 60 * 60 * 24),
                _ => return Err(anyhow!("Invalid duration suffix: {}", c)),
            }
            acc.clear();
        }
    }
    if !acc.is_empty() {
        let dur = acc.parse::<u64>()?;
        duration += Duration::from_millis(dur);
    }
    Ok(duration)
}

/// Initializes the `env_logger` logger with a custom format including
/// timestamps with elapsed time since initialization.
pub fn init_env_logger() -> Result<()> {
    use jiff::SpanRound;
    use jiff::fmt::friendly::{Designator, Spacing, SpanPrinter};

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    let start = std::time::Instant::now();
    let printer = SpanPrinter::new()
        .spacing(Spacing::None)
        .designator(Designator::Compact);
    let span_round = SpanRound::new()
        .largest(jiff::Unit::Day)
        .smallest(jiff::Unit::Millisecond)
        .days_are_24_hours();

    builder.format(move |buf, record| {
        let Ok(ts) = jiff::Timestamp::try_from(SystemTime::now()) else {
            return Err(std::io::Error::other("Failed to get timestamp"));
        };
        let style = buf.default_level_style(record.level());
        let elapsed = start.elapsed();
        let span = jiff::Span::new()
            .seconds(elapsed.as_secs() as i64)
            .milliseconds(elapsed.subsec_millis() as i64)
            .round(span_round)
            .map_err(std::io::Error::other)?;
        writeln!(
            buf,
            "{} {} {style}{}{style:#} [{}] {} - {}",
            ts.strftime("%F %T%.3f"),
            printer.span_to_string(&span),
            record.level(),
            std::thread::current().name().unwrap_or("main"),
            record.target(),
            record.args()
        )
    });
    builder.try_init()?;
    Ok(())
}

#[derive(Args, Debug)]
pub struct GlobalArgs {
    #[arg(long, value_parser = parse_duration, global=true, display_order = 1000)]
    /// How often to log progress. Default is 10s. You can use the suffixes "s"
    /// for seconds, "m" for minutes, "h" for hours, and "d" for days. If no
    /// suffix is provided it is assumed to be in milliseconds.
    /// Example: "1d2h3m4s567" is parsed as 1 day + 2 hours + 3 minutes + 4
    /// seconds + 567 milliseconds = 93784567 milliseconds.
    pub log_interval: Option<Duration>,
}

#[derive(Subcommand, Debug)]
pub enum SubCommands {
    #[clap(name = "pagerank", visible_alias = "pr")]
    PageRank(pagerank::CliArgs),
}

#[derive(Parser, Debug)]
#[command(name = "pregel", version)]
/// Vertex-centric bulk-synchronous-parallel computations on graphs given as
/// arc lists.
///
/// Noteworthy environment variables:
///
/// - RUST_LOG: configuration for env_logger
///   <https://docs.rs/env_logger/latest/env_logger/>
///
/// - RUST_MIN_STACK: minimum thread stack size (in bytes)
pub struct Cli {
    #[command(subcommand)]
    pub command: SubCommands,
    #[clap(flatten)]
    pub args: GlobalArgs,
}

/// The entry point of the command-line interface.
pub fn cli_main<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let start = std::time::Instant::now();
    let cli = Cli::parse_from(args);
    match cli.command {
        SubCommands::PageRank(args) => {
            pagerank::main(cli.args, args)?;
        }
    }

    log::info!(
        "The command took {}",
        pretty_print_elapsed(start.elapsed().as_secs_f64())
    );

    Ok(())
}

/// Pretty-prints seconds in a human-readable format.
fn pretty_print_elapsed(elapsed: f64) -> String {
    let mut result = String::new();
    let mut elapsed_seconds = elapsed as u64;
    let days = elapsed_seconds / (60 * 60 * 24);
    elapsed_seconds %= 60 * 60 * 24;
    let hours = elapsed_seconds / (60 * 60);
    elapsed_seconds %= 60 * 60;
    let minutes = elapsed_seconds / 60;

    for (amount, unit) in [(days, "day"), (hours, "hour"), (minutes, "minute")] {
        match amount {
            0 => {}
            1 => result.push_str(&format!("1 {unit} ")),
            _ => result.push_str(&format!("{amount} {unit}s ")),
        }
    }

    result.push_str(&format!("{:.3} seconds ({}s)", elapsed % 60.0, elapsed));
    result
}

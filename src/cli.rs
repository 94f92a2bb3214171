//! Command-line interface for the sharedmap harness.

use std::fmt;

use clap::{Parser, Subcommand, ValueEnum};

/// Command-line arguments for the harness.
#[derive(Debug, Parser)]
#[command(version, about)]
pub(crate) struct Args {
    /// The workload to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// What workload to run.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Have many callers fill and partially drain disjoint key ranges, then check that no update
    /// was lost.
    ///
    /// Exits with a failure status code if the final size is wrong or if any add or delete
    /// reported an unexpected prior state.
    #[clap(alias = "fuzz")]
    Stress(StressArgs),
    /// Time a random mix of operations against the map and against a mutex-guarded `HashMap`.
    #[clap(alias = "bench")]
    Compare(CompareArgs),
}

/// Which rendition of the map to exercise.
#[derive(Debug, Default, Clone, Copy, ValueEnum)]
pub(crate) enum Flavor {
    /// The owner is a Tokio task and callers are Tokio tasks.
    #[default]
    #[clap(alias = "tokio")]
    Async,
    /// The owner is a dedicated thread and callers are threads.
    #[clap(alias = "thread")]
    Blocking,
}

impl fmt::Display for Flavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Async => "async",
            Self::Blocking => "blocking",
        })
    }
}

/// Arguments for the stress workload.
#[derive(Debug, Parser)]
pub(crate) struct StressArgs {
    /// Number of concurrent callers.
    #[arg(short, long, default_value_t = 100)]
    pub(crate) callers: u64,
    /// Number of keys each caller adds. Every other one is deleted again afterwards.
    #[arg(short, long, default_value_t = 10_000)]
    pub(crate) keys: u64,
    /// Which rendition of the map to exercise.
    #[arg(value_enum, short, long, default_value_t)]
    pub(crate) flavor: Flavor,
}

/// Arguments for the comparison workload.
#[derive(Debug, Parser)]
pub(crate) struct CompareArgs {
    /// Number of concurrent callers.
    #[arg(short, long, default_value_t = 100)]
    pub(crate) callers: u64,
    /// Number of operations each caller performs.
    #[arg(short, long, default_value_t = 10_000)]
    pub(crate) ops: u64,
    /// One in this many operations is a write; the rest are reads.
    #[arg(long, default_value_t = 40, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) read_ratio: u32,
    /// One in this many writes is a delete; the rest are adds.
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) delete_ratio: u32,
    /// Keys are drawn uniformly from zero up to this value.
    #[arg(long, default_value_t = 1_000_000, value_parser = clap::value_parser!(u32).range(1..))]
    pub(crate) key_space: u32,
}

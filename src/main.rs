//! A harness that exercises the map from the command line.
//!
//! For usage, run `cargo run --features binary -- --help`. Set `RUST_LOG` to see the map's own
//! tracing output.

mod cli;

use crate::cli::{Args, Command, CompareArgs, Flavor, StressArgs};
use clap::Parser as _;
use futures::future;
use rand::rngs::SmallRng;
use rand::{Rng as _, SeedableRng as _};
use sharedmap::{blocking, MapError, SharedMap};
use std::collections::HashMap;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// A custom error message.
#[derive(Debug)]
struct ErrStr(&'static str);

impl std::error::Error for ErrStr {}

impl std::fmt::Display for ErrStr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let Args { command } = Args::parse();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    match command {
        Command::Stress(args) => stress(args, &runtime),
        Command::Compare(args) => runtime.block_on(compare(args)),
    }
}

/// Fill and partially drain disjoint key ranges from many callers at once.
///
/// Caller `n` adds keys `n * keys..(n + 1) * keys`, then deletes every other one of them starting
/// with the first. Every add must report a fresh key and every delete a present one, and the map
/// must end with exactly the undeleted keys.
fn stress(
    StressArgs {
        callers,
        keys,
        flavor,
    }: StressArgs,
    runtime: &Runtime,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    if callers.checked_mul(keys).is_none() {
        return Err(Box::new(ErrStr("callers * keys overflows the key type")));
    }

    info!(callers, keys, %flavor, "starting stress run");
    let start = Instant::now();
    let (size, unexpected) = match flavor {
        Flavor::Async => runtime.block_on(stress_async(callers, keys))?,
        Flavor::Blocking => stress_blocking(callers, keys)?,
    };
    let elapsed = start.elapsed();

    let expected = usize::try_from(callers * (keys / 2))?;
    info!(size, expected, unexpected, ?elapsed, "stress run finished");

    if size != expected || unexpected != 0 {
        error!(size, expected, unexpected, "lost or duplicated updates");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

/// Run the stress workload against [`SharedMap`] from Tokio tasks.
async fn stress_async(
    callers: u64,
    keys: u64,
) -> Result<(usize, u64), Box<dyn std::error::Error>> {
    let map = SharedMap::new();

    let tasks = (0..callers).map(|caller| {
        let map = map.clone();
        tokio::spawn(async move {
            let range = caller * keys..(caller + 1) * keys;
            let mut unexpected = 0_u64;
            for key in range.clone() {
                if map.add(key, caller).await? {
                    unexpected += 1;
                }
            }
            for key in range.step_by(2) {
                if !map.delete(key).await? {
                    unexpected += 1;
                }
            }
            Ok::<_, MapError>(unexpected)
        })
    });
    let mut unexpected = 0;
    for result in future::try_join_all(tasks).await? {
        unexpected += result?;
    }

    let size = map.size().await?;
    map.close();
    Ok((size, unexpected))
}

/// Run the stress workload against [`blocking::SharedMap`] from threads.
fn stress_blocking(callers: u64, keys: u64) -> Result<(usize, u64), Box<dyn std::error::Error>> {
    let map = blocking::SharedMap::new()?;

    let unexpected = thread::scope(|scope| {
        let threads: Vec<_> = (0..callers)
            .map(|caller| {
                let map = map.clone();
                scope.spawn(move || {
                    let range = caller * keys..(caller + 1) * keys;
                    let mut unexpected = 0_u64;
                    for key in range.clone() {
                        if map.add(key, caller)? {
                            unexpected += 1;
                        }
                    }
                    for key in range.step_by(2) {
                        if !map.delete(key)? {
                            unexpected += 1;
                        }
                    }
                    Ok::<_, MapError>(unexpected)
                })
            })
            .collect();
        let mut unexpected = 0;
        for thread in threads {
            let result = thread
                .join()
                .map_err(|_| ErrStr("a stress caller panicked"))?;
            unexpected += result?;
        }
        Ok::<_, Box<dyn std::error::Error>>(unexpected)
    })?;

    let size = map.size()?;
    map.close();
    Ok((size, unexpected))
}

/// An operation drawn by the comparison workload.
#[derive(Debug, Clone, Copy)]
enum Op {
    /// Read a key.
    Get(u32),
    /// Write a key.
    Add(u32),
    /// Remove a key.
    Delete(u32),
}

impl CompareArgs {
    /// Draw the next operation according to the configured ratios.
    fn next_op(&self, rng: &mut SmallRng) -> Op {
        let key = rng.gen_range(0..self.key_space);
        if rng.gen_range(0..self.read_ratio) > 0 {
            Op::Get(key)
        } else if rng.gen_range(0..self.delete_ratio) > 0 {
            Op::Add(key)
        } else {
            Op::Delete(key)
        }
    }
}

/// Time the same random workload against [`SharedMap`] and against a mutex-guarded `HashMap`.
async fn compare(args: CompareArgs) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = Arc::new(args);
    info!(
        callers = args.callers,
        ops = args.ops,
        read_ratio = args.read_ratio,
        delete_ratio = args.delete_ratio,
        "starting comparison"
    );

    let shared = compare_shared_map(Arc::clone(&args)).await?;
    let mutex = compare_mutex_map(Arc::clone(&args)).await?;

    let total_ops = args.callers * args.ops;
    for (name, elapsed) in [("shared map", shared), ("mutex map", mutex)] {
        #[allow(clippy::print_stdout)]
        {
            println!(
                "{name}: {total_ops} ops in {elapsed:?} ({:.1} ns/op)",
                elapsed.as_nanos() as f64 / total_ops.max(1) as f64,
            );
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Run the comparison workload against [`SharedMap`].
async fn compare_shared_map(
    args: Arc<CompareArgs>,
) -> Result<Duration, Box<dyn std::error::Error>> {
    let map = SharedMap::new();
    let start = Instant::now();

    let tasks = (0..args.callers).map(|_| {
        let map = map.clone();
        let args = Arc::clone(&args);
        tokio::spawn(async move {
            let mut rng = SmallRng::from_entropy();
            for _ in 0..args.ops {
                match args.next_op(&mut rng) {
                    Op::Get(key) => {
                        let _value = map.get(key).await?;
                    }
                    Op::Add(key) => {
                        let _existed = map.add(key, key).await?;
                    }
                    Op::Delete(key) => {
                        let _found = map.delete(key).await?;
                    }
                }
            }
            Ok::<_, MapError>(())
        })
    });
    for result in future::try_join_all(tasks).await? {
        result?;
    }

    let elapsed = start.elapsed();
    map.close();
    Ok(elapsed)
}

/// Run the comparison workload against a `HashMap` behind a `Mutex`.
async fn compare_mutex_map(
    args: Arc<CompareArgs>,
) -> Result<Duration, Box<dyn std::error::Error>> {
    let map = Arc::new(Mutex::new(HashMap::new()));
    let start = Instant::now();

    let tasks = (0..args.callers).map(|_| {
        let map = Arc::clone(&map);
        let args = Arc::clone(&args);
        tokio::spawn(async move {
            let mut rng = SmallRng::from_entropy();
            for _ in 0..args.ops {
                let op = args.next_op(&mut rng);
                let Ok(mut map) = map.lock() else {
                    return Err(ErrStr("mutex map poisoned"));
                };
                match op {
                    Op::Get(key) => {
                        let _value = map.get(&key);
                    }
                    Op::Add(key) => {
                        let _previous = map.insert(key, key);
                    }
                    Op::Delete(key) => {
                        let _removed = map.remove(&key);
                    }
                }
            }
            Ok(())
        })
    });
    for result in future::try_join_all(tasks).await? {
        result?;
    }

    Ok(start.elapsed())
}

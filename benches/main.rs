#![allow(
    missing_docs,
    clippy::missing_docs_in_private_items,
    unused_results,
    clippy::unwrap_used
)]

mod mutex_map;

use criterion::Criterion;
use rand::Rng as _;
use tracing::Dispatch;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::Layer;
use tracing_subscriber::prelude::*;
use tracing_timing::{Builder, Histogram};

/// Keys are drawn uniformly from `0..KEY_SPACE`.
const KEY_SPACE: u32 = 1_000_000;
/// Number of concurrent callers in each benchmark.
const CONCURRENCY: [usize; 4] = [1, 10, 100, 1_000];

#[derive(Debug, Clone, Copy)]
enum Op {
    Get(u32),
    Add(u32),
    Delete(u32),
}

/// The mix of operations each caller issues.
#[derive(Debug, Clone, Copy)]
struct Workload {
    /// One in this many operations is a write.
    read_to_write: u32,
    /// One in this many writes is a delete.
    add_to_delete: u32,
}

impl Workload {
    fn next_op(self, rng: &mut impl rand::Rng) -> Op {
        let key = rng.gen_range(0..KEY_SPACE);
        if rng.gen_range(0..self.read_to_write) > 0 {
            Op::Get(key)
        } else if rng.gen_range(0..self.add_to_delete) > 0 {
            Op::Add(key)
        } else {
            Op::Delete(key)
        }
    }
}

fn create_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
}

#[allow(clippy::significant_drop_tightening)] // false positive
fn main() {
    let timing_layer = Builder::default().layer(|| Histogram::new(1).unwrap());
    let downcaster = timing_layer.downcaster();

    let subscriber = tracing_subscriber::registry()
        .with(Layer::new().with_filter(EnvFilter::from_default_env()))
        .with(timing_layer);

    let dispatch = Dispatch::new(subscriber);
    tracing::dispatcher::set_global_default(dispatch.clone())
        .expect("setting tracing default failed");

    shared_map::shared_map();
    mutex_map::mutex_map();

    Criterion::default().configure_from_args().final_summary();

    let timings = downcaster.downcast(&dispatch).unwrap();
    timings.force_synchronize();
    timings.with_histograms(|hs| {
        let Some(hs) = hs.get("map_owner") else {
            return;
        };
        #[allow(clippy::print_stdout)]
        for (event_group, h) in hs {
            println!(
                "[map_owner:{event_group}] mean: {:.1}ns, min: {:.1}ns, max: {:.1}ns, \
                    stdev: {:.1}ns",
                h.mean(),
                h.min(),
                h.max(),
                h.stdev(),
            );
        }
    });
}

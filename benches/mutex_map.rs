use crate::{create_runtime, Op, Workload, CONCURRENCY};
use criterion::{criterion_group, BenchmarkId, Criterion};
use futures::future;
use rand::rngs::SmallRng;
use rand::SeedableRng as _;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

// A lock is cheap enough that the baseline is run write-heavy.
const WORKLOAD: Workload = Workload {
    read_to_write: 4,
    add_to_delete: 100,
};

fn mutex_map_mixed(c: &mut Criterion) {
    let runtime = create_runtime();
    let mut group = c.benchmark_group("mutex_map");

    for callers in CONCURRENCY {
        group.bench_with_input(
            BenchmarkId::from_parameter(callers),
            &callers,
            |b, &callers| {
                b.to_async(&runtime).iter_custom(|iters| async move {
                    let map = Arc::new(Mutex::new(HashMap::new()));
                    let start = Instant::now();
                    let tasks = (0..callers).map(|_| {
                        let map = Arc::clone(&map);
                        tokio::spawn(async move {
                            let mut rng = SmallRng::from_entropy();
                            for _ in 0..iters {
                                let op = WORKLOAD.next_op(&mut rng);
                                let mut map = map.lock().unwrap();
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
                        })
                    });
                    future::try_join_all(tasks).await.unwrap();
                    start.elapsed()
                });
            },
        );
    }

    group.finish();
}

criterion_group!(mutex_map, mutex_map_mixed);

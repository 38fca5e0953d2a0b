use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use semalock::{HybridMutex, Registry};
use std::{
    iter,
    sync::Barrier,
    thread,
    time::{Duration, Instant},
};

struct Options {
    n_threads: usize,
    n_locks: usize,
    n_ops: usize,
}

fn random_numbers(seed: u32) -> impl Iterator<Item = u32> {
    let mut random = seed;
    iter::repeat_with(move || {
        random ^= random << 13;
        random ^= random >> 17;
        random ^= random << 5;
        random
    })
}

fn run(registry: &Registry, options: &Options) -> Duration {
    let locks = (0..options.n_locks)
        .map(|_| HybridMutex::new())
        .collect::<Vec<_>>();
    let start_barrier = Barrier::new(options.n_threads + 1);
    let end_barrier = Barrier::new(options.n_threads + 1);

    thread::scope(|s| {
        for thread_seed in random_numbers(0x6F4A955E).take(options.n_threads) {
            let (locks, start_barrier, end_barrier) = (&locks, &start_barrier, &end_barrier);
            s.spawn(move || {
                let worker = registry.register().expect("bench worker slot");
                start_barrier.wait();
                for idx in random_numbers(thread_seed | 1)
                    .map(|n| n as usize % options.n_locks)
                    .take(options.n_ops)
                {
                    let _guard = locks[idx].lock(&worker);
                }
                end_barrier.wait();
            });
        }

        start_barrier.wait();
        let started = Instant::now();
        end_barrier.wait();
        started.elapsed()
    })
}

fn bench_contention(c: &mut Criterion) {
    let registry = Registry::default();
    let mut group = c.benchmark_group("hybrid_mutex");

    for n_threads in [1, 2, 4, 8] {
        for n_locks in [1, 16] {
            let options = Options {
                n_threads,
                n_locks,
                n_ops: 1_000,
            };
            group.throughput(Throughput::Elements((n_threads * options.n_ops) as u64));
            group.bench_with_input(
                BenchmarkId::new(format!("{}_locks", n_locks), n_threads),
                &options,
                |b, options| {
                    b.iter_custom(|iters| (0..iters).map(|_| run(&registry, options)).sum());
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_contention);
criterion_main!(benches);

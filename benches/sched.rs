/// Benchmark suite for the worker pool and the pixel spin lock
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polyraster::sched::{Arg, Pool};
use polyraster::SpinLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn bench_spinlock_uncontended(c: &mut Criterion) {
    c.bench_function("spinlock_uncontended", |b| {
        let lock = SpinLock::new();
        b.iter(|| {
            let _guard = black_box(&lock).lock();
        });
    });
}

fn bench_pool_fork_join(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_fork_join_1000");
    for &workers in &[1usize, 2, 4, 8] {
        let pool = Pool::with_workers(workers).unwrap();
        let sum = Arc::new(AtomicU64::new(0));
        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| {
                pool.add(1000);
                for i in 0..1000u64 {
                    let sum = Arc::clone(&sum);
                    pool.run(move || {
                        sum.fetch_add(black_box(i), Ordering::Relaxed);
                    });
                }
                pool.wait();
            });
        });
    }
    group.finish();
}

fn add_one(arg: Arg) {
    if let Ok(counter) = arg.downcast::<Arc<AtomicU64>>() {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

fn bench_pool_run_with_args(c: &mut Criterion) {
    c.bench_function("pool_run_with_args_1000", |b| {
        let pool = Pool::with_workers(4).unwrap();
        let counter = Arc::new(AtomicU64::new(0));
        b.iter(|| {
            pool.add(1000);
            for _ in 0..1000 {
                pool.run_with_args(add_one, Box::new(Arc::clone(&counter)));
            }
            pool.wait();
        });
    });
}

fn bench_pool_empty_wait(c: &mut Criterion) {
    c.bench_function("pool_empty_wait", |b| {
        let pool = Pool::with_workers(2).unwrap();
        b.iter(|| pool.wait());
    });
}

criterion_group!(
    benches,
    bench_spinlock_uncontended,
    bench_pool_fork_join,
    bench_pool_run_with_args,
    bench_pool_empty_wait,
);

criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::thread;
use tally_core::GuardedCounter;

fn uncontended(c: &mut Criterion) {
    let counter = GuardedCounter::new();
    c.bench_function("increment_uncontended", |b| {
        b.iter(|| counter.increment().unwrap());
    });
    c.bench_function("read_uncontended", |b| b.iter(|| black_box(counter.read())));
}

fn contended(c: &mut Criterion) {
    let mut group = c.benchmark_group("increment_contended");
    for threads in [2usize, 4, 8] {
        group.bench_with_input(BenchmarkId::from_parameter(threads), &threads, |b, &threads| {
            b.iter(|| {
                let counter = GuardedCounter::new();
                thread::scope(|scope| {
                    for _ in 0..threads {
                        scope.spawn(|| {
                            for _ in 0..1000 {
                                counter.increment().unwrap();
                            }
                        });
                    }
                });
                black_box(counter.into_inner())
            });
        });
    }
    group.finish();
}

criterion_group!(benches, uncontended, contended);
criterion_main!(benches);

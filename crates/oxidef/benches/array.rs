// Array benchmarks
//
// Measures the splice primitive through its common entry points and the
// sort / search helpers:
// - Append with linear chunked growth
// - Insert at the front (full tail move)
// - Quicksort on random and presorted input
// - Leftmost binary search

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use oxidef::collections::{Array, CallbackSet};
use oxidef_mem::default_allocator;

fn words(n: u64) -> Array<u64> {
    let mut array = Array::new_mutable(default_allocator(), CallbackSet::null()).unwrap();
    for i in 0..n {
        array.append(i).unwrap();
    }
    array
}

fn shuffled(n: u64) -> Array<u64> {
    let mut state = 0x9E37_79B9_u64;
    let mut array = Array::new_mutable(default_allocator(), CallbackSet::null()).unwrap();
    for _ in 0..n {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        array.append(state % (n * 4)).unwrap();
    }
    array
}

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_append");

    for n in [16u64, 256, 4_096] {
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| words(black_box(n)));
        });
    }

    group.finish();
}

fn bench_insert_front(c: &mut Criterion) {
    c.bench_function("array_insert_front_1000", |b| {
        b.iter(|| {
            let mut array = Array::new_mutable(default_allocator(), CallbackSet::null()).unwrap();
            for i in 0..1_000u64 {
                array.insert(0, black_box(i)).unwrap();
            }
            array
        });
    });
}

fn bench_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("array_sort");

    group.bench_function("random_10000", |b| {
        b.iter_batched(
            || shuffled(10_000),
            |mut array| {
                let len = array.len();
                array.sort(0..len, |a, b| a.cmp(b));
                array
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.bench_function("sorted_10000", |b| {
        b.iter_batched(
            || words(10_000),
            |mut array| {
                let len = array.len();
                array.sort(0..len, |a, b| a.cmp(b));
                array
            },
            criterion::BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn bench_binary_search(c: &mut Criterion) {
    let array = words(100_000);
    c.bench_function("array_binary_search", |b| {
        let mut target = 0u64;
        b.iter(|| {
            target = (target + 7_919) % 100_000;
            black_box(array.binary_search(0..array.len(), &target, |a, b| a.cmp(b)))
        });
    });
}

criterion_group!(
    benches,
    bench_append,
    bench_insert_front,
    bench_sort,
    bench_binary_search
);
criterion_main!(benches);

// Allocator benchmarks for the OxideF memory crate
//
// Compares the system allocator, the bump arena and the budgeted wrapper on
// the request sizes the runtime issues most: instance headers and small
// collection buffers.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use oxidef_mem::{
    Allocator, ArenaAllocator, LimitedAllocator, RawBuffer, SystemAllocator,
    default_allocator,
};
use std::alloc::Layout;
use std::sync::Arc;

fn bench_allocate_free(c: &mut Criterion) {
    let mut group = c.benchmark_group("allocate_free");

    for size in [32usize, 64, 256, 1024] {
        let layout = Layout::from_size_align(size, 16).unwrap();

        group.bench_with_input(BenchmarkId::new("system", size), &layout, |b, &layout| {
            let alloc = SystemAllocator;
            b.iter(|| {
                let ptr = alloc.allocate(black_box(layout)).unwrap();
                unsafe { alloc.deallocate(ptr, layout) };
            });
        });

        group.bench_with_input(BenchmarkId::new("limited", size), &layout, |b, &layout| {
            let alloc = LimitedAllocator::unlimited(default_allocator());
            b.iter(|| {
                let ptr = alloc.allocate(black_box(layout)).unwrap();
                unsafe { alloc.deallocate(ptr, layout) };
            });
        });
    }

    group.finish();
}

fn bench_arena_bump(c: &mut Criterion) {
    let mut group = c.benchmark_group("arena_bump");

    for size in [32usize, 256] {
        let layout = Layout::from_size_align(size, 16).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &layout, |b, &layout| {
            let arena = ArenaAllocator::new(64 * 1024);
            b.iter(|| arena.allocate(black_box(layout)).unwrap());
        });
    }

    group.finish();
}

fn bench_buffer_growth(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_growth");

    group.bench_function("linear_16", |b| {
        b.iter(|| {
            let mut buffer: RawBuffer<usize> = RawBuffer::new_in(default_allocator());
            let mut capacity = 0;
            while capacity < 4096 {
                capacity += 16;
                buffer.try_resize(black_box(capacity)).unwrap();
            }
            buffer
        });
    });

    group.bench_function("arena_linear_16", |b| {
        b.iter(|| {
            let arena = Arc::new(ArenaAllocator::new(64 * 1024));
            let mut buffer: RawBuffer<usize> = RawBuffer::new_in(arena);
            let mut capacity = 0;
            while capacity < 4096 {
                capacity += 16;
                buffer.try_resize(black_box(capacity)).unwrap();
            }
            buffer
        });
    });

    group.finish();
}

criterion_group!(benches, bench_allocate_free, bench_arena_bump, bench_buffer_growth);
criterion_main!(benches);

// Hash table benchmarks
//
// Measures the engine behind dictionaries, sets and bags:
// - Insertion with growth from the smallest prime
// - Lookup hits and misses on a populated table
// - Removal with shrinking
// - Object keys hashed through the runtime

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use oxidef::collections::{CallbackSet, Dictionary, HashTable, Multiplicity};
use oxidef::{Object, Runtime, RuntimeConfig};
use oxidef_mem::default_allocator;

fn populated(n: u64) -> HashTable<u64, u64> {
    HashTable::with_values(
        default_allocator(),
        Multiplicity::Unique,
        (0..n).map(|k| (k, k)),
        CallbackSet::values(),
        CallbackSet::null(),
    )
    .unwrap()
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_table_insert");

    for n in [100u64, 1_000, 10_000] {
        group.throughput(Throughput::Elements(n));
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, &n| {
            b.iter(|| {
                let mut table: HashTable<u64, u64> = HashTable::new(
                    default_allocator(),
                    Multiplicity::Unique,
                    CallbackSet::values(),
                    CallbackSet::null(),
                )
                .unwrap();
                for k in 0..n {
                    table.set(black_box(k), k).unwrap();
                }
                table
            });
        });
    }

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("hash_table_lookup");
    let table = populated(10_000);

    group.bench_function("hit", |b| {
        let mut k = 0;
        b.iter(|| {
            k = (k + 7) % 10_000;
            black_box(table.get(&k))
        });
    });

    group.bench_function("miss", |b| {
        let mut k = 10_000;
        b.iter(|| {
            k += 1;
            black_box(table.get(&k))
        });
    });

    group.finish();
}

fn bench_remove(c: &mut Criterion) {
    c.bench_function("hash_table_remove_all_keys", |b| {
        b.iter_batched(
            || populated(1_000),
            |mut table| {
                for k in 0..1_000 {
                    table.remove(&k);
                }
                table
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_object_keys(c: &mut Criterion) {
    let rt = Runtime::new(RuntimeConfig::default());
    let keys: Vec<Object> = (0..1_000i64)
        .map(|n| rt.create_native(None, format!("key-{n}")).unwrap().into())
        .collect();
    let mut dict = Dictionary::new(
        default_allocator(),
        CallbackSet::objects(),
        CallbackSet::objects(),
    )
    .unwrap();
    for key in &keys {
        dict.set(key.clone(), key.clone()).unwrap();
    }

    c.bench_function("dictionary_string_object_lookup", |b| {
        let mut i = 0;
        b.iter(|| {
            i = (i + 1) % keys.len();
            black_box(dict.get(&keys[i]))
        });
    });
}

criterion_group!(
    benches,
    bench_insert,
    bench_lookup,
    bench_remove,
    bench_object_keys
);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rowdex::{Base64Order, CollectionConfig, CollectionEnv, ExecutorConfig, RowCollection, RowSchema, SortExecutor, Unbounded};
use std::sync::Arc;
use rand::Rng;

const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

/// Helper to create random 12-byte url hashes
fn random_hashes(count: usize) -> Vec<[u8; 12]> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let mut key = [0u8; 12];
            for b in key.iter_mut() {
                *b = ALPHABET[rng.gen_range(0..ALPHABET.len())];
            }
            key
        })
        .collect()
}

fn schema() -> Arc<RowSchema> {
    Arc::new(RowSchema::parse("byte[] hash-12, Cardinal date-4", Arc::new(Base64Order)).unwrap())
}

fn filled(env: CollectionEnv, keys: &[[u8; 12]]) -> RowCollection {
    let mut coll = RowCollection::with_env(schema(), keys.len(), env).unwrap();
    let mut record = [0u8; 16];
    for (i, key) in keys.iter().enumerate() {
        record[..12].copy_from_slice(key);
        record[12..].copy_from_slice(&(i as u32).to_be_bytes());
        coll.append(&record).unwrap();
    }
    coll
}

/// Benchmark appends into a collection that grows from empty
fn bench_append(c: &mut Criterion) {
    let keys = random_hashes(10_000);
    c.bench_function("append_10k_from_empty", |b| {
        b.iter(|| black_box(filled(CollectionEnv::default(), &keys)));
    });
}

/// Benchmark sequential vs pooled sorting across sizes
fn bench_sort(c: &mut Criterion) {
    let executor = SortExecutor::start(ExecutorConfig::default()).unwrap();
    let pooled = CollectionEnv::new(CollectionConfig::default(), Arc::new(Unbounded), Some(executor.clone())).unwrap();
    let mut group = c.benchmark_group("sort");

    for size in [1_000, 10_000, 100_000].iter() {
        let keys = random_hashes(*size);
        group.bench_with_input(BenchmarkId::new("sequential", size), size, |b, _| {
            b.iter_batched(
                || filled(CollectionEnv::default(), &keys),
                |mut coll| {
                    coll.sort();
                    coll
                },
                criterion::BatchSize::LargeInput,
            );
        });
        group.bench_with_input(BenchmarkId::new("pooled", size), size, |b, _| {
            b.iter_batched(
                || filled(pooled.clone(), &keys),
                |mut coll| {
                    coll.sort();
                    coll
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }

    group.finish();
    executor.shutdown();
}

/// Benchmark folding a short unsorted tail into a large sorted prefix
fn bench_short_tail(c: &mut Criterion) {
    let keys = random_hashes(50_010);
    c.bench_function("sort_tail_of_10", |b| {
        b.iter_batched(
            || {
                let mut coll = filled(CollectionEnv::default(), &keys[..50_000]);
                coll.sort();
                let mut record = [0u8; 16];
                for key in &keys[50_000..] {
                    record[..12].copy_from_slice(key);
                    coll.append(&record).unwrap();
                }
                coll
            },
            |mut coll| {
                coll.sort();
                coll
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

/// Benchmark duplicate removal on a doubled key set
fn bench_dedup(c: &mut Criterion) {
    let keys = random_hashes(20_000);
    let doubled: Vec<[u8; 12]> = keys.iter().chain(keys.iter()).copied().collect();
    c.bench_function("dedup_40k_half_duplicates", |b| {
        b.iter_batched(
            || filled(CollectionEnv::default(), &doubled),
            |mut coll| black_box(coll.dedup_in_place().unwrap()),
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_append, bench_sort, bench_short_tail, bench_dedup);
criterion_main!(benches);

//! The same lower-bound measurements expressed with criterion, for cross-checking harness numbers

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use lower_bound_bench::{
    generators::DatasetGenerator, input::PreparedInput, ContainerKind, Order, SetContainer,
    SortedContainer, ValueType, VectorContainer,
};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use std::hint::black_box;

const SIZES: [usize; 3] = [1 << 4, 1 << 10, 1 << 14];

fn lower_bound_group<V: ValueType, C: ContainerKind>(c: &mut Criterion) {
    let mut group = c.benchmark_group(format!("lower_bound/{}/{}", V::NAME, C::NAME));

    for size in SIZES {
        let mut generator = DatasetGenerator::<V>::new(size, Order::Random);

        let mut input = PreparedInput::<C, V>::prepare(generator.next_dataset()).unwrap();
        group.bench_function(BenchmarkId::new("precomputed", size), |b| {
            b.iter(|| {
                black_box(input.search());
            })
        });

        let dataset = generator.next_dataset();
        let mut rng = SmallRng::seed_from_u64(42);
        group.bench_function(BenchmarkId::new("inline", size), |b| {
            b.iter_batched(
                || {
                    let needle = dataset[rng.gen_range(0..dataset.len())].clone();
                    (C::sorted_from(dataset.clone()), needle)
                },
                |(haystack, needle)| {
                    black_box(haystack.lower_bound(&needle));
                    haystack
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish()
}

fn lower_bound_benchmarks(c: &mut Criterion) {
    lower_bound_group::<u32, VectorContainer>(c);
    lower_bound_group::<u32, SetContainer>(c);
    lower_bound_group::<String, VectorContainer>(c);
    lower_bound_group::<String, SetContainer>(c);
}

criterion_group!(benches, lower_bound_benchmarks);
criterion_main!(benches);

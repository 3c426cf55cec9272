use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use prism_core::renderer::api::command::radix_sort64;
use std::hint::black_box;

fn pseudo_random_keys(count: usize) -> Vec<u64> {
    let mut state = 0x9e37_79b9_7f4a_7c15u64;
    (0..count)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            state
        })
        .collect()
}

fn bench_radix_sort(c: &mut Criterion) {
    let mut group = c.benchmark_group("Frame Sort");

    for count in [1_000usize, 10_000, 65_535] {
        let keys = pseudo_random_keys(count);
        let values: Vec<u32> = (0..count as u32).collect();
        let mut temp_keys = Vec::with_capacity(count);
        let mut temp_values = Vec::with_capacity(count);

        group.bench_function(format!("radix_sort64 ({count} keys)"), |b| {
            b.iter_batched(
                || (keys.clone(), values.clone()),
                |(mut k, mut v)| {
                    radix_sort64(&mut k, &mut v, &mut temp_keys, &mut temp_values);
                    black_box((k, v))
                },
                BatchSize::SmallInput,
            );
        });

        group.bench_function(format!("slice::sort_by_key ({count} keys)"), |b| {
            b.iter_batched(
                || keys.iter().copied().zip(values.iter().copied()).collect::<Vec<_>>(),
                |mut pairs| {
                    pairs.sort_by_key(|(k, _)| *k);
                    black_box(pairs)
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_radix_sort);
criterion_main!(benches);

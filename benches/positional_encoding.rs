//! Benchmarks for the sinusoidal positional encoding.

use burn::{backend::NdArray, tensor::Tensor};
use burn_classifiers::models::positional_encoding::{sinusoid_table, PositionalEncodingConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_sinusoid_table(c: &mut Criterion) {
    let mut group = c.benchmark_group("sinusoid_table");

    for positions in [50, 512, 5000].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(positions), positions, |b, &n| {
            b.iter(|| sinusoid_table(black_box(n), black_box(128)));
        });
    }

    group.finish();
}

fn bench_encoding_forward(c: &mut Criterion) {
    let mut group = c.benchmark_group("positional_encoding_forward");

    let encoding = PositionalEncodingConfig::new(128)
        .with_max_len(200)
        .with_dropout(0.0)
        .init::<NdArray>(&Default::default());

    for seq_length in [50, 200].iter() {
        let x = Tensor::<NdArray, 3>::zeros([32, *seq_length, 128], &Default::default());

        group.bench_with_input(BenchmarkId::from_parameter(seq_length), seq_length, |b, _| {
            b.iter(|| encoding.forward(black_box(x.clone())).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sinusoid_table, bench_encoding_forward);
criterion_main!(benches);

//! Benchmarks for balance projection and record decoding
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use fundflow::format::format_units;
use fundflow::stream::{parse_flow_rate, StreamCheckpoint};

fn create_checkpoints(count: usize) -> Vec<StreamCheckpoint> {
    (0..count)
        .map(|i| {
            let i = i as u128;
            StreamCheckpoint::from_seconds(i * 1_000_000, 1_700_000_000, 385_802_469_135 + i)
        })
        .collect()
}

fn bench_projection(c: &mut Criterion) {
    let mut group = c.benchmark_group("projection");

    for size in [100, 1000, 10000] {
        let checkpoints = create_checkpoints(size);
        let now = 1_700_086_400_000;

        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(format!("balance_at_{}", size), |b| {
            b.iter(|| {
                checkpoints
                    .iter()
                    .map(|cp| cp.balance_at(black_box(now)))
                    .fold(0u128, u128::saturating_add)
            })
        });

        group.bench_function(format!("format_{}", size), |b| {
            b.iter(|| {
                for cp in &checkpoints {
                    black_box(format_units(cp.balance_at(now), 18, 6));
                }
            })
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    group.bench_function("flow_rate_integer", |b| {
        b.iter(|| parse_flow_rate(black_box("385802469135802")))
    });

    group.bench_function("flow_rate_malformed", |b| {
        b.iter(|| parse_flow_rate(black_box("not-a-rate")))
    });

    group.finish();
}

criterion_group!(benches, bench_projection, bench_parse);
criterion_main!(benches);

//! Benchmarks for artifact validation and backoff computation.

use agentforge::pipeline::{JitterStrategy, RetryPolicy};
use agentforge::testing::sample_artifacts;
use agentforge::validation::{check_python, validate};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn validation_benchmark(c: &mut Criterion) {
    let artifacts = sample_artifacts();
    c.bench_function("validate_sample_artifacts", |b| {
        b.iter(|| validate(black_box(&artifacts)));
    });

    let source = artifacts.get("agent_py").unwrap_or_default().repeat(50);
    c.bench_function("check_python_large", |b| {
        b.iter(|| check_python(black_box(&source)));
    });
}

fn backoff_benchmark(c: &mut Criterion) {
    let policy = RetryPolicy::default().with_jitter(JitterStrategy::Full);
    c.bench_function("delay_for_attempt", |b| {
        b.iter(|| {
            for attempt in 1..=10 {
                black_box(policy.delay_for_attempt(black_box(attempt)));
            }
        });
    });
}

criterion_group!(benches, validation_benchmark, backoff_benchmark);
criterion_main!(benches);

use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use std::sync::Arc;

use api_store::{ApiKeyStore, MemoryBackend, Signal};

fn signal_read_benchmark(c: &mut Criterion) {
    let signal = Signal::new(String::from("sk-123"));

    c.bench_function("signal_read", |b| {
        b.iter(|| {
            black_box(signal.get());
        });
    });
}

fn signal_write_benchmark(c: &mut Criterion) {
    let signal: Signal<i32> = Signal::new(0);

    c.bench_function("signal_write", |b| {
        let mut i = 0;
        b.iter(|| {
            signal.set(black_box(i));
            i += 1;
        });
    });
}

fn api_key_read_benchmark(c: &mut Criterion) {
    let store = ApiKeyStore::new();
    store.set_api_key("sk-123");

    c.bench_function("api_key_read", |b| {
        b.iter(|| {
            black_box(store.api_key());
        });
    });
}

fn api_key_write_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("api_key_write");

    let memory_only = ApiKeyStore::new();
    group.bench_function("memory_only", |b| {
        let mut i = 0u64;
        b.iter(|| {
            memory_only.set_api_key(format!("sk-{}", black_box(i)));
            i += 1;
        });
    });

    let persisted = ApiKeyStore::with_backend(Arc::new(MemoryBackend::new()));
    group.bench_function("persisted", |b| {
        let mut i = 0u64;
        b.iter(|| {
            persisted.set_api_key(format!("sk-{}", black_box(i)));
            i += 1;
        });
    });

    group.bench_function("unchanged", |b| {
        b.iter(|| {
            persisted.set_api_key(black_box("sk-same"));
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    signal_read_benchmark,
    signal_write_benchmark,
    api_key_read_benchmark,
    api_key_write_benchmark
);
criterion_main!(benches);

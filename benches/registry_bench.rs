// benches/registry_bench.rs
//! Registry operation benchmarks
//!
//! Every intercepted call pays for at least one registry lookup, so lookup
//! cost is the shim's hot path.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use intents_shim::interception::registry::Registry;
use intents_shim::policy::PassthroughPolicy;

fn bench_lookup(c: &mut Criterion) {
    let registry = Registry::new();
    for fd in 0..1024 {
        registry.create_and_register(fd, &PassthroughPolicy).unwrap();
    }

    c.bench_function("lookup_hit", |b| {
        b.iter(|| registry.lookup(black_box(512)))
    });

    c.bench_function("lookup_miss", |b| {
        b.iter(|| registry.lookup(black_box(5000)))
    });
}

fn bench_register_remove(c: &mut Criterion) {
    let registry = Registry::new();

    c.bench_function("register_remove_cycle", |b| {
        b.iter(|| {
            registry
                .create_and_register(black_box(7), &PassthroughPolicy)
                .unwrap();
            registry.remove_and_destroy(black_box(7), &PassthroughPolicy);
        })
    });
}

criterion_group!(benches, bench_lookup, bench_register_remove);
criterion_main!(benches);

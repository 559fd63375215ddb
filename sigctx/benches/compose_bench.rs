//! Benchmarks for context composition.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use sigctx::prelude::*;
use sigctx::testing::ManualSignalSource;
use std::sync::Arc;

fn context_benchmark(c: &mut Criterion) {
    let parent = Context::background();
    c.bench_function("child_cancel", |b| {
        b.iter(|| {
            let (ctx, cancel) = parent.child();
            cancel.cancel();
            black_box(ctx.is_done())
        })
    });
}

fn compose_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let composer = Composer::new()
        .with_logger(Arc::new(NoOpLogger))
        .with_signal_source(Arc::new(ManualSignalSource::new()));
    let parent = Context::background();

    c.bench_function("compose_cancel_join", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let (ctx, handle) = composer
                    .compose(&parent, &Signal::shutdown_set())
                    .unwrap();
                handle.cancel();
                black_box(handle.join().await);
                black_box(ctx.is_done())
            })
        })
    });
}

criterion_group!(benches, context_benchmark, compose_benchmark);
criterion_main!(benches);

// Pool throughput benchmarks.
//
// Measures raw acquire/release overhead with a zero-cost resource
// (no I/O, instant connect) on single- and multi-threaded runtimes.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};
use reservoir::{Pool, PoolConfig};

fn bench_config(cap: usize) -> PoolConfig {
    PoolConfig {
        cap,
        max_idle: Duration::from_secs(3600),
        reap_interval: Duration::from_secs(3600),
    }
}

fn single_thread_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build runtime");

    let pool = rt.block_on(async {
        let pool = Arc::new(Pool::with_config(|| 0u64, bench_config(64)));
        // Warm up: open one handle so subsequent acquires reuse it.
        pool.acquire().await.release();
        pool
    });

    c.bench_function("single_thread_acquire_release", |b| {
        b.to_async(&rt).iter(|| {
            let pool = Arc::clone(&pool);
            async move {
                let lease = pool.acquire().await;
                black_box(lease.resource());
                drop(lease);
            }
        });
    });
}

fn multi_thread_contention(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("failed to build runtime");

    let pool = rt.block_on(async {
        let pool = Arc::new(Pool::with_config(|| 0u64, bench_config(64)));
        // Warm up with a batch of handles.
        let mut leases = Vec::new();
        for _ in 0..8 {
            leases.push(pool.acquire().await);
        }
        drop(leases);
        pool
    });

    c.bench_function("contended_acquire_release", |b| {
        b.to_async(&rt).iter(|| {
            let pool = Arc::clone(&pool);
            async move {
                let mut workers = Vec::with_capacity(4);
                for _ in 0..4 {
                    let pool = Arc::clone(&pool);
                    workers.push(tokio::spawn(async move {
                        let lease = pool.acquire().await;
                        black_box(lease.resource());
                        drop(lease);
                    }));
                }
                for worker in workers {
                    worker.await.unwrap();
                }
            }
        });
    });
}

criterion_group!(benches, single_thread_throughput, multi_thread_contention);
criterion_main!(benches);

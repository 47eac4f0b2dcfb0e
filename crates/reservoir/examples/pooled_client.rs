//! Pooled client example
//!
//! Drives the pool with a simulated connection type: many short-lived
//! workers share a small set of expensive-to-open connections, and the
//! reaper closes connections that idle too long once the burst is over.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reservoir::Pool;
use tokio::task::JoinSet;

/// Stand-in for a real network connection.
struct Connection {
    id: usize,
}

impl Connection {
    /// Simulated round-trip.
    async fn query(&self) -> String {
        tokio::time::sleep(Duration::from_millis(5)).await;
        format!("pong from connection {}", self.id)
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reservoir=debug".into()),
        )
        .init();

    let opened = Arc::new(AtomicUsize::new(0));
    let closed = Arc::new(AtomicUsize::new(0));

    let opened_c = Arc::clone(&opened);
    let closed_c = Arc::clone(&closed);
    let pool = Arc::new(
        Pool::builder()
            .cap(8)
            .max_idle(Duration::from_millis(500))
            .reap_interval(Duration::from_millis(250))
            .close_with(move |conn: &Connection| {
                closed_c.fetch_add(1, Ordering::SeqCst);
                tracing::info!(id = conn.id, "closing idle connection");
            })
            .build(move || {
                let id = opened_c.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::info!(id, "opening connection");
                Connection { id }
            }),
    );

    // A burst of workers, far more than the pool will ever open.
    let mut workers = JoinSet::new();
    for worker in 0..32 {
        let pool = Arc::clone(&pool);
        workers.spawn(async move {
            for _ in 0..4 {
                let lease = pool.acquire().await;
                let conn = lease.resource().expect("connect never fails here");
                let reply = conn.query().await;
                tracing::debug!(worker, reply = %reply, "query done");
            }
        });
    }
    while let Some(result) = workers.join_next().await {
        result.expect("worker should not panic");
    }

    let stats = pool.stats();
    tracing::info!(
        size = stats.size,
        created = stats.created,
        opened = opened.load(Ordering::SeqCst),
        "burst finished"
    );

    // Let the reaper drain the now-idle connections.
    tokio::time::sleep(Duration::from_secs(2)).await;
    let stats = pool.stats();
    tracing::info!(
        size = stats.size,
        evicted = stats.evicted,
        closed = closed.load(Ordering::SeqCst),
        "after idle eviction"
    );

    pool.close();
}

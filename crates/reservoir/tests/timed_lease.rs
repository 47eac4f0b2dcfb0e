//! Deadline-bounded leases: auto-release on expiry, cooperative early
//! release, and the rendezvous between the two.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reservoir::{Pool, PoolConfig};

fn counted_connect() -> (Arc<AtomicUsize>, impl Fn() -> usize + Send + Sync + 'static) {
    let counter = Arc::new(AtomicUsize::new(0));
    let counter_c = Arc::clone(&counter);
    (counter, move || counter_c.fetch_add(1, Ordering::SeqCst) + 1)
}

fn quiet_config(cap: usize) -> PoolConfig {
    PoolConfig {
        cap,
        max_idle: Duration::from_secs(3600),
        reap_interval: Duration::from_secs(3600),
    }
}

#[tokio::test]
async fn deadline_fires_and_releases_the_handle() {
    let (_, connect) = counted_connect();
    let pool = Pool::with_config(connect, quiet_config(1));

    let lease = pool.acquire_timed(Duration::from_millis(100)).await;
    assert_eq!(pool.working_number(), 1);

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(pool.working_number(), 0, "deadline should auto-release");
    assert_eq!(pool.size(), 1);

    // The caller releases long after the deadline fired; nothing happens.
    drop(lease);
    assert_eq!(pool.working_number(), 0);
}

#[tokio::test]
async fn late_release_does_not_disturb_the_next_lease() {
    let (connects, connect) = counted_connect();
    let pool = Pool::with_config(connect, quiet_config(1));

    let stale = pool.acquire_timed(Duration::from_millis(50)).await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    // Someone else picks up the handle the deadline released.
    let fresh = pool.acquire().await;
    assert_eq!(pool.working_number(), 1);

    // Dropping the stale lease must not release the fresh one.
    drop(stale);
    assert_eq!(pool.working_number(), 1);
    assert_eq!(connects.load(Ordering::SeqCst), 1);
    drop(fresh);
    assert_eq!(pool.working_number(), 0);
}

#[tokio::test]
async fn early_release_cancels_the_deadline_waiter() {
    let (_, connect) = counted_connect();
    let pool = Pool::with_config(connect, quiet_config(1));

    let lease = pool.acquire_timed(Duration::from_secs(5)).await;
    tokio::time::sleep(Duration::from_millis(10)).await;
    lease.release();

    assert_eq!(pool.working_number(), 0);
    assert_eq!(pool.size(), 1);

    // The handle is immediately reusable; nothing waits out the five
    // seconds or releases it a second time.
    let next = pool.acquire().await;
    assert_eq!(pool.working_number(), 1);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pool.working_number(), 1);
    drop(next);
}

#[tokio::test]
async fn timed_lease_hands_out_the_resource() {
    let (_, connect) = counted_connect();
    let pool = Pool::with_config(connect, quiet_config(2));

    let lease = pool.acquire_timed(Duration::from_secs(1)).await;
    assert_eq!(lease.resource().map(|r| *r), Some(1));
    lease.release();
}

#[tokio::test]
async fn expired_handle_is_not_closed_by_expiry_alone() {
    // Expiry returns the handle to the idle set; only the reaper closes.
    let (_, connect) = counted_connect();
    let closes = Arc::new(AtomicUsize::new(0));
    let closes_c = Arc::clone(&closes);

    let pool = Pool::builder()
        .cap(1)
        .max_idle(Duration::from_secs(3600))
        .reap_interval(Duration::from_secs(3600))
        .close_with(move |_conn: &usize| {
            closes_c.fetch_add(1, Ordering::SeqCst);
        })
        .build(connect);

    let lease = pool.acquire_timed(Duration::from_millis(20)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(pool.working_number(), 0, "deadline has fired by now");

    assert_eq!(pool.size(), 1);
    assert_eq!(closes.load(Ordering::SeqCst), 0);
    drop(lease);
}

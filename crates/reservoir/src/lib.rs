//! # Reservoir
//!
//! A concurrency-safe resource pool that amortizes the cost of establishing
//! expensive, reusable handles (network connections, authenticated sessions,
//! file descriptors) across many short-lived callers.
//!
//! Callers [`acquire`](Pool::acquire) a handle for a unit of work and release
//! it by dropping the returned [`Lease`]. The pool keeps idle handles alive
//! for reuse up to a configurable cap and runs a background reaper that
//! evicts handles idle longer than `max_idle`.
//!
//! ```no_run
//! use std::time::Duration;
//! use reservoir::{Pool, PoolConfig};
//!
//! # async fn demo() {
//! let pool = Pool::with_config(
//!     || "some expensive connection".to_string(),
//!     PoolConfig {
//!         cap: 16,
//!         max_idle: Duration::from_secs(3),
//!         reap_interval: Duration::from_secs(2),
//!     },
//! );
//!
//! let lease = pool.acquire().await;
//! if let Some(conn) = lease.resource() {
//!     // use the connection
//!     let _ = conn.len();
//! }
//! drop(lease); // handle returns to the idle set
//! # }
//! ```
//!
//! Acquisition never fails with an error: a lease over a handle whose
//! `connect` panicked, or from a closed pool, simply carries no resource,
//! so callers check [`Lease::resource`] before use.
//!
//! The pool must be created from within a Tokio runtime: it spawns the
//! reaper task at construction and a waiter task per timed lease.

pub mod config;
pub mod hooks;
pub mod lease;
pub mod pool;

mod handle;
mod registry;

pub use config::PoolConfig;
pub use hooks::{panic_message, CloseHook, PanicHook, PanicPayload};
pub use lease::Lease;
pub use pool::{Pool, PoolBuilder, PoolStats};

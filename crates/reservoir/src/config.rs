//! Pool configuration types

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::hooks::{default_panic_hook, CloseHook, PanicHook};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for a [`Pool`](crate::Pool).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfig {
    /// Maximum number of handles the pool may hold
    pub cap: usize,
    /// Time after which an idle handle becomes eligible for eviction
    pub max_idle: Duration,
    /// Interval between reaper sweeps
    pub reap_interval: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            cap: 1000,
            max_idle: Duration::from_secs(3),
            reap_interval: Duration::from_secs(2),
        }
    }
}

// ---------------------------------------------------------------------------
// Live settings
// ---------------------------------------------------------------------------

/// Runtime-tunable knobs and hooks, shared between the pool and its reaper.
///
/// Durations are stored as atomic nanosecond counts so the reaper reads a
/// consistent value at the top of each cycle without coordinating with
/// callers; hook slots sit behind their own locks so a setter takes effect
/// by the next sweep.
pub(crate) struct Settings<T> {
    max_idle_nanos: AtomicU64,
    reap_interval_nanos: AtomicU64,
    close: RwLock<Option<CloseHook<T>>>,
    on_panic: RwLock<PanicHook>,
}

fn nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

impl<T> Settings<T> {
    pub(crate) fn new(config: &PoolConfig) -> Self {
        Self {
            max_idle_nanos: AtomicU64::new(nanos(config.max_idle)),
            reap_interval_nanos: AtomicU64::new(nanos(config.reap_interval)),
            close: RwLock::new(None),
            on_panic: RwLock::new(default_panic_hook()),
        }
    }

    pub(crate) fn max_idle(&self) -> Duration {
        Duration::from_nanos(self.max_idle_nanos.load(Ordering::Relaxed))
    }

    pub(crate) fn set_max_idle(&self, max_idle: Duration) {
        self.max_idle_nanos.store(nanos(max_idle), Ordering::Relaxed);
    }

    pub(crate) fn reap_interval(&self) -> Duration {
        Duration::from_nanos(self.reap_interval_nanos.load(Ordering::Relaxed))
    }

    pub(crate) fn set_reap_interval(&self, reap_interval: Duration) {
        self.reap_interval_nanos
            .store(nanos(reap_interval), Ordering::Relaxed);
    }

    pub(crate) fn close_hook(&self) -> Option<CloseHook<T>> {
        self.close.read().clone()
    }

    pub(crate) fn set_close_hook(&self, hook: CloseHook<T>) {
        *self.close.write() = Some(hook);
    }

    pub(crate) fn panic_hook(&self) -> PanicHook {
        self.on_panic.read().clone()
    }

    pub(crate) fn set_panic_hook(&self, hook: PanicHook) {
        *self.on_panic.write() = hook;
    }
}

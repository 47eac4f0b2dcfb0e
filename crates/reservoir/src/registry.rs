//! Concurrent handle set with background idle eviction.
//!
//! The registry owns every handle in the pool, keyed by a monotonically
//! assigned token. A readers-writer lock protects the map: size and
//! working-count reads and the sweep's scan phase take the shared side;
//! `take_idle`, `add`, and the sweep's remove phase take the exclusive
//! side. The reaper runs as its own task and coordinates with acquirers
//! purely through that lock and the per-handle atomics.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::config::Settings;
use crate::handle::Handle;
use crate::hooks::{CloseHook, ConnectFn, PanicHook};

pub(crate) struct Registry<T> {
    members: RwLock<HashMap<u64, Arc<Handle<T>>>>,
    next_token: AtomicU64,
    closed: AtomicBool,
    created: AtomicU64,
    evicted: AtomicU64,
}

impl<T> Registry<T> {
    pub(crate) fn new() -> Self {
        Self {
            members: RwLock::new(HashMap::new()),
            next_token: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            created: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        }
    }

    /// Construct a handle and insert it under a fresh token.
    ///
    /// The `connect` callback runs outside any lock. The returned handle is
    /// already claimed for the caller: publishing it idle would let a
    /// concurrent `take_idle` walk off with it before the caller could,
    /// handing one handle to two leases.
    ///
    /// Returns `None` when the registry is closed.
    pub(crate) fn add(
        &self,
        connect: &ConnectFn<T>,
        on_panic: &PanicHook,
    ) -> Option<Arc<Handle<T>>> {
        if self.is_closed() {
            return None;
        }

        let token = self.next_token.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = Arc::new(Handle::connect(connect, on_panic));
        let claimed = handle.try_claim();
        debug_assert!(claimed, "fresh handle must be claimable");

        let mut members = self.members.write();
        if self.is_closed() {
            return None;
        }
        members.insert(token, Arc::clone(&handle));
        self.created.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "tracing")]
        tracing::debug!(token, size = members.len(), "opened new handle");

        Some(handle)
    }

    /// Claim the first idle handle, if any.
    ///
    /// Runs under the exclusive lock: the idle observation and the busy
    /// transition must happen in the same critical section, so no other
    /// acquirer (and no sweep scan) can interleave and claim the same
    /// handle. The scan order over the map is unspecified.
    pub(crate) fn take_idle(&self) -> Option<Arc<Handle<T>>> {
        let members = self.members.write();
        for handle in members.values() {
            if handle.try_claim() {
                return Some(Arc::clone(handle));
            }
        }
        None
    }

    pub(crate) fn len(&self) -> usize {
        self.members.read().len()
    }

    /// Size and busy count in one consistent snapshot.
    pub(crate) fn counts(&self) -> (usize, usize) {
        let members = self.members.read();
        let size = members.len();
        let working = members.values().filter(|h| !h.is_idle()).count();
        (size, working)
    }

    pub(crate) fn working_count(&self) -> usize {
        self.counts().1
    }

    pub(crate) fn created(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    pub(crate) fn evicted(&self) -> u64 {
        self.evicted.load(Ordering::Relaxed)
    }

    /// Two-phase eviction pass.
    ///
    /// Scan phase, shared lock: collect handles whose `connect` panicked
    /// (removed unconditionally, close hook never invoked) and idle handles
    /// past `max_idle`. A stale handle is claimed before its close hook
    /// runs; once claimed it can no longer be leased, so the hook never
    /// races a caller and runs at most once per handle. Handles that lose
    /// the claim race just became busy and are skipped.
    ///
    /// Remove phase, exclusive lock, only entered when something matched:
    /// delete the collected tokens.
    pub(crate) fn sweep(
        &self,
        max_idle: Duration,
        close: Option<&CloseHook<T>>,
        on_panic: &PanicHook,
    ) {
        let mut stale = Vec::new();
        {
            let members = self.members.read();
            for (&token, handle) in members.iter() {
                if handle.resource().is_none() {
                    stale.push(token);
                    continue;
                }
                if handle.idle_duration() > max_idle && handle.try_claim() {
                    handle.invoke(close, on_panic);
                    stale.push(token);
                }
            }
        }

        if stale.is_empty() {
            return;
        }

        let mut members = self.members.write();
        for token in &stale {
            members.remove(token);
        }
        self.evicted.fetch_add(stale.len() as u64, Ordering::Relaxed);

        #[cfg(feature = "tracing")]
        tracing::debug!(
            evicted = stale.len(),
            remaining = members.len(),
            "evicted stale handles"
        );
    }

    /// Close the registry and drop all members.
    ///
    /// Survivors are dropped without their close hook; the reaper observes
    /// the flag and exits on its next wake. Returns `true` on the first
    /// call only; the member map is cleared exactly once.
    pub(crate) fn close(&self) -> bool {
        let mut members = self.members.write();
        if self.closed.swap(true, Ordering::SeqCst) {
            return false;
        }
        members.clear();
        true
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl<T: Send + Sync + 'static> Registry<T> {
    /// Spawn the background reaper.
    ///
    /// Each iteration re-reads the interval, idle threshold, and hooks, so
    /// live reconfiguration takes effect by the next cycle. The timer is
    /// armed before the sweep runs: a slow sweep eats into the wait rather
    /// than stretching the period.
    pub(crate) fn spawn_reaper(self: Arc<Self>, settings: Arc<Settings<T>>) {
        let registry = self;
        tokio::spawn(async move {
            loop {
                let wake_at = tokio::time::Instant::now() + settings.reap_interval();
                let close = settings.close_hook();
                let on_panic = settings.panic_hook();
                registry.sweep(settings.max_idle(), close.as_ref(), &on_panic);

                if registry.is_closed() {
                    break;
                }
                tokio::time::sleep_until(wake_at).await;
            }

            #[cfg(feature = "tracing")]
            tracing::trace!("reaper exited");
        });
    }
}

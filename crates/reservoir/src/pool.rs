//! The pool: cap enforcement, the acquisition loop, and the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::{PoolConfig, Settings};
use crate::handle::Handle;
use crate::hooks::{ConnectFn, PanicHook, PanicPayload};
use crate::lease::Lease;
use crate::registry::Registry;

// ---------------------------------------------------------------------------
// Pool
// ---------------------------------------------------------------------------

/// A concurrency-safe pool of reusable resource handles.
///
/// The pool owns a registry of handles and a background reaper that evicts
/// handles idle longer than `max_idle`. Acquisition prefers reusing an idle
/// handle, grows the pool while below `cap`, and cooperatively yields and
/// retries once the cap is reached.
///
/// The cap check and the growth step are intentionally not one atomic
/// operation: two acquirers racing past the size check may briefly push the
/// pool one handle over `cap` each. The overshoot is transient; the reaper
/// drains it along with any other idle excess.
///
/// A pool must be created from within a Tokio runtime (construction spawns
/// the reaper). Dropping the pool closes it, so an abandoned pool does not
/// leak its reaper task. Share a pool between tasks by wrapping it in an
/// [`Arc`].
pub struct Pool<T> {
    connect: ConnectFn<T>,
    cap: AtomicUsize,
    settings: Arc<Settings<T>>,
    registry: Arc<Registry<T>>,
}

impl<T: Send + Sync + 'static> Pool<T> {
    /// Create a pool with the default configuration.
    pub fn new(connect: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::with_config(connect, PoolConfig::default())
    }

    /// Create a pool with an explicit configuration.
    pub fn with_config(connect: impl Fn() -> T + Send + Sync + 'static, config: PoolConfig) -> Self {
        let settings = Arc::new(Settings::new(&config));
        let registry = Arc::new(Registry::new());
        Arc::clone(&registry).spawn_reaper(Arc::clone(&settings));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            cap = config.cap,
            max_idle_ms = config.max_idle.as_millis() as u64,
            reap_interval_ms = config.reap_interval.as_millis() as u64,
            "created resource pool"
        );

        Self {
            connect: Arc::new(connect),
            cap: AtomicUsize::new(config.cap),
            settings,
            registry,
        }
    }

    /// Start building a pool with option-style configuration.
    #[must_use]
    pub fn builder() -> PoolBuilder<T> {
        PoolBuilder::new()
    }

    /// Acquire a handle for a unit of work.
    ///
    /// Returns a [`Lease`] that releases the handle when dropped. The
    /// leased resource is `None` when the `connect` callback panicked and
    /// on a closed pool, where the lease carries nothing and its release
    /// is a no-op; callers must check
    /// [`resource()`](Lease::resource) either way.
    pub async fn acquire(&self) -> Lease<T> {
        match self.search().await {
            Some(handle) => Lease::manual(handle),
            None => Lease::detached(),
        }
    }

    /// Acquire a handle that auto-releases after `deadline`.
    ///
    /// If the caller drops the lease first, the deadline waiter is
    /// cancelled through the handle's rendezvous; if the deadline fires
    /// first, the eventual drop is a no-op. On a closed pool, returns the
    /// same absent lease as [`acquire`](Pool::acquire).
    pub async fn acquire_timed(&self, deadline: Duration) -> Lease<T> {
        match self.search().await {
            Some(handle) => {
                Arc::clone(&handle).start_timed(deadline);
                Lease::timed(handle)
            }
            None => Lease::detached(),
        }
    }

    /// The acquisition loop: reuse, then grow, then yield and retry.
    ///
    /// Reuse wins over growth even far below the cap, minimizing handle
    /// churn; growth wins over waiting because everything under the cap is
    /// throughput the caller paid for. Only at the cap does the caller
    /// yield to the scheduler and wait for a release.
    async fn search(&self) -> Option<Arc<Handle<T>>> {
        let mut found = self.registry.take_idle();
        loop {
            if let Some(handle) = found {
                return Some(handle);
            }
            if self.registry.is_closed() {
                return None;
            }
            if self.registry.len() < self.cap() {
                // `add` only refuses when the pool closed under us.
                return self.registry.add(&self.connect, &self.settings.panic_hook());
            }
            tokio::task::yield_now().await;
            found = self.registry.take_idle();
        }
    }

    // -- observability ------------------------------------------------------

    /// Number of handles currently leased out.
    #[must_use]
    pub fn working_number(&self) -> usize {
        self.registry.working_count()
    }

    /// Total number of handles, busy and idle.
    #[must_use]
    pub fn size(&self) -> usize {
        self.registry.len()
    }

    /// Snapshot of pool counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let (size, working) = self.registry.counts();
        PoolStats {
            size,
            working,
            idle: size - working,
            created: self.registry.created(),
            evicted: self.registry.evicted(),
        }
    }

    #[must_use]
    pub fn cap(&self) -> usize {
        self.cap.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn max_idle(&self) -> Duration {
        self.settings.max_idle()
    }

    #[must_use]
    pub fn reap_interval(&self) -> Duration {
        self.settings.reap_interval()
    }

    // -- live reconfiguration ----------------------------------------------

    /// Change the cap. Takes effect on the next growth decision; shrinking
    /// below the current size does not evict anything by itself.
    pub fn set_cap(&self, cap: usize) {
        self.cap.store(cap, Ordering::Relaxed);
    }

    /// Change the idle threshold; the reaper reads it each cycle.
    pub fn set_max_idle(&self, max_idle: Duration) {
        self.settings.set_max_idle(max_idle);
    }

    /// Change the sweep interval; takes effect after the current wait.
    pub fn set_reap_interval(&self, reap_interval: Duration) {
        self.settings.set_reap_interval(reap_interval);
    }

    /// Replace the panic hook invoked with captured callback panics.
    pub fn set_on_panic(&self, hook: impl Fn(PanicPayload) + Send + Sync + 'static) {
        self.settings.set_panic_hook(Arc::new(hook));
    }

    /// Set the hook the reaper invokes with a resource before evicting it.
    pub fn set_close_with(&self, hook: impl Fn(&T) + Send + Sync + 'static) {
        self.settings.set_close_hook(Arc::new(hook));
    }

    /// Close the pool.
    ///
    /// Idempotent. Drops all handles without invoking the close hook,
    /// refuses further acquisitions, and lets the reaper exit on its next
    /// wake. In-flight acquisitions spinning at the cap observe the close
    /// and come back with an absent lease.
    pub fn close(&self) {
        if self.registry.close() {
            #[cfg(feature = "tracing")]
            tracing::debug!("pool closed");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.registry.is_closed()
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        self.registry.close();
    }
}

impl<T: Send + Sync + 'static> std::fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("cap", &self.cap())
            .field("closed", &self.is_closed())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Total handles, busy and idle.
    pub size: usize,
    /// Handles currently leased out.
    pub working: usize,
    /// Handles waiting for reuse.
    pub idle: usize,
    /// Handles ever opened.
    pub created: u64,
    /// Handles ever evicted by the reaper.
    pub evicted: u64,
}

// ---------------------------------------------------------------------------
// PoolBuilder
// ---------------------------------------------------------------------------

/// Option-style pool construction.
///
/// ```no_run
/// # async fn demo() {
/// use std::time::Duration;
/// use reservoir::Pool;
///
/// let pool = Pool::builder()
///     .cap(64)
///     .max_idle(Duration::from_secs(30))
///     .close_with(|conn: &String| drop(conn.clone()))
///     .build(|| "connection".to_string());
/// # let _ = pool.size();
/// # }
/// ```
pub struct PoolBuilder<T> {
    config: PoolConfig,
    close: Option<Arc<dyn Fn(&T) + Send + Sync>>,
    on_panic: Option<PanicHook>,
}

impl<T: Send + Sync + 'static> PoolBuilder<T> {
    fn new() -> Self {
        Self {
            config: PoolConfig::default(),
            close: None,
            on_panic: None,
        }
    }

    /// Maximum number of handles the pool may hold.
    #[must_use]
    pub fn cap(mut self, cap: usize) -> Self {
        self.config.cap = cap;
        self
    }

    /// Idle time after which a handle becomes eligible for eviction.
    #[must_use]
    pub fn max_idle(mut self, max_idle: Duration) -> Self {
        self.config.max_idle = max_idle;
        self
    }

    /// Interval between reaper sweeps.
    #[must_use]
    pub fn reap_interval(mut self, reap_interval: Duration) -> Self {
        self.config.reap_interval = reap_interval;
        self
    }

    /// Hook invoked with a resource before the reaper evicts it.
    #[must_use]
    pub fn close_with(mut self, hook: impl Fn(&T) + Send + Sync + 'static) -> Self {
        self.close = Some(Arc::new(hook));
        self
    }

    /// Hook receiving captured panic payloads from user callbacks.
    #[must_use]
    pub fn on_panic(mut self, hook: impl Fn(PanicPayload) + Send + Sync + 'static) -> Self {
        self.on_panic = Some(Arc::new(hook));
        self
    }

    /// Build the pool around the `connect` callback.
    pub fn build(self, connect: impl Fn() -> T + Send + Sync + 'static) -> Pool<T> {
        let pool = Pool::with_config(connect, self.config);
        if let Some(close) = self.close {
            pool.settings.set_close_hook(close);
        }
        if let Some(on_panic) = self.on_panic {
            pool.settings.set_panic_hook(on_panic);
        }
        pool
    }
}

impl<T: Send + Sync + 'static> Default for PoolBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

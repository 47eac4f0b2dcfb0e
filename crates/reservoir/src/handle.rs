//! Per-resource handle state machine.
//!
//! A `Handle` wraps one user resource together with the small amount of
//! state the pool needs: an atomic busy flag, a lock-free last-idle
//! timestamp, and the rendezvous slot a timed lease uses to settle with its
//! deadline waiter. Handles need no registry-level coordination of their
//! own: the busy flag and idle clock are plain atomics, and the rendezvous
//! slot sits behind its own small mutex.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::hooks::{catch_panic, CloseHook, ConnectFn, PanicHook};

pub(crate) struct Handle<T> {
    /// Resource produced by the user `connect` callback; `None` when the
    /// callback panicked. Immutable after construction.
    resource: Option<Arc<T>>,
    busy: AtomicBool,
    created_at: Instant,
    /// Last busy→idle transition, as elapsed microseconds since `created_at`.
    /// Meaningful only while idle.
    last_idle_micros: AtomicU64,
    /// Rendezvous between a timed lease's releaser and its deadline waiter:
    /// whoever takes the sender out of the slot performs the idle
    /// transition; the other side observes the empty slot and stands down.
    release_tx: Mutex<Option<oneshot::Sender<()>>>,
}

impl<T> Handle<T> {
    /// Construct a handle by invoking the user `connect` callback.
    ///
    /// A panic in the callback is forwarded to `on_panic` and leaves the
    /// handle with an absent resource; such handles are removed on the
    /// next reaper sweep.
    pub(crate) fn connect(connect: &ConnectFn<T>, on_panic: &PanicHook) -> Self {
        let connect = Arc::clone(connect);
        let resource = catch_panic(move || connect(), on_panic).map(Arc::new);
        Self {
            resource,
            busy: AtomicBool::new(false),
            created_at: Instant::now(),
            last_idle_micros: AtomicU64::new(0),
            release_tx: Mutex::new(None),
        }
    }

    pub(crate) fn resource(&self) -> Option<Arc<T>> {
        self.resource.clone()
    }

    /// Advisory idle check; may race with a concurrent claim.
    pub(crate) fn is_idle(&self) -> bool {
        !self.busy.load(Ordering::SeqCst)
    }

    /// Claim the handle for a lease. The idle observation and the busy
    /// transition are a single compare-and-swap, so two callers can never
    /// claim the same handle.
    pub(crate) fn try_claim(&self) -> bool {
        self.busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// How long the handle has been idle; zero while busy.
    pub(crate) fn idle_duration(&self) -> Duration {
        if !self.is_idle() {
            return Duration::ZERO;
        }
        let last_idle = Duration::from_micros(self.last_idle_micros.load(Ordering::SeqCst));
        self.created_at.elapsed().saturating_sub(last_idle)
    }

    /// Whether a deadline waiter is currently blocked on this handle.
    pub(crate) fn deadline_armed(&self) -> bool {
        self.release_tx.lock().is_some()
    }

    /// End an untimed lease: mark idle and refresh the idle timestamp.
    pub(crate) fn release(&self) {
        self.busy.store(false, Ordering::SeqCst);
        self.touch_idle();
    }

    /// End a timed lease from the caller's side.
    ///
    /// Taking the sender out of the rendezvous slot means the caller beat
    /// the deadline: it performs the idle transition and wakes the waiter.
    /// An empty slot means the deadline already fired and performed the
    /// release, so a late call is a complete no-op.
    pub(crate) fn release_timed(&self) {
        if let Some(tx) = self.release_tx.lock().take() {
            self.busy.store(false, Ordering::SeqCst);
            self.touch_idle();
            let _ = tx.send(());
        }
    }

    /// Deadline side of the rendezvous: release unless the caller got
    /// there first.
    fn expire(&self) {
        if let Some(tx) = self.release_tx.lock().take() {
            drop(tx);
            self.busy.store(false, Ordering::SeqCst);
            self.touch_idle();
        }
    }

    /// Run `f` against the resource with panic capture. A missing hook or
    /// an absent resource is a no-op.
    pub(crate) fn invoke(&self, f: Option<&CloseHook<T>>, on_panic: &PanicHook) {
        let (Some(resource), Some(f)) = (self.resource.as_ref(), f) else {
            return;
        };
        let f = Arc::clone(f);
        let resource = Arc::clone(resource);
        catch_panic(move || f(&resource), on_panic);
    }

    fn touch_idle(&self) {
        let elapsed = u64::try_from(self.created_at.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.last_idle_micros.store(elapsed, Ordering::SeqCst);
    }
}

impl<T: Send + Sync + 'static> Handle<T> {
    /// Arm a deadline on an already-claimed handle.
    ///
    /// Spawns a waiter that races the deadline timer against the
    /// early-release rendezvous. Exactly one of the two ends the lease:
    /// either the timer fires and the waiter performs the release, or the
    /// caller releases first and the waiter merely observes the rendezvous
    /// and exits.
    pub(crate) fn start_timed(self: Arc<Self>, deadline: Duration) {
        let (tx, rx) = oneshot::channel();
        *self.release_tx.lock() = Some(tx);
        self.busy.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(deadline) => self.expire(),
                _ = rx => {}
            }
        });
    }
}

impl<T> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Handle")
            .field("connected", &self.resource.is_some())
            .field("busy", &self.busy.load(Ordering::SeqCst))
            .field("deadline_armed", &self.deadline_armed())
            .finish()
    }
}

//! User-supplied callback plumbing.
//!
//! The pool has exactly three plug-in points: the `connect` callback that
//! produces a resource, the close hook invoked before an idle resource is
//! evicted, and the panic hook that receives any payload captured from a
//! panicking user callback. All three are shared as `Arc<dyn Fn>` so live
//! reconfiguration through the pool setters is visible to the reaper by its
//! next cycle.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Payload captured from a panicking user callback.
pub type PanicPayload = Box<dyn Any + Send + 'static>;

/// Hook receiving captured panic payloads. Must not panic itself.
pub type PanicHook = Arc<dyn Fn(PanicPayload) + Send + Sync>;

/// Hook invoked with a resource before the reaper evicts it.
pub type CloseHook<T> = Arc<dyn Fn(&T) + Send + Sync>;

pub(crate) type ConnectFn<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Run `f`, forwarding a panic payload to `on_panic` instead of unwinding.
///
/// Returns `None` when `f` panicked.
pub(crate) fn catch_panic<R>(f: impl FnOnce() -> R, on_panic: &PanicHook) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            on_panic(payload);
            None
        }
    }
}

/// Best-effort extraction of the human-readable message from a panic payload.
///
/// Payloads produced by `panic!` are either `&'static str` or `String`;
/// anything else is reported as opaque.
#[must_use]
pub fn panic_message(payload: &PanicPayload) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "opaque panic payload"
    }
}

/// The default panic hook logs the payload and drops it.
pub(crate) fn default_panic_hook() -> PanicHook {
    Arc::new(|payload: PanicPayload| {
        #[cfg(feature = "tracing")]
        tracing::error!(panic = panic_message(&payload), "user callback panicked");
        #[cfg(not(feature = "tracing"))]
        drop(payload);
    })
}

//! RAII lease over a pooled handle

use std::sync::Arc;

use crate::handle::Handle;

/// A leased handle.
///
/// Holds the resource for the duration of one unit of work and releases
/// the handle back to the pool when dropped. [`release`](Lease::release)
/// does the same explicitly.
///
/// The resource is `None` when the pool's `connect` callback panicked for
/// this handle (such handles are removed by the next reaper sweep), and
/// for leases handed out by a closed pool, which carry no handle at all
/// and release nothing.
pub struct Lease<T> {
    resource: Option<Arc<T>>,
    handle: Option<Arc<Handle<T>>>,
    timed: bool,
}

impl<T> Lease<T> {
    pub(crate) fn manual(handle: Arc<Handle<T>>) -> Self {
        Self {
            resource: handle.resource(),
            handle: Some(handle),
            timed: false,
        }
    }

    pub(crate) fn timed(handle: Arc<Handle<T>>) -> Self {
        Self {
            resource: handle.resource(),
            handle: Some(handle),
            timed: true,
        }
    }

    /// Lease handed out by a closed pool: no resource, release is a no-op.
    pub(crate) fn detached() -> Self {
        Self {
            resource: None,
            handle: None,
            timed: false,
        }
    }

    /// The leased resource. Cheap to clone; callers may move the `Arc`
    /// into spawned work, but the lease itself decides when the handle
    /// returns to the pool.
    #[must_use]
    pub fn resource(&self) -> Option<Arc<T>> {
        self.resource.clone()
    }

    /// Whether this lease actually carries a resource.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.resource.is_some()
    }

    /// Release the handle back to the pool now. Equivalent to dropping
    /// the lease; dropping a timed lease whose deadline already fired is
    /// a no-op.
    pub fn release(self) {}
}

impl<T> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if self.timed {
                handle.release_timed();
            } else {
                handle.release();
            }
        }
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("resource", &self.resource)
            .field("timed", &self.timed)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{ConnectFn, PanicHook};

    fn claimed_handle(value: u32) -> Arc<Handle<u32>> {
        let connect: ConnectFn<u32> = Arc::new(move || value);
        let hook: PanicHook = Arc::new(|_| {});
        let handle = Arc::new(Handle::connect(&connect, &hook));
        assert!(handle.try_claim());
        handle
    }

    #[test]
    fn drop_releases_handle() {
        let handle = claimed_handle(3);
        let lease = Lease::manual(Arc::clone(&handle));
        assert!(!handle.is_idle());

        drop(lease);
        assert!(handle.is_idle());
    }

    #[test]
    fn resource_is_shared() {
        let handle = claimed_handle(9);
        let lease = Lease::manual(Arc::clone(&handle));

        assert_eq!(lease.resource().map(|r| *r), Some(9));
        assert!(lease.is_connected());
        lease.release();
        assert!(handle.is_idle());
    }

    #[test]
    fn detached_lease_is_absent_and_inert() {
        let lease: Lease<u32> = Lease::detached();
        assert!(lease.resource().is_none());
        assert!(!lease.is_connected());
        lease.release();
    }

    #[test]
    fn lease_over_failed_connect_has_no_resource() {
        let connect: ConnectFn<u32> = Arc::new(|| panic!("refused"));
        let hook: PanicHook = Arc::new(|_| {});
        let handle = Arc::new(Handle::connect(&connect, &hook));
        assert!(handle.try_claim());

        let lease = Lease::manual(handle);
        assert!(lease.resource().is_none());
        assert!(!lease.is_connected());
    }
}

//! Reference-counted lifetime for protocol objects.
//!
//! Every object handed across the protocol boundary (endpoint, connector,
//! cursors) is shared-ownership reference counted: the host graph manager
//! may hold transient references from its own threads, and the object is
//! destroyed exactly once, when its count transitions to zero.
//!
//! [`Retained<T>`] is the owning handle (one count per handle). The count is
//! captured *before* any destruction, so the value returned by
//! [`Retained::release`] is never read from freed memory. [`Unowned<T>`] is
//! the non-owning back-reference used where the protocol guarantees the
//! referent outlives the use (connector → endpoint, endpoint → graph,
//! connection → peer).

use crate::error::{Error, Result};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::NonNull;
use std::sync::atomic::{self, AtomicUsize, Ordering};

// ============================================================================
// Retained - owning handle
// ============================================================================

struct RetainedBox<T> {
    count: AtomicUsize,
    value: T,
}

/// Shared-ownership handle to a reference-counted protocol object.
///
/// Each handle accounts for exactly one reference. Cloning acquires, dropping
/// releases, and the boxed value is dropped exactly once when the count hits
/// zero, on whichever thread performed the final release.
pub struct Retained<T> {
    ptr: NonNull<RetainedBox<T>>,
    _marker: PhantomData<RetainedBox<T>>,
}

// A handle can move between threads and be shared between them whenever the
// value itself can; same bounds as std's shared-ownership pointer.
unsafe impl<T: Send + Sync> Send for Retained<T> {}
unsafe impl<T: Send + Sync> Sync for Retained<T> {}

impl<T> Retained<T> {
    /// Allocate a new protocol object with a reference count of 1.
    ///
    /// The handle itself is a reference. Objects the protocol describes as
    /// "returned pre-referenced" (cursors) are simply returned as the handle
    /// produced here.
    pub fn new(value: T) -> Self {
        let boxed = Box::new(RetainedBox {
            count: AtomicUsize::new(1),
            value,
        });
        Self {
            ptr: NonNull::from(Box::leak(boxed)),
            _marker: PhantomData,
        }
    }

    #[inline]
    fn shared(&self) -> &RetainedBox<T> {
        // SAFETY: this handle holds one of the counted references, so the
        // box is alive for at least as long as `self`.
        unsafe { self.ptr.as_ref() }
    }

    /// Atomically take an additional reference.
    ///
    /// Returns the new handle together with the updated reference count.
    pub fn acquire(this: &Self) -> (Self, usize) {
        let previous = this.shared().count.fetch_add(1, Ordering::Relaxed);
        debug_assert!(previous > 0, "acquire on a destroyed object");
        (
            Self {
                ptr: this.ptr,
                _marker: PhantomData,
            },
            previous + 1,
        )
    }

    /// Atomically drop this reference, returning the remaining count.
    ///
    /// When the count reaches zero the object is destroyed and 0 is
    /// returned. The remaining count is captured before destruction; the
    /// returned value is only meaningful up to that instant.
    pub fn release(this: Self) -> usize {
        let ptr = this.ptr;
        std::mem::forget(this);
        // SAFETY: the forgotten handle still accounts for one reference,
        // which this decrement consumes.
        let previous = unsafe { ptr.as_ref() }.count.fetch_sub(1, Ordering::Release);
        if previous == 1 {
            atomic::fence(Ordering::Acquire);
            // SAFETY: the count reached zero exactly once; no other handle
            // or back-reference upgrade can observe the object anymore.
            drop(unsafe { Box::from_raw(ptr.as_ptr()) });
            0
        } else {
            previous - 1
        }
    }

    /// Snapshot of the current reference count.
    ///
    /// Racy by nature; useful for diagnostics and tests only.
    pub fn reference_count(this: &Self) -> usize {
        this.shared().count.load(Ordering::Relaxed)
    }

    /// Create a non-owning reference to the same object.
    pub fn downgrade(this: &Self) -> Unowned<T> {
        Unowned {
            ptr: this.ptr,
            _marker: PhantomData,
        }
    }

    /// Check whether two handles point at the same object.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.ptr == b.ptr
    }
}

impl<T> Clone for Retained<T> {
    fn clone(&self) -> Self {
        let (handle, _) = Retained::acquire(self);
        handle
    }
}

impl<T> Deref for Retained<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.shared().value
    }
}

impl<T> Drop for Retained<T> {
    fn drop(&mut self) {
        let previous = self.shared().count.fetch_sub(1, Ordering::Release);
        if previous == 1 {
            atomic::fence(Ordering::Acquire);
            // SAFETY: last reference gone; destroy exactly once.
            drop(unsafe { Box::from_raw(self.ptr.as_ptr()) });
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Retained<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

// ============================================================================
// Unowned - non-owning back-reference
// ============================================================================

/// Non-owning reference to a reference-counted protocol object.
///
/// Carries no count of its own. The protocol guarantees the referent's
/// lifetime externally: a connector never outlives its endpoint's use of it,
/// a joined graph outlives its membership, a connected peer outlives the
/// connection. Dereferencing or upgrading outside those guarantees is
/// undefined behavior, which is why both operations are `unsafe`.
pub struct Unowned<T> {
    ptr: NonNull<RetainedBox<T>>,
    _marker: PhantomData<RetainedBox<T>>,
}

unsafe impl<T: Send + Sync> Send for Unowned<T> {}
unsafe impl<T: Send + Sync> Sync for Unowned<T> {}

impl<T> Unowned<T> {
    /// Borrow the referent.
    ///
    /// # Safety
    ///
    /// The referent must still be alive, i.e. the external lifetime
    /// guarantee attached to this back-reference must hold at the call site.
    #[inline]
    pub unsafe fn get(&self) -> &T {
        // SAFETY: forwarded to the caller's contract.
        &unsafe { self.ptr.as_ref() }.value
    }

    /// Acquire an owning handle to the referent.
    ///
    /// # Safety
    ///
    /// The referent must still be alive (same contract as [`Unowned::get`]);
    /// the reference count must not have reached zero.
    pub unsafe fn upgrade(&self) -> Retained<T> {
        // SAFETY: forwarded to the caller's contract.
        let previous = unsafe { self.ptr.as_ref() }.count.fetch_add(1, Ordering::Relaxed);
        debug_assert!(previous > 0, "upgrade of a destroyed object");
        Retained {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T> Clone for Unowned<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Unowned<T> {}

// ============================================================================
// Capability dispatch
// ============================================================================

/// Identifier for a protocol capability an object may answer to.
///
/// The host asks objects for typed views of themselves through
/// [`QueryCapability`]; each identifier corresponds to one such view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapabilityId {
    /// The base shared-object capability every protocol object exposes.
    Object,
    /// The connector (pin) negotiation surface.
    Connector,
    /// The sample-reception surface of a connector.
    SampleInput,
    /// The persistence surface of the endpoint.
    Persist,
    /// The lifecycle-control surface of the endpoint.
    MediaControl,
    /// The graph-membership surface of the endpoint.
    Endpoint,
    /// A cursor over an endpoint's connectors.
    ConnectorCursor,
    /// A cursor over a connector's advertised formats.
    FormatCursor,
}

/// Capability lookup on a protocol object.
///
/// Resolution is a single `match` over the requested identifier: the first
/// matching arm wins and returns immediately with a newly acquired reference
/// tagged to that capability. There is no fallthrough past a match, so a
/// partial match can never silently select the wrong capability.
pub trait QueryCapability: Sized {
    /// Tagged set of capabilities this object answers to.
    type Capability;

    /// Resolve `id` to an acquired, typed reference, or
    /// [`Error::CapabilityNotFound`] when the object does not expose it.
    fn query_capability(this: &Retained<Self>, id: CapabilityId) -> Result<Self::Capability>;
}

/// Helper for implementors: the uniform "not supported" failure.
#[inline]
pub(crate) fn capability_not_found<T>(id: CapabilityId) -> Result<T> {
    Err(Error::CapabilityNotFound(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    /// Records one event per destruction.
    struct DropProbe(Arc<AtomicUsize>);

    impl Drop for DropProbe {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn new_handle_starts_at_one() {
        let handle = Retained::new(7_u32);
        assert_eq!(Retained::reference_count(&handle), 1);
        assert_eq!(*handle, 7);
    }

    #[test]
    fn acquire_and_release_report_counts() {
        let drops = Arc::new(AtomicUsize::new(0));
        let first = Retained::new(DropProbe(drops.clone()));

        let (second, count) = Retained::acquire(&first);
        assert_eq!(count, 2);

        assert_eq!(Retained::release(second), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 0);

        assert_eq!(Retained::release(first), 0);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_destroys_exactly_once() {
        let drops = Arc::new(AtomicUsize::new(0));
        let first = Retained::new(DropProbe(drops.clone()));
        let second = Retained::clone(&first);
        let third = Retained::clone(&second);

        drop(first);
        drop(second);
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        drop(third);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unowned_upgrade_acquires() {
        let handle = Retained::new(String::from("graph"));
        let weak = Retained::downgrade(&handle);

        // SAFETY: `handle` keeps the object alive across the upgrade.
        let upgraded = unsafe { weak.upgrade() };
        assert_eq!(Retained::reference_count(&handle), 2);
        assert!(Retained::ptr_eq(&handle, &upgraded));
        // SAFETY: as above.
        assert_eq!(unsafe { weak.get() }, "graph");

        drop(upgraded);
        assert_eq!(Retained::reference_count(&handle), 1);
    }

    /// Randomized concurrent acquire/release sequences that net to zero must
    /// trigger exactly one destruction event, regardless of interleaving.
    #[test]
    fn destruction_fires_once_under_concurrent_traffic() {
        use rand::Rng;

        for _ in 0..32 {
            let drops = Arc::new(AtomicUsize::new(0));
            let root = Retained::new(DropProbe(drops.clone()));

            let workers: Vec<_> = (0..4)
                .map(|_| {
                    let seed = Retained::clone(&root);
                    std::thread::spawn(move || {
                        let mut rng = rand::thread_rng();
                        let mut held = vec![seed];
                        for _ in 0..500 {
                            if rng.gen_bool(0.5) {
                                let pick = rng.gen_range(0..held.len());
                                held.push(Retained::clone(&held[pick]));
                            } else if held.len() > 1 {
                                let pick = rng.gen_range(0..held.len());
                                drop(held.swap_remove(pick));
                            }
                        }
                    })
                })
                .collect();

            drop(root);
            for worker in workers {
                worker.join().expect("refcount worker panicked");
            }
            assert_eq!(drops.load(Ordering::SeqCst), 1);
        }
    }
}

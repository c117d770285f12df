//! Weak (non-owning) references to intrusive targets.

use super::intrusive::{IntrusivePtr, WeakIntrusiveTarget, release_weak, try_upgrade};
use super::policy::{CountPolicy, RefCounts};
use std::fmt;
use std::ptr::NonNull;

/// Non-owning observer of an intrusively counted object.
///
/// Keeps the allocation (and its counters) alive, never the object.
pub struct WeakIntrusivePtr<T: WeakIntrusiveTarget> {
    ptr: NonNull<T>,
    counts: NonNull<RefCounts<T::Policy>>,
}

// SAFETY: same reasoning as for `IntrusivePtr`.
unsafe impl<T: WeakIntrusiveTarget + Send + Sync> Send for WeakIntrusivePtr<T> {}
// SAFETY: same reasoning as for `IntrusivePtr`.
unsafe impl<T: WeakIntrusiveTarget + Send + Sync> Sync for WeakIntrusivePtr<T> {}

impl<T: WeakIntrusiveTarget> WeakIntrusivePtr<T> {
    /// Adopt a weak reference to a live object.
    ///
    /// # Safety
    ///
    /// The object must be alive and the caller must own one weak reference.
    pub(crate) unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        // SAFETY: the object is alive.
        let counts = NonNull::from(unsafe { ptr.as_ref() }.ref_counts());
        Self { ptr, counts }
    }

    fn counts(&self) -> &RefCounts<T::Policy> {
        // SAFETY: our weak reference keeps the counters allocated.
        unsafe { self.counts.as_ref() }
    }

    /// Obtain a strong reference if the object still exists.
    pub fn upgrade(&self) -> Option<IntrusivePtr<T>> {
        // SAFETY: we hold a weak reference to these counters.
        if unsafe { try_upgrade(self.counts) } {
            // SAFETY: the successful upgrade is the strong reference we adopt.
            Some(unsafe { IntrusivePtr::from_raw(self.ptr) })
        } else {
            None
        }
    }

    /// Whether the object has not been dropped yet.
    pub fn is_alive(&self) -> bool {
        self.strong_count() > 0
    }

    /// Number of strong references to the object.
    pub fn strong_count(&self) -> usize {
        self.counts().strong()
    }

    /// Whether both weak references observe the same allocation.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.ptr == b.ptr
    }
}

impl<T: WeakIntrusiveTarget> Clone for WeakIntrusivePtr<T> {
    fn clone(&self) -> Self {
        <T::Policy as CountPolicy>::increment(self.counts().weak_counter());
        Self {
            ptr: self.ptr,
            counts: self.counts,
        }
    }
}

impl<T: WeakIntrusiveTarget> Drop for WeakIntrusivePtr<T> {
    fn drop(&mut self) {
        // SAFETY: we own one weak reference to this allocation.
        unsafe { release_weak(self.ptr, self.counts) };
    }
}

impl<T: WeakIntrusiveTarget> fmt::Debug for WeakIntrusivePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakIntrusivePtr")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::intrusive::IntrusiveTarget;
    use crate::memory::policy::Atomic;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    struct Node {
        counts: RefCounts<Atomic>,
        drops: Arc<AtomicUsize>,
    }

    unsafe impl IntrusiveTarget for Node {
        type Policy = Atomic;

        fn ref_counts(&self) -> &RefCounts<Atomic> {
            &self.counts
        }
    }

    unsafe impl WeakIntrusiveTarget for Node {}

    impl Drop for Node {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn node() -> (IntrusivePtr<Node>, Arc<AtomicUsize>) {
        let drops = Arc::new(AtomicUsize::new(0));
        let ptr = IntrusivePtr::new(Node {
            counts: RefCounts::new(),
            drops: drops.clone(),
        });
        (ptr, drops)
    }

    #[test]
    fn test_upgrade_while_alive() {
        let (strong, _) = node();
        let weak = IntrusivePtr::downgrade(&strong);
        assert!(weak.is_alive());
        let again = weak.upgrade().unwrap();
        assert_eq!(IntrusivePtr::strong_count(&again), 2);
        assert_eq!(IntrusivePtr::weak_count(&again), 1);
    }

    #[test]
    fn test_upgrade_after_drop_fails() {
        let (strong, drops) = node();
        let weak = IntrusivePtr::downgrade(&strong);
        let weak2 = weak.clone();
        drop(strong);
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        assert!(!weak.is_alive());
        assert!(weak.upgrade().is_none());
        assert!(weak2.upgrade().is_none());
    }

    #[test]
    fn test_concurrent_upgrade_and_release() {
        for _ in 0..50 {
            let (strong, drops) = node();
            let weak = IntrusivePtr::downgrade(&strong);
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let weak = weak.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            if let Some(s) = weak.upgrade() {
                                drop(s.clone());
                            }
                        }
                    })
                })
                .collect();
            drop(strong);
            for handle in handles {
                handle.join().unwrap();
            }
            assert_eq!(drops.load(Ordering::SeqCst), 1);
            assert!(weak.upgrade().is_none());
        }
    }
}

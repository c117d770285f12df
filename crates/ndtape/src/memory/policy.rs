//! Reference-count policies.
//!
//! A [`CountPolicy`] decides how the counters embedded in an intrusive target
//! are updated. [`Local`] uses plain cells and keeps its targets `!Sync`, so a
//! single-threaded tape pays nothing for atomics. [`Atomic`] allows strong and
//! weak references to be shared and raced across threads.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{self, AtomicUsize, Ordering};

/// Strategy for updating reference counts.
///
/// Every operation on a counter that is already zero and would go below zero
/// is a fatal invariant violation and panics.
pub trait CountPolicy: 'static {
    /// Counter storage.
    type Counter: fmt::Debug;

    /// Create a counter holding `value`.
    fn new_counter(value: usize) -> Self::Counter;

    /// Current value.
    fn load(counter: &Self::Counter) -> usize;

    /// Overwrite the value. Only valid while the counter is not shared.
    fn store(counter: &Self::Counter, value: usize);

    /// Increment and return the new value.
    fn increment(counter: &Self::Counter) -> usize;

    /// Decrement and return the new value.
    ///
    /// When the new value is zero, all accesses made by previous owners happen
    /// before the return.
    ///
    /// # Panics
    ///
    /// Panics if the counter is already zero.
    fn decrement(counter: &Self::Counter) -> usize;

    /// Increment unless the counter is zero, as one indivisible step.
    fn increment_if_nonzero(counter: &Self::Counter) -> bool;

    /// Move the counter from 1 to 0, as one indivisible step.
    fn release_if_unique(counter: &Self::Counter) -> bool;
}

/// Non-atomic counts for single-threaded object graphs.
#[derive(Debug, Clone, Copy, Default)]
pub struct Local;

/// Atomic counts for object graphs shared between threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct Atomic;

const MAX_COUNT: usize = isize::MAX as usize;

#[cold]
#[inline(never)]
fn underflow() -> ! {
    panic!("reference count underflow")
}

#[cold]
#[inline(never)]
fn overflow() -> ! {
    std::process::abort()
}

impl CountPolicy for Local {
    type Counter = Cell<usize>;

    fn new_counter(value: usize) -> Cell<usize> {
        Cell::new(value)
    }

    #[inline]
    fn load(counter: &Cell<usize>) -> usize {
        counter.get()
    }

    #[inline]
    fn store(counter: &Cell<usize>, value: usize) {
        counter.set(value);
    }

    #[inline]
    fn increment(counter: &Cell<usize>) -> usize {
        let n = counter.get();
        if n >= MAX_COUNT {
            overflow();
        }
        counter.set(n + 1);
        n + 1
    }

    #[inline]
    fn decrement(counter: &Cell<usize>) -> usize {
        let Some(n) = counter.get().checked_sub(1) else {
            underflow()
        };
        counter.set(n);
        n
    }

    #[inline]
    fn increment_if_nonzero(counter: &Cell<usize>) -> bool {
        if counter.get() == 0 {
            return false;
        }
        Self::increment(counter);
        true
    }

    #[inline]
    fn release_if_unique(counter: &Cell<usize>) -> bool {
        if counter.get() != 1 {
            return false;
        }
        counter.set(0);
        true
    }
}

impl CountPolicy for Atomic {
    type Counter = AtomicUsize;

    fn new_counter(value: usize) -> AtomicUsize {
        AtomicUsize::new(value)
    }

    #[inline]
    fn load(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::Acquire)
    }

    #[inline]
    fn store(counter: &AtomicUsize, value: usize) {
        counter.store(value, Ordering::Release);
    }

    #[inline]
    fn increment(counter: &AtomicUsize) -> usize {
        // A new reference can only be made from an existing one, so no
        // synchronization is needed here.
        let old = counter.fetch_add(1, Ordering::Relaxed);
        if old >= MAX_COUNT {
            overflow();
        }
        old + 1
    }

    #[inline]
    fn decrement(counter: &AtomicUsize) -> usize {
        let old = match counter.fetch_update(Ordering::Release, Ordering::Relaxed, |n| {
            n.checked_sub(1)
        }) {
            Ok(old) => old,
            Err(_) => underflow(),
        };
        if old == 1 {
            atomic::fence(Ordering::Acquire);
        }
        old - 1
    }

    #[inline]
    fn increment_if_nonzero(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |n| {
                if n == 0 {
                    None
                } else if n >= MAX_COUNT {
                    overflow()
                } else {
                    Some(n + 1)
                }
            })
            .is_ok()
    }

    #[inline]
    fn release_if_unique(counter: &AtomicUsize) -> bool {
        counter
            .compare_exchange(1, 0, Ordering::Acquire, Ordering::Relaxed)
            .is_ok()
    }
}

/// Strong and weak counters embedded in an intrusive target.
///
/// A fresh value has one strong reference and one weak reference. The weak
/// one is held collectively by all strong references and is released when the
/// object is dropped, so the allocation outlives the object while weak
/// observers remain.
///
/// Cloning produces fresh counts: a copy of an object is a new object.
pub struct RefCounts<P: CountPolicy> {
    strong: P::Counter,
    weak: P::Counter,
}

impl<P: CountPolicy> RefCounts<P> {
    /// Fresh counts: one strong, one (implicit) weak.
    pub fn new() -> Self {
        Self {
            strong: P::new_counter(1),
            weak: P::new_counter(1),
        }
    }

    /// Number of strong references.
    pub fn strong(&self) -> usize {
        P::load(&self.strong)
    }

    /// Number of weak references, excluding the implicit one.
    pub fn weak(&self) -> usize {
        let weak = P::load(&self.weak);
        if self.strong() == 0 {
            weak
        } else {
            weak.saturating_sub(1)
        }
    }

    pub(crate) fn strong_counter(&self) -> &P::Counter {
        &self.strong
    }

    pub(crate) fn weak_counter(&self) -> &P::Counter {
        &self.weak
    }

    /// Restore fresh counts on an object about to be placed behind a new owner.
    pub(crate) fn reset(&self) {
        P::store(&self.strong, 1);
        P::store(&self.weak, 1);
    }
}

impl<P: CountPolicy> Default for RefCounts<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: CountPolicy> Clone for RefCounts<P> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<P: CountPolicy> fmt::Debug for RefCounts<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefCounts")
            .field("strong", &self.strong())
            .field("weak", &self.weak())
            .finish()
    }
}

//! Intrusive strong ownership.
//!
//! The counters live inside the owned object (see [`RefCounts`]), so a
//! pointer to the object is all an owner needs. [`IntrusivePtr`] is the
//! ready-made owner; the free functions [`acquire`], [`release`],
//! [`acquire_weak`], [`release_weak`] and [`try_upgrade`] let other wrappers
//! manage the same objects without going through it.
//!
//! ```text
//! strong 1 -> 0 : drop the object in place, release the implicit weak count
//! weak   1 -> 0 : free the allocation
//! ```

use super::aligned::{AlignedAllocator, RECORD_ALIGNMENT};
use super::policy::{CountPolicy, RefCounts};
use super::weak::WeakIntrusivePtr;
use crate::error::Result;
use std::alloc::{Layout, handle_alloc_error};
use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::ptr::{self, NonNull};

/// Objects that embed their own strong count.
///
/// # Safety
///
/// `ref_counts` must return the same embedded counters for the whole life of
/// the object, and the counters must not be modified except through this
/// module.
pub unsafe trait IntrusiveTarget {
    /// Counting policy of this object type.
    type Policy: CountPolicy;

    /// The embedded counters.
    fn ref_counts(&self) -> &RefCounts<Self::Policy>;
}

/// Objects that may additionally be observed through weak references.
///
/// # Safety
///
/// Same contract as [`IntrusiveTarget`]. In addition, the counters must stay
/// readable after the object has been dropped in place, which holds for the
/// plain [`RefCounts`] field since it has no drop glue.
pub unsafe trait WeakIntrusiveTarget: IntrusiveTarget {}

type Allocator<T> = AlignedAllocator<T, RECORD_ALIGNMENT>;

/// Add a strong reference.
///
/// The caller becomes responsible for a matching [`release`].
pub fn acquire<T: IntrusiveTarget>(target: &T) {
    <T::Policy as CountPolicy>::increment(target.ref_counts().strong_counter());
}

/// Drop a strong reference.
///
/// The last strong reference drops the object in place and gives up the
/// implicit weak reference, freeing the allocation if no weak observer is left.
///
/// # Safety
///
/// `ptr` must point to a live object allocated by [`IntrusivePtr`], and the
/// caller must own the strong reference being released.
pub unsafe fn release<T: IntrusiveTarget>(ptr: NonNull<T>) {
    // SAFETY: the caller owns a strong reference, so the object is alive.
    let counts = NonNull::from(unsafe { ptr.as_ref() }.ref_counts());
    // SAFETY: as above.
    let remaining =
        unsafe { <T::Policy as CountPolicy>::decrement(counts.as_ref().strong_counter()) };
    if remaining == 0 {
        // SAFETY: this was the last strong reference; nobody can observe the
        // object any more except through the counters.
        unsafe {
            ptr::drop_in_place(ptr.as_ptr());
            release_weak(ptr, counts);
        }
    }
}

/// Add a weak reference.
///
/// The caller becomes responsible for a matching [`release_weak`].
pub fn acquire_weak<T: WeakIntrusiveTarget>(target: &T) {
    <T::Policy as CountPolicy>::increment(target.ref_counts().weak_counter());
}

/// Drop a weak reference, freeing the allocation when it was the last one.
///
/// # Safety
///
/// `counts` must be the counters embedded in `*ptr`, the allocation must come
/// from [`IntrusivePtr`], and the caller must own the weak reference.
pub unsafe fn release_weak<T: IntrusiveTarget>(
    ptr: NonNull<T>,
    counts: NonNull<RefCounts<T::Policy>>,
) {
    // SAFETY: the allocation is alive while the caller holds a weak reference.
    let remaining =
        unsafe { <T::Policy as CountPolicy>::decrement(counts.as_ref().weak_counter()) };
    if remaining == 0 {
        // SAFETY: last reference of any kind; allocated with the same allocator.
        unsafe { Allocator::<T>::new().deallocate(ptr, 1) };
    }
}

/// Try to turn a weak reference into a new strong one.
///
/// Succeeds iff the strong count is still positive; the check and the
/// increment are one indivisible step under the atomic policy.
///
/// # Safety
///
/// `counts` must point to the counters of an allocation the caller holds a
/// weak reference to.
pub unsafe fn try_upgrade<P: CountPolicy>(counts: NonNull<RefCounts<P>>) -> bool {
    // SAFETY: the weak reference keeps the counters allocated.
    P::increment_if_nonzero(unsafe { counts.as_ref() }.strong_counter())
}

/// Owning pointer to an intrusively counted object.
///
/// Objects are placed in blocks aligned to [`RECORD_ALIGNMENT`].
pub struct IntrusivePtr<T: IntrusiveTarget> {
    ptr: NonNull<T>,
    _marker: PhantomData<T>,
}

// SAFETY: shared ownership of `T` across threads needs `T: Send + Sync`, as for
// `Arc`. Targets using the `Local` policy are never `Sync`.
unsafe impl<T: IntrusiveTarget + Send + Sync> Send for IntrusivePtr<T> {}
// SAFETY: see above.
unsafe impl<T: IntrusiveTarget + Send + Sync> Sync for IntrusivePtr<T> {}

impl<T: IntrusiveTarget> IntrusivePtr<T> {
    /// Move `value` into a new aligned allocation.
    ///
    /// The embedded counts are reset to one strong reference.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::AllocationFailed` if the allocator is out of memory.
    pub fn try_new(value: T) -> Result<Self> {
        value.ref_counts().reset();
        let ptr = Allocator::<T>::new().allocate(1)?;
        // SAFETY: fresh allocation with room for one `T`.
        unsafe { ptr.as_ptr().write(value) };
        Ok(Self {
            ptr,
            _marker: PhantomData,
        })
    }

    /// Like [`try_new`](Self::try_new), but aborts through
    /// [`handle_alloc_error`] when out of memory, as `Box::new` does.
    pub fn new(value: T) -> Self {
        match Self::try_new(value) {
            Ok(this) => this,
            Err(_) => handle_alloc_error(Layout::new::<T>()),
        }
    }

    /// Give up ownership without releasing the strong reference.
    pub fn into_raw(this: Self) -> NonNull<T> {
        let ptr = this.ptr;
        std::mem::forget(this);
        ptr
    }

    /// Take ownership of a strong reference.
    ///
    /// # Safety
    ///
    /// `ptr` must come from [`into_raw`](Self::into_raw), or be a live object
    /// for which the caller has performed an [`acquire`] or successful
    /// [`try_upgrade`].
    pub unsafe fn from_raw(ptr: NonNull<T>) -> Self {
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    /// Number of strong references.
    pub fn strong_count(this: &Self) -> usize {
        this.ref_counts().strong()
    }

    /// Number of weak references.
    pub fn weak_count(this: &Self) -> usize {
        this.ref_counts().weak()
    }

    /// Whether both pointers refer to the same object.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        a.ptr == b.ptr
    }

    /// Raw pointer to the object.
    pub fn as_ptr(this: &Self) -> *const T {
        this.ptr.as_ptr()
    }

    /// Mutable access if this is the only reference of any kind.
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        let counts = this.ref_counts();
        let unique = <T::Policy as CountPolicy>::load(counts.strong_counter()) == 1
            && <T::Policy as CountPolicy>::load(counts.weak_counter()) == 1;
        // SAFETY: no other strong or weak reference exists, and `&mut self`
        // prevents new ones from being made.
        unique.then(|| unsafe { this.ptr.as_mut() })
    }

    /// Move the object out if this is the only strong reference.
    ///
    /// Weak observers see the object as gone afterwards.
    ///
    /// # Errors
    ///
    /// Returns the pointer unchanged if other strong references exist.
    pub fn try_unwrap(this: Self) -> std::result::Result<T, Self> {
        let counts = NonNull::from(this.ref_counts());
        // SAFETY: `this` keeps the counters alive.
        let strong = unsafe { counts.as_ref() }.strong_counter();
        if !<T::Policy as CountPolicy>::release_if_unique(strong) {
            return Err(this);
        }
        let ptr = Self::into_raw(this);
        // SAFETY: the strong count is now zero, so we are the only reader; the
        // counters stay in place for weak observers.
        let value = unsafe { ptr::read(ptr.as_ptr()) };
        // SAFETY: the implicit weak reference was held by the strong side.
        unsafe { release_weak(ptr, counts) };
        value.ref_counts().reset();
        Ok(value)
    }
}

impl<T: WeakIntrusiveTarget> IntrusivePtr<T> {
    /// Create a weak reference to the object.
    pub fn downgrade(this: &Self) -> WeakIntrusivePtr<T> {
        acquire_weak(&**this);
        // SAFETY: the weak count was just incremented for the new reference.
        unsafe { WeakIntrusivePtr::from_raw(this.ptr) }
    }
}

impl<T: IntrusiveTarget> Clone for IntrusivePtr<T> {
    fn clone(&self) -> Self {
        acquire(&**self);
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T: IntrusiveTarget> Drop for IntrusivePtr<T> {
    fn drop(&mut self) {
        // SAFETY: we own one strong reference.
        unsafe { release(self.ptr) };
    }
}

impl<T: IntrusiveTarget> Deref for IntrusivePtr<T> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        // SAFETY: a strong reference keeps the object alive.
        unsafe { self.ptr.as_ref() }
    }
}

impl<T: IntrusiveTarget + fmt::Debug> fmt::Debug for IntrusivePtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

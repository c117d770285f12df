//! Aligned allocation.
//!
//! [`AlignedAllocator`] hands out blocks whose address is a multiple of a
//! compile-time power-of-two alignment. [`AlignedBuffer`] is the owned,
//! fixed-length buffer built on it that backs every `Store`.

use crate::error::{Result, TapeError};
use std::alloc::{self, Layout};
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Deref, DerefMut};
use std::ptr::{self, NonNull};

/// Alignment of record allocations.
pub const RECORD_ALIGNMENT: usize = 16;

/// Alignment of tensor element buffers (one cache line, AVX-512 friendly).
pub const STORE_ALIGNMENT: usize = 64;

/// Stateless allocator for `T` aligned to `ALIGN` bytes.
///
/// The effective alignment is `max(ALIGN, align_of::<T>())`. Instances carry no
/// state, so any two allocators with the same `ALIGN` are interchangeable and
/// compare equal whatever their element type.
pub struct AlignedAllocator<T, const ALIGN: usize> {
    _marker: PhantomData<fn() -> T>,
}

impl<T, const ALIGN: usize> AlignedAllocator<T, ALIGN> {
    const ALIGN_IS_POWER_OF_TWO: () =
        assert!(ALIGN.is_power_of_two(), "alignment must be a power of two");

    /// Effective alignment of returned blocks.
    pub const ALIGNMENT: usize = if ALIGN > align_of::<T>() {
        ALIGN
    } else {
        align_of::<T>()
    };

    /// Create an allocator.
    pub const fn new() -> Self {
        let () = Self::ALIGN_IS_POWER_OF_TWO;
        Self {
            _marker: PhantomData,
        }
    }

    /// The same allocator for another element type, keeping the alignment.
    pub const fn rebind<U>(self) -> AlignedAllocator<U, ALIGN> {
        AlignedAllocator::new()
    }

    /// Layout of a block holding `n` elements.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::CapacityOverflow` if the byte size overflows `isize`.
    pub fn layout(n: usize) -> Result<Layout> {
        let overflow = || TapeError::CapacityOverflow {
            len: n,
            elem_size: size_of::<T>(),
        };
        let bytes = size_of::<T>().checked_mul(n).ok_or_else(overflow)?;
        Layout::from_size_align(bytes, Self::ALIGNMENT).map_err(|_| overflow())
    }

    /// Allocate uninitialized space for `n` elements.
    ///
    /// Zero-byte requests return a dangling pointer that is still aligned.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::CapacityOverflow` for impossible sizes and
    /// `TapeError::AllocationFailed` if the global allocator is out of memory.
    pub fn allocate(&self, n: usize) -> Result<NonNull<T>> {
        let () = Self::ALIGN_IS_POWER_OF_TWO;
        let layout = Self::layout(n)?;
        let failed = || TapeError::AllocationFailed {
            bytes: layout.size(),
            align: layout.align(),
        };
        if layout.size() == 0 {
            return NonNull::new(ptr::without_provenance_mut(layout.align())).ok_or_else(failed);
        }
        // SAFETY: layout has non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        NonNull::new(raw.cast::<T>()).ok_or_else(failed)
    }

    /// Release a block returned by [`allocate`](Self::allocate).
    ///
    /// # Safety
    ///
    /// `ptr` must come from `allocate(n)` on an allocator with the same `ALIGN`
    /// and element type, with the same `n`, and must not be used afterwards.
    pub unsafe fn deallocate(&self, ptr: NonNull<T>, n: usize) {
        let Ok(layout) = Self::layout(n) else {
            return;
        };
        if layout.size() != 0 {
            // SAFETY: guaranteed by the caller.
            unsafe { alloc::dealloc(ptr.as_ptr().cast(), layout) };
        }
    }
}

impl<T, const ALIGN: usize> Default for AlignedAllocator<T, ALIGN> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const ALIGN: usize> Clone for AlignedAllocator<T, ALIGN> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T, const ALIGN: usize> Copy for AlignedAllocator<T, ALIGN> {}

impl<T, const ALIGN: usize> fmt::Debug for AlignedAllocator<T, ALIGN> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedAllocator")
            .field("align", &Self::ALIGNMENT)
            .finish()
    }
}

impl<T, U, const ALIGN: usize> PartialEq<AlignedAllocator<U, ALIGN>>
    for AlignedAllocator<T, ALIGN>
{
    fn eq(&self, _other: &AlignedAllocator<U, ALIGN>) -> bool {
        true
    }
}

impl<T, const ALIGN: usize> Eq for AlignedAllocator<T, ALIGN> {}

/// Owned, fixed-length buffer of `T` aligned to `ALIGN` bytes.
pub struct AlignedBuffer<T: Copy, const ALIGN: usize> {
    ptr: NonNull<T>,
    len: usize,
}

// SAFETY: the buffer uniquely owns its elements, like `Box<[T]>`.
unsafe impl<T: Copy + Send, const ALIGN: usize> Send for AlignedBuffer<T, ALIGN> {}
// SAFETY: shared access only hands out `&[T]`.
unsafe impl<T: Copy + Sync, const ALIGN: usize> Sync for AlignedBuffer<T, ALIGN> {}

impl<T: Copy, const ALIGN: usize> AlignedBuffer<T, ALIGN> {
    /// Allocate `len` elements, each set to `value`.
    ///
    /// # Errors
    ///
    /// Propagates allocation failure from [`AlignedAllocator::allocate`].
    pub fn filled(len: usize, value: T) -> Result<Self> {
        let ptr = AlignedAllocator::<T, ALIGN>::new().allocate(len)?;
        for i in 0..len {
            // SAFETY: `i < len` and the block holds `len` elements.
            unsafe { ptr.as_ptr().add(i).write(value) };
        }
        Ok(Self { ptr, len })
    }

    /// Allocate a copy of `data`.
    ///
    /// # Errors
    ///
    /// Propagates allocation failure from [`AlignedAllocator::allocate`].
    pub fn from_slice(data: &[T]) -> Result<Self> {
        let ptr = AlignedAllocator::<T, ALIGN>::new().allocate(data.len())?;
        // SAFETY: fresh allocation of `data.len()` elements cannot overlap `data`.
        unsafe { ptr::copy_nonoverlapping(data.as_ptr(), ptr.as_ptr(), data.len()) };
        Ok(Self {
            ptr,
            len: data.len(),
        })
    }

    /// Fallible clone.
    pub fn try_clone(&self) -> Result<Self> {
        Self::from_slice(self)
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Get immutable slice of data.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: `ptr` is valid and initialized for `len` elements.
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// Get mutable slice of data.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: unique access through `&mut self`.
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<T: Copy, const ALIGN: usize> Drop for AlignedBuffer<T, ALIGN> {
    fn drop(&mut self) {
        // SAFETY: allocated by `allocate(self.len)` with the same parameters.
        unsafe { AlignedAllocator::<T, ALIGN>::new().deallocate(self.ptr, self.len) };
    }
}

impl<T: Copy, const ALIGN: usize> Clone for AlignedBuffer<T, ALIGN> {
    fn clone(&self) -> Self {
        match self.try_clone() {
            Ok(buffer) => buffer,
            Err(_) => alloc::handle_alloc_error(
                AlignedAllocator::<T, ALIGN>::layout(self.len).unwrap_or(Layout::new::<T>()),
            ),
        }
    }
}

impl<T: Copy, const ALIGN: usize> Deref for AlignedBuffer<T, ALIGN> {
    type Target = [T];

    #[inline]
    fn deref(&self) -> &[T] {
        self.as_slice()
    }
}

impl<T: Copy, const ALIGN: usize> DerefMut for AlignedBuffer<T, ALIGN> {
    #[inline]
    fn deref_mut(&mut self) -> &mut [T] {
        self.as_mut_slice()
    }
}

impl<T: Copy + fmt::Debug, const ALIGN: usize> fmt::Debug for AlignedBuffer<T, ALIGN> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

impl<T: Copy + PartialEq, const ALIGN: usize> PartialEq for AlignedBuffer<T, ALIGN> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

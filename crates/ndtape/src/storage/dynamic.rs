//! Rank-erased storage.
//!
//! The tape keeps activations and gradients of records with different ranks
//! side by side, so it holds them as [`DynStore`] and hands them out as
//! [`DynView`]. Both convert back to the static-rank types with a rank check.

use super::store::Store;
use super::view::StoreView;
use crate::error::{Result, TapeError};
use crate::memory::{AlignedBuffer, STORE_ALIGNMENT};
use crate::scalar::Scalar;
use crate::shape::Shape;
use crate::strides::element_count;
use smallvec::SmallVec;

/// Extents of a rank-erased store; ranks up to 4 stay inline.
pub type DynExtents = SmallVec<[usize; 4]>;

fn static_extents<const R: usize>(extents: &[usize]) -> Result<[usize; R]> {
    extents.try_into().map_err(|_| TapeError::RankMismatch {
        expected: R,
        actual: extents.len(),
    })
}

/// Owned row-major storage whose rank is only known at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct DynStore<T: Scalar> {
    extents: DynExtents,
    data: AlignedBuffer<T, STORE_ALIGNMENT>,
}

impl<T: Scalar> DynStore<T> {
    /// Create a store with every element set to `value`.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::CapacityOverflow` if the element count overflows,
    /// or an allocation error.
    pub fn filled(extents: &[usize], value: T) -> Result<Self> {
        let len = element_count::<T>(extents)?;
        Ok(Self {
            extents: extents.iter().copied().collect(),
            data: AlignedBuffer::filled(len, value)?,
        })
    }

    /// Create a zero-initialized store.
    pub fn zeros(extents: &[usize]) -> Result<Self> {
        Self::filled(extents, T::zero())
    }

    pub(crate) fn from_parts(extents: &[usize], data: AlignedBuffer<T, STORE_ALIGNMENT>) -> Self {
        Self {
            extents: extents.iter().copied().collect(),
            data,
        }
    }

    /// Per-axis extents.
    #[inline]
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Number of axes.
    #[inline]
    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the store has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major element slice.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable row-major element slice.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Borrow as a rank-erased view.
    pub fn as_view(&self) -> DynView<'_, T> {
        DynView::new(&self.extents, &self.data)
    }

    /// Borrow as a view of rank `R`.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::RankMismatch` if the rank is not `R`.
    pub fn view<const R: usize>(&self) -> Result<StoreView<'_, T, R>> {
        self.as_view().to_static()
    }

    /// Recover the static-rank store without copying.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::RankMismatch` if the rank is not `R`.
    pub fn into_static<const R: usize>(self) -> Result<Store<T, R>> {
        let extents = static_extents::<R>(&self.extents)?;
        Ok(Store::from_parts(Shape::new(extents), self.data))
    }
}

/// Borrowed row-major elements whose rank is only known at runtime.
#[derive(Debug, Clone, Copy)]
pub struct DynView<'a, T: Scalar> {
    extents: &'a [usize],
    data: &'a [T],
}

impl<'a, T: Scalar> DynView<'a, T> {
    pub(crate) fn new(extents: &'a [usize], data: &'a [T]) -> Self {
        debug_assert_eq!(extents.iter().product::<usize>(), data.len());
        Self { extents, data }
    }

    /// Per-axis extents.
    #[inline]
    pub fn extents(&self) -> &'a [usize] {
        self.extents
    }

    /// Number of axes.
    #[inline]
    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    /// Number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the view has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Row-major element slice.
    #[inline]
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Reinterpret as a view of rank `R`.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::RankMismatch` if the rank is not `R`.
    pub fn to_static<const R: usize>(&self) -> Result<StoreView<'a, T, R>> {
        let extents = static_extents::<R>(self.extents)?;
        Ok(StoreView::new(Shape::new(extents), self.data))
    }

    /// Copy into an owned store.
    pub fn to_owned(&self) -> Result<DynStore<T>> {
        Ok(DynStore {
            extents: self.extents.iter().copied().collect(),
            data: AlignedBuffer::from_slice(self.data)?,
        })
    }
}

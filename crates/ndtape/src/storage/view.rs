//! Borrowed read-only views of storage.

use super::store::Store;
use crate::error::Result;
use crate::scalar::Scalar;
use crate::shape::Shape;

/// Read-only view of rank `R` over borrowed row-major elements.
#[derive(Debug, Clone, Copy)]
pub struct StoreView<'a, T: Scalar, const R: usize> {
    shape: Shape<R>,
    data: &'a [T],
}

impl<'a, T: Scalar, const R: usize> StoreView<'a, T, R> {
    pub(crate) fn new(shape: Shape<R>, data: &'a [T]) -> Self {
        debug_assert_eq!(shape.len(), data.len());
        Self { shape, data }
    }

    /// Shape descriptor.
    #[inline]
    pub fn shape(&self) -> Shape<R> {
        self.shape
    }

    /// Per-axis extents.
    #[inline]
    pub fn extents(&self) -> &[usize; R] {
        self.shape.extents()
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

    /// Element at a multi-index.
    #[inline]
    pub fn at(&self, idx: [usize; R]) -> T {
        self.data[self.shape.linear(&idx)]
    }

    /// Element at a flattened row-major offset.
    #[inline]
    pub fn linear(&self, i: usize) -> T {
        self.data[i]
    }

    /// Row-major element slice.
    #[inline]
    pub fn as_slice(&self) -> &'a [T] {
        self.data
    }

    /// Copy into an owned store.
    pub fn to_store(&self) -> Result<Store<T, R>> {
        Store::from_slice(self.shape, self.data)
    }
}

impl<'a, T: Scalar> StoreView<'a, T, 0> {
    /// The single element of a rank-0 view.
    #[inline]
    pub fn value(&self) -> T {
        self.data[0]
    }
}

impl<'a, T: Scalar, const R: usize> From<&'a Store<T, R>> for StoreView<'a, T, R> {
    fn from(store: &'a Store<T, R>) -> Self {
        store.view()
    }
}

impl<T: Scalar, const R: usize> PartialEq<Store<T, R>> for StoreView<'_, T, R> {
    fn eq(&self, other: &Store<T, R>) -> bool {
        self.extents() == other.extents() && self.data == other.as_slice()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_view_reads_store() {
        let s = Store::from_vec([2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let v = s.view();
        assert_eq!(v.at([1, 0]), 3.0);
        assert_eq!(v.linear(3), 4.0);
        assert_eq!(v.extents(), &[2, 2]);
        assert!(v == s);
    }

    #[test]
    fn test_to_store_copies() {
        let s = Store::from_vec([2], vec![1.0, 2.0]).unwrap();
        let copy = s.view().to_store().unwrap();
        assert_eq!(copy, s);
        assert_ne!(copy.as_slice().as_ptr(), s.as_slice().as_ptr());
    }
}

//! Owned dense storage of compile-time rank.

use super::dynamic::{DynStore, DynView};
use super::view::StoreView;
use crate::error::{Result, TapeError};
use crate::expr::StoreExpr;
use crate::memory::{AlignedBuffer, STORE_ALIGNMENT};
use crate::scalar::Scalar;
use crate::shape::Shape;
use crate::strides::element_count;
use std::ops::{Index, IndexMut};

/// Dense, row-major storage of rank `R`.
///
/// Elements live in a buffer aligned to [`STORE_ALIGNMENT`]. Cloning copies
/// the buffer; two stores never share elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Store<T: Scalar, const R: usize> {
    shape: Shape<R>,
    data: AlignedBuffer<T, STORE_ALIGNMENT>,
}

impl<T: Scalar, const R: usize> Store<T, R> {
    /// Create a store with every element set to `value`.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::CapacityOverflow` if the element count of `shape`
    /// overflows, or an allocation error if the buffer cannot be allocated.
    pub fn filled(shape: impl Into<Shape<R>>, value: T) -> Result<Self> {
        let shape = shape.into();
        let data = AlignedBuffer::filled(element_count::<T>(shape.extents())?, value)?;
        Ok(Self { shape, data })
    }

    /// Create a zero-initialized store.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndtape::Store;
    ///
    /// let s: Store<f64, 3> = Store::zeros([2, 3, 4]).unwrap();
    /// assert_eq!(s.extents(), &[2, 3, 4]);
    /// assert_eq!(s.len(), 24);
    /// ```
    pub fn zeros(shape: impl Into<Shape<R>>) -> Result<Self> {
        Self::filled(shape, T::zero())
    }

    /// Create a store filled with ones.
    pub fn ones(shape: impl Into<Shape<R>>) -> Result<Self> {
        Self::filled(shape, T::one())
    }

    /// Create a store from row-major data.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::CapacityOverflow` if the element count of `shape`
    /// overflows, or `TapeError::ShapeMismatch` if `data.len()` differs from
    /// it.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndtape::Store;
    ///
    /// let s = Store::from_slice([2, 3], &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
    /// assert_eq!(s.at([0, 2]), 3.0);
    /// assert_eq!(s.at([1, 0]), 4.0); // Row-major: [1,0] is the fourth element
    /// ```
    pub fn from_slice(shape: impl Into<Shape<R>>, data: &[T]) -> Result<Self> {
        let shape = shape.into();
        let len = element_count::<T>(shape.extents())?;
        if data.len() != len {
            return Err(TapeError::ShapeMismatch {
                expected: len,
                actual: data.len(),
            });
        }
        Ok(Self {
            shape,
            data: AlignedBuffer::from_slice(data)?,
        })
    }

    /// Create a store from a row-major vector.
    ///
    /// # Errors
    ///
    /// Same as [`from_slice`](Self::from_slice).
    pub fn from_vec(shape: impl Into<Shape<R>>, data: Vec<T>) -> Result<Self> {
        Self::from_slice(shape, &data)
    }

    /// Create a store by evaluating `f` at every multi-index.
    pub fn from_fn(shape: impl Into<Shape<R>>, mut f: impl FnMut([usize; R]) -> T) -> Result<Self> {
        let mut store = Self::zeros(shape)?;
        for (slot, idx) in store.data.iter_mut().zip(store.shape.indices()) {
            *slot = f(idx);
        }
        Ok(store)
    }

    /// Materialize a lazy expression.
    pub fn from_expr<E>(expr: &E) -> Result<Self>
    where
        E: StoreExpr<R, Elem = T> + ?Sized,
    {
        Self::from_fn(expr.shape(), |idx| expr.at(idx))
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

    /// Check if the store has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Element at a multi-index.
    ///
    /// Per-axis bounds are only checked in debug builds.
    #[inline]
    pub fn at(&self, idx: [usize; R]) -> T {
        self.data[self.shape.linear(&idx)]
    }

    /// Mutable element at a multi-index.
    #[inline]
    pub fn at_mut(&mut self, idx: [usize; R]) -> &mut T {
        let i = self.shape.linear(&idx);
        &mut self.data[i]
    }

    /// Element at a multi-index, or `None` if out of bounds.
    pub fn get(&self, idx: [usize; R]) -> Option<&T> {
        if self.shape.contains(&idx) {
            self.data.get(self.shape.linear(&idx))
        } else {
            None
        }
    }

    /// Element at a flattened row-major offset.
    #[inline]
    pub fn linear(&self, i: usize) -> T {
        debug_assert!(i < self.len(), "linear index {i} out of bounds");
        self.data[i]
    }

    /// Mutable element at a flattened row-major offset.
    #[inline]
    pub fn linear_mut(&mut self, i: usize) -> &mut T {
        debug_assert!(i < self.len(), "linear index {i} out of bounds");
        &mut self.data[i]
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

    /// Set every element to `value`.
    pub fn fill(&mut self, value: T) {
        self.data.fill(value);
    }

    /// Borrow as a view.
    #[inline]
    pub fn view(&self) -> StoreView<'_, T, R> {
        StoreView::new(self.shape, &self.data)
    }

    /// Borrow with the rank erased.
    pub fn dyn_view(&self) -> DynView<'_, T> {
        DynView::new(self.shape.extents(), &self.data)
    }

    /// Erase the rank, keeping the buffer.
    pub fn into_dyn(self) -> DynStore<T> {
        DynStore::from_parts(self.shape.extents(), self.data)
    }

    /// Rebuild from parts checked by the caller.
    pub(crate) fn from_parts(shape: Shape<R>, data: AlignedBuffer<T, STORE_ALIGNMENT>) -> Self {
        debug_assert_eq!(shape.len(), data.len());
        Self { shape, data }
    }

    /// Fallible deep copy.
    ///
    /// # Errors
    ///
    /// Returns an allocation error instead of aborting like `clone` does.
    pub fn try_clone(&self) -> Result<Self> {
        Ok(Self {
            shape: self.shape,
            data: self.data.try_clone()?,
        })
    }

    /// Elementwise map into a new store.
    ///
    /// # Errors
    ///
    /// Returns an allocation error if the new buffer cannot be allocated.
    pub fn mapv(&self, f: impl Fn(T) -> T) -> Result<Self> {
        let mut out = self.try_clone()?;
        out.data.iter_mut().for_each(|x| *x = f(*x));
        Ok(out)
    }
}

impl<T: Scalar> Store<T, 0> {
    /// Create a rank-0 store holding `value`.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndtape::Store;
    ///
    /// let s = Store::scalar(2.5).unwrap();
    /// assert_eq!(s.value(), 2.5);
    /// assert_eq!(s.len(), 1);
    /// ```
    pub fn scalar(value: T) -> Result<Self> {
        Self::filled(Shape::scalar(), value)
    }

    /// The single stored element.
    #[inline]
    pub fn value(&self) -> T {
        self.data[0]
    }
}

impl<T: Scalar, const R: usize> Index<[usize; R]> for Store<T, R> {
    type Output = T;

    #[inline]
    fn index(&self, idx: [usize; R]) -> &T {
        &self.data[self.shape.linear(&idx)]
    }
}

impl<T: Scalar, const R: usize> IndexMut<[usize; R]> for Store<T, R> {
    #[inline]
    fn index_mut(&mut self, idx: [usize; R]) -> &mut T {
        self.at_mut(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::c64;

    #[test]
    fn test_zeros() {
        let s: Store<f64, 2> = Store::zeros([2, 3]).unwrap();
        assert_eq!(s.len(), 6);
        assert!(s.as_slice().iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_row_major_access() {
        let s = Store::from_vec([2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let mut seen = Vec::new();
        for i in 0..2 {
            for j in 0..3 {
                seen.push(s.at([i, j]));
            }
        }
        assert_eq!(seen, vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(s.linear(4), 5.0);
        assert_eq!(s[[1, 2]], 6.0);
    }

    #[test]
    fn test_from_vec_length_mismatch() {
        let err = Store::<f64, 2>::from_vec([2, 2], vec![1.0; 3]).unwrap_err();
        assert!(matches!(
            err,
            TapeError::ShapeMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_overflowing_shape_is_rejected() {
        let huge = [1usize << 32, 1 << 32];
        assert!(matches!(
            Store::<f64, 2>::zeros(huge),
            Err(TapeError::CapacityOverflow { .. })
        ));
        assert!(matches!(
            Store::<f64, 2>::from_slice(huge, &[]),
            Err(TapeError::CapacityOverflow { .. })
        ));
        assert!(matches!(
            Store::<f64, 2>::from_fn(huge, |_| 0.0),
            Err(TapeError::CapacityOverflow { .. })
        ));
        // a zero axis keeps the product in range
        let empty: Store<f64, 3> = Store::zeros([usize::MAX, 2, 0]).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_try_clone_and_mapv_copy() {
        let s = Store::from_vec([3], vec![1.0, -2.0, 3.0]).unwrap();
        let mut copy = s.try_clone().unwrap();
        copy.fill(0.0);
        assert_eq!(s.as_slice(), &[1.0, -2.0, 3.0]);
        assert_eq!(s.mapv(|x| x * 2.0).unwrap().as_slice(), &[2.0, -4.0, 6.0]);

        let mut evaluated = StoreExpr::eval(&s).unwrap();
        evaluated.fill(1.0);
        assert_eq!(s.as_slice(), &[1.0, -2.0, 3.0]);
        assert_eq!(evaluated.as_slice(), &[1.0; 3]);
    }

    #[test]
    fn test_from_fn() {
        let s: Store<f64, 2> = Store::from_fn([2, 2], |[i, j]| (10 * i + j) as f64).unwrap();
        assert_eq!(s.as_slice(), &[0.0, 1.0, 10.0, 11.0]);
    }

    #[test]
    fn test_at_mut_and_index_mut() {
        let mut s: Store<f64, 2> = Store::zeros([2, 2]).unwrap();
        *s.at_mut([0, 1]) = 3.0;
        s[[1, 0]] = 4.0;
        *s.linear_mut(3) = 5.0;
        assert_eq!(s.as_slice(), &[0.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_get_out_of_bounds() {
        let s: Store<f64, 2> = Store::zeros([2, 3]).unwrap();
        assert!(s.get([1, 2]).is_some());
        // Linear offset 3 is in range, but axis 1 is not.
        assert!(s.get([0, 3]).is_none());
    }

    #[test]
    fn test_clone_is_independent() {
        let a = Store::from_vec([2], vec![1.0, 2.0]).unwrap();
        let mut b = a.clone();
        b[[0]] = 9.0;
        assert_eq!(a.at([0]), 1.0);
        assert_ne!(a.as_slice().as_ptr(), b.as_slice().as_ptr());
    }

    #[test]
    fn test_scalar_store() {
        let s = Store::scalar(c64::new(1.0, -1.0)).unwrap();
        assert_eq!(s.value(), c64::new(1.0, -1.0));
        assert_eq!(s.at([]), s.value());
    }

    #[test]
    fn test_buffer_is_aligned() {
        let s: Store<f64, 1> = Store::zeros([7]).unwrap();
        assert_eq!(s.as_slice().as_ptr() as usize % STORE_ALIGNMENT, 0);
    }

    #[test]
    fn test_into_dyn_roundtrip() {
        let s = Store::from_vec([3], vec![1.0, 2.0, 3.0]).unwrap();
        let d = s.clone().into_dyn();
        assert_eq!(d.extents(), &[3]);
        assert_eq!(d.into_static::<1>().unwrap(), s);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of bounds")]
    fn test_at_checks_axes_in_debug() {
        let s: Store<f64, 2> = Store::zeros([2, 3]).unwrap();
        s.at([0, 3]);
    }
}

//! Lazy expression composition.
//!
//! An expression is a tree whose leaves are stores (or views) and whose inner
//! nodes are elementwise operations or contractions. Nothing is computed when
//! the tree is built; [`StoreExpr::at`] evaluates the subtree at one
//! multi-index, and [`StoreExpr::eval`] materializes the whole result.
//!
//! ```text
//! add(&a, mul(&b, &c)?)?          Zip(+)
//!                                 ├── &a
//!                                 └── Zip(*)
//!                                     ├── &b
//!                                     └── &c
//! ```
//!
//! Per-index results are not cached. A sub-expression referenced by several
//! output indices is recomputed for each of them; call `eval` on it first when
//! that is too expensive.

mod ops;

pub use ops::{Fill, Map, Zip, add, mul, neg, scale, sub};

use crate::error::{Result, TapeError};
use crate::scalar::Scalar;
use crate::shape::Shape;
use crate::storage::{Store, StoreView};

/// An unevaluated tensor of rank `R`.
pub trait StoreExpr<const R: usize> {
    /// Element type.
    type Elem: Scalar;

    /// Shape of the result.
    fn shape(&self) -> Shape<R>;

    /// Compute the element at `idx`.
    fn at(&self, idx: [usize; R]) -> Self::Elem;

    /// Materialize into a new store.
    fn eval(&self) -> Result<Store<Self::Elem, R>> {
        Store::from_expr(self)
    }

    /// Apply `f` to every element, lazily.
    fn map<F>(self, f: F) -> Map<Self, F>
    where
        Self: Sized,
        F: Fn(Self::Elem) -> Self::Elem,
    {
        Map::new(self, f)
    }

    /// Combine with another expression of the same shape, lazily.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::ContractionMismatch` if the extents differ.
    fn zip_with<B, F>(self, other: B, f: F) -> Result<Zip<Self, B, F>>
    where
        Self: Sized,
        B: StoreExpr<R, Elem = Self::Elem>,
        F: Fn(Self::Elem, Self::Elem) -> Self::Elem,
    {
        let (lhs, rhs) = (self.shape(), other.shape());
        if lhs != rhs {
            return Err(TapeError::ContractionMismatch {
                expected: lhs.extents().to_vec(),
                actual: rhs.extents().to_vec(),
            });
        }
        Ok(Zip::new(self, other, f))
    }
}

impl<T: Scalar, const R: usize> StoreExpr<R> for Store<T, R> {
    type Elem = T;

    fn shape(&self) -> Shape<R> {
        Store::shape(self)
    }

    #[inline]
    fn at(&self, idx: [usize; R]) -> T {
        Store::at(self, idx)
    }

    fn eval(&self) -> Result<Store<T, R>> {
        self.try_clone()
    }
}

impl<T: Scalar, const R: usize> StoreExpr<R> for StoreView<'_, T, R> {
    type Elem = T;

    fn shape(&self) -> Shape<R> {
        StoreView::shape(self)
    }

    #[inline]
    fn at(&self, idx: [usize; R]) -> T {
        StoreView::at(self, idx)
    }

    fn eval(&self) -> Result<Store<T, R>> {
        self.to_store()
    }
}

impl<E: StoreExpr<R> + ?Sized, const R: usize> StoreExpr<R> for &E {
    type Elem = E::Elem;

    fn shape(&self) -> Shape<R> {
        (**self).shape()
    }

    #[inline]
    fn at(&self, idx: [usize; R]) -> E::Elem {
        (**self).at(idx)
    }

    fn eval(&self) -> Result<Store<E::Elem, R>> {
        (**self).eval()
    }
}

//! Elementwise expression nodes.

use super::StoreExpr;
use crate::error::Result;
use crate::scalar::Scalar;
use crate::shape::Shape;

/// Elementwise unary node.
#[derive(Debug, Clone)]
pub struct Map<A, F> {
    inner: A,
    f: F,
}

impl<A, F> Map<A, F> {
    pub(crate) fn new(inner: A, f: F) -> Self {
        Self { inner, f }
    }
}

impl<A, F, const R: usize> StoreExpr<R> for Map<A, F>
where
    A: StoreExpr<R>,
    F: Fn(A::Elem) -> A::Elem,
{
    type Elem = A::Elem;

    fn shape(&self) -> Shape<R> {
        self.inner.shape()
    }

    #[inline]
    fn at(&self, idx: [usize; R]) -> A::Elem {
        (self.f)(self.inner.at(idx))
    }
}

/// Elementwise binary node over operands of equal shape.
#[derive(Debug, Clone)]
pub struct Zip<A, B, F> {
    lhs: A,
    rhs: B,
    f: F,
}

impl<A, B, F> Zip<A, B, F> {
    pub(crate) fn new(lhs: A, rhs: B, f: F) -> Self {
        Self { lhs, rhs, f }
    }
}

impl<A, B, F, const R: usize> StoreExpr<R> for Zip<A, B, F>
where
    A: StoreExpr<R>,
    B: StoreExpr<R, Elem = A::Elem>,
    F: Fn(A::Elem, A::Elem) -> A::Elem,
{
    type Elem = A::Elem;

    fn shape(&self) -> Shape<R> {
        self.lhs.shape()
    }

    #[inline]
    fn at(&self, idx: [usize; R]) -> A::Elem {
        (self.f)(self.lhs.at(idx), self.rhs.at(idx))
    }
}

/// Constant expression.
#[derive(Debug, Clone, Copy)]
pub struct Fill<T, const R: usize> {
    shape: Shape<R>,
    value: T,
}

impl<T: Scalar, const R: usize> Fill<T, R> {
    /// An expression of `shape` whose every element is `value`.
    pub fn new(shape: impl Into<Shape<R>>, value: T) -> Self {
        Self {
            shape: shape.into(),
            value,
        }
    }
}

impl<T: Scalar, const R: usize> StoreExpr<R> for Fill<T, R> {
    type Elem = T;

    fn shape(&self) -> Shape<R> {
        self.shape
    }

    #[inline]
    fn at(&self, _idx: [usize; R]) -> T {
        self.value
    }
}

type Binary<T> = fn(T, T) -> T;

/// Lazy elementwise sum.
///
/// # Errors
///
/// Returns `TapeError::ContractionMismatch` if the extents differ.
pub fn add<A, B, const R: usize>(a: A, b: B) -> Result<Zip<A, B, Binary<A::Elem>>>
where
    A: StoreExpr<R>,
    B: StoreExpr<R, Elem = A::Elem>,
{
    let f: Binary<A::Elem> = |x, y| x + y;
    a.zip_with(b, f)
}

/// Lazy elementwise difference.
///
/// # Errors
///
/// Returns `TapeError::ContractionMismatch` if the extents differ.
pub fn sub<A, B, const R: usize>(a: A, b: B) -> Result<Zip<A, B, Binary<A::Elem>>>
where
    A: StoreExpr<R>,
    B: StoreExpr<R, Elem = A::Elem>,
{
    let f: Binary<A::Elem> = |x, y| x - y;
    a.zip_with(b, f)
}

/// Lazy elementwise (Hadamard) product.
///
/// # Errors
///
/// Returns `TapeError::ContractionMismatch` if the extents differ.
pub fn mul<A, B, const R: usize>(a: A, b: B) -> Result<Zip<A, B, Binary<A::Elem>>>
where
    A: StoreExpr<R>,
    B: StoreExpr<R, Elem = A::Elem>,
{
    let f: Binary<A::Elem> = |x, y| x * y;
    a.zip_with(b, f)
}

/// Lazy negation.
pub fn neg<A, const R: usize>(a: A) -> Map<A, fn(A::Elem) -> A::Elem>
where
    A: StoreExpr<R>,
{
    let f: fn(A::Elem) -> A::Elem = |x| -x;
    a.map(f)
}

/// Lazy multiplication by a scalar.
pub fn scale<A, const R: usize>(a: A, factor: A::Elem) -> Map<A, impl Fn(A::Elem) -> A::Elem>
where
    A: StoreExpr<R>,
{
    a.map(move |x| x * factor)
}

//! Stores carrying a tangent.

use crate::error::{Result, TapeError};
use crate::scalar::Scalar;
use crate::shape::Shape;
use crate::storage::Store;

/// A store with an associated tangent for forward-mode differentiation.
///
/// A missing tangent stands for zero, which lets constant inputs pass
/// through operations without tangent arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub struct DualStore<T: Scalar, const R: usize> {
    primal: Store<T, R>,
    tangent: Option<Store<T, R>>,
}

impl<T: Scalar, const R: usize> DualStore<T, R> {
    /// A constant: zero tangent.
    pub fn new(primal: Store<T, R>) -> Self {
        Self {
            primal,
            tangent: None,
        }
    }

    /// A store varying along `tangent`.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::ContractionMismatch` if the tangent shape differs
    /// from the primal shape.
    ///
    /// # Example
    ///
    /// ```
    /// use ndtape::Store;
    /// use ndtape::forward::DualStore;
    ///
    /// let x = Store::from_vec([3], vec![1.0, 2.0, 3.0])?;
    /// let dx = Store::ones([3])?;
    /// let dual = DualStore::with_tangent(x, dx)?;
    /// assert!(dual.has_tangent());
    /// # Ok::<(), ndtape::TapeError>(())
    /// ```
    pub fn with_tangent(primal: Store<T, R>, tangent: Store<T, R>) -> Result<Self> {
        if primal.shape() != tangent.shape() {
            return Err(TapeError::ContractionMismatch {
                expected: primal.extents().to_vec(),
                actual: tangent.extents().to_vec(),
            });
        }
        Ok(Self {
            primal,
            tangent: Some(tangent),
        })
    }

    pub(crate) fn from_parts(primal: Store<T, R>, tangent: Option<Store<T, R>>) -> Self {
        Self { primal, tangent }
    }

    pub fn primal(&self) -> &Store<T, R> {
        &self.primal
    }

    /// The tangent, `None` when it is zero.
    pub fn tangent(&self) -> Option<&Store<T, R>> {
        self.tangent.as_ref()
    }

    /// The tangent, materializing zeros for a constant.
    ///
    /// # Errors
    ///
    /// Returns an allocation error.
    pub fn tangent_or_zeros(&self) -> Result<Store<T, R>> {
        match &self.tangent {
            Some(t) => t.try_clone(),
            None => Store::zeros(self.primal.shape()),
        }
    }

    pub fn into_parts(self) -> (Store<T, R>, Option<Store<T, R>>) {
        (self.primal, self.tangent)
    }

    pub fn has_tangent(&self) -> bool {
        self.tangent.is_some()
    }

    pub fn shape(&self) -> Shape<R> {
        self.primal.shape()
    }

    pub fn extents(&self) -> &[usize; R] {
        self.primal.extents()
    }

    pub fn len(&self) -> usize {
        self.primal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primal.is_empty()
    }

    /// Copy of the primal as a constant.
    ///
    /// # Errors
    ///
    /// Returns an allocation error.
    pub fn detach(&self) -> Result<Self> {
        Ok(Self::new(self.primal.try_clone()?))
    }
}

impl<T: Scalar> DualStore<T, 0> {
    /// Value of a rank-0 dual store.
    pub fn value(&self) -> T {
        self.primal.value()
    }

    /// Derivative of a rank-0 dual store, zero for a constant.
    pub fn derivative(&self) -> T {
        self.tangent.as_ref().map_or(T::zero(), Store::value)
    }
}

impl<T: Scalar, const R: usize> From<Store<T, R>> for DualStore<T, R> {
    fn from(primal: Store<T, R>) -> Self {
        Self::new(primal)
    }
}

//! Forward-mode counterparts of the tape operations.
//!
//! Each operation computes the primal the same way the recorded operation
//! does and pushes the tangents through its Jacobian.

use tracing::trace;

use super::store::DualStore;
use crate::contract::{self, einsum_into};
use crate::error::Result;
use crate::expr::{self, StoreExpr};
use crate::scalar::Scalar;
use crate::storage::Store;

/// `a + b`.
///
/// # Errors
///
/// Returns `TapeError::ContractionMismatch` if the extents differ.
pub fn add<T: Scalar, const R: usize>(
    a: &DualStore<T, R>,
    b: &DualStore<T, R>,
) -> Result<DualStore<T, R>> {
    let primal = expr::add(a.primal(), b.primal())?.eval()?;
    let tangent = match (a.tangent(), b.tangent()) {
        (None, None) => None,
        (Some(da), None) => Some(da.try_clone()?),
        (None, Some(db)) => Some(db.try_clone()?),
        (Some(da), Some(db)) => Some(expr::add(da, db)?.eval()?),
    };
    Ok(DualStore::from_parts(primal, tangent))
}

/// `a - b`.
///
/// # Errors
///
/// Returns `TapeError::ContractionMismatch` if the extents differ.
pub fn sub<T: Scalar, const R: usize>(
    a: &DualStore<T, R>,
    b: &DualStore<T, R>,
) -> Result<DualStore<T, R>> {
    let primal = expr::sub(a.primal(), b.primal())?.eval()?;
    let tangent = match (a.tangent(), b.tangent()) {
        (None, None) => None,
        (Some(da), None) => Some(da.try_clone()?),
        (None, Some(db)) => Some(expr::neg(db).eval()?),
        (Some(da), Some(db)) => Some(expr::sub(da, db)?.eval()?),
    };
    Ok(DualStore::from_parts(primal, tangent))
}

/// Hadamard product, `d(ab) = da b + a db`.
///
/// # Errors
///
/// Returns `TapeError::ContractionMismatch` if the extents differ.
pub fn mul<T: Scalar, const R: usize>(
    a: &DualStore<T, R>,
    b: &DualStore<T, R>,
) -> Result<DualStore<T, R>> {
    let primal = expr::mul(a.primal(), b.primal())?.eval()?;
    let tangent = match (a.tangent(), b.tangent()) {
        (None, None) => None,
        (Some(da), None) => Some(expr::mul(da, b.primal())?.eval()?),
        (None, Some(db)) => Some(expr::mul(a.primal(), db)?.eval()?),
        (Some(da), Some(db)) => {
            let left = expr::mul(da, b.primal())?;
            let right = expr::mul(a.primal(), db)?;
            Some(expr::add(left, right)?.eval()?)
        }
    };
    Ok(DualStore::from_parts(primal, tangent))
}

/// `-a`.
///
/// # Errors
///
/// Returns an allocation error.
pub fn neg<T: Scalar, const R: usize>(a: &DualStore<T, R>) -> Result<DualStore<T, R>> {
    let primal = expr::neg(a.primal()).eval()?;
    let tangent = a.tangent().map(|da| expr::neg(da).eval()).transpose()?;
    Ok(DualStore::from_parts(primal, tangent))
}

/// `factor * a` for a constant `factor`.
///
/// # Errors
///
/// Returns an allocation error.
pub fn scale<T: Scalar, const R: usize>(
    a: &DualStore<T, R>,
    factor: T,
) -> Result<DualStore<T, R>> {
    let primal = expr::scale(a.primal(), factor).eval()?;
    let tangent = a.tangent().map(|da| expr::scale(da, factor).eval()).transpose()?;
    Ok(DualStore::from_parts(primal, tangent))
}

/// Sum of all elements.
///
/// # Errors
///
/// Returns an allocation error.
pub fn sum<T: Scalar, const R: usize>(a: &DualStore<T, R>) -> Result<DualStore<T, 0>> {
    let total = |s: &Store<T, R>| s.as_slice().iter().fold(T::zero(), |acc, &x| acc + x);
    let primal = Store::scalar(total(a.primal()))?;
    let tangent = a.tangent().map(|da| Store::scalar(total(da))).transpose()?;
    Ok(DualStore::from_parts(primal, tangent))
}

/// Contract `b` and `c`, `d(b c) = db c + b dc`.
///
/// Labels follow [`crate::einsum`]. The second tangent term is accumulated
/// into the first, so no intermediate store is added.
///
/// # Errors
///
/// Returns the errors of [`crate::einsum`].
///
/// # Example
///
/// ```
/// use ndtape::Store;
/// use ndtape::forward::{DualStore, ops};
///
/// let b = DualStore::with_tangent(Store::<f64, 2>::ones([2, 3])?, Store::ones([2, 3])?)?;
/// let c = DualStore::new(Store::ones([3, 4])?);
/// let out = ops::einsum(['i', 'k'], &b, ['i', 'j'], &c, ['j', 'k'])?;
/// assert_eq!(out.tangent().unwrap().as_slice(), &[3.0; 8]);
/// # Ok::<(), ndtape::TapeError>(())
/// ```
pub fn einsum<T, const RA: usize, const RB: usize, const RC: usize>(
    out: [char; RA],
    b: &DualStore<T, RB>,
    b_labels: [char; RB],
    c: &DualStore<T, RC>,
    c_labels: [char; RC],
) -> Result<DualStore<T, RA>>
where
    T: Scalar,
{
    let primal = contract::einsum(out, b.primal(), b_labels, c.primal(), c_labels)?;
    trace!(
        ?out,
        b_tangent = b.has_tangent(),
        c_tangent = c.has_tangent(),
        "forward einsum"
    );
    let tangent = match (b.tangent(), c.tangent()) {
        (None, None) => None,
        (Some(db), None) => Some(contract::einsum(out, db, b_labels, c.primal(), c_labels)?),
        (None, Some(dc)) => Some(contract::einsum(out, b.primal(), b_labels, dc, c_labels)?),
        (Some(db), Some(dc)) => {
            let mut t = contract::einsum(out, db, b_labels, c.primal(), c_labels)?;
            einsum_into(&mut t, out, b.primal(), b_labels, dc, c_labels)?;
            Some(t)
        }
    };
    Ok(DualStore::from_parts(primal, tangent))
}

//! Einstein-summation contraction.
//!
//! Operands are labelled axis by axis with `char`s. A label shared between
//! the operands is contracted (summed over), a label listed in the output is
//! kept. Label arrays have the operand's rank as their length, so a label
//! list of the wrong arity is a type error:
//!
//! ```text
//! einsum(['i', 'k'], &b, ['i', 'j'], &c, ['j', 'k'])   // out[i,k] = Σ_j b[i,j] c[j,k]
//! einsum([],         &b, ['i', 'j'], &c, ['i', 'j'])   // full contraction
//! einsum(['i'],      &b, ['i', 'i'], &c, [])           // diagonal of b times scalar c
//! ```
//!
//! # Design
//!
//! An [`EinsumPlan`] assigns every distinct label a slot and sorts the slots
//! into free labels followed by summed labels. Evaluation iterates the free
//! slots and, for each output element, recurses over the summed slots and
//! multiplies at the innermost level. Label matching runs at runtime; only the
//! arities are fixed at compile time.

mod lazy;
mod plan;

pub use lazy::EinsumExpr;
pub use plan::EinsumPlan;

use crate::error::{Result, TapeError};
use crate::scalar::Scalar;
use crate::shape::Shape;
use crate::storage::{DynStore, Store, StoreView};

/// Contract `b` and `c` into a new store.
///
/// # Arguments
///
/// * `out` - Labels of the output axes, distinct
/// * `b` - First operand
/// * `b_labels` - Labels for each axis of `b`
/// * `c` - Second operand
/// * `c_labels` - Labels for each axis of `c`
///
/// # Errors
///
/// Returns the errors of [`EinsumPlan::new`], or an allocation error.
///
/// # Examples
///
/// ```
/// use ndtape::{Store, einsum};
///
/// // Matrix multiplication: out[i,k] = b[i,j] * c[j,k]
/// let b = Store::from_vec([2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
/// let c = Store::from_vec([2, 2], vec![5.0, 6.0, 7.0, 8.0]).unwrap();
/// let out = einsum(['i', 'k'], &b, ['i', 'j'], &c, ['j', 'k']).unwrap();
/// assert_eq!(out.as_slice(), &[19.0, 22.0, 43.0, 50.0]);
/// ```
pub fn einsum<'a, T, const RA: usize, const RB: usize, const RC: usize>(
    out: [char; RA],
    b: impl Into<StoreView<'a, T, RB>>,
    b_labels: [char; RB],
    c: impl Into<StoreView<'a, T, RC>>,
    c_labels: [char; RC],
) -> Result<Store<T, RA>>
where
    T: Scalar,
{
    let (b, c) = (b.into(), c.into());
    let plan = EinsumPlan::new(&out, &b_labels, b.extents(), &c_labels, c.extents())?;
    let extents: [usize; RA] = output_shape(&plan)?;
    let mut result = Store::zeros(extents)?;
    plan.accumulate(result.as_mut_slice(), b.as_slice(), c.as_slice());
    Ok(result)
}

/// Add the contraction of `b` and `c` into `out`.
///
/// Output extents are taken from `out`. An output label that appears in
/// neither operand broadcasts along its axis; a repeated output label writes
/// to the diagonal. This is the form needed to push gradients back through a
/// contraction.
///
/// # Errors
///
/// Returns the errors of [`EinsumPlan::accumulating`].
///
/// # Examples
///
/// ```
/// use ndtape::{Store, einsum_into};
///
/// let mut out: Store<f64, 1> = Store::ones([2]).unwrap();
/// let b = Store::from_vec([2, 3], vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]).unwrap();
/// let c = Store::scalar(0.5).unwrap();
/// einsum_into(&mut out, ['i'], &b, ['i', 'j'], &c, []).unwrap();
/// assert_eq!(out.as_slice(), &[2.5, 4.0]);
/// ```
pub fn einsum_into<'a, T, const RA: usize, const RB: usize, const RC: usize>(
    out: &mut Store<T, RA>,
    out_labels: [char; RA],
    b: impl Into<StoreView<'a, T, RB>>,
    b_labels: [char; RB],
    c: impl Into<StoreView<'a, T, RC>>,
    c_labels: [char; RC],
) -> Result<()>
where
    T: Scalar,
{
    let (b, c) = (b.into(), c.into());
    let plan = EinsumPlan::accumulating(
        &out_labels,
        out.extents(),
        &b_labels,
        b.extents(),
        &c_labels,
        c.extents(),
    )?;
    plan.accumulate(out.as_mut_slice(), b.as_slice(), c.as_slice());
    Ok(())
}

/// Contraction as a lazy expression.
///
/// # Errors
///
/// Returns the errors of [`EinsumPlan::new`].
///
/// # Examples
///
/// ```
/// use ndtape::{Store, StoreExpr, einsum_expr};
///
/// let b = Store::from_vec([2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
/// let c = Store::from_vec([2], vec![1.0, 1.0]).unwrap();
/// let row_sums = einsum_expr(['i'], &b, ['i', 'j'], &c, ['j']).unwrap();
/// assert_eq!(row_sums.at([1]), 7.0);
/// ```
pub fn einsum_expr<'a, T, const RA: usize, const RB: usize, const RC: usize>(
    out: [char; RA],
    b: impl Into<StoreView<'a, T, RB>>,
    b_labels: [char; RB],
    c: impl Into<StoreView<'a, T, RC>>,
    c_labels: [char; RC],
) -> Result<EinsumExpr<'a, T, RA, RB, RC>>
where
    T: Scalar,
{
    let (b, c) = (b.into(), c.into());
    let plan = EinsumPlan::new(&out, &b_labels, b.extents(), &c_labels, c.extents())?;
    let shape = Shape::new(output_shape(&plan)?);
    Ok(EinsumExpr::new(plan, shape, b, c))
}

/// Contract with the implicit output rule.
///
/// Labels that occur exactly once across both operands are kept, in sorted
/// order; all others are summed. The output rank therefore depends on the
/// labels and the result is rank-erased.
///
/// # Examples
///
/// ```
/// use ndtape::{Store, einsum_implicit};
///
/// // "ij,jk" -> "ik"
/// let b = Store::from_vec([2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
/// let c = Store::from_vec([2, 2], vec![5.0, 6.0, 7.0, 8.0]).unwrap();
/// let out = einsum_implicit(&b, ['i', 'j'], &c, ['j', 'k']).unwrap();
/// assert_eq!(out.extents(), &[2, 2]);
///
/// // "ii," -> trace
/// let one = Store::scalar(1.0).unwrap();
/// let trace = einsum_implicit(&b, ['i', 'i'], &one, []).unwrap();
/// assert_eq!(trace.as_slice(), &[5.0]);
/// ```
pub fn einsum_implicit<'a, T, const RB: usize, const RC: usize>(
    b: impl Into<StoreView<'a, T, RB>>,
    b_labels: [char; RB],
    c: impl Into<StoreView<'a, T, RC>>,
    c_labels: [char; RC],
) -> Result<DynStore<T>>
where
    T: Scalar,
{
    let (b, c) = (b.into(), c.into());
    let mut out: Vec<char> = b_labels
        .iter()
        .chain(&c_labels)
        .copied()
        .filter(|l| b_labels.iter().chain(&c_labels).filter(|x| *x == l).count() == 1)
        .collect();
    out.sort_unstable();
    let plan = EinsumPlan::new(&out, &b_labels, b.extents(), &c_labels, c.extents())?;
    let mut result = DynStore::zeros(&plan.output_extents())?;
    plan.accumulate(result.as_mut_slice(), b.as_slice(), c.as_slice());
    Ok(result)
}

fn output_shape<const RA: usize>(plan: &EinsumPlan) -> Result<[usize; RA]> {
    let extents = plan.output_extents();
    extents
        .as_slice()
        .try_into()
        .map_err(|_| TapeError::RankMismatch {
            expected: RA,
            actual: extents.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::StoreExpr;
    use crate::scalar::c64;
    use approx::assert_relative_eq;

    #[test]
    fn test_matmul() {
        // b = [[1,2,3],[4,5,6]], c = [[1,0],[0,1],[1,1]]
        let b = Store::from_vec([2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let c = Store::from_vec([3, 2], vec![1.0, 0.0, 0.0, 1.0, 1.0, 1.0]).unwrap();
        let out = einsum(['i', 'k'], &b, ['i', 'j'], &c, ['j', 'k']).unwrap();
        assert_eq!(out.extents(), &[2, 2]);
        assert_eq!(out.as_slice(), &[4.0, 5.0, 10.0, 11.0]);
    }

    #[test]
    fn test_transposed_output() {
        let b = Store::from_vec([2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        let one = Store::scalar(1.0).unwrap();
        let t = einsum(['j', 'i'], &b, ['i', 'j'], &one, []).unwrap();
        assert_eq!(t.extents(), &[3, 2]);
        assert_eq!(t.at([2, 1]), 6.0);
        assert_eq!(t.at([0, 1]), 4.0);
    }

    #[test]
    fn test_inner_product() {
        let b = Store::from_vec([3], vec![1.0, 2.0, 3.0]).unwrap();
        let c = Store::from_vec([3], vec![4.0, 5.0, 6.0]).unwrap();
        let out = einsum([], &b, ['i'], &c, ['i']).unwrap();
        assert_relative_eq!(out.value(), 32.0);
    }

    #[test]
    fn test_outer_product() {
        let b = Store::from_vec([2], vec![1.0, 2.0]).unwrap();
        let c = Store::from_vec([3], vec![1.0, 10.0, 100.0]).unwrap();
        let out = einsum(['i', 'j'], &b, ['i'], &c, ['j']).unwrap();
        assert_eq!(out.as_slice(), &[1.0, 10.0, 100.0, 2.0, 20.0, 200.0]);
    }

    #[test]
    fn test_batched_matmul() {
        // out[n,i,k] = b[n,i,j] c[n,j,k] with identity c
        let b: Store<f64, 3> =
            Store::from_fn([2, 2, 3], |[n, i, j]| (n * 100 + i * 10 + j) as f64).unwrap();
        let c: Store<f64, 3> =
            Store::from_fn([2, 3, 3], |[_, j, k]| if j == k { 1.0 } else { 0.0 }).unwrap();
        let out = einsum(['n', 'i', 'k'], &b, ['n', 'i', 'j'], &c, ['n', 'j', 'k']).unwrap();
        assert_eq!(out, b);
    }

    #[test]
    fn test_diagonal_extraction() {
        let b = Store::from_vec([2, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        let one = Store::scalar(1.0).unwrap();
        let diag = einsum(['i'], &b, ['i', 'i'], &one, []).unwrap();
        assert_eq!(diag.as_slice(), &[1.0, 4.0]);
    }

    #[test]
    fn test_complex_contraction() {
        let b = Store::from_vec([2], vec![c64::new(1.0, 1.0), c64::new(0.0, 2.0)]).unwrap();
        let c = Store::from_vec([2], vec![c64::new(1.0, 0.0), c64::new(0.0, 1.0)]).unwrap();
        let out = einsum([], &b, ['i'], &c, ['i']).unwrap();
        // (1+i)*1 + (2i)*(i) = 1 + i - 2
        assert_eq!(out.value(), c64::new(-1.0, 1.0));
    }

    #[test]
    fn test_einsum_into_accumulates() {
        let b = Store::from_vec([2], vec![1.0, 2.0]).unwrap();
        let c = Store::from_vec([2], vec![3.0, 4.0]).unwrap();
        let mut out: Store<f64, 0> = Store::scalar(1.0).unwrap();
        einsum_into(&mut out, [], &b, ['i'], &c, ['i']).unwrap();
        einsum_into(&mut out, [], &b, ['i'], &c, ['i']).unwrap();
        assert_relative_eq!(out.value(), 23.0);
    }

    #[test]
    fn test_einsum_into_broadcasts() {
        let mut out: Store<f64, 2> = Store::zeros([2, 3]).unwrap();
        let b = Store::from_vec([2], vec![1.0, 2.0]).unwrap();
        let one = Store::scalar(1.0).unwrap();
        einsum_into(&mut out, ['i', 'j'], &b, ['i'], &one, []).unwrap();
        assert_eq!(out.as_slice(), &[1.0, 1.0, 1.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn test_einsum_expr_matches_eager() {
        let b: Store<f64, 2> = Store::from_fn([3, 4], |[i, j]| (i + 2 * j) as f64).unwrap();
        let c: Store<f64, 2> = Store::from_fn([4, 2], |[j, k]| (j * k + 1) as f64).unwrap();
        let eager = einsum(['i', 'k'], &b, ['i', 'j'], &c, ['j', 'k']).unwrap();
        let lazy = einsum_expr(['i', 'k'], &b, ['i', 'j'], &c, ['j', 'k']).unwrap();
        assert_eq!(lazy.eval().unwrap(), eager);
    }

    #[test]
    fn test_implicit_output() {
        let b: Store<f64, 2> = Store::from_fn([2, 3], |[i, j]| (i * 3 + j) as f64).unwrap();
        let c: Store<f64, 2> = Store::from_fn([3, 4], |[j, k]| (j + k) as f64).unwrap();
        let implicit = einsum_implicit(&b, ['i', 'j'], &c, ['j', 'k']).unwrap();
        let explicit = einsum(['i', 'k'], &b, ['i', 'j'], &c, ['j', 'k']).unwrap();
        assert_eq!(implicit.into_static::<2>().unwrap(), explicit);
    }

    #[test]
    fn test_implicit_sorts_labels() {
        let b = Store::from_vec([2], vec![1.0, 2.0]).unwrap();
        let c = Store::from_vec([3], vec![1.0, 1.0, 1.0]).unwrap();
        // "k,a" -> "ak"
        let out = einsum_implicit(&b, ['k'], &c, ['a']).unwrap();
        assert_eq!(out.extents(), &[3, 2]);
    }

    #[test]
    fn test_mismatched_extents() {
        let b: Store<f64, 2> = Store::zeros([2, 3]).unwrap();
        let c: Store<f64, 2> = Store::zeros([4, 2]).unwrap();
        let err = einsum(['i', 'k'], &b, ['i', 'j'], &c, ['j', 'k']).unwrap_err();
        assert!(matches!(err, TapeError::LabelExtentMismatch { label: 'j', .. }));
    }

    #[test]
    fn test_zero_extent() {
        let b: Store<f64, 2> = Store::zeros([0, 3]).unwrap();
        let c: Store<f64, 1> = Store::ones([3]).unwrap();
        let out = einsum(['i'], &b, ['i', 'j'], &c, ['j']).unwrap();
        assert!(out.is_empty());

        // summing over an empty axis gives zero
        let b: Store<f64, 1> = Store::zeros([0]).unwrap();
        let out = einsum([], &b, ['i'], &b, ['i']).unwrap();
        assert_eq!(out.value(), 0.0);
    }
}

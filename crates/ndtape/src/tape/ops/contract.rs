//! Recorded contraction.

use crate::contract;
use crate::error::Result;
use crate::memory::CountPolicy;
use crate::scalar::Scalar;
use crate::tape::{Tape, Var};

/// Record `einsum(out, b, b_labels, c, c_labels)`.
///
/// The gradient of each operand is the contraction of the incoming gradient
/// with the other operand, labelled with the operand's own labels. Complex
/// operands are not conjugated.
///
/// # Errors
///
/// Returns the errors of [`contract::einsum`] or [`Tape::push`].
///
/// # Example
///
/// ```
/// use ndtape::{Store, Tape, ops};
///
/// let mut tape = Tape::<f64>::new();
/// let a = tape.variable(Store::from_vec([2, 2], vec![1.0, 2.0, 3.0, 4.0])?)?;
/// let v = tape.variable(Store::from_vec([2], vec![1.0, 1.0])?)?;
/// let w = ops::einsum(&mut tape, ['i'], &a, ['i', 'j'], &v, ['j'])?;
/// assert_eq!(w.value().as_slice(), &[3.0, 7.0]);
/// # Ok::<(), ndtape::TapeError>(())
/// ```
pub fn einsum<T, P, const RA: usize, const RB: usize, const RC: usize>(
    tape: &mut Tape<T, P>,
    out: [char; RA],
    b: &Var<T, RB, P>,
    b_labels: [char; RB],
    c: &Var<T, RC, P>,
    c_labels: [char; RC],
) -> Result<Var<T, RA, P>>
where
    T: Scalar,
    P: CountPolicy,
{
    let value = contract::einsum(out, b.value(), b_labels, c.value(), c_labels)?;
    let (ib, ic) = (b.id(), c.id());
    tape.push("einsum", value, &[ib, ic], move |prop, grad| {
        let vb = prop.activation::<RB>(ib)?;
        let vc = prop.activation::<RC>(ic)?;
        prop.accumulate_einsum(ib, b_labels, grad, out, vc, c_labels)?;
        prop.accumulate_einsum(ic, c_labels, grad, out, vb, b_labels)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Store;
    use crate::tape::ops;
    use approx::assert_relative_eq;

    #[test]
    fn test_matmul_gradients() {
        let mut tape = Tape::<f64>::new();
        let a = Store::from_fn([2, 3], |[i, j]| (i * 3 + j + 1) as f64).unwrap();
        let b = Store::from_fn([3, 4], |[i, j]| (i * 4 + j + 1) as f64).unwrap();
        let a = tape.variable(a).unwrap();
        let b = tape.variable(b).unwrap();
        let c = einsum(&mut tape, ['i', 'k'], &a, ['i', 'j'], &b, ['j', 'k']).unwrap();
        let loss = ops::sum(&mut tape, &c).unwrap();
        tape.complete(&loss).unwrap();

        let grads = tape.backward().unwrap();
        let ga = grads.get(&a).unwrap();
        let gb = grads.get(&b).unwrap();

        // dL/dA[i,j] = sum_k B[j,k]
        for i in 0..2 {
            for j in 0..3 {
                let row: f64 = (0..4).map(|k| b.value().at([j, k])).sum();
                assert_relative_eq!(ga.at([i, j]), row);
            }
        }
        // dL/dB[j,k] = sum_i A[i,j]
        for j in 0..3 {
            for k in 0..4 {
                let col: f64 = (0..2).map(|i| a.value().at([i, j])).sum();
                assert_relative_eq!(gb.at([j, k]), col);
            }
        }
    }

    #[test]
    fn test_trace_gradient_is_identity() {
        let mut tape = Tape::<f64>::new();
        let m = Store::from_fn([3, 3], |[i, j]| (i + 2 * j) as f64).unwrap();
        let m = tape.variable(m).unwrap();
        let one = tape.variable(Store::scalar(1.0).unwrap()).unwrap();
        let tr = einsum(&mut tape, [], &m, ['i', 'i'], &one, []).unwrap();
        assert_relative_eq!(tr.item(), 9.0);

        tape.complete(&tr).unwrap();
        let grads = tape.backward().unwrap();
        let g = grads.get(&m).unwrap();
        for i in 0..3 {
            for j in 0..3 {
                assert_eq!(g.at([i, j]), if i == j { 1.0 } else { 0.0 });
            }
        }
        assert_relative_eq!(grads.get(&one).unwrap().value(), 9.0);
    }
}

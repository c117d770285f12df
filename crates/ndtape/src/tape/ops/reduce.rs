//! Reductions.

use crate::error::Result;
use crate::expr::Fill;
use crate::memory::CountPolicy;
use crate::scalar::Scalar;
use crate::storage::Store;
use crate::tape::{Tape, Var};

/// Record the sum of all elements of `a`.
///
/// # Errors
///
/// Returns the errors of [`Tape::push`].
pub fn sum<T: Scalar, const R: usize, P: CountPolicy>(
    tape: &mut Tape<T, P>,
    a: &Var<T, R, P>,
) -> Result<Var<T, 0, P>> {
    let total = a.value().as_slice().iter().fold(T::zero(), |acc, &x| acc + x);
    let shape = a.shape();
    let ia = a.id();
    tape.push("sum", Store::scalar(total)?, &[ia], move |prop, grad| {
        prop.accumulate(ia, Fill::new(shape, grad.value()))
    })
}

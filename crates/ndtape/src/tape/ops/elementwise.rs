//! Elementwise operations with their backward functions.

use crate::error::Result;
use crate::expr::{self, StoreExpr};
use crate::memory::CountPolicy;
use crate::scalar::Scalar;
use crate::tape::{Tape, Var};

/// Record `a + b`.
///
/// # Errors
///
/// Returns `TapeError::ContractionMismatch` if the extents differ, or the
/// errors of [`Tape::push`].
pub fn add<T: Scalar, const R: usize, P: CountPolicy>(
    tape: &mut Tape<T, P>,
    a: &Var<T, R, P>,
    b: &Var<T, R, P>,
) -> Result<Var<T, R, P>> {
    let value = expr::add(a.value(), b.value())?.eval()?;
    let (ia, ib) = (a.id(), b.id());
    tape.push("add", value, &[ia, ib], move |prop, grad| {
        prop.accumulate(ia, grad)?;
        prop.accumulate(ib, grad)
    })
}

/// Record `a - b`.
///
/// # Errors
///
/// Returns `TapeError::ContractionMismatch` if the extents differ, or the
/// errors of [`Tape::push`].
pub fn sub<T: Scalar, const R: usize, P: CountPolicy>(
    tape: &mut Tape<T, P>,
    a: &Var<T, R, P>,
    b: &Var<T, R, P>,
) -> Result<Var<T, R, P>> {
    let value = expr::sub(a.value(), b.value())?.eval()?;
    let (ia, ib) = (a.id(), b.id());
    tape.push("sub", value, &[ia, ib], move |prop, grad| {
        prop.accumulate(ia, grad)?;
        prop.accumulate(ib, expr::neg(grad))
    })
}

/// Record the Hadamard product `a * b`.
///
/// The backward function reads the operands back from their records, so no
/// copy of them is kept.
///
/// # Errors
///
/// Returns `TapeError::ContractionMismatch` if the extents differ, or the
/// errors of [`Tape::push`].
pub fn mul<T: Scalar, const R: usize, P: CountPolicy>(
    tape: &mut Tape<T, P>,
    a: &Var<T, R, P>,
    b: &Var<T, R, P>,
) -> Result<Var<T, R, P>> {
    let value = expr::mul(a.value(), b.value())?.eval()?;
    let (ia, ib) = (a.id(), b.id());
    tape.push("mul", value, &[ia, ib], move |prop, grad| {
        let va = prop.activation::<R>(ia)?;
        let vb = prop.activation::<R>(ib)?;
        prop.accumulate(ia, expr::mul(grad, vb)?)?;
        prop.accumulate(ib, expr::mul(grad, va)?)
    })
}

/// Record `-a`.
///
/// # Errors
///
/// Returns the errors of [`Tape::push`].
pub fn neg<T: Scalar, const R: usize, P: CountPolicy>(
    tape: &mut Tape<T, P>,
    a: &Var<T, R, P>,
) -> Result<Var<T, R, P>> {
    let value = expr::neg(a.value()).eval()?;
    let ia = a.id();
    tape.push("neg", value, &[ia], move |prop, grad| prop.accumulate(ia, expr::neg(grad)))
}

/// Record `factor * a`.
///
/// # Errors
///
/// Returns the errors of [`Tape::push`].
pub fn scale<T: Scalar, const R: usize, P: CountPolicy>(
    tape: &mut Tape<T, P>,
    a: &Var<T, R, P>,
    factor: T,
) -> Result<Var<T, R, P>> {
    let value = expr::scale(a.value(), factor).eval()?;
    let ia = a.id();
    tape.push("scale", value, &[ia], move |prop, grad| {
        prop.accumulate(ia, expr::scale(grad, factor))
    })
}

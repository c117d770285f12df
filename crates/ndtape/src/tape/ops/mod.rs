//! Differentiable operations.
//!
//! Each function computes its result from the operands' values, pushes a
//! record holding that result onto the tape, and attaches the
//! vector-Jacobian product that carries the record's gradient back to the
//! operands.

mod contract;
mod elementwise;
mod reduce;

pub use contract::einsum;
pub use elementwise::{add, mul, neg, scale, sub};
pub use reduce::sum;

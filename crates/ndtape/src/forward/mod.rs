//! Forward-mode differentiation.
//!
//! Where the tape computes vector-Jacobian products after the fact, forward
//! mode pushes tangents alongside the values as they are computed:
//!
//! ```text
//! Dual<T, N>       scalar with N tangents; diff, gradient
//! DualStore<T, R>  store with an optional tangent store; ops mirror tape::ops
//! ```
//!
//! A `DualStore` without a tangent is a constant. Operations skip the tangent
//! arithmetic of constant operands, so differentiating with respect to one
//! input of an einsum costs one extra contraction, not two.
//!
//! # Example
//!
//! ```
//! use ndtape::forward::diff;
//!
//! // x^16 by repeated squaring
//! let (y, dy) = diff(|x| {
//!     let x2 = x * x;
//!     let x4 = x2 * x2;
//!     let x8 = x4 * x4;
//!     x8 * x8
//! }, 2.0);
//! assert_eq!(y, 65536.0);
//! assert_eq!(dy, 524288.0);
//! ```

mod dual;
pub mod ops;
mod store;

pub use dual::{Dual, diff, gradient};
pub use store::DualStore;

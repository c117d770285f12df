//! ndtape - reverse-mode differentiation over shaped tensors
//!
//! The crate is layered bottom-up:
//!
//! ```text
//! tape      Tape, Var, records, backward pass, differentiable ops
//! forward   Dual numbers and tangent-carrying stores
//!   │
//! contract  einsum over labelled axes (eager, in-place, lazy)
//! expr      lazy elementwise expressions
//!   │
//! storage   Store<T, R> / DynStore<T>, row-major, 64-byte aligned
//! shape     Shape<R>, strides
//!   │
//! memory    aligned allocation, intrusive strong/weak counting
//! ```
//!
//! # Example
//!
//! ```
//! use ndtape::{Store, Tape, ops};
//!
//! let mut tape = Tape::<f64>::new();
//! let x = tape.variable(Store::from_vec([3], vec![1.0, 2.0, 3.0])?)?;
//! let w = tape.variable(Store::from_vec([3], vec![0.5, -1.0, 2.0])?)?;
//!
//! // loss = sum_i x[i] * w[i]
//! let loss = ops::einsum(&mut tape, [], &x, ['i'], &w, ['i'])?;
//! assert_eq!(loss.item(), 4.5);
//!
//! tape.complete(&loss)?;
//! let grads = tape.backward()?;
//! assert_eq!(grads.get(&x).unwrap().as_slice(), &[0.5, -1.0, 2.0]);
//! assert_eq!(grads.get(&w).unwrap().as_slice(), &[1.0, 2.0, 3.0]);
//! # Ok::<(), ndtape::TapeError>(())
//! ```

pub mod contract;
pub mod error;
pub mod expr;
pub mod forward;
pub mod memory;
pub mod random;
pub mod scalar;
pub mod shape;
pub mod storage;
pub mod strides;
pub mod tape;

pub use contract::{EinsumExpr, EinsumPlan, einsum, einsum_expr, einsum_implicit, einsum_into};
pub use error::{Result, TapeError};
pub use expr::StoreExpr;
pub use memory::{Atomic, CountPolicy, IntrusivePtr, Local, WeakIntrusivePtr};
pub use random::RandomScalar;
pub use scalar::{Scalar, c64};
pub use shape::Shape;
pub use storage::{DynStore, DynView, Store, StoreView};
pub use tape::{Gradients, Propagator, RecordId, Tape, TapeId, TapeState, Var, WeakVar, ops};

//! Contraction as a lazy expression node.

use super::plan::EinsumPlan;
use crate::expr::StoreExpr;
use crate::scalar::Scalar;
use crate::shape::Shape;
use crate::storage::StoreView;

/// Unevaluated contraction of two operands.
///
/// Each call to [`StoreExpr::at`] sums over the contracted labels for that
/// one output element. Built by [`einsum_expr`](super::einsum_expr).
#[derive(Debug, Clone)]
pub struct EinsumExpr<'a, T: Scalar, const RA: usize, const RB: usize, const RC: usize> {
    plan: EinsumPlan,
    shape: Shape<RA>,
    b: StoreView<'a, T, RB>,
    c: StoreView<'a, T, RC>,
}

impl<'a, T: Scalar, const RA: usize, const RB: usize, const RC: usize>
    EinsumExpr<'a, T, RA, RB, RC>
{
    pub(crate) fn new(
        plan: EinsumPlan,
        shape: Shape<RA>,
        b: StoreView<'a, T, RB>,
        c: StoreView<'a, T, RC>,
    ) -> Self {
        Self { plan, shape, b, c }
    }

    /// The contraction plan.
    pub fn plan(&self) -> &EinsumPlan {
        &self.plan
    }
}

impl<T: Scalar, const RA: usize, const RB: usize, const RC: usize> StoreExpr<RA>
    for EinsumExpr<'_, T, RA, RB, RC>
{
    type Elem = T;

    fn shape(&self) -> Shape<RA> {
        self.shape
    }

    fn at(&self, idx: [usize; RA]) -> T {
        debug_assert!(self.shape.contains(&idx), "index {idx:?} out of bounds");
        let free = self.plan.free_from_output(&idx);
        self.plan.element(&free, self.b.as_slice(), self.c.as_slice())
    }
}

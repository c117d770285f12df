//! User-facing handles to records.

use super::link::RecordNode;
use super::record::{RecordId, TapeId};
use crate::memory::{CountPolicy, IntrusivePtr, Local, WeakIntrusivePtr};
use crate::scalar::Scalar;
use crate::shape::Shape;
use crate::storage::StoreView;
use std::fmt;

/// Strong handle to a record of rank `R`.
///
/// Keeps the record (and the older part of its chain) alive even after the
/// tape has been cleared, so forward values stay readable.
pub struct Var<T: Scalar, const R: usize, P: CountPolicy = Local> {
    node: IntrusivePtr<RecordNode<T, P>>,
    shape: Shape<R>,
}

impl<T: Scalar, const R: usize, P: CountPolicy> Var<T, R, P> {
    pub(crate) fn new(node: IntrusivePtr<RecordNode<T, P>>, shape: Shape<R>) -> Self {
        Self { node, shape }
    }

    /// Handle of the underlying record.
    pub fn id(&self) -> RecordId {
        self.node.id()
    }

    /// Tape the record was pushed on.
    pub fn tape_id(&self) -> TapeId {
        self.node.tape()
    }

    /// Name of the operation that produced this value.
    pub fn what(&self) -> &'static str {
        self.node.record().what()
    }

    /// Shape of the value.
    pub fn shape(&self) -> Shape<R> {
        self.shape
    }

    /// Per-axis extents of the value.
    pub fn extents(&self) -> &[usize; R] {
        self.shape.extents()
    }

    /// The forward value.
    pub fn value(&self) -> StoreView<'_, T, R> {
        StoreView::new(self.shape, self.node.record().activation().as_slice())
    }

    /// Non-owning handle that does not keep the record alive.
    pub fn downgrade(&self) -> WeakVar<T, R, P> {
        WeakVar {
            node: IntrusivePtr::downgrade(&self.node),
            shape: self.shape,
        }
    }

    /// Whether both handles refer to the same record.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        IntrusivePtr::ptr_eq(&a.node, &b.node)
    }
}

impl<T: Scalar, P: CountPolicy> Var<T, 0, P> {
    /// The forward value of a rank-0 variable.
    pub fn item(&self) -> T {
        self.value().value()
    }
}

impl<T: Scalar, const R: usize, P: CountPolicy> Clone for Var<T, R, P> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            shape: self.shape,
        }
    }
}

impl<T: Scalar, const R: usize, P: CountPolicy> fmt::Debug for Var<T, R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Var")
            .field("id", &self.id())
            .field("what", &self.what())
            .field("extents", self.extents())
            .finish()
    }
}

/// Weak handle to a record of rank `R`.
pub struct WeakVar<T: Scalar, const R: usize, P: CountPolicy = Local> {
    node: WeakIntrusivePtr<RecordNode<T, P>>,
    shape: Shape<R>,
}

impl<T: Scalar, const R: usize, P: CountPolicy> WeakVar<T, R, P> {
    /// Strong handle, or `None` once the record has been released.
    pub fn upgrade(&self) -> Option<Var<T, R, P>> {
        self.node.upgrade().map(|node| Var::new(node, self.shape))
    }

    /// Whether the record still exists.
    pub fn is_alive(&self) -> bool {
        self.node.is_alive()
    }
}

impl<T: Scalar, const R: usize, P: CountPolicy> Clone for WeakVar<T, R, P> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
            shape: self.shape,
        }
    }
}

impl<T: Scalar, const R: usize, P: CountPolicy> fmt::Debug for WeakVar<T, R, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakVar")
            .field("alive", &self.is_alive())
            .field("extents", self.shape.extents())
            .finish()
    }
}

//! Record nodes: the polymorphic interface and the concrete static record.

use super::propagate::Propagator;
use crate::error::Result;
use crate::scalar::Scalar;
use crate::storage::{DynStore, DynView, Store, StoreView};
use smallvec::SmallVec;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of one tape instance.
///
/// Every tape (and every tape after [`clear`](super::Tape::clear)) gets a fresh
/// id, so handles from a torn-down tape are recognised as foreign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TapeId(u64);

static NEXT_TAPE_ID: AtomicU64 = AtomicU64::new(0);

impl TapeId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TAPE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value.
    pub fn get(&self) -> u64 {
        self.0
    }
}

/// Handle of a record: its tape and its position in creation order.
///
/// Records refer to their producers through these handles, resolved by the
/// tape, never through owning pointers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    tape: TapeId,
    index: usize,
}

impl RecordId {
    pub(crate) fn new(tape: TapeId, index: usize) -> Self {
        Self { tape, index }
    }

    /// Tape the record was pushed on.
    pub fn tape(&self) -> TapeId {
        self.tape
    }

    /// Position in creation order, starting at 0.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.tape.0, self.index)
    }
}

/// Common interface of every node on a tape.
///
/// A record owns its activation, knows which records produced its inputs, and
/// can push the gradient of its output back to them.
pub trait AbstractRecord<T: Scalar>: Send + Sync {
    /// Name of the operation that produced this record.
    fn what(&self) -> &'static str;

    /// The stored forward value.
    fn activation(&self) -> DynView<'_, T>;

    /// Handles of the records this one was computed from.
    fn producers(&self) -> &[RecordId];

    /// Number of activation elements held.
    fn activations(&self) -> usize {
        self.activation().len()
    }

    /// Accumulate the gradient contributions of `grad` into the producers.
    fn propagate(&self, grad: &DynStore<T>, propagator: &mut Propagator<'_, T>) -> Result<()>;
}

/// Backward function type of leaf records.
pub type LeafBackward<T, const R: usize> =
    fn(&mut Propagator<'_, T>, StoreView<'_, T, R>) -> Result<()>;

/// Record with a rank-`R` activation and a backward closure `F`.
///
/// `F` receives the propagator and a view of this record's accumulated output
/// gradient, shaped like the activation.
pub struct StaticRecord<T: Scalar, const R: usize, F> {
    name: &'static str,
    activation: Store<T, R>,
    producers: SmallVec<[RecordId; 2]>,
    backward: Option<F>,
}

impl<T: Scalar, const R: usize, F> StaticRecord<T, R, F>
where
    F: Fn(&mut Propagator<'_, T>, StoreView<'_, T, R>) -> Result<()> + Send + Sync,
{
    /// Record of an operation with a backward function.
    pub fn new(
        name: &'static str,
        activation: Store<T, R>,
        producers: &[RecordId],
        backward: F,
    ) -> Self {
        Self {
            name,
            activation,
            producers: producers.into(),
            backward: Some(backward),
        }
    }

    /// The activation with its static rank.
    pub fn value(&self) -> StoreView<'_, T, R> {
        self.activation.view()
    }
}

impl<T: Scalar, const R: usize> StaticRecord<T, R, LeafBackward<T, R>> {
    /// Record of an input: no producers, nothing to propagate.
    pub fn leaf(activation: Store<T, R>) -> Self {
        Self {
            name: "variable",
            activation,
            producers: SmallVec::new(),
            backward: None,
        }
    }
}

impl<T: Scalar, const R: usize, F> AbstractRecord<T> for StaticRecord<T, R, F>
where
    F: Fn(&mut Propagator<'_, T>, StoreView<'_, T, R>) -> Result<()> + Send + Sync,
{
    fn what(&self) -> &'static str {
        self.name
    }

    fn activation(&self) -> DynView<'_, T> {
        self.activation.dyn_view()
    }

    fn producers(&self) -> &[RecordId] {
        &self.producers
    }

    fn propagate(&self, grad: &DynStore<T>, propagator: &mut Propagator<'_, T>) -> Result<()> {
        match &self.backward {
            Some(backward) => backward(propagator, grad.view::<R>()?),
            None => Ok(()),
        }
    }
}

impl<T: Scalar, const R: usize, F> fmt::Debug for StaticRecord<T, R, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticRecord")
            .field("name", &self.name)
            .field("extents", self.activation.extents())
            .field("producers", &self.producers)
            .field("has_backward", &self.backward.is_some())
            .finish()
    }
}

//! The tape: owner of the record chain.

use super::link::{Chain, Link, RecordNode};
use super::propagate::{Gradients, Propagator};
use super::record::{AbstractRecord, RecordId, StaticRecord, TapeId};
use super::var::Var;
use crate::error::{Result, TapeError};
use crate::memory::{CountPolicy, IntrusivePtr, Local};
use crate::scalar::Scalar;
use crate::storage::{DynStore, DynView, Store, StoreView};
use std::fmt;
use tracing::{debug, debug_span, trace, trace_span};

/// Lifecycle of a tape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapeState {
    /// No records; backward is a no-op error.
    Empty,
    /// Records are being appended.
    Recording,
    /// An output has been designated; backward may run.
    Complete,
}

/// Append-only record of a forward pass.
///
/// The tape is the only owner of its records apart from [`Var`] handles:
/// records name their producers by [`RecordId`], so diamond-shaped graphs
/// create no ownership cycles.
///
/// # Example
///
/// ```
/// use ndtape::{Store, Tape, ops};
///
/// let mut tape = Tape::<f64>::new();
/// let x = tape.variable(Store::scalar(2.0)?)?;
/// let y = tape.variable(Store::scalar(3.0)?)?;
/// let z = ops::mul(&mut tape, &x, &y)?;
/// tape.complete(&z)?;
///
/// let grads = tape.backward()?;
/// assert_eq!(grads.get(&x).unwrap().value(), 3.0);
/// assert_eq!(grads.get(&y).unwrap().value(), 2.0);
/// # Ok::<(), ndtape::TapeError>(())
/// ```
pub struct Tape<T: Scalar, P: CountPolicy = Local> {
    id: TapeId,
    head: Link<T, P>,
    len: usize,
    activations: usize,
    output: Option<RecordId>,
}

impl<T: Scalar, P: CountPolicy> Tape<T, P> {
    /// Start an empty tape.
    pub fn new() -> Self {
        Self {
            id: TapeId::next(),
            head: Link::none(),
            len: 0,
            activations: 0,
            output: None,
        }
    }

    /// Identifier of this tape (changes on [`clear`](Self::clear)).
    pub fn id(&self) -> TapeId {
        self.id
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if no records have been pushed.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total number of activation elements held by the records.
    pub fn activations(&self) -> usize {
        self.activations
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TapeState {
        match (self.len, self.output) {
            (0, _) => TapeState::Empty,
            (_, None) => TapeState::Recording,
            (_, Some(_)) => TapeState::Complete,
        }
    }

    /// Designated output record.
    pub fn output(&self) -> Option<RecordId> {
        self.output
    }

    /// Record an input value.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::TapeComplete` after [`complete`](Self::complete),
    /// or an allocation error.
    pub fn variable<const R: usize>(&mut self, value: Store<T, R>) -> Result<Var<T, R, P>> {
        let shape = value.shape();
        let node = self.link(Box::new(StaticRecord::leaf(value)))?;
        Ok(Var::new(node, shape))
    }

    /// Record the result of an operation.
    ///
    /// `backward` receives the accumulated gradient of `activation` and must
    /// pass contributions for `producers` to the propagator.
    ///
    /// # Errors
    ///
    /// * `TapeError::TapeComplete` after [`complete`](Self::complete)
    /// * `TapeError::ForeignRecord` if a producer belongs to another tape
    /// * `TapeError::RecordNotOnTape` if a producer is not on this tape
    pub fn push<const R: usize, F>(
        &mut self,
        name: &'static str,
        activation: Store<T, R>,
        producers: &[RecordId],
        backward: F,
    ) -> Result<Var<T, R, P>>
    where
        F: Fn(&mut Propagator<'_, T>, StoreView<'_, T, R>) -> Result<()> + Send + Sync + 'static,
    {
        let shape = activation.shape();
        let record = StaticRecord::new(name, activation, producers, backward);
        let node = self.link(Box::new(record))?;
        Ok(Var::new(node, shape))
    }

    /// Record a custom [`AbstractRecord`] implementation.
    ///
    /// # Errors
    ///
    /// Same as [`push`](Self::push).
    pub fn push_record(&mut self, record: Box<dyn AbstractRecord<T>>) -> Result<RecordId> {
        Ok(self.link(record)?.id())
    }

    fn link(
        &mut self,
        record: Box<dyn AbstractRecord<T>>,
    ) -> Result<IntrusivePtr<RecordNode<T, P>>> {
        if self.output.is_some() {
            return Err(TapeError::TapeComplete);
        }
        for &producer in record.producers() {
            self.check(producer)?;
        }
        let id = RecordId::new(self.id, self.len);
        let activations = record.activations();
        trace!(record = %id, what = record.what(), activations, "push");

        let node = IntrusivePtr::try_new(RecordNode::new(id, self.head.clone(), record))?;
        self.head = Link::to(node.clone());
        self.len += 1;
        self.activations += activations;
        Ok(node)
    }

    fn check(&self, id: RecordId) -> Result<()> {
        if id.tape() != self.id {
            return Err(TapeError::ForeignRecord {
                id: id.index() as u64,
                tape: id.tape().get(),
            });
        }
        if id.index() >= self.len {
            return Err(TapeError::RecordNotOnTape {
                id: id.index() as u64,
            });
        }
        Ok(())
    }

    /// Designate the output and stop recording.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::EmptyTape` if nothing was recorded, or a record
    /// error if `output` is not on this tape.
    pub fn complete<const R: usize>(&mut self, output: &Var<T, R, P>) -> Result<()> {
        if self.is_empty() {
            return Err(TapeError::EmptyTape);
        }
        self.check(output.id())?;
        self.output = Some(output.id());
        debug!(tape = self.id.get(), output = %output.id(), records = self.len, "complete");
        Ok(())
    }

    /// Run the backward pass seeded with ones.
    ///
    /// # Errors
    ///
    /// * `TapeError::EmptyTape` if nothing was recorded
    /// * `TapeError::IncompleteTape` if no output was designated
    /// * errors returned by backward functions
    pub fn backward(&self) -> Result<Gradients<T>> {
        let output = self.output_node()?;
        let seed = DynStore::filled(output.record().activation().extents(), T::one())?;
        self.run(output, seed)
    }

    /// Run the backward pass seeded with `seed`.
    ///
    /// # Errors
    ///
    /// As [`backward`](Self::backward), plus `TapeError::ContractionMismatch`
    /// if `seed` is not shaped like the output.
    pub fn backward_with<const R: usize>(&self, seed: Store<T, R>) -> Result<Gradients<T>> {
        let output = self.output_node()?;
        let expected = output.record().activation().extents();
        if expected != seed.extents() {
            return Err(TapeError::ContractionMismatch {
                expected: expected.to_vec(),
                actual: seed.extents().to_vec(),
            });
        }
        self.run(output, seed.into_dyn())
    }

    fn output_node(&self) -> Result<&RecordNode<T, P>> {
        if self.is_empty() {
            return Err(TapeError::EmptyTape);
        }
        let id = self.output.ok_or(TapeError::IncompleteTape)?;
        Chain::new(&self.head)
            .find(|node| node.id() == id)
            .ok_or(TapeError::RecordNotOnTape {
                id: id.index() as u64,
            })
    }

    fn run(&self, output: &RecordNode<T, P>, seed: DynStore<T>) -> Result<Gradients<T>> {
        let _span = debug_span!("backward", tape = self.id.get(), records = self.len).entered();

        let mut records: Vec<&dyn AbstractRecord<T>> =
            Chain::new(&self.head).map(|node| node.record()).collect();
        records.reverse();

        let mut slots: Vec<Option<DynStore<T>>> = (0..records.len()).map(|_| None).collect();
        let start = output.id().index();
        slots[start] = Some(seed);

        for index in (0..=start).rev() {
            let Some(grad) = slots[index].take() else {
                continue;
            };
            let record = records[index];
            {
                let _span =
                    trace_span!("propagate", record = index, what = record.what()).entered();
                let (older, _) = slots.split_at_mut(index);
                let mut propagator = Propagator::new(self.id, &records[..index], older);
                record.propagate(&grad, &mut propagator)?;
            }
            slots[index] = Some(grad);
        }

        Ok(Gradients::new(self.id, slots))
    }

    /// Iterate over the records, newest first.
    pub fn iter(&self) -> Records<'_, T, P> {
        Records {
            chain: Chain::new(&self.head),
        }
    }

    /// Release every record and start over with a new tape id.
    ///
    /// Records still referenced by a [`Var`] survive until that handle drops;
    /// handles from before the teardown are rejected by this tape afterwards.
    pub fn clear(&mut self) {
        debug!(
            tape = self.id.get(),
            records = self.len,
            activations = self.activations,
            "teardown"
        );
        self.head = Link::none();
        self.id = TapeId::next();
        self.len = 0;
        self.activations = 0;
        self.output = None;
    }
}

impl<T: Scalar, P: CountPolicy> Default for Tape<T, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Scalar, P: CountPolicy> fmt::Debug for Tape<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tape")
            .field("id", &self.id)
            .field("len", &self.len)
            .field("activations", &self.activations)
            .field("state", &self.state())
            .finish()
    }
}

/// Borrowed view of one record on a tape.
#[derive(Clone, Copy)]
pub struct RecordRef<'a, T: Scalar> {
    id: RecordId,
    record: &'a dyn AbstractRecord<T>,
}

impl<'a, T: Scalar> RecordRef<'a, T> {
    /// Handle of the record.
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Operation name.
    pub fn what(&self) -> &'static str {
        self.record.what()
    }

    /// Producer handles.
    pub fn producers(&self) -> &'a [RecordId] {
        self.record.producers()
    }

    /// Forward value.
    pub fn activation(&self) -> DynView<'a, T> {
        self.record.activation()
    }
}

impl<T: Scalar> fmt::Debug for RecordRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordRef")
            .field("id", &self.id)
            .field("what", &self.what())
            .field("extents", &self.activation().extents())
            .finish()
    }
}

/// Iterator over a tape's records, newest first.
pub struct Records<'a, T: Scalar, P: CountPolicy> {
    chain: Chain<'a, T, P>,
}

impl<'a, T: Scalar, P: CountPolicy> Iterator for Records<'a, T, P> {
    type Item = RecordRef<'a, T>;

    fn next(&mut self) -> Option<RecordRef<'a, T>> {
        self.chain.next().map(|node| RecordRef {
            id: node.id(),
            record: node.record(),
        })
    }
}

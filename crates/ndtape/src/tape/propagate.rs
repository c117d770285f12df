//! Gradient accumulation during the backward pass.

use super::record::{AbstractRecord, RecordId, TapeId};
use super::var::Var;
use crate::contract::EinsumPlan;
use crate::error::{Result, TapeError};
use crate::expr::StoreExpr;
use crate::memory::CountPolicy;
use crate::scalar::Scalar;
use crate::storage::{DynStore, StoreView};

/// Accumulation context handed to a record's backward function.
///
/// It exposes the records older than the one being propagated, together with
/// their gradient slots. A slot may receive any number of contributions; they
/// are summed. Since consumers are always newer than their producers, every
/// contribution to a slot arrives before that slot's record is propagated.
pub struct Propagator<'a, T: Scalar> {
    tape: TapeId,
    records: &'a [&'a dyn AbstractRecord<T>],
    slots: &'a mut [Option<DynStore<T>>],
}

impl<'a, T: Scalar> Propagator<'a, T> {
    pub(crate) fn new(
        tape: TapeId,
        records: &'a [&'a dyn AbstractRecord<T>],
        slots: &'a mut [Option<DynStore<T>>],
    ) -> Self {
        debug_assert_eq!(records.len(), slots.len());
        Self {
            tape,
            records,
            slots,
        }
    }

    fn resolve(&self, id: RecordId) -> Result<usize> {
        if id.tape() != self.tape {
            return Err(TapeError::ForeignRecord {
                id: id.index() as u64,
                tape: id.tape().get(),
            });
        }
        if id.index() >= self.records.len() {
            return Err(TapeError::RecordNotOnTape {
                id: id.index() as u64,
            });
        }
        Ok(id.index())
    }

    /// Forward value of an older record.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::RankMismatch` if the record's rank is not `R`, or a
    /// record error if `id` is not an older record of this tape.
    pub fn activation<const R: usize>(&self, id: RecordId) -> Result<StoreView<'a, T, R>> {
        let records: &'a [&'a dyn AbstractRecord<T>] = self.records;
        records[self.resolve(id)?].activation().to_static()
    }

    fn slot(&mut self, id: RecordId, extents: &[usize]) -> Result<&mut DynStore<T>> {
        let index = self.resolve(id)?;
        let record: &'a dyn AbstractRecord<T> = self.records[index];
        let expected = record.activation().extents();
        if expected != extents {
            return Err(TapeError::ContractionMismatch {
                expected: expected.to_vec(),
                actual: extents.to_vec(),
            });
        }
        let entry = &mut self.slots[index];
        let store = match entry.take() {
            Some(store) => store,
            None => DynStore::zeros(expected)?,
        };
        Ok(entry.insert(store))
    }

    /// Add `contribution` to the gradient of record `id`.
    ///
    /// # Errors
    ///
    /// Returns `TapeError::ContractionMismatch` if the contribution's extents
    /// differ from the record's activation.
    pub fn accumulate<E, const R: usize>(&mut self, id: RecordId, contribution: E) -> Result<()>
    where
        E: StoreExpr<R, Elem = T>,
    {
        let shape = contribution.shape();
        let slot = self.slot(id, shape.extents())?;
        for (dst, idx) in slot.as_mut_slice().iter_mut().zip(shape.indices()) {
            *dst += contribution.at(idx);
        }
        Ok(())
    }

    /// Add the contraction of `b` and `c`, labelled by `out`, to the gradient
    /// of record `id`.
    ///
    /// The gradient has the activation's extents; labels of `out` absent from
    /// both operands broadcast.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`EinsumPlan::accumulating`].
    #[allow(clippy::too_many_arguments)]
    pub fn accumulate_einsum<const RA: usize, const RB: usize, const RC: usize>(
        &mut self,
        id: RecordId,
        out: [char; RA],
        b: StoreView<'_, T, RB>,
        b_labels: [char; RB],
        c: StoreView<'_, T, RC>,
        c_labels: [char; RC],
    ) -> Result<()> {
        let index = self.resolve(id)?;
        let record: &'a dyn AbstractRecord<T> = self.records[index];
        let extents = record.activation().extents();
        if extents.len() != RA {
            return Err(TapeError::RankMismatch {
                expected: RA,
                actual: extents.len(),
            });
        }
        let plan = EinsumPlan::accumulating(
            &out,
            extents,
            &b_labels,
            b.extents(),
            &c_labels,
            c.extents(),
        )?;
        let slot = self.slot(id, extents)?;
        plan.accumulate(slot.as_mut_slice(), b.as_slice(), c.as_slice());
        Ok(())
    }

    /// Tape being propagated.
    pub fn tape(&self) -> TapeId {
        self.tape
    }
}

/// Gradients produced by one backward pass, one slot per record.
#[derive(Debug, Clone)]
pub struct Gradients<T: Scalar> {
    tape: TapeId,
    slots: Vec<Option<DynStore<T>>>,
}

impl<T: Scalar> Gradients<T> {
    pub(crate) fn new(tape: TapeId, slots: Vec<Option<DynStore<T>>>) -> Self {
        Self { tape, slots }
    }

    /// Gradient with respect to `var`, if any reached it.
    pub fn get<const R: usize, P: CountPolicy>(
        &self,
        var: &Var<T, R, P>,
    ) -> Option<StoreView<'_, T, R>> {
        self.get_dyn(var.id())?.view().ok()
    }

    /// Gradient of a record by handle.
    pub fn get_dyn(&self, id: RecordId) -> Option<&DynStore<T>> {
        if id.tape() != self.tape {
            return None;
        }
        self.slots.get(id.index())?.as_ref()
    }

    /// Whether a gradient reached record `id`.
    pub fn contains(&self, id: RecordId) -> bool {
        self.get_dyn(id).is_some()
    }

    /// Number of records that received a gradient.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Check if no record received a gradient.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the records that received a gradient.
    pub fn iter(&self) -> impl Iterator<Item = (RecordId, &DynStore<T>)> {
        let tape = self.tape;
        self.slots
            .iter()
            .enumerate()
            .filter_map(move |(i, s)| s.as_ref().map(|g| (RecordId::new(tape, i), g)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Fill;
    use crate::storage::Store;
    use crate::tape::record::{LeafBackward, StaticRecord};
    use approx::assert_relative_eq;

    type Leaf = StaticRecord<f64, 1, LeafBackward<f64, 1>>;

    fn leaves(tape: TapeId) -> (Vec<Leaf>, RecordId, RecordId) {
        let a = StaticRecord::leaf(Store::from_vec([2], vec![1.0, 2.0]).unwrap());
        let b = StaticRecord::leaf(Store::from_vec([2], vec![3.0, 4.0]).unwrap());
        (vec![a, b], RecordId::new(tape, 0), RecordId::new(tape, 1))
    }

    #[test]
    fn test_accumulate_sums_contributions() {
        let tape = TapeId::next();
        let (records, a, _) = leaves(tape);
        let refs: Vec<&dyn AbstractRecord<f64>> = records.iter().map(|r| r as _).collect();
        let mut slots = vec![None, None];
        let mut prop = Propagator::new(tape, &refs, &mut slots);

        prop.accumulate(a, Fill::new([2], 1.5)).unwrap();
        prop.accumulate(a, Fill::new([2], 2.0)).unwrap();
        assert_relative_eq!(slots[0].as_ref().unwrap().as_slice()[1], 3.5);
        assert!(slots[1].is_none());
    }

    #[test]
    fn test_accumulate_shape_mismatch() {
        let tape = TapeId::next();
        let (records, a, _) = leaves(tape);
        let refs: Vec<&dyn AbstractRecord<f64>> = records.iter().map(|r| r as _).collect();
        let mut slots = vec![None, None];
        let mut prop = Propagator::new(tape, &refs, &mut slots);

        let err = prop.accumulate(a, Fill::new([3], 1.0)).unwrap_err();
        assert!(matches!(err, TapeError::ContractionMismatch { .. }));
    }

    #[test]
    fn test_activation_and_foreign_ids() {
        let tape = TapeId::next();
        let (records, a, b) = leaves(tape);
        let refs: Vec<&dyn AbstractRecord<f64>> = records.iter().map(|r| r as _).collect();
        let mut slots = vec![None, None];
        let prop = Propagator::new(tape, &refs, &mut slots);

        assert_eq!(prop.activation::<1>(b).unwrap().at([0]), 3.0);
        assert!(matches!(
            prop.activation::<2>(a),
            Err(TapeError::RankMismatch { .. })
        ));
        let other = RecordId::new(TapeId::next(), 0);
        assert!(matches!(
            prop.activation::<1>(other),
            Err(TapeError::ForeignRecord { .. })
        ));
        let newer = RecordId::new(tape, 5);
        assert!(matches!(
            prop.activation::<1>(newer),
            Err(TapeError::RecordNotOnTape { id: 5 })
        ));
    }

    #[test]
    fn test_accumulate_einsum_outer() {
        let tape = TapeId::next();
        let m = StaticRecord::leaf(Store::<f64, 2>::zeros([2, 2]).unwrap());
        let refs: Vec<&dyn AbstractRecord<f64>> = vec![&m as &dyn AbstractRecord<f64>];
        let mut slots = vec![None];
        let mut prop = Propagator::new(tape, &refs, &mut slots);

        let u = Store::from_vec([2], vec![1.0, 2.0]).unwrap();
        let v = Store::from_vec([2], vec![3.0, 4.0]).unwrap();
        let id = RecordId::new(tape, 0);
        prop.accumulate_einsum(id, ['i', 'j'], u.view(), ['i'], v.view(), ['j']).unwrap();
        assert!(matches!(
            prop.accumulate_einsum(id, ['i'], u.view(), ['i'], v.view(), ['j']),
            Err(TapeError::RankMismatch {
                expected: 1,
                actual: 2
            })
        ));
        assert_eq!(slots[0].as_ref().unwrap().as_slice(), &[3.0, 4.0, 6.0, 8.0]);
    }

    #[test]
    fn test_gradients_lookup() {
        let tape = TapeId::next();
        let grads = Gradients::new(tape, vec![None, Some(DynStore::<f64>::zeros(&[2]).unwrap())]);
        assert_eq!(grads.len(), 1);
        assert!(!grads.contains(RecordId::new(tape, 0)));
        assert!(grads.contains(RecordId::new(tape, 1)));
        assert!(grads.get_dyn(RecordId::new(TapeId::next(), 1)).is_none());
        assert_eq!(grads.iter().map(|(id, _)| id.index()).collect::<Vec<_>>(), vec![1]);
    }
}

//! Label analysis and the recursive summation kernel.

use crate::error::{Result, TapeError};
use crate::scalar::Scalar;
use crate::storage::DynExtents;
use crate::strides::{compute_strides_dyn, increment_index};
use smallvec::{SmallVec, smallvec};

type Slots = SmallVec<[usize; 4]>;

/// How one tensor's axes map onto label slots.
#[derive(Debug, Clone, Default)]
struct Operand {
    slots: Slots,
    strides: Slots,
}

impl Operand {
    fn new(labels: &[char], extents: &[usize], slot_labels: &[char]) -> Self {
        let slots = labels
            .iter()
            .map(|l| slot_labels.iter().position(|s| s == l).unwrap_or_default())
            .collect();
        Self {
            slots,
            strides: compute_strides_dyn(extents).into_iter().collect(),
        }
    }

    #[inline]
    fn offset(&self, idx: &[usize]) -> usize {
        self.slots
            .iter()
            .zip(&self.strides)
            .map(|(&slot, &stride)| idx[slot] * stride)
            .sum()
    }
}

/// Precomputed matching of labelled axes for `out = sum b * c`.
///
/// Every distinct label gets one slot. Slots are ordered so that a single
/// recursion visits them in evaluation order:
///
/// ```text
/// [ free (output) labels | summed labels of b | summed labels only in c ]
///   iterated, not summed   summed               summed
/// ```
///
/// A label that repeats inside one operand maps all those axes to the same
/// slot, which ties them to the diagonal.
#[derive(Debug, Clone)]
pub struct EinsumPlan {
    labels: SmallVec<[char; 8]>,
    extents: SmallVec<[usize; 8]>,
    free: usize,
    out: Operand,
    b: Operand,
    c: Operand,
}

fn bind(bound: &mut SmallVec<[(char, usize); 8]>, label: char, extent: usize) -> Result<()> {
    match bound.iter().find(|(l, _)| *l == label) {
        Some(&(_, expected)) if expected != extent => Err(TapeError::LabelExtentMismatch {
            label,
            expected,
            actual: extent,
        }),
        Some(_) => Ok(()),
        None => {
            bound.push((label, extent));
            Ok(())
        }
    }
}

fn check_rank(labels: &[char], extents: &[usize]) -> Result<()> {
    if labels.len() != extents.len() {
        return Err(TapeError::RankMismatch {
            expected: labels.len(),
            actual: extents.len(),
        });
    }
    Ok(())
}

impl EinsumPlan {
    /// Plan a contraction producing a fresh output.
    ///
    /// Output labels must be distinct and each must appear in `b` or `c`.
    ///
    /// # Errors
    ///
    /// * `TapeError::RankMismatch` if a label list and its extents differ in length
    /// * `TapeError::LabelExtentMismatch` if a label is bound to two extents
    /// * `TapeError::DuplicateOutputLabel` if an output label repeats
    /// * `TapeError::UnboundLabel` if an output label is in neither operand
    ///
    /// # Example
    ///
    /// ```
    /// use ndtape::contract::EinsumPlan;
    ///
    /// // Matrix multiplication: out[i,k] = b[i,j] * c[j,k]
    /// let plan =
    ///     EinsumPlan::new(&['i', 'k'], &['i', 'j'], &[2, 3], &['j', 'k'], &[3, 4]).unwrap();
    /// assert_eq!(plan.output_extents().as_slice(), &[2, 4]);
    /// assert_eq!(plan.summed_labels(), &['j']);
    /// ```
    pub fn new(
        out: &[char],
        b: &[char],
        b_extents: &[usize],
        c: &[char],
        c_extents: &[usize],
    ) -> Result<Self> {
        Self::build(out, None, b, b_extents, c, c_extents)
    }

    /// Plan a contraction accumulated into an existing output.
    ///
    /// Output extents come from `out_extents`, so an output label absent from
    /// both operands broadcasts along that axis, and a repeated output label
    /// writes to the diagonal.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new), except that output labels may repeat and
    /// need not be bound by an operand.
    pub fn accumulating(
        out: &[char],
        out_extents: &[usize],
        b: &[char],
        b_extents: &[usize],
        c: &[char],
        c_extents: &[usize],
    ) -> Result<Self> {
        Self::build(out, Some(out_extents), b, b_extents, c, c_extents)
    }

    fn build(
        out: &[char],
        out_extents: Option<&[usize]>,
        b: &[char],
        b_extents: &[usize],
        c: &[char],
        c_extents: &[usize],
    ) -> Result<Self> {
        check_rank(b, b_extents)?;
        check_rank(c, c_extents)?;

        let mut bound = SmallVec::new();
        for (&label, &extent) in b.iter().zip(b_extents).chain(c.iter().zip(c_extents)) {
            bind(&mut bound, label, extent)?;
        }
        if let Some(out_extents) = out_extents {
            check_rank(out, out_extents)?;
            for (&label, &extent) in out.iter().zip(out_extents) {
                bind(&mut bound, label, extent)?;
            }
        }

        let mut labels: SmallVec<[char; 8]> = SmallVec::new();
        for &label in out {
            if labels.contains(&label) {
                if out_extents.is_none() {
                    return Err(TapeError::DuplicateOutputLabel { label });
                }
                continue;
            }
            if !bound.iter().any(|(l, _)| *l == label) {
                return Err(TapeError::UnboundLabel { label });
            }
            labels.push(label);
        }
        let free = labels.len();
        for &label in b.iter().chain(c) {
            if !labels.contains(&label) {
                labels.push(label);
            }
        }

        let extents: SmallVec<[usize; 8]> = labels
            .iter()
            .map(|l| {
                bound
                    .iter()
                    .find(|(bl, _)| bl == l)
                    .map_or(0, |&(_, extent)| extent)
            })
            .collect();
        let out_extents: Slots = match out_extents {
            Some(extents) => extents.iter().copied().collect(),
            None => extents[..free].iter().copied().collect(),
        };

        Ok(Self {
            out: Operand::new(out, &out_extents, &labels),
            b: Operand::new(b, b_extents, &labels),
            c: Operand::new(c, c_extents, &labels),
            labels,
            extents,
            free,
        })
    }

    /// All distinct labels in slot order.
    pub fn labels(&self) -> &[char] {
        &self.labels
    }

    /// Extent of every slot.
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    /// Labels iterated without summation.
    pub fn free_labels(&self) -> &[char] {
        &self.labels[..self.free]
    }

    /// Labels summed over.
    pub fn summed_labels(&self) -> &[char] {
        &self.labels[self.free..]
    }

    /// Extents of the output, axis by axis.
    pub fn output_extents(&self) -> DynExtents {
        self.out.slots.iter().map(|&s| self.extents[s]).collect()
    }

    /// Add the contraction of `b` and `c` into `out` (row-major slices).
    pub(crate) fn accumulate<T: Scalar>(&self, out: &mut [T], b: &[T], c: &[T]) {
        if self.extents[..self.free].contains(&0) {
            return;
        }
        let mut idx: SmallVec<[usize; 8]> = smallvec![0; self.labels.len()];
        loop {
            let sum = self.sum_from(self.free, &mut idx, b, c);
            out[self.out.offset(&idx)] += sum;
            if !increment_index(&mut idx[..self.free], &self.extents[..self.free]) {
                break;
            }
        }
    }

    /// One output element, given the values of the free labels.
    pub(crate) fn element<T: Scalar>(&self, free: &[usize], b: &[T], c: &[T]) -> T {
        debug_assert_eq!(free.len(), self.free);
        let mut idx: SmallVec<[usize; 8]> = smallvec![0; self.labels.len()];
        idx[..self.free].copy_from_slice(free);
        self.sum_from(self.free, &mut idx, b, c)
    }

    fn sum_from<T: Scalar>(&self, level: usize, idx: &mut [usize], b: &[T], c: &[T]) -> T {
        if level == self.labels.len() {
            return b[self.b.offset(idx)] * c[self.c.offset(idx)];
        }
        let mut acc = T::zero();
        for i in 0..self.extents[level] {
            idx[level] = i;
            acc += self.sum_from(level + 1, idx, b, c);
        }
        acc
    }

    /// Map output axes to free-label values (handles repeated output labels).
    pub(crate) fn free_from_output(&self, out_idx: &[usize]) -> SmallVec<[usize; 8]> {
        let mut free: SmallVec<[usize; 8]> = smallvec![0; self.free];
        for (&slot, &i) in self.out.slots.iter().zip(out_idx) {
            free[slot] = i;
        }
        free
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_order() {
        // out[k,i] = b[i,j,l] * c[l,k,m]
        let plan = EinsumPlan::new(
            &['k', 'i'],
            &['i', 'j', 'l'],
            &[2, 3, 4],
            &['l', 'k', 'm'],
            &[4, 5, 6],
        )
        .unwrap();
        assert_eq!(plan.labels(), &['k', 'i', 'j', 'l', 'm']);
        assert_eq!(plan.extents(), &[5, 2, 3, 4, 6]);
        assert_eq!(plan.free_labels(), &['k', 'i']);
        assert_eq!(plan.summed_labels(), &['j', 'l', 'm']);
        assert_eq!(plan.output_extents().as_slice(), &[5, 2]);
    }

    #[test]
    fn test_extent_mismatch() {
        let err = EinsumPlan::new(&['i'], &['i', 'j'], &[2, 3], &['j'], &[4]).unwrap_err();
        assert!(matches!(
            err,
            TapeError::LabelExtentMismatch {
                label: 'j',
                expected: 3,
                actual: 4
            }
        ));
    }

    #[test]
    fn test_unbound_and_duplicate_output() {
        assert!(matches!(
            EinsumPlan::new(&['z'], &['i'], &[2], &['i'], &[2]),
            Err(TapeError::UnboundLabel { label: 'z' })
        ));
        assert!(matches!(
            EinsumPlan::new(&['i', 'i'], &['i'], &[2], &['i'], &[2]),
            Err(TapeError::DuplicateOutputLabel { label: 'i' })
        ));
    }

    #[test]
    fn test_accumulating_allows_broadcast_and_diagonal() {
        let plan =
            EinsumPlan::accumulating(&['i', 'i', 'z'], &[2, 2, 3], &['i'], &[2], &[], &[]).unwrap();
        assert_eq!(plan.free_labels(), &['i', 'z']);

        let mut out = vec![0.0; 12];
        plan.accumulate(&mut out, &[1.0, 2.0], &[10.0]);
        // out[i, i, z] = b[i] * c for every z; off-diagonal entries untouched
        assert_eq!(&out[0..3], &[10.0, 10.0, 10.0]);
        assert_eq!(&out[3..9], &[0.0; 6]);
        assert_eq!(&out[9..12], &[20.0, 20.0, 20.0]);
    }

    #[test]
    fn test_accumulating_rejects_inconsistent_output() {
        assert!(matches!(
            EinsumPlan::accumulating(&['i'], &[3], &['i'], &[2], &[], &[]),
            Err(TapeError::LabelExtentMismatch { label: 'i', .. })
        ));
    }

    #[test]
    fn test_rank_mismatch() {
        assert!(matches!(
            EinsumPlan::new(&[], &['i', 'j'], &[2], &[], &[]),
            Err(TapeError::RankMismatch { .. })
        ));
    }

    #[test]
    fn test_element_and_free_from_output() {
        // trace-like: out[i] = sum_j b[i,j] * c[j]
        let plan = EinsumPlan::new(&['i'], &['i', 'j'], &[2, 2], &['j'], &[2]).unwrap();
        let b = [1.0, 2.0, 3.0, 4.0];
        let c = [1.0, 10.0];
        let free = plan.free_from_output(&[1]);
        assert_eq!(plan.element(&free, &b, &c), 43.0);
    }
}

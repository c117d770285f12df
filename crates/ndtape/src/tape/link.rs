//! The intrusive chain threading records in creation order.
//!
//! ```text
//! tape.head ──> R3 ──older──> R2 ──older──> R1 ──older──> (none)
//! ```
//!
//! Each [`RecordNode`] embeds its reference counts and the [`Link`] to the
//! next-older record, so pushing is O(1) and walking from the head visits
//! records newest first.

use super::record::{AbstractRecord, RecordId, TapeId};
use crate::memory::{CountPolicy, IntrusivePtr, IntrusiveTarget, RefCounts, WeakIntrusiveTarget};
use crate::scalar::Scalar;
use std::fmt;

/// A record together with its counts and its place in the chain.
pub struct RecordNode<T: Scalar, P: CountPolicy> {
    counts: RefCounts<P>,
    id: RecordId,
    older: Link<T, P>,
    record: Box<dyn AbstractRecord<T>>,
}

impl<T: Scalar, P: CountPolicy> RecordNode<T, P> {
    pub(crate) fn new(id: RecordId, older: Link<T, P>, record: Box<dyn AbstractRecord<T>>) -> Self {
        Self {
            counts: RefCounts::new(),
            id,
            older,
            record,
        }
    }

    /// Handle of this record.
    pub fn id(&self) -> RecordId {
        self.id
    }

    /// Tape this record was pushed on.
    pub fn tape(&self) -> TapeId {
        self.id.tape()
    }

    /// The record itself.
    pub fn record(&self) -> &dyn AbstractRecord<T> {
        &*self.record
    }

    /// The next-older node, if any.
    pub fn older(&self) -> Option<&RecordNode<T, P>> {
        self.older.node()
    }
}

// SAFETY: `counts` is a plain embedded field returned unchanged.
unsafe impl<T: Scalar, P: CountPolicy> IntrusiveTarget for RecordNode<T, P> {
    type Policy = P;

    fn ref_counts(&self) -> &RefCounts<P> {
        &self.counts
    }
}

// SAFETY: `RefCounts` has no drop glue.
unsafe impl<T: Scalar, P: CountPolicy> WeakIntrusiveTarget for RecordNode<T, P> {}

impl<T: Scalar, P: CountPolicy> fmt::Debug for RecordNode<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordNode")
            .field("id", &self.id)
            .field("what", &self.record.what())
            .field("counts", &self.counts)
            .finish()
    }
}

/// Owning link to the next-older record.
pub struct Link<T: Scalar, P: CountPolicy>(Option<IntrusivePtr<RecordNode<T, P>>>);

impl<T: Scalar, P: CountPolicy> Link<T, P> {
    /// The end of the chain.
    pub const fn none() -> Self {
        Self(None)
    }

    pub(crate) fn to(node: IntrusivePtr<RecordNode<T, P>>) -> Self {
        Self(Some(node))
    }

    /// The node this link points to.
    pub fn node(&self) -> Option<&RecordNode<T, P>> {
        self.0.as_deref()
    }

    /// Whether this is the end of the chain.
    pub fn is_none(&self) -> bool {
        self.0.is_none()
    }
}

impl<T: Scalar, P: CountPolicy> Default for Link<T, P> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T: Scalar, P: CountPolicy> Clone for Link<T, P> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Scalar, P: CountPolicy> Drop for Link<T, P> {
    // Unlink iteratively: dropping a long chain recursively would overflow the
    // stack. Stops at the first node someone else still owns.
    fn drop(&mut self) {
        let mut next = self.0.take();
        while let Some(ptr) = next {
            match IntrusivePtr::try_unwrap(ptr) {
                Ok(mut node) => next = node.older.0.take(),
                Err(_) => break,
            }
        }
    }
}

impl<T: Scalar, P: CountPolicy> fmt::Debug for Link<T, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.node() {
            Some(node) => write!(f, "Link({})", node.id),
            None => f.write_str("Link(none)"),
        }
    }
}

/// Iterator over a chain, newest record first.
pub struct Chain<'a, T: Scalar, P: CountPolicy> {
    next: Option<&'a RecordNode<T, P>>,
}

impl<'a, T: Scalar, P: CountPolicy> Chain<'a, T, P> {
    pub(crate) fn new(head: &'a Link<T, P>) -> Self {
        Self { next: head.node() }
    }
}

impl<'a, T: Scalar, P: CountPolicy> Iterator for Chain<'a, T, P> {
    type Item = &'a RecordNode<T, P>;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next?;
        self.next = node.older();
        Some(node)
    }
}

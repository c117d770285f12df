//! Reverse-mode recording.
//!
//! A [`Tape`] is a singly linked chain of records, newest at the head. Each
//! record owns its forward value and lists the records it was computed from
//! by [`RecordId`]:
//!
//! ```text
//!  head
//!   │
//!   ▼
//! ┌──────────┐ older ┌──────────┐ older ┌──────────┐
//! │ #2 mul   │──────▶│ #1 var y │──────▶│ #0 var x │
//! │ [#0, #1] │       │ []       │       │ []       │
//! └──────────┘       └──────────┘       └──────────┘
//! ```
//!
//! The backward pass walks the chain from the designated output towards the
//! tail. Because producers are always older than their consumers, a record's
//! gradient slot holds every contribution by the time it is reached.
//!
//! Records are reference counted with the intrusive pointers of
//! [`crate::memory`], so a [`Var`] keeps its record (and everything older)
//! alive after the tape is cleared. The chain is torn down iteratively.

mod link;
pub mod ops;
mod propagate;
mod record;
mod recording;
mod var;

#[cfg(feature = "graph")]
mod graph;

#[cfg(feature = "graph")]
pub use graph::RecordSummary;
pub use link::{Link, RecordNode};
pub use propagate::{Gradients, Propagator};
pub use record::{AbstractRecord, LeafBackward, RecordId, StaticRecord, TapeId};
pub use recording::{RecordRef, Records, Tape, TapeState};
pub use var::{Var, WeakVar};

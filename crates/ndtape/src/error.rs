//! Error types for ndtape.

use thiserror::Error;

/// Errors that can occur while allocating, contracting or differentiating.
///
/// Count underflow and double destruction are not represented here: they are
/// programming errors and panic at the point of detection.
#[derive(Debug, Error)]
pub enum TapeError {
    /// The global allocator returned null.
    #[error("allocation of {bytes} bytes aligned to {align} failed")]
    AllocationFailed { bytes: usize, align: usize },

    /// Requested element count does not fit in an allocation layout.
    #[error("capacity overflow: {len} elements of {elem_size} bytes")]
    CapacityOverflow { len: usize, elem_size: usize },

    /// Data length does not match the element count of a shape.
    #[error("shape mismatch: expected {expected} elements, got {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    /// Extents of two operands (or of a gradient and its activation) disagree.
    #[error("contraction mismatch: expected extents {expected:?}, got {actual:?}")]
    ContractionMismatch {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    /// A label is bound to axes of different extents.
    #[error("label '{label}' bound to extent {expected} and {actual}")]
    LabelExtentMismatch {
        label: char,
        expected: usize,
        actual: usize,
    },

    /// An output label does not appear in any operand.
    #[error("output label '{label}' does not appear in any operand")]
    UnboundLabel { label: char },

    /// An output label is listed more than once.
    #[error("output label '{label}' is repeated")]
    DuplicateOutputLabel { label: char },

    /// Operation requires a specific rank.
    #[error("expected rank {expected}, got rank {actual}")]
    RankMismatch { expected: usize, actual: usize },

    /// Backward pass requested on a tape with no records.
    #[error("tape is empty")]
    EmptyTape,

    /// Backward pass requested before an output record was designated.
    #[error("tape has no designated output; call `complete` first")]
    IncompleteTape,

    /// Record pushed after the tape was completed.
    #[error("tape is complete; clear it before recording again")]
    TapeComplete,

    /// A record handle belongs to a different (or torn down) tape.
    #[error("record {id} belongs to tape {tape}, not this tape")]
    ForeignRecord { id: u64, tape: u64 },

    /// A record handle is not present on this tape.
    #[error("record {id} is not on this tape")]
    RecordNotOnTape { id: u64 },
}

/// Result type for ndtape operations.
pub type Result<T> = std::result::Result<T, TapeError>;

//! Error types for mesh refinement.

use super::refiner::RefineState;

/// Precondition violations detected before any buffer is read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RefineError {
    /// `sum(counts)` does not match the index buffer length.
    #[error("topology mismatch: face counts sum to {expected} but there are {actual} indices")]
    TopologyMismatch { expected: usize, actual: usize },

    /// A corner references a vertex past the end of the point buffer.
    #[error("corner {corner} references vertex {index}, mesh has {vertices} vertices")]
    IndexOutOfRange {
        corner: usize,
        index: u32,
        vertices: usize,
    },

    /// A single polygon has more corners than the split vertex budget.
    #[error("face {face} has {arity} corners, split budget is {budget}")]
    SplitBudgetTooSmall { budget: u32, arity: u32, face: usize },

    /// An attribute is neither per-vertex nor per-corner.
    #[error("attribute `{name}` has {len} values, expected {vertices} (per vertex) or {corners} (per corner)")]
    AttributeLengthMismatch {
        name: &'static str,
        len: usize,
        vertices: usize,
        corners: usize,
    },

    /// Per-face material ids do not match the face count.
    #[error("{len} material ids for {faces} faces")]
    MaterialIdsMismatch { len: usize, faces: usize },

    /// Refiner operations were called out of order.
    #[error("refiner is {actual:?}, operation requires {expected:?}")]
    InvalidState {
        expected: RefineState,
        actual: RefineState,
    },
}

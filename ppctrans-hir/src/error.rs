//! Error Handling
//!
//! Error types for the HIR layer using `thiserror`. A violated invariant in
//! this layer indicates a programming defect in a pass or in the lowering
//! frontend, not a user-facing runtime condition, so the taxonomy is small and
//! fail-fast:
//!
//! - **Contract violations**: wrong operand kind handed to a binding
//!   operation, out-of-range slot index. Surfaced as `Err` from the mutators.
//! - **Structural corruption**: findings of the graph verifier. Never
//!   recovered from at runtime.
//!
//! Pure queries (the binary-arrange family, tunneling) never return errors;
//! "no match" is expressed as a sentinel `None`, per the HIR contract.

use thiserror::Error;

use crate::hir::opcode::{Opcode, SigType};

/// HIR error types.
///
/// Uses `thiserror` for zero-cost error handling with detailed messages.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HirError {
    /// An operand binding did not match the opcode signature's kind for that
    /// slot (e.g. a value handed to a label-typed slot).
    #[error("operand kind mismatch on {opcode:?} slot {slot}: signature says {expected:?}, got {found:?}")]
    OperandKindMismatch {
        opcode: Opcode,
        slot: usize,
        expected: SigType,
        found: SigType,
    },

    /// `set_src` was called on a slot the signature does not mark Value-typed.
    #[error("slot {slot} of {opcode:?} is not value-typed")]
    SlotNotValueTyped { opcode: Opcode, slot: usize },

    /// A destination was bound on an opcode whose signature has no destination.
    #[error("{opcode:?} has no destination slot")]
    NoDestSlot { opcode: Opcode },

    /// Slot index outside 0..3.
    #[error("invalid operand slot index {slot} (must be 0..3)")]
    InvalidSlot { slot: usize },

    /// Verifier finding: a label referenced by a branch was never bound to a
    /// block.
    #[error("label l{label} is referenced but never bound to a block")]
    LabelUnbound { label: u32 },

    /// Verifier finding: def-use records or list links are inconsistent.
    #[error("graph corrupt: {message}")]
    GraphCorrupt { message: String },
}

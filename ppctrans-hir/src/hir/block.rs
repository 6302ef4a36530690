//! Blocks, Labels and Symbols
//!
//! The structural containers the instruction list lives inside. A `Block` owns
//! the head/tail of its intrusive instruction list; labels name branch targets
//! and are bound to blocks once the frontend has laid the function out; symbols
//! name external call targets (guest functions or runtime helpers).
//!
//! Control-flow analysis over blocks is a consumer concern and lives outside
//! this crate.

use serde::Serialize;

use crate::hir::instr::InstrId;

/// Handle to a [`Block`] in its function's block arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BlockId(pub(crate) u32);

impl BlockId {
    /// Raw index into the block arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a [`Label`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct LabelId(pub(crate) u32);

impl LabelId {
    /// Raw index into the label arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a [`Symbol`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SymbolId(pub(crate) u32);

impl SymbolId {
    /// Raw index into the symbol table.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One basic block: exclusive owner of a doubly linked list of instructions.
#[derive(Debug, Clone, Serialize)]
pub struct Block {
    /// First instruction, or `None` for an empty block.
    pub(crate) head: Option<InstrId>,
    /// Last instruction, or `None` for an empty block.
    pub(crate) tail: Option<InstrId>,
}

impl Block {
    pub(crate) fn new() -> Self {
        Self { head: None, tail: None }
    }

    /// First instruction in the block, if any.
    #[inline]
    pub fn head(&self) -> Option<InstrId> {
        self.head
    }

    /// Last instruction in the block, if any.
    #[inline]
    pub fn tail(&self) -> Option<InstrId> {
        self.tail
    }

    /// True if the block holds no instructions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

/// A branch target. Unbound until the frontend knows which block it lands in.
#[derive(Debug, Clone, Serialize)]
pub struct Label {
    /// Optional debug name (guest address string, loop header name, ...).
    pub name: Option<String>,
    /// The block this label resolves to, once bound.
    pub block: Option<BlockId>,
}

/// A call target: a guest function or runtime helper known by name/address.
#[derive(Debug, Clone, Serialize)]
pub struct Symbol {
    /// Symbol name (for display and linking).
    pub name: String,
    /// Guest entry address.
    pub address: u32,
}

//! HIR Instruction Node
//!
//! An `Instr` is one operation node in a block's doubly linked instruction
//! list: an opcode, a 16-bit flag word, up to three tagged operand slots, an
//! optional destination value and intrusive `prev`/`next` links. The links are
//! arena handles rather than pointers, so an instruction's identity is stable
//! across list moves.
//!
//! The structural mutators (binding, relinking, removal) live on
//! [`super::function::HirFunction`], which owns all the arenas; this module is
//! the passive data model plus read-only slot accessors.

use serde::Serialize;

use crate::hir::block::{BlockId, LabelId, SymbolId};
use crate::hir::opcode::Opcode;
use crate::hir::value::{UseId, ValueId};

/// Handle to an [`Instr`] in its function's instruction arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct InstrId(pub(crate) u32);

impl InstrId {
    /// Raw index into the instruction arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One tagged operand slot.
///
/// The variant must agree with the opcode signature's kind tag for that slot;
/// the binding operations check this once at bind time, so reads can trust the
/// tag without re-consulting the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operand {
    /// Slot is unbound (or unused by the opcode).
    None,
    /// Reference to a value; mirrored by a `Use` record.
    Value(ValueId),
    /// Reference to a branch target label.
    Label(LabelId),
    /// Reference to a call target symbol.
    Symbol(SymbolId),
    /// Raw 64-bit immediate offset.
    Offset(u64),
}

impl Operand {
    /// The bound value, if this slot holds one.
    #[inline]
    pub fn as_value(&self) -> Option<ValueId> {
        match self {
            Operand::Value(v) => Some(*v),
            _ => None,
        }
    }
}

/// One operation node.
///
/// Fields are read-only outside the crate; all mutation goes through
/// `HirFunction` so that list links and def-use records stay consistent.
#[derive(Debug, Clone, Serialize)]
pub struct Instr {
    /// Owning block.
    pub(crate) block: BlockId,
    /// Previous instruction in the block list.
    pub(crate) prev: Option<InstrId>,
    /// Next instruction in the block list.
    pub(crate) next: Option<InstrId>,
    /// Operation; indexes the opcode info table.
    pub(crate) opcode: Opcode,
    /// Opcode-specific modifier flags.
    pub(crate) flags: u16,
    /// Monotonically increasing ordinal for "comes before" comparisons.
    /// Not renumbered by `move_before`; see `HirFunction::renumber_ordinals`.
    pub(crate) ordinal: u32,
    /// Destination value, if the signature has one.
    pub(crate) dest: Option<ValueId>,
    /// The three tagged operand slots.
    pub(crate) srcs: [Operand; 3],
    /// Use record per slot; `Some` exactly for Value-typed slots that are
    /// currently bound.
    pub(crate) src_uses: [Option<UseId>; 3],
}

impl Instr {
    pub(crate) fn new(block: BlockId, opcode: Opcode, flags: u16, ordinal: u32) -> Self {
        Self {
            block,
            prev: None,
            next: None,
            opcode,
            flags,
            ordinal,
            dest: None,
            srcs: [Operand::None; 3],
            src_uses: [None; 3],
        }
    }

    /// Owning block.
    #[inline]
    pub fn block(&self) -> BlockId {
        self.block
    }

    /// Previous instruction in the block list, if any.
    #[inline]
    pub fn prev(&self) -> Option<InstrId> {
        self.prev
    }

    /// Next instruction in the block list, if any.
    #[inline]
    pub fn next(&self) -> Option<InstrId> {
        self.next
    }

    /// Operation.
    #[inline]
    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    /// Opcode-specific modifier flags.
    #[inline]
    pub fn flags(&self) -> u16 {
        self.flags
    }

    /// Ordinal for in-block ordering comparisons.
    #[inline]
    pub fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Destination value, if bound.
    #[inline]
    pub fn dest(&self) -> Option<ValueId> {
        self.dest
    }

    /// Operand slot `slot` (0..3).
    #[inline]
    pub fn src(&self, slot: usize) -> Operand {
        self.srcs[slot]
    }

    /// Convenience accessor for slot 0.
    #[inline]
    pub fn src1(&self) -> Operand {
        self.srcs[0]
    }

    /// Convenience accessor for slot 1.
    #[inline]
    pub fn src2(&self) -> Operand {
        self.srcs[1]
    }

    /// Convenience accessor for slot 2.
    #[inline]
    pub fn src3(&self) -> Operand {
        self.srcs[2]
    }
}

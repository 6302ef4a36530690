//! HIR Function Graph
//!
//! `HirFunction` owns every arena of the instruction graph for one translated
//! guest function: blocks, instructions, values, use records, labels and
//! symbols. All structural mutation (operand binding, list surgery, removal)
//! goes through methods here so that list links and def-use bookkeeping are
//! updated as a single logical step — the transactional invariant every
//! optimization pass depends on.
//!
//! One graph belongs to exactly one translation job; separate worker threads
//! each own independent graphs, so nothing here needs locking.
//!
//! # Design
//! - Entities reference each other by `u32` arena handles, never pointers.
//!   Identity is stable across list moves and removal, and use-after-remove is
//!   a checkable condition instead of undefined behavior.
//! - Use records realize the intrusive use-list back-link as a stored list
//!   position (`Use::list_pos`), giving O(1) edge removal via swap-remove.
//! - Pure queries (the binary-arrange family, tunneling, operand visiting)
//!   never mutate and never error: "no match" is the `None` sentinel.

use crate::error::HirError;
use crate::hir::block::{Block, BlockId, Label, LabelId, Symbol, SymbolId};
use crate::hir::instr::{Instr, InstrId, Operand};
use crate::hir::opcode::{
    Opcode, SigType, TUNNEL_AND_MASK, TUNNEL_ASSIGNS, TUNNEL_SIGN_EXTEND, TUNNEL_TRUNCATE,
    TUNNEL_ZERO_EXTEND,
};
use crate::hir::value::{ConstantValue, Use, UseId, Value, ValueId, ValueType};

/// The instruction/value graph of one translated guest function.
#[derive(Debug, Clone, serde::Serialize)]
pub struct HirFunction {
    /// Function name (for dumps and linking).
    pub name: String,
    /// Guest entry address.
    pub address: u32,
    pub(crate) blocks: Vec<Block>,
    pub(crate) instrs: Vec<Instr>,
    pub(crate) values: Vec<Value>,
    /// Use arena; `None` marks a freed record awaiting reuse.
    pub(crate) uses: Vec<Option<Use>>,
    #[serde(skip)]
    free_uses: Vec<UseId>,
    pub(crate) labels: Vec<Label>,
    pub(crate) symbols: Vec<Symbol>,
    next_instr_ordinal: u32,
    next_value_ordinal: u32,
}

impl HirFunction {
    /// Create an empty graph for the guest function at `address`.
    pub fn new(name: impl Into<String>, address: u32) -> Self {
        Self {
            name: name.into(),
            address,
            blocks: Vec::new(),
            instrs: Vec::new(),
            values: Vec::new(),
            uses: Vec::new(),
            free_uses: Vec::new(),
            labels: Vec::new(),
            symbols: Vec::new(),
            next_instr_ordinal: 0,
            next_value_ordinal: 0,
        }
    }

    // ---- arena accessors ---------------------------------------------------

    /// Borrow an instruction node.
    #[inline]
    pub fn instr(&self, id: InstrId) -> &Instr {
        &self.instrs[id.index()]
    }

    /// Borrow a value.
    #[inline]
    pub fn value(&self, id: ValueId) -> &Value {
        &self.values[id.index()]
    }

    /// Borrow a use record. Panics if the record was already released —
    /// holding a `UseId` across a rebind is a caller defect.
    #[inline]
    pub fn use_record(&self, id: UseId) -> &Use {
        self.uses[id.index()].as_ref().unwrap_or_else(|| {
            panic!("use record u{} was already released", id.0);
        })
    }

    /// Borrow a block.
    #[inline]
    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    /// Borrow a label.
    #[inline]
    pub fn label(&self, id: LabelId) -> &Label {
        &self.labels[id.index()]
    }

    /// Borrow a symbol.
    #[inline]
    pub fn symbol(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id.index()]
    }

    /// Blocks in creation order.
    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> {
        (0..self.blocks.len() as u32).map(BlockId)
    }

    /// Instructions of `block` in list order.
    pub fn block_instrs(&self, block: BlockId) -> BlockInstrs<'_> {
        BlockInstrs { func: self, cursor: self.blocks[block.index()].head }
    }

    // ---- entity construction ----------------------------------------------

    /// Append a new empty block.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new());
        id
    }

    /// Create an unbound label.
    pub fn new_label(&mut self, name: Option<String>) -> LabelId {
        let id = LabelId(self.labels.len() as u32);
        self.labels.push(Label { name, block: None });
        id
    }

    /// Bind `label` to `block`. Rebinding is allowed (frontends lay blocks out
    /// incrementally).
    pub fn bind_label(&mut self, label: LabelId, block: BlockId) {
        self.labels[label.index()].block = Some(block);
    }

    /// Register an external call target.
    pub fn new_symbol(&mut self, name: impl Into<String>, address: u32) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol { name: name.into(), address });
        id
    }

    /// Create a fresh value of type `ty` with no definition and no uses.
    pub fn new_value(&mut self, ty: ValueType) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        let ordinal = self.next_value_ordinal;
        self.next_value_ordinal += 1;
        self.values.push(Value::new(ty, ordinal));
        id
    }

    /// Create a value carrying a compile-time constant payload.
    pub fn new_constant(&mut self, constant: ConstantValue) -> ValueId {
        let id = self.new_value(constant.ty());
        self.values[id.index()].constant = Some(constant);
        id
    }

    /// Create an instruction and append it to the end of `block`.
    pub fn append_instr(&mut self, block: BlockId, opcode: Opcode, flags: u16) -> InstrId {
        let id = self.alloc_instr(block, opcode, flags);
        let prev = self.blocks[block.index()].tail;
        self.instrs[id.index()].prev = prev;
        match prev {
            Some(p) => self.instrs[p.index()].next = Some(id),
            None => self.blocks[block.index()].head = Some(id),
        }
        self.blocks[block.index()].tail = Some(id);
        id
    }

    /// Create an instruction immediately before `other`, in `other`'s block.
    pub fn insert_instr_before(&mut self, other: InstrId, opcode: Opcode, flags: u16) -> InstrId {
        let block = self.instrs[other.index()].block;
        let id = self.alloc_instr(block, opcode, flags);
        self.link_before(id, other);
        id
    }

    fn alloc_instr(&mut self, block: BlockId, opcode: Opcode, flags: u16) -> InstrId {
        let id = InstrId(self.instrs.len() as u32);
        let ordinal = self.next_instr_ordinal;
        self.next_instr_ordinal += 1;
        self.instrs.push(Instr::new(block, opcode, flags, ordinal));
        id
    }

    // ---- use-list management ----------------------------------------------

    /// Register a new (value, slot) edge. O(1).
    fn add_use(&mut self, value: ValueId, instr: InstrId, slot: u8) -> UseId {
        let list_pos = self.values[value.index()].uses.len() as u32;
        let record = Use { value, instr, slot, list_pos };
        let id = match self.free_uses.pop() {
            Some(id) => {
                self.uses[id.index()] = Some(record);
                id
            }
            None => {
                let id = UseId(self.uses.len() as u32);
                self.uses.push(Some(record));
                id
            }
        };
        self.values[value.index()].uses.push(id);
        id
    }

    /// Unregister an edge given its handle. O(1) via the stored list position;
    /// the displaced tail entry (if any) gets its position fixed up. The
    /// caller clears the owning slot's use handle as part of the same logical
    /// operation.
    fn remove_use(&mut self, id: UseId) {
        let record = match self.uses[id.index()].take() {
            Some(r) => r,
            None => {
                debug_assert!(false, "use u{} released twice", id.0);
                return;
            }
        };
        let list = &mut self.values[record.value.index()].uses;
        let pos = record.list_pos as usize;
        debug_assert_eq!(list.get(pos), Some(&id), "use-list back-link out of sync");
        list.swap_remove(pos);
        if pos < list.len() {
            let moved = list[pos];
            if let Some(m) = self.uses[moved.index()].as_mut() {
                m.list_pos = pos as u32;
            }
        }
        self.free_uses.push(id);
    }

    // ---- operand binding ---------------------------------------------------

    /// Bind value operand slot `slot` of `instr`, releasing any edge the slot
    /// previously held. Release-old, store-new and register-new happen as one
    /// logical step; there is no window where the use-list and the slot
    /// disagree. Passing `None` clears the slot.
    ///
    /// # Errors
    /// `SlotNotValueTyped` if the opcode signature does not mark `slot` as
    /// Value-typed; `InvalidSlot` for slot indices outside 0..3.
    pub fn set_src(
        &mut self,
        instr: InstrId,
        slot: usize,
        value: Option<ValueId>,
    ) -> Result<(), HirError> {
        if slot >= 3 {
            return Err(HirError::InvalidSlot { slot });
        }
        let opcode = self.instrs[instr.index()].opcode;
        if opcode.info().signature.srcs[slot] != SigType::Value {
            return Err(HirError::SlotNotValueTyped { opcode, slot });
        }
        if let Some(old) = self.instrs[instr.index()].src_uses[slot].take() {
            self.remove_use(old);
        }
        match value {
            Some(v) => {
                let use_id = self.add_use(v, instr, slot as u8);
                let node = &mut self.instrs[instr.index()];
                node.srcs[slot] = Operand::Value(v);
                node.src_uses[slot] = Some(use_id);
            }
            None => {
                let node = &mut self.instrs[instr.index()];
                node.srcs[slot] = Operand::None;
                node.src_uses[slot] = None;
            }
        }
        Ok(())
    }

    /// Bind slot 0. See [`Self::set_src`].
    pub fn set_src1(&mut self, instr: InstrId, value: Option<ValueId>) -> Result<(), HirError> {
        self.set_src(instr, 0, value)
    }

    /// Bind slot 1. See [`Self::set_src`].
    pub fn set_src2(&mut self, instr: InstrId, value: Option<ValueId>) -> Result<(), HirError> {
        self.set_src(instr, 1, value)
    }

    /// Bind slot 2. See [`Self::set_src`].
    pub fn set_src3(&mut self, instr: InstrId, value: Option<ValueId>) -> Result<(), HirError> {
        self.set_src(instr, 2, value)
    }

    /// Bind a label operand.
    pub fn set_label_operand(
        &mut self,
        instr: InstrId,
        slot: usize,
        label: LabelId,
    ) -> Result<(), HirError> {
        self.set_non_value_operand(instr, slot, SigType::Label, Operand::Label(label))
    }

    /// Bind a symbol operand.
    pub fn set_symbol_operand(
        &mut self,
        instr: InstrId,
        slot: usize,
        symbol: SymbolId,
    ) -> Result<(), HirError> {
        self.set_non_value_operand(instr, slot, SigType::Symbol, Operand::Symbol(symbol))
    }

    /// Bind a raw immediate offset operand.
    pub fn set_offset_operand(
        &mut self,
        instr: InstrId,
        slot: usize,
        offset: u64,
    ) -> Result<(), HirError> {
        self.set_non_value_operand(instr, slot, SigType::Offset, Operand::Offset(offset))
    }

    fn set_non_value_operand(
        &mut self,
        instr: InstrId,
        slot: usize,
        expected: SigType,
        operand: Operand,
    ) -> Result<(), HirError> {
        if slot >= 3 {
            return Err(HirError::InvalidSlot { slot });
        }
        let opcode = self.instrs[instr.index()].opcode;
        let found = opcode.info().signature.srcs[slot];
        if found != expected {
            return Err(HirError::OperandKindMismatch { opcode, slot, expected, found });
        }
        debug_assert!(self.instrs[instr.index()].src_uses[slot].is_none());
        self.instrs[instr.index()].srcs[slot] = operand;
        Ok(())
    }

    /// Bind or clear the destination. Follows the same release-then-bind
    /// discipline as `set_src` and additionally maintains the value's `def`
    /// back-reference.
    ///
    /// # Errors
    /// `NoDestSlot` if the signature has no destination and `value` is `Some`.
    pub fn set_dest(&mut self, instr: InstrId, value: Option<ValueId>) -> Result<(), HirError> {
        let opcode = self.instrs[instr.index()].opcode;
        if value.is_some() && opcode.info().signature.dest != SigType::Value {
            return Err(HirError::NoDestSlot { opcode });
        }
        if let Some(old) = self.instrs[instr.index()].dest.take() {
            if self.values[old.index()].def == Some(instr) {
                self.values[old.index()].def = None;
            }
        }
        if let Some(v) = value {
            self.instrs[instr.index()].dest = Some(v);
            self.values[v.index()].def = Some(instr);
        }
        Ok(())
    }

    // ---- list structural operations ---------------------------------------

    /// Unlink `instr` from its current position and relink it immediately
    /// before `other`, in `other`'s block. Operands, uses and the ordinal are
    /// untouched.
    ///
    /// Known limitation: ordinals are deliberately not renumbered, so
    /// ordinal-based "comes before" comparisons are invalidated until the
    /// caller runs [`Self::renumber_ordinals`].
    pub fn move_before(&mut self, instr: InstrId, other: InstrId) {
        if instr == other {
            return;
        }
        self.unlink(instr);
        self.link_before(instr, other);
    }

    /// Swap `instr`'s identity to a different operation, in place. Operand
    /// slots are reconciled against the new signature: any slot whose kind tag
    /// changes is cleared (releasing its use edge if it held a value), and the
    /// destination is released if the new opcode has none. Newly Value-typed
    /// slots are left unbound for the caller to fill via `set_src` — this
    /// never synthesizes operands and never allocates.
    pub fn replace_opcode(&mut self, instr: InstrId, new_opcode: Opcode, new_flags: u16) {
        let old_sig = self.instrs[instr.index()].opcode.info().signature;
        let new_sig = new_opcode.info().signature;
        for slot in 0..3 {
            if old_sig.srcs[slot] != new_sig.srcs[slot] {
                if let Some(use_id) = self.instrs[instr.index()].src_uses[slot].take() {
                    self.remove_use(use_id);
                }
                self.instrs[instr.index()].srcs[slot] = Operand::None;
            }
        }
        if old_sig.dest != new_sig.dest {
            if let Some(old) = self.instrs[instr.index()].dest.take() {
                if self.values[old.index()].def == Some(instr) {
                    self.values[old.index()].def = None;
                }
            }
        }
        log::trace!(
            "replace i{}: {:?} -> {:?}",
            instr.0,
            self.instrs[instr.index()].opcode,
            new_opcode
        );
        let node = &mut self.instrs[instr.index()];
        node.opcode = new_opcode;
        node.flags = new_flags;
    }

    /// Remove `instr` from the graph: release every value-typed source edge,
    /// clear the destination value's `def` back-reference if it points here,
    /// and unlink from the block list. The node itself stays in the arena with
    /// its operands readable, so a stale `InstrId` is inspectable rather than
    /// undefined behavior.
    pub fn remove_instr(&mut self, instr: InstrId) {
        for slot in 0..3 {
            if let Some(use_id) = self.instrs[instr.index()].src_uses[slot].take() {
                self.remove_use(use_id);
            }
        }
        if let Some(dest) = self.instrs[instr.index()].dest {
            if self.values[dest.index()].def == Some(instr) {
                self.values[dest.index()].def = None;
            }
        }
        self.unlink(instr);
        log::trace!("removed i{} ({:?})", instr.0, self.instrs[instr.index()].opcode);
    }

    /// Reassign instruction ordinals in block order, restoring ordinal-based
    /// ordering after list surgery.
    pub fn renumber_ordinals(&mut self) {
        let mut next = 0u32;
        for block in 0..self.blocks.len() {
            let mut cursor = self.blocks[block].head;
            while let Some(id) = cursor {
                self.instrs[id.index()].ordinal = next;
                next += 1;
                cursor = self.instrs[id.index()].next;
            }
        }
        self.next_instr_ordinal = next;
        log::debug!("renumbered {} instruction ordinals in {}", next, self.name);
    }

    fn unlink(&mut self, instr: InstrId) {
        let node = &self.instrs[instr.index()];
        let (block, prev, next) = (node.block, node.prev, node.next);
        match prev {
            Some(p) => self.instrs[p.index()].next = next,
            None => {
                if self.blocks[block.index()].head == Some(instr) {
                    self.blocks[block.index()].head = next;
                }
            }
        }
        match next {
            Some(n) => self.instrs[n.index()].prev = prev,
            None => {
                if self.blocks[block.index()].tail == Some(instr) {
                    self.blocks[block.index()].tail = prev;
                }
            }
        }
        let node = &mut self.instrs[instr.index()];
        node.prev = None;
        node.next = None;
    }

    fn link_before(&mut self, instr: InstrId, other: InstrId) {
        let block = self.instrs[other.index()].block;
        let prev = self.instrs[other.index()].prev;
        {
            let node = &mut self.instrs[instr.index()];
            node.block = block;
            node.prev = prev;
            node.next = Some(other);
        }
        self.instrs[other.index()].prev = Some(instr);
        match prev {
            Some(p) => self.instrs[p.index()].next = Some(instr),
            None => self.blocks[block.index()].head = Some(instr),
        }
    }

    // ---- pattern-matching / traversal helpers ------------------------------

    /// Evaluate `pred` on the two value operands of a binary operation and
    /// order-normalize the result: `Some((matching, other))` when the
    /// predicate holds for exactly one operand, `None` when it holds for
    /// neither or for both. Exclusivity is intentional — passes only want the
    /// unambiguous case and special-case the symmetric ones themselves.
    ///
    /// Returns `None` (never panics) if the opcode is not a binary operation
    /// over two values or either slot is unbound.
    pub fn binary_value_arrange_by_predicate_exclusive<P>(
        &self,
        instr: InstrId,
        pred: P,
    ) -> Option<(ValueId, ValueId)>
    where
        P: Fn(&Value) -> bool,
    {
        let node = &self.instrs[instr.index()];
        if !node.opcode.info().signature.is_binary_value() {
            return None;
        }
        let a = node.srcs[0].as_value()?;
        let b = node.srcs[1].as_value()?;
        match (pred(&self.values[a.index()]), pred(&self.values[b.index()])) {
            (true, false) => Some((a, b)),
            (false, true) => Some((b, a)),
            _ => None,
        }
    }

    /// Arrange a binary operation as (constant, variable): the constant
    /// operand first regardless of which physical slot held it, or `None` if
    /// both or neither operand is constant.
    pub fn binary_value_arrange_as_const_and_var(
        &self,
        instr: InstrId,
    ) -> Option<(ValueId, ValueId)> {
        self.binary_value_arrange_by_predicate_exclusive(instr, |v| v.is_constant())
    }

    /// Arrange a binary operation so the operand defined by an instruction
    /// with opcode `op` comes first, or `None` if neither or both qualify.
    pub fn binary_value_arrange_by_defining_opcode(
        &self,
        instr: InstrId,
        op: Opcode,
    ) -> Option<(ValueId, ValueId)> {
        self.binary_value_arrange_by_predicate_exclusive(instr, |v| {
            v.def.is_some_and(|d| self.instrs[d.index()].opcode == op)
        })
    }

    /// Like [`Self::binary_value_arrange_by_defining_opcode`], additionally
    /// requiring the other operand to be constant. Returns `(defined-by-op,
    /// constant)` or `None`. This is the shape peephole rules want for
    /// "combine a chain of ops with a trailing constant".
    pub fn binary_value_arrange_by_def_op_and_constant(
        &self,
        instr: InstrId,
        op: Opcode,
    ) -> Option<(ValueId, ValueId)> {
        let (matched, other) = self.binary_value_arrange_by_defining_opcode(instr, op)?;
        if !self.values[other.index()].is_constant() {
            return None;
        }
        Some((matched, other))
    }

    /// Walk backward from `instr` through the chain of pure assignments until
    /// reaching a non-assign definer. Returns `instr` itself if it is not an
    /// assign, `None` if the chain dead-ends in a value with no definition.
    ///
    /// Hops are bounded by the arena size, so a malformed cyclic chain
    /// produces `None` instead of an infinite loop.
    pub fn dest_def_skip_assigns(&self, instr: InstrId) -> Option<InstrId> {
        let mut current = instr;
        let mut hops = 0usize;
        while self.instrs[current.index()].opcode.is_pure_assign() {
            if hops >= self.instrs.len() {
                log::warn!("assign chain exceeded {} hops in {}; cyclic graph?", hops, self.name);
                return None;
            }
            hops += 1;
            let src = self.instrs[current.index()].srcs[0].as_value()?;
            current = self.values[src.index()].def?;
        }
        Some(current)
    }

    /// Generalized tunneling: walk backward from `instr` through every
    /// "transparent" instruction whose category is enabled in `tunnel_flags`
    /// (a mask of the `TUNNEL_*` constants). On return, `tunnel_flags` holds
    /// the categories actually traversed, so the caller can tell whether the
    /// tunneling crossed a width or sign change and adjust its transform.
    ///
    /// AND instructions are only transparent when one operand is a constant
    /// all-ones 32-bit mask; the walk continues through the other operand.
    /// Bounded by the arena size; a cyclic chain yields `None`.
    pub fn dest_def_tunnel_movs(
        &self,
        instr: InstrId,
        tunnel_flags: &mut u32,
    ) -> Option<InstrId> {
        let allowed = *tunnel_flags;
        let mut traversed = 0u32;
        let mut current = instr;
        let mut hops = 0usize;
        loop {
            if hops > self.instrs.len() {
                *tunnel_flags = traversed;
                log::warn!("mov tunnel exceeded {} hops in {}; cyclic graph?", hops, self.name);
                return None;
            }
            hops += 1;
            let opcode = self.instrs[current.index()].opcode;
            let category = match opcode {
                Opcode::Assign => TUNNEL_ASSIGNS,
                Opcode::ZeroExtend => TUNNEL_ZERO_EXTEND,
                Opcode::SignExtend => TUNNEL_SIGN_EXTEND,
                Opcode::Truncate => TUNNEL_TRUNCATE,
                Opcode::And => TUNNEL_AND_MASK,
                _ => 0,
            };
            if category == 0 || allowed & category == 0 {
                break;
            }
            let through = if opcode == Opcode::And {
                match self.binary_value_arrange_as_const_and_var(current) {
                    Some((mask, var))
                        if self.values[mask.index()]
                            .constant
                            .is_some_and(|c| c.is_mask32()) =>
                    {
                        var
                    }
                    _ => break,
                }
            } else {
                match self.instrs[current.index()].srcs[0].as_value() {
                    Some(v) => v,
                    None => break,
                }
            };
            match self.values[through.index()].def {
                Some(def) => {
                    traversed |= category;
                    current = def;
                }
                None => {
                    *tunnel_flags = traversed;
                    return None;
                }
            }
        }
        *tunnel_flags = traversed;
        Some(current)
    }

    /// Invoke `callback(value, slot)` for exactly the operand slots the
    /// signature marks Value-typed, in slot order. Label/symbol/offset slots
    /// are skipped. An unbound Value-typed slot is a contract violation
    /// (asserted in debug builds, skipped in release).
    pub fn visit_value_operands<F>(&self, instr: InstrId, mut callback: F)
    where
        F: FnMut(ValueId, usize),
    {
        let node = &self.instrs[instr.index()];
        let sig = node.opcode.info().signature;
        for slot in 0..3 {
            if sig.srcs[slot] != SigType::Value {
                continue;
            }
            match node.srcs[slot] {
                Operand::Value(v) => callback(v, slot),
                other => {
                    debug_assert!(
                        false,
                        "value-typed slot {} of {:?} holds {:?}",
                        slot, node.opcode, other
                    );
                }
            }
        }
    }
}

/// Iterator over a block's instruction list, front to back.
pub struct BlockInstrs<'a> {
    func: &'a HirFunction,
    cursor: Option<InstrId>,
}

impl<'a> Iterator for BlockInstrs<'a> {
    type Item = InstrId;

    fn next(&mut self) -> Option<InstrId> {
        let id = self.cursor?;
        self.cursor = self.func.instrs[id.index()].next;
        Some(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::verify::verify;
    use crate::hir::opcode::TUNNEL_AND_MASK;

    fn int32(f: &mut HirFunction) -> ValueId {
        f.new_value(ValueType::Int32)
    }

    /// Build `dest = assign(src)` appended to `block`.
    fn emit_assign(f: &mut HirFunction, block: BlockId, src: ValueId) -> (InstrId, ValueId) {
        let i = f.append_instr(block, Opcode::Assign, 0);
        let d = int32(f);
        f.set_dest(i, Some(d)).unwrap();
        f.set_src1(i, Some(src)).unwrap();
        (i, d)
    }

    fn emit_const(f: &mut HirFunction, block: BlockId, v: i32) -> (InstrId, ValueId) {
        let i = f.append_instr(block, Opcode::LoadConstant, 0);
        let d = f.new_constant(ConstantValue::Int32(v));
        f.set_dest(i, Some(d)).unwrap();
        (i, d)
    }

    fn emit_add(f: &mut HirFunction, block: BlockId, a: ValueId, b: ValueId) -> (InstrId, ValueId) {
        let i = f.append_instr(block, Opcode::Add, 0);
        let d = int32(f);
        f.set_dest(i, Some(d)).unwrap();
        f.set_src1(i, Some(a)).unwrap();
        f.set_src2(i, Some(b)).unwrap();
        (i, d)
    }

    #[test]
    fn test_rebinding_is_idempotent() {
        let mut f = HirFunction::new("t", 0);
        let b = f.new_block();
        let v = int32(&mut f);
        let w = int32(&mut f);
        let (add, _) = emit_add(&mut f, b, v, w);

        // Same value twice in a row: exactly one use, no duplicate, no leak.
        f.set_src1(add, Some(v)).unwrap();
        assert_eq!(f.value(v).use_count(), 1);
        let record = f.use_record(f.instrs[add.index()].src_uses[0].unwrap());
        assert_eq!((record.value, record.instr, record.slot), (v, add, 0));

        // Rebinding to a different value moves the edge.
        let u = int32(&mut f);
        f.set_src1(add, Some(u)).unwrap();
        assert_eq!(f.value(v).use_count(), 0);
        assert_eq!(f.value(u).use_count(), 1);

        // Clearing releases the edge.
        f.set_src1(add, None).unwrap();
        assert_eq!(f.value(u).use_count(), 0);
        assert_eq!(f.instr(add).src1(), Operand::None);
        verify(&f).unwrap();
    }

    #[test]
    fn test_binding_contract_violations() {
        let mut f = HirFunction::new("t", 0);
        let b = f.new_block();
        let v = int32(&mut f);

        let branch = f.append_instr(b, Opcode::Branch, 0);
        assert_eq!(
            f.set_src1(branch, Some(v)),
            Err(HirError::SlotNotValueTyped { opcode: Opcode::Branch, slot: 0 })
        );

        let store = f.append_instr(b, Opcode::Store, 0);
        assert_eq!(f.set_dest(store, Some(v)), Err(HirError::NoDestSlot { opcode: Opcode::Store }));
        assert_eq!(f.set_src(store, 5, Some(v)), Err(HirError::InvalidSlot { slot: 5 }));

        // Offset where the signature wants a value.
        assert_eq!(
            f.set_offset_operand(store, 0, 0x10),
            Err(HirError::OperandKindMismatch {
                opcode: Opcode::Store,
                slot: 0,
                expected: SigType::Offset,
                found: SigType::Value,
            })
        );
    }

    #[test]
    fn test_replace_releases_slots_the_new_signature_drops() {
        let mut f = HirFunction::new("t", 0);
        let b = f.new_block();
        let x = int32(&mut f);
        let y = int32(&mut f);
        let (add, dest) = emit_add(&mut f, b, x, y);

        // add(V, V) -> load_context(Offset): both value slots change kind.
        f.replace_opcode(add, Opcode::LoadContext, 0);
        assert_eq!(f.value(x).use_count(), 0);
        assert_eq!(f.value(y).use_count(), 0);
        assert_eq!(f.instr(add).src1(), Operand::None);
        assert_eq!(f.instr(add).src2(), Operand::None);
        assert!(f.instrs[add.index()].src_uses.iter().all(|u| u.is_none()));
        // Both opcodes define a value: the dest survives the swap.
        assert_eq!(f.instr(add).dest(), Some(dest));
        assert_eq!(f.value(dest).def, Some(add));

        f.set_offset_operand(add, 0, 0x18).unwrap();
        verify(&f).unwrap();
    }

    #[test]
    fn test_replace_keeps_slots_with_matching_kind() {
        let mut f = HirFunction::new("t", 0);
        let b = f.new_block();
        let x = int32(&mut f);
        let y = int32(&mut f);
        let (add, _) = emit_add(&mut f, b, x, y);

        // add -> sub: identical signature, operands untouched.
        f.replace_opcode(add, Opcode::Sub, 0);
        assert_eq!(f.instr(add).opcode(), Opcode::Sub);
        assert_eq!(f.instr(add).src1(), Operand::Value(x));
        assert_eq!(f.value(x).use_count(), 1);
        verify(&f).unwrap();
    }

    #[test]
    fn test_replace_drops_dest_when_new_opcode_has_none() {
        let mut f = HirFunction::new("t", 0);
        let b = f.new_block();
        let x = int32(&mut f);
        let (assign, dest) = emit_assign(&mut f, b, x);

        // assign(V)->V becomes call_indirect(V): value slot kept, dest dropped.
        f.replace_opcode(assign, Opcode::CallIndirect, 0);
        assert_eq!(f.instr(assign).dest(), None);
        assert_eq!(f.value(dest).def, None);
        assert_eq!(f.instr(assign).src1(), Operand::Value(x));
        verify(&f).unwrap();
    }

    #[test]
    fn test_remove_unbinds_everything() {
        let mut f = HirFunction::new("t", 0);
        let b = f.new_block();
        let (_, c) = emit_const(&mut f, b, 3);
        let (assign, av) = emit_assign(&mut f, b, c);
        let (add, _) = emit_add(&mut f, b, av, c);

        f.remove_instr(assign);
        // No use record anywhere references the removed instruction.
        for entry in f.uses.iter().flatten() {
            assert_ne!(entry.instr, assign);
        }
        assert_eq!(f.value(av).def, None);
        assert_eq!(f.value(c).use_count(), 1); // only the add remains
        // List relinked around it: const -> add.
        let order: Vec<_> = f.block_instrs(b).collect();
        assert_eq!(order.len(), 2);
        assert_eq!(order[1], add);
        verify(&f).unwrap();
    }

    #[test]
    fn test_move_before_preserves_ordinals_until_renumbered() {
        let mut f = HirFunction::new("t", 0);
        let b = f.new_block();
        let (c1, v1) = emit_const(&mut f, b, 1);
        let (_, v2) = emit_const(&mut f, b, 2);
        let (add, _) = emit_add(&mut f, b, v1, v2);

        let ordinal_before = f.instr(add).ordinal();
        f.move_before(add, c1);
        // Known limitation: the ordinal is stale after a move.
        assert_eq!(f.instr(add).ordinal(), ordinal_before);
        let order: Vec<_> = f.block_instrs(b).collect();
        assert_eq!(order[0], add);
        verify(&f).unwrap();

        f.renumber_ordinals();
        let ordinals: Vec<_> = f.block_instrs(b).map(|i| f.instr(i).ordinal()).collect();
        assert_eq!(ordinals, vec![0, 1, 2]);
    }

    #[test]
    fn test_move_before_across_blocks() {
        let mut f = HirFunction::new("t", 0);
        let b0 = f.new_block();
        let b1 = f.new_block();
        let (c, _) = emit_const(&mut f, b0, 1);
        let ret = f.append_instr(b1, Opcode::Return, 0);

        f.move_before(c, ret);
        assert!(f.block(b0).is_empty());
        assert_eq!(f.instr(c).block(), b1);
        let order: Vec<_> = f.block_instrs(b1).collect();
        assert_eq!(order, vec![c, ret]);
        verify(&f).unwrap();
    }

    #[test]
    fn test_skip_assigns_walks_to_the_real_definer() {
        let mut f = HirFunction::new("t", 0);
        let b = f.new_block();
        let (cdef, c) = emit_const(&mut f, b, 5);
        let (_, a1) = emit_assign(&mut f, b, c);
        let (_, a2) = emit_assign(&mut f, b, a1);
        let (a3_instr, _) = emit_assign(&mut f, b, a2);

        assert_eq!(f.dest_def_skip_assigns(a3_instr), Some(cdef));
        // A non-assign is its own terminal.
        assert_eq!(f.dest_def_skip_assigns(cdef), Some(cdef));
    }

    #[test]
    fn test_skip_assigns_dead_ends_on_undefined_input() {
        let mut f = HirFunction::new("t", 0);
        let b = f.new_block();
        let arg = int32(&mut f); // no def: function input
        let (assign, _) = emit_assign(&mut f, b, arg);
        assert_eq!(f.dest_def_skip_assigns(assign), None);
    }

    #[test]
    fn test_skip_assigns_bounded_on_cyclic_chain() {
        let mut f = HirFunction::new("t", 0);
        let b = f.new_block();
        let va = int32(&mut f);
        let vb = int32(&mut f);
        let ia = f.append_instr(b, Opcode::Assign, 0);
        f.set_dest(ia, Some(va)).unwrap();
        let ib = f.append_instr(b, Opcode::Assign, 0);
        f.set_dest(ib, Some(vb)).unwrap();
        // Deliberately malformed: each assign consumes the other's dest.
        f.set_src1(ia, Some(vb)).unwrap();
        f.set_src1(ib, Some(va)).unwrap();

        assert_eq!(f.dest_def_skip_assigns(ia), None);
        let mut flags = TUNNEL_ASSIGNS;
        assert_eq!(f.dest_def_tunnel_movs(ia, &mut flags), None);
    }

    #[test]
    fn test_tunnel_movs_respects_category_mask() {
        let mut f = HirFunction::new("t", 0);
        let b = f.new_block();
        let (cdef, c) = emit_const(&mut f, b, 5);
        let (_, assigned) = emit_assign(&mut f, b, c);
        let zext = f.append_instr(b, Opcode::ZeroExtend, 0);
        let widened = f.new_value(ValueType::Int64);
        f.set_dest(zext, Some(widened)).unwrap();
        f.set_src1(zext, Some(assigned)).unwrap();

        // Both categories enabled: tunnels zext -> assign -> const definer.
        let mut flags = TUNNEL_ASSIGNS | TUNNEL_ZERO_EXTEND;
        assert_eq!(f.dest_def_tunnel_movs(zext, &mut flags), Some(cdef));
        assert_eq!(flags, TUNNEL_ASSIGNS | TUNNEL_ZERO_EXTEND);

        // Without the zero-extend category the walk cannot leave the start.
        let mut flags = TUNNEL_ASSIGNS;
        assert_eq!(f.dest_def_tunnel_movs(zext, &mut flags), Some(zext));
        assert_eq!(flags, 0);
    }

    #[test]
    fn test_tunnel_movs_through_and_mask32_only() {
        let mut f = HirFunction::new("t", 0);
        let b = f.new_block();
        // Non-constant source: a guest context load.
        let lc = f.append_instr(b, Opcode::LoadContext, 0);
        let x = f.new_value(ValueType::Int64);
        f.set_dest(lc, Some(x)).unwrap();
        f.set_offset_operand(lc, 0, 0x18).unwrap();

        let mask = f.new_constant(ConstantValue::Int64(0xFFFF_FFFF));
        let and = f.append_instr(b, Opcode::And, 0);
        let masked = f.new_value(ValueType::Int64);
        f.set_dest(and, Some(masked)).unwrap();
        f.set_src1(and, Some(mask)).unwrap();
        f.set_src2(and, Some(x)).unwrap();

        let mut flags = TUNNEL_AND_MASK;
        assert_eq!(f.dest_def_tunnel_movs(and, &mut flags), Some(lc));
        assert_eq!(flags, TUNNEL_AND_MASK);

        // A non-mask constant is not transparent.
        let other = f.new_constant(ConstantValue::Int64(0xFF));
        f.set_src1(and, Some(other)).unwrap();
        let mut flags = TUNNEL_AND_MASK;
        assert_eq!(f.dest_def_tunnel_movs(and, &mut flags), Some(and));
        assert_eq!(flags, 0);
    }

    #[test]
    fn test_visit_value_operands_skips_non_value_slots() {
        let mut f = HirFunction::new("t", 0);
        let b = f.new_block();
        let v = int32(&mut f);
        let label = f.new_label(None);
        f.bind_label(label, b);
        let bt = f.append_instr(b, Opcode::BranchTrue, 0);
        f.set_src1(bt, Some(v)).unwrap();
        f.set_label_operand(bt, 1, label).unwrap();

        let mut visited = Vec::new();
        f.visit_value_operands(bt, |value, slot| visited.push((value, slot)));
        assert_eq!(visited, vec![(v, 0)]);
    }
}

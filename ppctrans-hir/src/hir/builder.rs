//! HIR Builder - Emission API for the Lowering Frontend
//!
//! The frontend that lowers decoded guest PowerPC instructions into HIR goes
//! through this builder: one emit method per opcode shape, each creating the
//! destination value, appending the instruction to the current block and
//! binding operands through the signature-checked operations on
//! [`HirFunction`]. Passes that splice instructions mid-list use
//! `HirFunction::insert_instr_before` directly; the builder only appends.
//!
//! # Conversion Strategy
//! - Result types follow the first operand unless the operation dictates
//!   otherwise (compares produce `Int8` 0/1, extends take an explicit type)
//! - Unsigned variants are the same opcode with `ARITHMETIC_UNSIGNED` set

use crate::error::HirError;
use crate::hir::block::{BlockId, LabelId, SymbolId};
use crate::hir::function::HirFunction;
use crate::hir::instr::InstrId;
use crate::hir::opcode::{Opcode, ARITHMETIC_UNSIGNED};
use crate::hir::value::{ConstantValue, ValueId, ValueType};

/// Builder over a [`HirFunction`] with a current-block append cursor.
pub struct HirBuilder {
    func: HirFunction,
    current: BlockId,
}

impl HirBuilder {
    /// Start building the guest function at `address`; creates the entry block.
    pub fn new(name: impl Into<String>, address: u32) -> Self {
        let mut func = HirFunction::new(name, address);
        let current = func.new_block();
        Self { func, current }
    }

    /// Finish building and hand the graph to the optimizer.
    pub fn finish(self) -> HirFunction {
        log::debug!(
            "built HIR for {}: {} blocks, {} instrs, {} values",
            self.func.name,
            self.func.blocks.len(),
            self.func.instrs.len(),
            self.func.values.len()
        );
        self.func
    }

    /// Borrow the graph under construction.
    pub fn function(&self) -> &HirFunction {
        &self.func
    }

    /// Mutably borrow the graph under construction (for mid-list surgery the
    /// emit API does not cover).
    pub fn function_mut(&mut self) -> &mut HirFunction {
        &mut self.func
    }

    /// The block new instructions are appended to.
    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Open a new block and make it current.
    pub fn new_block(&mut self) -> BlockId {
        let block = self.func.new_block();
        self.current = block;
        block
    }

    /// Redirect appends to an existing block.
    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    /// Create a label, unbound until [`Self::bind_label`].
    pub fn new_label(&mut self, name: Option<String>) -> LabelId {
        self.func.new_label(name)
    }

    /// Bind `label` to the current block.
    pub fn bind_label(&mut self, label: LabelId) {
        let block = self.current;
        self.func.bind_label(label, block);
    }

    /// Register an external call target.
    pub fn new_symbol(&mut self, name: impl Into<String>, address: u32) -> SymbolId {
        self.func.new_symbol(name, address)
    }

    fn emit(&mut self, opcode: Opcode, flags: u16) -> InstrId {
        self.func.append_instr(self.current, opcode, flags)
    }

    fn emit_unary(&mut self, opcode: Opcode, src: ValueId, ty: ValueType) -> Result<ValueId, HirError> {
        let instr = self.emit(opcode, 0);
        let dest = self.func.new_value(ty);
        self.func.set_dest(instr, Some(dest))?;
        self.func.set_src1(instr, Some(src))?;
        Ok(dest)
    }

    fn emit_binary(
        &mut self,
        opcode: Opcode,
        flags: u16,
        a: ValueId,
        b: ValueId,
        ty: ValueType,
    ) -> Result<ValueId, HirError> {
        let instr = self.emit(opcode, flags);
        let dest = self.func.new_value(ty);
        self.func.set_dest(instr, Some(dest))?;
        self.func.set_src1(instr, Some(a))?;
        self.func.set_src2(instr, Some(b))?;
        Ok(dest)
    }

    /// Emit `nop`.
    pub fn nop(&mut self) -> InstrId {
        self.emit(Opcode::Nop, 0)
    }

    /// Materialize a constant: the destination value carries the payload.
    pub fn load_constant(&mut self, constant: ConstantValue) -> Result<ValueId, HirError> {
        let instr = self.emit(Opcode::LoadConstant, 0);
        let dest = self.func.new_constant(constant);
        self.func.set_dest(instr, Some(dest))?;
        Ok(dest)
    }

    /// Emit `dest = src` (pure assignment).
    pub fn assign(&mut self, src: ValueId) -> Result<ValueId, HirError> {
        let ty = self.func.value(src).ty;
        self.emit_unary(Opcode::Assign, src, ty)
    }

    /// Emit a zero-extension of `src` to `ty`.
    pub fn zero_extend(&mut self, src: ValueId, ty: ValueType) -> Result<ValueId, HirError> {
        self.emit_unary(Opcode::ZeroExtend, src, ty)
    }

    /// Emit a sign-extension of `src` to `ty`.
    pub fn sign_extend(&mut self, src: ValueId, ty: ValueType) -> Result<ValueId, HirError> {
        self.emit_unary(Opcode::SignExtend, src, ty)
    }

    /// Emit a truncation of `src` to `ty`.
    pub fn truncate(&mut self, src: ValueId, ty: ValueType) -> Result<ValueId, HirError> {
        self.emit_unary(Opcode::Truncate, src, ty)
    }

    /// Emit `dest = a + b`.
    pub fn add(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        let ty = self.func.value(a).ty;
        self.emit_binary(Opcode::Add, 0, a, b, ty)
    }

    /// Emit `dest = a - b`.
    pub fn sub(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        let ty = self.func.value(a).ty;
        self.emit_binary(Opcode::Sub, 0, a, b, ty)
    }

    /// Emit `dest = a * b` (signed).
    pub fn mul(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        let ty = self.func.value(a).ty;
        self.emit_binary(Opcode::Mul, 0, a, b, ty)
    }

    /// Emit `dest = a / b` (signed).
    pub fn div(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        let ty = self.func.value(a).ty;
        self.emit_binary(Opcode::Div, 0, a, b, ty)
    }

    /// Emit `dest = a / b` (unsigned).
    pub fn div_unsigned(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        let ty = self.func.value(a).ty;
        self.emit_binary(Opcode::Div, ARITHMETIC_UNSIGNED, a, b, ty)
    }

    /// Emit `dest = a & b`.
    pub fn and(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        let ty = self.func.value(a).ty;
        self.emit_binary(Opcode::And, 0, a, b, ty)
    }

    /// Emit `dest = a | b`.
    pub fn or(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        let ty = self.func.value(a).ty;
        self.emit_binary(Opcode::Or, 0, a, b, ty)
    }

    /// Emit `dest = a ^ b`.
    pub fn xor(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        let ty = self.func.value(a).ty;
        self.emit_binary(Opcode::Xor, 0, a, b, ty)
    }

    /// Emit `dest = !a`.
    pub fn not(&mut self, a: ValueId) -> Result<ValueId, HirError> {
        let ty = self.func.value(a).ty;
        self.emit_unary(Opcode::Not, a, ty)
    }

    /// Emit `dest = a << b`.
    pub fn shl(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        let ty = self.func.value(a).ty;
        self.emit_binary(Opcode::Shl, 0, a, b, ty)
    }

    /// Emit `dest = a >> b` (logical).
    pub fn shr(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        let ty = self.func.value(a).ty;
        self.emit_binary(Opcode::Shr, 0, a, b, ty)
    }

    /// Emit `dest = a >> b` (arithmetic, sign-filling).
    pub fn sar(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        let ty = self.func.value(a).ty;
        self.emit_binary(Opcode::Sar, 0, a, b, ty)
    }

    /// Emit `dest = (a == b)` as Int8 0/1.
    pub fn compare_eq(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        self.emit_binary(Opcode::CompareEq, 0, a, b, ValueType::Int8)
    }

    /// Emit `dest = (a < b)` signed, as Int8 0/1.
    pub fn compare_slt(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        self.emit_binary(Opcode::CompareSlt, 0, a, b, ValueType::Int8)
    }

    /// Emit `dest = (a < b)` unsigned, as Int8 0/1.
    pub fn compare_ult(&mut self, a: ValueId, b: ValueId) -> Result<ValueId, HirError> {
        self.emit_binary(Opcode::CompareUlt, 0, a, b, ValueType::Int8)
    }

    /// Emit a guest memory load of `ty` from the address in `addr`.
    pub fn load(&mut self, addr: ValueId, ty: ValueType) -> Result<ValueId, HirError> {
        self.emit_unary(Opcode::Load, addr, ty)
    }

    /// Emit a guest memory store of `value` to the address in `addr`.
    pub fn store(&mut self, addr: ValueId, value: ValueId) -> Result<InstrId, HirError> {
        let instr = self.emit(Opcode::Store, 0);
        self.func.set_src1(instr, Some(addr))?;
        self.func.set_src2(instr, Some(value))?;
        Ok(instr)
    }

    /// Emit a load of `ty` from the guest register context at byte `offset`.
    pub fn load_context(&mut self, offset: u64, ty: ValueType) -> Result<ValueId, HirError> {
        let instr = self.emit(Opcode::LoadContext, 0);
        let dest = self.func.new_value(ty);
        self.func.set_dest(instr, Some(dest))?;
        self.func.set_offset_operand(instr, 0, offset)?;
        Ok(dest)
    }

    /// Emit a store of `value` to the guest register context at byte `offset`.
    pub fn store_context(&mut self, offset: u64, value: ValueId) -> Result<InstrId, HirError> {
        let instr = self.emit(Opcode::StoreContext, 0);
        self.func.set_offset_operand(instr, 0, offset)?;
        self.func.set_src2(instr, Some(value))?;
        Ok(instr)
    }

    /// Emit an unconditional branch to `label`.
    pub fn branch(&mut self, label: LabelId) -> Result<InstrId, HirError> {
        let instr = self.emit(Opcode::Branch, 0);
        self.func.set_label_operand(instr, 0, label)?;
        Ok(instr)
    }

    /// Emit a branch to `label` taken when `cond` is non-zero.
    pub fn branch_true(&mut self, cond: ValueId, label: LabelId) -> Result<InstrId, HirError> {
        let instr = self.emit(Opcode::BranchTrue, 0);
        self.func.set_src1(instr, Some(cond))?;
        self.func.set_label_operand(instr, 1, label)?;
        Ok(instr)
    }

    /// Emit a branch to `label` taken when `cond` is zero.
    pub fn branch_false(&mut self, cond: ValueId, label: LabelId) -> Result<InstrId, HirError> {
        let instr = self.emit(Opcode::BranchFalse, 0);
        self.func.set_src1(instr, Some(cond))?;
        self.func.set_label_operand(instr, 1, label)?;
        Ok(instr)
    }

    /// Emit a direct call to `symbol`.
    pub fn call(&mut self, symbol: SymbolId) -> Result<InstrId, HirError> {
        let instr = self.emit(Opcode::Call, 0);
        self.func.set_symbol_operand(instr, 0, symbol)?;
        Ok(instr)
    }

    /// Emit an indirect call through the guest address in `target`.
    pub fn call_indirect(&mut self, target: ValueId) -> Result<InstrId, HirError> {
        let instr = self.emit(Opcode::CallIndirect, 0);
        self.func.set_src1(instr, Some(target))?;
        Ok(instr)
    }

    /// Emit a return.
    pub fn ret(&mut self) -> InstrId {
        self.emit(Opcode::Return, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hir::instr::Operand;

    #[test]
    fn test_builder_binds_operands_and_dest() {
        let mut b = HirBuilder::new("sub_80003100", 0x8000_3100);
        let lhs = b.load_constant(ConstantValue::Int32(1)).unwrap();
        let rhs = b.load_constant(ConstantValue::Int32(2)).unwrap();
        let sum = b.add(lhs, rhs).unwrap();
        let f = b.finish();

        let def = f.value(sum).def.expect("add defines its dest");
        assert_eq!(f.instr(def).opcode(), Opcode::Add);
        assert_eq!(f.instr(def).src1(), Operand::Value(lhs));
        assert_eq!(f.instr(def).src2(), Operand::Value(rhs));
        assert_eq!(f.value(lhs).use_count(), 1);
        assert_eq!(f.value(rhs).use_count(), 1);
    }

    #[test]
    fn test_builder_context_and_branch_shapes() {
        let mut b = HirBuilder::new("sub_80003200", 0x8000_3200);
        let r3 = b.load_context(0x18, ValueType::Int32).unwrap();
        let exit = b.new_label(Some("exit".into()));
        b.branch_true(r3, exit).unwrap();
        b.store_context(0x18, r3).unwrap();
        let exit_block = b.new_block();
        b.bind_label(exit);
        b.ret();
        let f = b.finish();

        assert_eq!(f.label(exit).block, Some(exit_block));
        // branch_true + store_context both consume r3
        assert_eq!(f.value(r3).use_count(), 2);
    }

    #[test]
    fn test_instr_ordinals_increase_in_emit_order() {
        let mut b = HirBuilder::new("sub_80003300", 0x8000_3300);
        let v = b.load_constant(ConstantValue::Int32(0)).unwrap();
        let w = b.assign(v).unwrap();
        let _ = b.assign(w).unwrap();
        let f = b.finish();
        let ids: Vec<_> = f.block_instrs(f.block_ids().next().unwrap()).collect();
        assert_eq!(ids.len(), 3);
        assert!(f.instr(ids[0]).ordinal() < f.instr(ids[1]).ordinal());
        assert!(f.instr(ids[1]).ordinal() < f.instr(ids[2]).ordinal());
    }
}

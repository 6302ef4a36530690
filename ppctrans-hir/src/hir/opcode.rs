//! HIR Opcode Table
//!
//! This module defines the machine-independent operation set of the HIR and the
//! read-only signature registry consulted on every operand binding. The table is
//! a process-wide `const` array indexed by opcode discriminant: loaded before any
//! graph is constructed, never mutated afterwards.
//!
//! # Signature Model
//! Every opcode carries a fixed arity and a per-slot kind tag (`SigType`). The
//! kind of an operand slot is fully determined by the signature, never by runtime
//! inspection of the slot's contents — callers consult the signature before
//! interpreting a slot.
//!
//! # Memory Optimizations
//! - `Opcode` and `SigType` use `#[repr(u8)]` to save 3 bytes per enum
//! - `OpcodeSignature` is 4 bytes total (one `SigType` per slot plus dest)

use serde::Serialize;

/// Per-slot operand kind tag.
///
/// # Memory Optimization
/// Uses `#[repr(u8)]` to reduce size from default enum size to 1 byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)] // Save 3 bytes per enum
pub enum SigType {
    /// Slot is unused by this opcode.
    None = 0,
    /// Slot holds a reference to a `Value` (participates in def-use tracking).
    Value = 1,
    /// Slot holds a reference to a branch target `Label`.
    Label = 2,
    /// Slot holds a reference to a call target `Symbol`.
    Symbol = 3,
    /// Slot holds a raw 64-bit immediate offset (guest context offsets).
    Offset = 4,
}

/// Operand shape descriptor for one opcode: destination kind plus three
/// source-slot kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OpcodeSignature {
    /// Destination kind (`SigType::Value` or `SigType::None`).
    pub dest: SigType,
    /// Source slot kinds, in slot order 0..3.
    pub srcs: [SigType; 3],
}

impl OpcodeSignature {
    /// True if this opcode is a binary operation over two `Value` operands
    /// (src3 unused). The destination kind is not considered.
    pub fn is_binary_value(&self) -> bool {
        self.srcs[0] == SigType::Value
            && self.srcs[1] == SigType::Value
            && self.srcs[2] == SigType::None
    }
}

const fn sig(dest: SigType, src1: SigType, src2: SigType, src3: SigType) -> OpcodeSignature {
    OpcodeSignature { dest, srcs: [src1, src2, src3] }
}

/// HIR operation set.
///
/// Machine-independent operations produced when lowering guest PowerPC
/// instructions. `LoadContext`/`StoreContext` access the guest register
/// context by byte offset; `Branch*` target labels; `Call` targets symbols.
///
/// # Memory Optimization
/// Uses `#[repr(u8)]` with explicit discriminants; the discriminant doubles as
/// the index into the opcode info table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)] // Save 3-7 bytes per enum; discriminant indexes OPCODE_TABLE
pub enum Opcode {
    /// No operation.
    Nop = 0,
    /// Materialize a compile-time constant: `dest = constant payload`.
    LoadConstant = 1,
    /// Pure assignment: `dest = src1`, unconditionally. Tunnel-able.
    Assign = 2,
    /// Zero-extend src1 to the destination type. Tunnel-able.
    ZeroExtend = 3,
    /// Sign-extend src1 to the destination type. Tunnel-able.
    SignExtend = 4,
    /// Truncate src1 to the destination type. Tunnel-able.
    Truncate = 5,
    /// Integer add: `dest = src1 + src2`.
    Add = 6,
    /// Integer subtract: `dest = src1 - src2`.
    Sub = 7,
    /// Integer multiply: `dest = src1 * src2`.
    Mul = 8,
    /// Integer divide: `dest = src1 / src2`.
    Div = 9,
    /// Bitwise AND: `dest = src1 & src2`. Tunnel-able when one operand is an
    /// all-ones 32-bit mask.
    And = 10,
    /// Bitwise OR: `dest = src1 | src2`.
    Or = 11,
    /// Bitwise XOR: `dest = src1 ^ src2`.
    Xor = 12,
    /// Bitwise NOT: `dest = !src1`.
    Not = 13,
    /// Shift left: `dest = src1 << src2`.
    Shl = 14,
    /// Logical shift right: `dest = src1 >> src2`.
    Shr = 15,
    /// Arithmetic shift right: `dest = src1 >> src2` (sign-filling).
    Sar = 16,
    /// Compare equal: `dest = (src1 == src2)` as Int8 0/1.
    CompareEq = 17,
    /// Compare signed less-than: `dest = (src1 < src2)` as Int8 0/1.
    CompareSlt = 18,
    /// Compare unsigned less-than: `dest = (src1 < src2)` as Int8 0/1.
    CompareUlt = 19,
    /// Load from guest memory: `dest = *src1`.
    Load = 20,
    /// Store to guest memory: `*src1 = src2`.
    Store = 21,
    /// Load from the guest register context: `dest = ctx[src1 offset]`.
    LoadContext = 22,
    /// Store to the guest register context: `ctx[src1 offset] = src2`.
    StoreContext = 23,
    /// Unconditional branch to label src1.
    Branch = 24,
    /// Branch to label src2 if src1 is non-zero.
    BranchTrue = 25,
    /// Branch to label src2 if src1 is zero.
    BranchFalse = 26,
    /// Call the function symbol src1.
    Call = 27,
    /// Call through a computed guest address in src1.
    CallIndirect = 28,
    /// Return from the translated function.
    Return = 29,
}

/// Number of opcodes; length of [`OPCODE_TABLE`].
pub const OPCODE_COUNT: usize = 30;

/// Read-only descriptor for one opcode: printable name plus signature.
#[derive(Debug, Clone, Copy)]
pub struct OpcodeInfo {
    /// Lowercase mnemonic used by the text dump.
    pub name: &'static str,
    /// Operand shape; consulted on every bind and traversal.
    pub signature: OpcodeSignature,
}

use SigType::{Label as L, None as N, Offset as O, Symbol as S, Value as V};

/// The process-wide opcode registry. Indexed by `Opcode` discriminant;
/// order must match the enum exactly (checked by tests).
static OPCODE_TABLE: [OpcodeInfo; OPCODE_COUNT] = [
    OpcodeInfo { name: "nop", signature: sig(N, N, N, N) },
    OpcodeInfo { name: "load_constant", signature: sig(V, N, N, N) },
    OpcodeInfo { name: "assign", signature: sig(V, V, N, N) },
    OpcodeInfo { name: "zero_extend", signature: sig(V, V, N, N) },
    OpcodeInfo { name: "sign_extend", signature: sig(V, V, N, N) },
    OpcodeInfo { name: "truncate", signature: sig(V, V, N, N) },
    OpcodeInfo { name: "add", signature: sig(V, V, V, N) },
    OpcodeInfo { name: "sub", signature: sig(V, V, V, N) },
    OpcodeInfo { name: "mul", signature: sig(V, V, V, N) },
    OpcodeInfo { name: "div", signature: sig(V, V, V, N) },
    OpcodeInfo { name: "and", signature: sig(V, V, V, N) },
    OpcodeInfo { name: "or", signature: sig(V, V, V, N) },
    OpcodeInfo { name: "xor", signature: sig(V, V, V, N) },
    OpcodeInfo { name: "not", signature: sig(V, V, N, N) },
    OpcodeInfo { name: "shl", signature: sig(V, V, V, N) },
    OpcodeInfo { name: "shr", signature: sig(V, V, V, N) },
    OpcodeInfo { name: "sar", signature: sig(V, V, V, N) },
    OpcodeInfo { name: "compare_eq", signature: sig(V, V, V, N) },
    OpcodeInfo { name: "compare_slt", signature: sig(V, V, V, N) },
    OpcodeInfo { name: "compare_ult", signature: sig(V, V, V, N) },
    OpcodeInfo { name: "load", signature: sig(V, V, N, N) },
    OpcodeInfo { name: "store", signature: sig(N, V, V, N) },
    OpcodeInfo { name: "load_context", signature: sig(V, O, N, N) },
    OpcodeInfo { name: "store_context", signature: sig(N, O, V, N) },
    OpcodeInfo { name: "branch", signature: sig(N, L, N, N) },
    OpcodeInfo { name: "branch_true", signature: sig(N, V, L, N) },
    OpcodeInfo { name: "branch_false", signature: sig(N, V, L, N) },
    OpcodeInfo { name: "call", signature: sig(N, S, N, N) },
    OpcodeInfo { name: "call_indirect", signature: sig(N, V, N, N) },
    OpcodeInfo { name: "return", signature: sig(N, N, N, N) },
];

impl Opcode {
    /// Look up this opcode's read-only descriptor.
    #[inline] // Hot path - consulted on every bind
    pub fn info(self) -> &'static OpcodeInfo {
        &OPCODE_TABLE[self as usize]
    }

    /// True for the "pure assignment" category: the destination is defined as
    /// exactly the single source operand, unconditionally.
    #[inline]
    pub fn is_pure_assign(self) -> bool {
        self == Opcode::Assign
    }
}

/// Tunnel through plain assigns.
pub const TUNNEL_ASSIGNS: u32 = 1 << 0;
/// Tunnel through zero-extensions.
pub const TUNNEL_ZERO_EXTEND: u32 = 1 << 1;
/// Tunnel through sign-extensions.
pub const TUNNEL_SIGN_EXTEND: u32 = 1 << 2;
/// Tunnel through truncations.
pub const TUNNEL_TRUNCATE: u32 = 1 << 3;
/// Tunnel through AND with an all-ones 32-bit mask (0xFFFF_FFFF).
pub const TUNNEL_AND_MASK: u32 = 1 << 4;

/// Instruction flag: treat operands as unsigned (Mul/Div/Shr).
pub const ARITHMETIC_UNSIGNED: u16 = 1 << 0;
/// Instruction flag: saturate instead of wrapping.
pub const ARITHMETIC_SATURATE: u16 = 1 << 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_order_matches_discriminants() {
        assert_eq!(Opcode::Nop.info().name, "nop");
        assert_eq!(Opcode::Assign.info().name, "assign");
        assert_eq!(Opcode::And.info().name, "and");
        assert_eq!(Opcode::StoreContext.info().name, "store_context");
        assert_eq!(Opcode::Return.info().name, "return");
    }

    #[test]
    fn test_binary_value_signatures() {
        assert!(Opcode::Add.info().signature.is_binary_value());
        assert!(Opcode::CompareUlt.info().signature.is_binary_value());
        // Unary, nullary and non-value shapes are not binary-value.
        assert!(!Opcode::Assign.info().signature.is_binary_value());
        assert!(!Opcode::Return.info().signature.is_binary_value());
        assert!(!Opcode::BranchTrue.info().signature.is_binary_value());
        assert!(!Opcode::StoreContext.info().signature.is_binary_value());
    }

    #[test]
    fn test_slot_kinds() {
        assert_eq!(Opcode::LoadContext.info().signature.srcs[0], SigType::Offset);
        assert_eq!(Opcode::Call.info().signature.srcs[0], SigType::Symbol);
        assert_eq!(Opcode::BranchTrue.info().signature.srcs[1], SigType::Label);
        assert_eq!(Opcode::Store.info().signature.dest, SigType::None);
    }
}

//! HIR Values and Def-Use Tracking
//!
//! A `Value` is a single typed definition with a set of uses: the unit of data
//! flow in the HIR. Every operand slot that references a `Value` is mirrored by
//! exactly one `Use` record in that value's use-list, maintained transactionally
//! by the binding operations in [`super::function`].
//!
//! All references between entities are `u32` arena handles, not pointers. This
//! keeps identity stable across list moves and makes the def-use invariant
//! mechanically checkable (see [`super::verify`]).
//!
//! # Memory Optimizations
//! - `ValueType` uses `#[repr(u8)]` to save 3 bytes per enum
//! - Use-lists use `SmallVec<[UseId; 4]>` (most values have few uses)

use serde::Serialize;
use smallvec::SmallVec;

use crate::hir::instr::InstrId;

/// Handle to a [`Value`] in its function's value arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ValueId(pub(crate) u32);

impl ValueId {
    /// Raw index into the value arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a [`Use`] record in its function's use arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct UseId(pub(crate) u32);

impl UseId {
    /// Raw index into the use arena.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Value type tag.
///
/// # Memory Optimization
/// Uses `#[repr(u8)]` to reduce size from default enum size to 1 byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)] // Save 3 bytes per enum
pub enum ValueType {
    /// 8-bit integer
    Int8 = 0,
    /// 16-bit integer
    Int16 = 1,
    /// 32-bit integer (the common case for 32-bit PowerPC guests)
    Int32 = 2,
    /// 64-bit integer
    Int64 = 3,
    /// 32-bit float
    Float32 = 4,
    /// 64-bit float
    Float64 = 5,
    /// 128-bit vector (paired singles / VMX style lanes)
    Vec128 = 6,
}

/// Compile-time constant payload, one variant per [`ValueType`] width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ConstantValue {
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Vec128(u128),
}

impl ConstantValue {
    /// The value type this payload materializes as.
    pub fn ty(&self) -> ValueType {
        match self {
            ConstantValue::Int8(_) => ValueType::Int8,
            ConstantValue::Int16(_) => ValueType::Int16,
            ConstantValue::Int32(_) => ValueType::Int32,
            ConstantValue::Int64(_) => ValueType::Int64,
            ConstantValue::Float32(_) => ValueType::Float32,
            ConstantValue::Float64(_) => ValueType::Float64,
            ConstantValue::Vec128(_) => ValueType::Vec128,
        }
    }

    /// True for an all-ones 32-bit mask (0xFFFF_FFFF), the AND pattern the
    /// mov-tunneling traversal is allowed to look through.
    pub fn is_mask32(&self) -> bool {
        match self {
            ConstantValue::Int32(v) => *v as u32 == u32::MAX,
            ConstantValue::Int64(v) => *v as u64 == u64::from(u32::MAX),
            _ => false,
        }
    }
}

/// One (value, operand-slot) edge: records that `instr`'s source slot `slot`
/// currently references `value`.
///
/// `list_pos` is the back-link into the value's use-list that makes removal
/// O(1): the record always sits at `values[value].uses[list_pos]`, and
/// swap-removal fixes up the displaced record's `list_pos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Use {
    /// The value being consumed.
    pub value: ValueId,
    /// The instruction consuming it.
    pub instr: InstrId,
    /// Which source slot of `instr` (0..3).
    pub slot: u8,
    /// Position of this record's id inside the value's use-list.
    pub(crate) list_pos: u32,
}

/// A single SSA-like definition.
///
/// Invariant: `uses` exactly reflects every operand slot across the whole
/// instruction list currently referencing this value. All mutation goes
/// through the binding operations on `HirFunction`; nothing here is public
/// mutable state.
///
/// A value with no `def` is a pre-existing input (constant or argument).
/// An empty use-list marks the value as dead; sweeping dead values is left
/// to an external dead-code pass.
#[derive(Debug, Clone, Serialize)]
pub struct Value {
    /// Type tag.
    pub ty: ValueType,
    /// Compile-time constant payload, if this value is a literal.
    pub constant: Option<ConstantValue>,
    /// Creation ordinal, for deterministic ordering in dumps and passes.
    pub ordinal: u32,
    /// The single instruction defining this value, or `None` for inputs.
    pub def: Option<InstrId>,
    /// Use-list: ids of every `Use` record referencing this value.
    /// Insertion order is irrelevant; multiplicity is allowed.
    #[serde(skip)]
    pub(crate) uses: SmallVec<[UseId; 4]>,
}

impl Value {
    pub(crate) fn new(ty: ValueType, ordinal: u32) -> Self {
        Self { ty, constant: None, ordinal, def: None, uses: SmallVec::new() }
    }

    /// True iff this value carries a compile-time literal payload.
    #[inline]
    pub fn is_constant(&self) -> bool {
        self.constant.is_some()
    }

    /// Number of operand slots currently referencing this value.
    #[inline]
    pub fn use_count(&self) -> usize {
        self.uses.len()
    }

    /// True if no operand slot references this value (candidate for sweeping
    /// by dead-code elimination).
    #[inline]
    pub fn is_unused(&self) -> bool {
        self.uses.is_empty()
    }

    /// Iterate over the ids of this value's use records.
    pub fn uses(&self) -> impl Iterator<Item = UseId> + '_ {
        self.uses.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_type_mapping() {
        assert_eq!(ConstantValue::Int32(7).ty(), ValueType::Int32);
        assert_eq!(ConstantValue::Float64(0.5).ty(), ValueType::Float64);
        assert_eq!(ConstantValue::Vec128(0).ty(), ValueType::Vec128);
    }

    #[test]
    fn test_mask32_detection() {
        assert!(ConstantValue::Int32(-1).is_mask32());
        assert!(ConstantValue::Int64(0xFFFF_FFFF).is_mask32());
        assert!(!ConstantValue::Int64(-1).is_mask32());
        assert!(!ConstantValue::Int32(0x7FFF_FFFF).is_mask32());
        assert!(!ConstantValue::Int8(-1).is_mask32());
    }

    #[test]
    fn test_fresh_value_is_dead_input() {
        let v = Value::new(ValueType::Int32, 0);
        assert!(!v.is_constant());
        assert!(v.is_unused());
        assert_eq!(v.def, None);
    }
}

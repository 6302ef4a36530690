//! High-level Intermediate Representation (HIR)
//!
//! The machine-independent instruction/value graph guest PowerPC code is
//! lowered into before optimization and native code generation. See the
//! crate-level docs for the layer boundaries.

pub mod block;
pub mod builder;
pub mod display;
pub mod function;
pub mod instr;
pub mod opcode;
pub mod value;
pub mod verify;

pub use block::{Block, BlockId, Label, LabelId, Symbol, SymbolId};
pub use builder::HirBuilder;
pub use function::HirFunction;
pub use instr::{Instr, InstrId, Operand};
pub use opcode::{Opcode, OpcodeInfo, OpcodeSignature, SigType};
pub use value::{ConstantValue, Use, UseId, Value, ValueId, ValueType};

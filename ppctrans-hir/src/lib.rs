//! PowerPC Dynamic Binary Translator - HIR Layer
//!
//! This crate is the intermediate-representation core of the translator: the
//! shared mutable graph every optimization pass and the native code generator
//! operate on. Guest PowerPC instructions are lowered by the frontend into HIR
//! operations over typed values; passes rewrite the graph through the
//! structural operations here; the backend consumes the finalized graph.
//!
//! # Layer Boundaries
//! - **Owned here**: the `Instr` node and operand model, `Value`/`Use` def-use
//!   tracking, list surgery (insert/remove/replace/move), the opcode signature
//!   registry, and the pattern-matching helpers passes build on.
//! - **Collaborators**: the lowering frontend (producer, via [`hir::HirBuilder`]),
//!   optimization passes and the register allocator/code emitter (consumers),
//!   and control-flow analysis over blocks.
//!
//! # Concurrency Model
//! One graph per translation job, single-writer, fully synchronous. Worker
//! threads translating different guest functions each own independent graphs,
//! so the core needs no locking.
//!
//! # Error Philosophy
//! A broken invariant here is a pass defect, not a user-facing condition:
//! binding operations fail fast with [`error::HirError`], pure queries answer
//! "no match" with `None` sentinels, and [`hir::verify`] checks the whole
//! graph between passes in tests and debug runs.

pub mod error;
pub mod hir;

pub use error::HirError;

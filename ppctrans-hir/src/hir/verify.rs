//! Graph Consistency Checker
//!
//! Walks a [`HirFunction`] and checks the structural invariants every pass
//! relies on: doubly-linked-list integrity per block, operand/signature
//! agreement, and the def-use invariant (every bound value slot is mirrored by
//! exactly one live use record, and every live use record points back at a
//! slot that owns it). There is no runtime recovery from a finding — a failure
//! here is a logic defect in whatever mutated the graph last.
//!
//! Intended for tests and for debug runs between optimization passes.

use crate::error::HirError;
use crate::hir::function::HirFunction;
use crate::hir::instr::{InstrId, Operand};
use crate::hir::opcode::SigType;

/// Check every structural invariant of `func`. Returns the first finding.
pub fn verify(func: &HirFunction) -> Result<(), HirError> {
    for (block_idx, block) in func.blocks.iter().enumerate() {
        verify_block_list(func, block_idx, block.head, block.tail)?;
    }
    for block in func.block_ids() {
        for instr in func.block_instrs(block) {
            verify_instr(func, instr)?;
        }
    }
    verify_use_arena(func)?;
    log::trace!("verified {}: {} instrs consistent", func.name, func.instrs.len());
    Ok(())
}

fn corrupt(message: String) -> HirError {
    HirError::GraphCorrupt { message }
}

fn verify_block_list(
    func: &HirFunction,
    block_idx: usize,
    head: Option<InstrId>,
    tail: Option<InstrId>,
) -> Result<(), HirError> {
    let mut prev: Option<InstrId> = None;
    let mut cursor = head;
    let mut steps = 0usize;
    while let Some(id) = cursor {
        if steps > func.instrs.len() {
            return Err(corrupt(format!("block b{block_idx} instruction list is cyclic")));
        }
        steps += 1;
        let node = &func.instrs[id.index()];
        if node.block.index() != block_idx {
            return Err(corrupt(format!(
                "i{} is linked into block b{} but its block field says b{}",
                id.0,
                block_idx,
                node.block.index()
            )));
        }
        if node.prev != prev {
            return Err(corrupt(format!("i{} has a broken prev link in b{block_idx}", id.0)));
        }
        prev = Some(id);
        cursor = node.next;
    }
    if tail != prev {
        return Err(corrupt(format!("block b{block_idx} tail does not match its list")));
    }
    Ok(())
}

fn verify_instr(func: &HirFunction, instr: InstrId) -> Result<(), HirError> {
    let node = func.instr(instr);
    let sig = node.opcode().info().signature;

    for slot in 0..3 {
        let operand = node.src(slot);
        let kind = sig.srcs[slot];
        let tag_ok = match (kind, operand) {
            (SigType::None, Operand::None) => true,
            (SigType::Value, Operand::Value(_)) | (SigType::Value, Operand::None) => true,
            (SigType::Label, Operand::Label(_)) | (SigType::Label, Operand::None) => true,
            (SigType::Symbol, Operand::Symbol(_)) | (SigType::Symbol, Operand::None) => true,
            (SigType::Offset, Operand::Offset(_)) | (SigType::Offset, Operand::None) => true,
            _ => false,
        };
        if !tag_ok {
            return Err(corrupt(format!(
                "i{} slot {}: operand {:?} disagrees with signature kind {:?}",
                instr.0, slot, operand, kind
            )));
        }
        match operand {
            Operand::Value(value) => {
                let use_id = func.instrs[instr.index()].src_uses[slot].ok_or_else(|| {
                    corrupt(format!("i{} slot {} holds a value but no use record", instr.0, slot))
                })?;
                let record = func.uses[use_id.index()].as_ref().ok_or_else(|| {
                    corrupt(format!("i{} slot {} points at a released use record", instr.0, slot))
                })?;
                if record.value != value || record.instr != instr || record.slot as usize != slot {
                    return Err(corrupt(format!(
                        "use u{} does not match its owning slot (i{} slot {})",
                        use_id.0, instr.0, slot
                    )));
                }
                let list = &func.values[value.index()].uses;
                let mut hits = list.iter().filter(|u| **u == use_id);
                if hits.next().is_none() || hits.next().is_some() {
                    return Err(corrupt(format!(
                        "use u{} appears {} times in v{}'s use-list (expected exactly once)",
                        use_id.0,
                        list.iter().filter(|u| **u == use_id).count(),
                        value.0
                    )));
                }
            }
            Operand::Label(label) => {
                if func.label(label).block.is_none() {
                    return Err(HirError::LabelUnbound { label: label.0 });
                }
            }
            _ => {
                if func.instrs[instr.index()].src_uses[slot].is_some() {
                    return Err(corrupt(format!(
                        "i{} slot {} has a use record but holds no value",
                        instr.0, slot
                    )));
                }
            }
        }
    }

    match node.dest() {
        Some(dest) => {
            if sig.dest != SigType::Value {
                return Err(corrupt(format!(
                    "i{} has a dest but {:?} takes none",
                    instr.0,
                    node.opcode()
                )));
            }
            if func.value(dest).def != Some(instr) {
                return Err(corrupt(format!(
                    "v{}'s def does not point back at its defining i{}",
                    dest.0, instr.0
                )));
            }
        }
        None => {}
    }
    Ok(())
}

/// Every live use record must be owned by the slot it names and indexed
/// correctly from its value's use-list. Catches stale records left behind by
/// a buggy rebind.
fn verify_use_arena(func: &HirFunction) -> Result<(), HirError> {
    for (idx, entry) in func.uses.iter().enumerate() {
        let Some(record) = entry else { continue };
        let list = &func.values[record.value.index()].uses;
        let pos = record.list_pos as usize;
        if list.get(pos).map(|u| u.index()) != Some(idx) {
            return Err(corrupt(format!(
                "use u{idx} back-link (pos {pos} in v{}'s list) is stale",
                record.value.0
            )));
        }
        let owner = &func.instrs[record.instr.index()];
        if owner.src_uses[record.slot as usize].map(|u| u.index()) != Some(idx) {
            return Err(corrupt(format!(
                "use u{idx} claims i{} slot {} but the slot does not own it",
                record.instr.0, record.slot
            )));
        }
    }
    Ok(())
}

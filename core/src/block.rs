use std::collections::HashMap;

use crate::error::{IrError, IrResult};
use crate::inst::{Inst, InstIdx};
use crate::opcode::{OpFlags, Opcode};
use crate::types::ValueClass;

/// Initial arena capacity of a block.
pub const DEFAULT_CAPACITY: usize = 256;

/// One guest block worth of IR.
///
/// An append-only arena of instructions. An [`InstIdx`] is a position
/// in the arena; operands always refer to earlier positions, so the
/// stream is a DAG in topological order.
#[derive(Debug, Clone)]
pub struct Block {
    insts: Vec<Inst>,
    /// Constant deduplication: value -> first `Const` carrying it.
    const_table: HashMap<u64, InstIdx>,
    /// Guest address of the first instruction.
    pub start_pc: u32,
    /// Guest address the final exit resumes at.
    pub exit_pc: u32,
    /// Cycles accounted for by the block.
    pub downcount: u32,
}

impl Block {
    pub fn new(start_pc: u32) -> Self {
        Self {
            insts: Vec::with_capacity(DEFAULT_CAPACITY),
            const_table: HashMap::new(),
            start_pc,
            exit_pc: start_pc,
            downcount: 0,
        }
    }

    /// Clear the block for building the next one.
    pub fn reset(&mut self, start_pc: u32) {
        self.insts.clear();
        self.const_table.clear();
        self.start_pc = start_pc;
        self.exit_pc = start_pc;
        self.downcount = 0;
    }

    /// Append an instruction and return its handle.
    pub fn push(&mut self, inst: Inst) -> InstIdx {
        let idx = InstIdx(self.insts.len() as u32);
        self.insts.push(inst);
        idx
    }

    /// Get or create a `Const` carrying `val`.
    pub fn push_const(&mut self, val: u64) -> InstIdx {
        if let Some(&existing) = self.const_table.get(&val) {
            return existing;
        }
        let idx = self.push(Inst::new(Opcode::Const).with_param(val));
        self.const_table.insert(val, idx);
        idx
    }

    #[inline]
    pub fn inst(&self, idx: InstIdx) -> &Inst {
        &self.insts[idx.index()]
    }

    #[inline]
    pub fn insts(&self) -> &[Inst] {
        &self.insts
    }

    /// Iterate over `(handle, instruction)` pairs in stream order.
    pub fn iter(&self) -> impl Iterator<Item = (InstIdx, &Inst)> {
        self.insts
            .iter()
            .enumerate()
            .map(|(i, inst)| (InstIdx(i as u32), inst))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.insts.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    #[inline]
    pub fn opc(&self, idx: InstIdx) -> Opcode {
        self.inst(idx).opc
    }

    /// True if `idx` is a compile-time constant.
    #[inline]
    pub fn is_imm(&self, idx: InstIdx) -> bool {
        self.opc(idx) == Opcode::Const
    }

    /// Low 32 bits of a constant.
    #[inline]
    pub fn imm_value(&self, idx: InstIdx) -> u32 {
        self.inst(idx).param as u32
    }

    /// Full 64-bit payload of a constant.
    #[inline]
    pub fn imm_value64(&self, idx: InstIdx) -> u64 {
        self.inst(idx).param
    }

    /// Check the structural well-formedness of the stream.
    pub fn verify(&self) -> IrResult<()> {
        for (at, inst) in self.iter() {
            if inst.opc == Opcode::Count {
                return Err(IrError::InvalidOpcode { at });
            }
            let def = inst.opc.def();
            let expected = def.nb_operands();
            let found = inst.nb_operands();
            let shape_ok = (def.operands[0] != ValueClass::None) == inst.op1.is_some()
                && (def.operands[1] != ValueClass::None) == inst.op2.is_some();
            if !shape_ok {
                return Err(IrError::OperandCount {
                    at,
                    opc: def.name,
                    expected,
                    found,
                });
            }

            for (slot, operand) in inst.operands() {
                if operand >= at {
                    return Err(IrError::ForwardReference { at, operand });
                }
                let found = self.opc(operand).result_class();
                let want = def.operands[slot as usize - 1];
                if found == ValueClass::None {
                    return Err(IrError::VoidOperand { at, operand });
                }
                if found != want {
                    return Err(IrError::ClassMismatch {
                        at,
                        operand,
                        slot: slot as u8,
                        expected: want,
                        found,
                    });
                }
            }

            let const_slots = [
                (OpFlags::CONST_OP1, inst.op1),
                (OpFlags::CONST_OP2, inst.op2),
            ];
            for (flag, operand) in const_slots {
                if let Some(operand) = operand {
                    if def.flags.contains(flag) && !self.is_imm(operand) {
                        return Err(IrError::NotConstant { at, operand });
                    }
                }
            }

            if inst.opc == Opcode::IdleBranch {
                let ok = inst.op1.is_some_and(|cmp| {
                    let cmp = self.inst(cmp);
                    cmp.opc == Opcode::ICmpEq && cmp.op2.is_some_and(|v| self.is_imm(v))
                });
                if !ok {
                    return Err(IrError::IdlePattern { at });
                }
            }

            if let Some(limit) = reg_index_limit(inst.opc) {
                if inst.param >= limit {
                    return Err(IrError::RegIndex {
                        at,
                        index: inst.param,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Number of guest registers addressable by a register-indexed opcode.
fn reg_index_limit(opc: Opcode) -> Option<u64> {
    match opc {
        Opcode::LoadGReg
        | Opcode::StoreGReg
        | Opcode::LoadFReg
        | Opcode::LoadFRegDENToZero
        | Opcode::StoreFReg => Some(32),
        Opcode::LoadCR | Opcode::StoreCR | Opcode::LoadGQR | Opcode::StoreGQR => Some(8),
        Opcode::StoreSRR => Some(2),
        _ => None,
    }
}

use jitil_core::Block;

use crate::code_buffer::CodeBuffer;
use crate::config::BackendConfig;
use crate::exit::CompiledBlock;
use crate::liveness::Liveness;
use crate::regalloc::SpillSlot;
use crate::x86_64::emitter::*;
use crate::x86_64::lower;
use crate::x86_64::regs::{Reg, Xmm, CALLEE_SAVED, CALL_ARG_REGS, ENV_REG, STACK_ADDEND};
use crate::{HostCodeGen, RegClass};

/// x86-64 code generator.
///
/// Owns the offsets of the shared prologue and epilogue; blocks are
/// entered through the prologue and leave through the epilogue.
#[derive(Debug, Default)]
pub struct X86_64CodeGen {
    /// Offset of the prologue (the function called from Rust).
    pub prologue_offset: usize,
    /// Offset where block code starts after the prologue.
    pub code_gen_start: usize,
    /// Offset of the exit path every block jumps to.
    pub tb_ret_offset: usize,
}

impl X86_64CodeGen {
    pub fn new() -> Self {
        Self::default()
    }
}

impl HostCodeGen for X86_64CodeGen {
    fn emit_prologue(&mut self, buf: &mut CodeBuffer) {
        self.prologue_offset = buf.offset();
        for &reg in CALLEE_SAVED {
            emit_push(buf, reg);
        }
        // mov rbp, rdi (guest state)
        emit_mov_rr(buf, true, ENV_REG, CALL_ARG_REGS[0]);
        // sub rsp, STACK_ADDEND
        emit_arith_ri(buf, ArithOp::Sub, true, Reg::Rsp, STACK_ADDEND as i32);
        // jmp *rsi (block code pointer)
        emit_jmp_reg(buf, CALL_ARG_REGS[1]);
        self.code_gen_start = buf.offset();
    }

    fn emit_epilogue(&mut self, buf: &mut CodeBuffer) {
        // Exits arrive with the exit index in EAX.
        self.tb_ret_offset = buf.offset();
        emit_arith_ri(buf, ArithOp::Add, true, Reg::Rsp, STACK_ADDEND as i32);
        for &reg in CALLEE_SAVED.iter().rev() {
            emit_pop(buf, reg);
        }
        emit_ret(buf);
    }

    fn patch_jump(&self, buf: &mut CodeBuffer, jump_offset: usize, target_offset: usize) {
        let disp = (target_offset as i64) - (jump_offset as i64 + 5);
        assert!(
            (i32::MIN as i64..=i32::MAX as i64).contains(&disp),
            "jump displacement out of i32 range"
        );
        buf.patch_u32(jump_offset + 1, disp as u32);
    }

    fn prologue_offset(&self) -> usize {
        self.prologue_offset
    }

    fn epilogue_offset(&self) -> usize {
        self.tb_ret_offset
    }

    fn out_spill(&self, buf: &mut CodeBuffer, class: RegClass, reg: u8, slot: SpillSlot) {
        match class {
            RegClass::Int => emit_store(buf, true, Reg::from_u8(reg), Reg::Rsp, slot.disp()),
            RegClass::Float => emit_movapd_store(buf, Xmm::from_u8(reg), Reg::Rsp, slot.disp()),
        }
    }

    fn out_reload(&self, buf: &mut CodeBuffer, class: RegClass, reg: u8, slot: SpillSlot) {
        match class {
            RegClass::Int => emit_load(buf, true, Reg::from_u8(reg), Reg::Rsp, slot.disp()),
            RegClass::Float => {
                emit_movapd(buf, Xmm::from_u8(reg), Rm::Mem(Reg::Rsp, slot.disp()))
            }
        }
    }

    fn lower_block(
        &self,
        buf: &mut CodeBuffer,
        block: &Block,
        live: &Liveness,
        config: &BackendConfig,
    ) -> CompiledBlock {
        lower::lower_block(self, buf, block, live, config)
    }
}

//! Guest register file and control register accesses.

use jitil_core::guest::*;
use jitil_core::{Inst, InstIdx, Opcode};

use super::{malformed, op1, op2, Lowering, Pc};
use crate::exit::ExitTarget;
use crate::x86_64::emitter::*;
use crate::x86_64::regs::{Reg, Xmm, ENV_REG};
use crate::RegClass;

/// Offset and width of a 32/64-bit guest field.
fn int_field(at: InstIdx, inst: &Inst) -> (i32, bool) {
    let n = inst.reg_index();
    match inst.opc {
        Opcode::LoadGReg | Opcode::StoreGReg => (gpr_offset(n), false),
        Opcode::LoadCR | Opcode::StoreCR => (cr_offset(n), true),
        Opcode::LoadCTR | Opcode::StoreCTR => (CTR_OFFSET, false),
        Opcode::LoadLink | Opcode::StoreLink => (LR_OFFSET, false),
        Opcode::LoadMSR | Opcode::StoreMSR => (MSR_OFFSET, false),
        Opcode::LoadGQR | Opcode::StoreGQR => (gqr_offset(n), false),
        Opcode::StoreSRR => (srr_offset(n), false),
        _ => malformed(at, "not an integer guest field"),
    }
}

pub(super) fn lower_guest_load(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    match inst.opc {
        Opcode::LoadFReg => {
            let r = lw.find_free(RegClass::Float);
            emit_movupd_load(lw.buf, Xmm::from_u8(r), ENV_REG, ps_offset(inst.reg_index()));
            lw.bind(r, at);
        }
        Opcode::LoadFRegDENToZero => {
            let r = lw.find_free(RegClass::Float);
            let ps = ps_offset(inst.reg_index());
            // Flush a ps0 that is denormal as a single to a signed zero.
            emit_load(lw.buf, false, Reg::Rcx, ENV_REG, ps + 4);
            emit_arith_ri(lw.buf, ArithOp::And, false, Reg::Rcx, 0x7ff0_0000);
            emit_arith_ri(lw.buf, ArithOp::Cmp, false, Reg::Rcx, 0x3800_0000);
            let normal = emit_jcc_fwd(lw.buf, X86Cond::Jae);
            emit_arith_rm_i(
                lw.buf,
                ArithOp::And,
                false,
                Rm::Mem(ENV_REG, ps + 4),
                0x8000_0000u32 as i32,
            );
            emit_store_imm(lw.buf, false, ENV_REG, ps, 0);
            set_jump_target(lw.buf, normal);
            emit_movupd_load(lw.buf, Xmm::from_u8(r), ENV_REG, ps);
            lw.bind(r, at);
        }
        Opcode::LoadCarry => {
            let r = lw.find_free(RegClass::Int);
            let dst = Reg::from_u8(r);
            emit_load(lw.buf, false, dst, ENV_REG, XER_OFFSET);
            emit_shift_ri(lw.buf, ShiftOp::Shr, false, dst, XER_CA_SHIFT as u8);
            emit_arith_ri(lw.buf, ArithOp::And, false, dst, 1);
            lw.bind(r, at);
        }
        _ => {
            let (off, wide) = int_field(at, inst);
            let r = lw.find_free(RegClass::Int);
            emit_load(lw.buf, wide, Reg::from_u8(r), ENV_REG, off);
            lw.bind(r, at);
        }
    }
}

pub(super) fn lower_guest_store(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    let val = op1(at, inst);
    match inst.opc {
        Opcode::StoreFReg => {
            let r = lw.ensure(val);
            emit_movupd_store(lw.buf, Xmm::from_u8(r), ENV_REG, ps_offset(inst.reg_index()));
        }
        Opcode::StoreCR => {
            let r = lw.ensure(val);
            emit_store(lw.buf, true, Reg::from_u8(r), ENV_REG, cr_offset(inst.reg_index()));
        }
        Opcode::StoreCarry => {
            let src = lw.loc(val);
            emit_arith_rm_i(lw.buf, ArithOp::Cmp, false, src, 0);
            let clear = emit_jcc_fwd(lw.buf, X86Cond::Je);
            let xer = Rm::Mem(ENV_REG, XER_OFFSET);
            emit_arith_rm_i(lw.buf, ArithOp::Or, false, xer, 1 << XER_CA_SHIFT);
            let done = emit_jmp_fwd(lw.buf);
            set_jump_target(lw.buf, clear);
            emit_arith_rm_i(lw.buf, ArithOp::And, false, xer, !(1 << XER_CA_SHIFT));
            set_jump_target(lw.buf, done);
        }
        Opcode::StoreFPRF => {
            let src = lw.loc(val);
            let fpscr = Rm::Mem(ENV_REG, FPSCR_OFFSET);
            emit_mov_r_rm(lw.buf, false, Reg::Rcx, src);
            emit_arith_ri(lw.buf, ArithOp::And, false, Reg::Rcx, 0x1F);
            emit_shift_ri(lw.buf, ShiftOp::Shl, false, Reg::Rcx, 12);
            emit_arith_rm_i(lw.buf, ArithOp::And, false, fpscr, !(0x1F << 12));
            emit_arith_rm_r(lw.buf, ArithOp::Or, false, fpscr, Reg::Rcx);
        }
        _ => {
            let (off, wide) = int_field(at, inst);
            if lw.is_imm(val) {
                let imm = lw.imm(val) as i32;
                emit_store_imm(lw.buf, wide, ENV_REG, off, imm);
            } else {
                let r = lw.ensure(val);
                emit_store(lw.buf, wide, Reg::from_u8(r), ENV_REG, off);
            }
        }
    }
    lw.release(at);

    if inst.opc == Opcode::StoreMSR {
        // Enabling interrupts delivers any pending exception now.
        let pc = lw.imm(op2(at, inst));
        emit_test_rm_i(lw.buf, false, Rm::Mem(ENV_REG, MSR_OFFSET), MSR_EE);
        let masked = emit_jcc_fwd(lw.buf, X86Cond::Je);
        emit_arith_rm_i(lw.buf, ArithOp::Cmp, false, Rm::Mem(ENV_REG, EXCEPTIONS_OFFSET), 0);
        let none = emit_jcc_fwd(lw.buf, X86Cond::Je);
        lw.emit_exit(ExitTarget::Exception, Pc::Imm(pc.wrapping_add(4)));
        set_jump_target(lw.buf, masked);
        set_jump_target(lw.buf, none);
    }
}

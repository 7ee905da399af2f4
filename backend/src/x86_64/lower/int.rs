use jitil_core::{Inst, InstIdx, Opcode};

use super::{malformed, op1, op2, Lowering};
use crate::x86_64::emitter::*;
use crate::x86_64::regs::Reg;
use crate::RegClass;

/// Materialize a constant some instruction needs in a register.
pub(super) fn lower_const(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    let r = lw.find_free(RegClass::Int);
    emit_mov_ri(lw.buf, true, Reg::from_u8(r), inst.param);
    lw.bind(r, at);
}

pub(super) fn lower_arith(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    match inst.opc {
        Opcode::Add => lw.emit_bin(at, inst, ArithOp::Add),
        Opcode::Sub => lw.emit_bin(at, inst, ArithOp::Sub),
        Opcode::And => lw.emit_bin(at, inst, ArithOp::And),
        Opcode::Or => lw.emit_bin(at, inst, ArithOp::Or),
        Opcode::Xor => lw.emit_bin(at, inst, ArithOp::Xor),
        Opcode::Mul => {
            let (r, other) = lw.bin_dst(at, inst);
            let dst = Reg::from_u8(r);
            if lw.is_imm(other) {
                let imm = lw.imm(other) as i32;
                emit_imul_ri(lw.buf, false, dst, dst, imm);
            } else {
                let src = lw.loc(other);
                emit_imul_r_rm(lw.buf, false, dst, src);
            }
            lw.bind(r, at);
            lw.release(at);
        }
        Opcode::MulHighUnsigned => {
            let (a, b) = (op1(at, inst), op2(at, inst));
            let r = lw.bin_reg(at, a, b);
            if lw.is_imm(b) {
                let imm = lw.imm(b);
                emit_mov_ri(lw.buf, false, Reg::Rax, imm as u64);
            } else {
                let src = lw.loc(b);
                emit_mov_r_rm(lw.buf, false, Reg::Rax, src);
            }
            let src = lw.loc(a);
            emit_mul(lw.buf, false, src);
            emit_mov_rr(lw.buf, false, Reg::from_u8(r), Reg::Rdx);
            lw.bind(r, at);
            lw.release(at);
        }
        Opcode::Not => {
            let r = lw.reg_with(at, op1(at, inst));
            emit_not(lw.buf, false, Reg::from_u8(r));
            lw.bind(r, at);
            lw.release(at);
        }
        Opcode::Cntlzw => {
            let a = op1(at, inst);
            let r = lw.u_reg(at, a);
            let dst = Reg::from_u8(r);
            let src = lw.loc(a);
            // bsr leaves ZF set and the destination undefined for zero.
            emit_mov_ri(lw.buf, false, Reg::Rcx, 63);
            emit_bsr(lw.buf, false, dst, src);
            emit_cmovcc(lw.buf, X86Cond::Je, false, dst, Reg::Rcx);
            emit_arith_ri(lw.buf, ArithOp::Xor, false, dst, 31);
            lw.bind(r, at);
            lw.release(at);
        }
        _ => malformed(at, "not an arithmetic opcode"),
    }
}

pub(super) fn lower_shift(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    let op = match inst.opc {
        Opcode::Rol => ShiftOp::Rol,
        Opcode::Shl => ShiftOp::Shl,
        Opcode::Shrl => ShiftOp::Shr,
        Opcode::Sarl => ShiftOp::Sar,
        _ => malformed(at, "not a shift opcode"),
    };
    let (a, b) = (op1(at, inst), op2(at, inst));
    let r = lw.reg_with(at, a);
    let dst = Reg::from_u8(r);
    if lw.is_imm(b) {
        let count = lw.imm(b) as u8;
        emit_shift_ri(lw.buf, op, false, dst, count);
    } else {
        let src = lw.loc(b);
        emit_mov_r_rm(lw.buf, false, Reg::Rcx, src);
        emit_shift_cl(lw.buf, op, false, dst);
    }
    lw.bind(r, at);
    lw.release(at);
}

pub(super) fn lower_compare(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    if let Some(cond) = inst.opc.icmp_cond() {
        let (a, b) = (op1(at, inst), op2(at, inst));
        lw.emit_cmp(a, b);
        emit_setcc(lw.buf, X86Cond::from_cond(cond), Reg::Rcx);
        let r = lw.bin_reg(at, a, b);
        emit_movzx(lw.buf, OPC_MOVZBL, Reg::from_u8(r), Reg::Rcx);
        lw.bind(r, at);
        lw.release(at);
        return;
    }
    match inst.opc {
        Opcode::ICmpCRSigned => lower_icmp_cr(lw, at, inst, true),
        Opcode::ICmpCRUnsigned => lower_icmp_cr(lw, at, inst, false),
        Opcode::FastCRSOSet
        | Opcode::FastCREQSet
        | Opcode::FastCRGTSet
        | Opcode::FastCRLTSet => lower_fast_cr(lw, at, inst),
        Opcode::FDCmpCR => super::float::lower_fdcmp_cr(lw, at, inst),
        _ => malformed(at, "not a compare opcode"),
    }
}

/// CR field value `ext(a) - ext(b)` in 64 bits: its sign, zero-ness
/// and magnitude encode LT, EQ and GT.
fn lower_icmp_cr(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst, signed: bool) {
    let (a, b) = (op1(at, inst), op2(at, inst));
    let r = if lw.last_use(at, a) {
        let r = lw.ensure(a);
        if signed {
            emit_movsx(lw.buf, OPC_MOVSLQ, Reg::from_u8(r), Rm::Reg(r));
        }
        r
    } else {
        let r = lw.find_free(RegClass::Int);
        let src = lw.loc(a);
        if signed {
            emit_movsx(lw.buf, OPC_MOVSLQ, Reg::from_u8(r), src);
        } else {
            emit_mov_r_rm(lw.buf, false, Reg::from_u8(r), src);
        }
        r
    };
    let dst = Reg::from_u8(r);

    if lw.is_imm(b) {
        let imm = lw.imm(b);
        if !signed && imm & 0x8000_0000 != 0 {
            // Would be sign-extended as an imm32.
            emit_mov_ri(lw.buf, false, Reg::Rax, imm as u64);
            emit_arith_rr(lw.buf, ArithOp::Sub, true, dst, Reg::Rax);
        } else if imm != 0 {
            emit_arith_ri(lw.buf, ArithOp::Sub, true, dst, imm as i32);
        }
    } else {
        let src = lw.loc(b);
        if signed {
            emit_movsx(lw.buf, OPC_MOVSLQ, Reg::Rax, src);
        } else {
            emit_mov_r_rm(lw.buf, false, Reg::Rax, src);
        }
        emit_arith_rr(lw.buf, ArithOp::Sub, true, dst, Reg::Rax);
    }
    lw.bind(r, at);
    lw.release(at);
}

/// Extract one bit of a fast-form CR field as 0 or 1.
fn lower_fast_cr(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    let a = op1(at, inst);
    let r = lw.u_reg(at, a);
    let src = lw.loc(a);
    match inst.opc {
        Opcode::FastCRSOSet => {
            emit_mov_ri(lw.buf, true, Reg::Rax, 1 << 61);
            emit_test_rm_r(lw.buf, true, src, Reg::Rax);
            emit_setcc(lw.buf, X86Cond::Jne, Reg::Rax);
        }
        Opcode::FastCREQSet => {
            emit_arith_rm_i(lw.buf, ArithOp::Cmp, false, src, 0);
            emit_setcc(lw.buf, X86Cond::Je, Reg::Rax);
        }
        Opcode::FastCRGTSet => {
            emit_arith_rm_i(lw.buf, ArithOp::Cmp, true, src, 0);
            emit_setcc(lw.buf, X86Cond::Jg, Reg::Rax);
        }
        _ => {
            emit_mov_ri(lw.buf, true, Reg::Rax, 1 << 62);
            emit_test_rm_r(lw.buf, true, src, Reg::Rax);
            emit_setcc(lw.buf, X86Cond::Jne, Reg::Rax);
        }
    }
    emit_movzx(lw.buf, OPC_MOVZBL, Reg::from_u8(r), Reg::Rax);
    lw.bind(r, at);
    lw.release(at);
}

/// Sign-extend the low byte or halfword.
pub(super) fn lower_sext(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    let a = op1(at, inst);
    let r = lw.u_reg(at, a);
    let dst = Reg::from_u8(r);
    let src = lw.loc(a);
    if inst.opc == Opcode::SExt8 {
        // Only AL..DL are byte-addressable without REX.
        emit_mov_r_rm(lw.buf, false, Reg::Rcx, src);
        emit_movsx(lw.buf, OPC_MOVSBL, dst, Rm::Reg(Reg::Rcx as u8));
    } else {
        emit_movsx(lw.buf, OPC_MOVSWL, dst, src);
    }
    lw.bind(r, at);
    lw.release(at);
}

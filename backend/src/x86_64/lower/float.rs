//! Scalar, paired-single and double operations on the vector pool.
//!
//! Paired singles occupy the low 64 bits of a register as `[ps0, ps1]`;
//! "MReg" values hold the same pair widened to two doubles.

use jitil_core::guest::{FPSCR_FX, FPSCR_OFFSET, FPSCR_VE, FPSCR_VXSNAN, FPSCR_VXVC};
use jitil_core::{Inst, InstIdx, Opcode};

use super::{malformed, op1, op2, Lowering};
use crate::x86_64::emitter::*;
use crate::x86_64::regs::{Reg, Xmm, ENV_REG};
use crate::RegClass;

pub(super) fn lower_float_arith(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    let sse_op = match inst.opc {
        Opcode::FSAdd => Some(OPC_ADDSS),
        Opcode::FSSub => Some(OPC_SUBSS),
        Opcode::FSMul => Some(OPC_MULSS),
        Opcode::FDAdd => Some(OPC_ADDSD),
        Opcode::FDSub => Some(OPC_SUBSD),
        Opcode::FDMul => Some(OPC_MULSD),
        Opcode::FPAdd => Some(OPC_ADDPS),
        Opcode::FPSub => Some(OPC_SUBPS),
        Opcode::FPMul => Some(OPC_MULPS),
        _ => None,
    };
    if let Some(opc) = sse_op {
        let (r, other) = lw.bin_dst(at, inst);
        let src = lw.loc(other);
        emit_sse(lw.buf, opc, Xmm::from_u8(r), src);
        lw.bind(r, at);
        lw.release(at);
        return;
    }

    let a = op1(at, inst);
    let r = match inst.opc {
        Opcode::FSNeg => negate(lw, at, a, 0x8000_0000),
        Opcode::FDNeg => negate(lw, at, a, 1 << 63),
        Opcode::FPNeg => negate(lw, at, a, 0x8000_0000_8000_0000),
        Opcode::FPDup0 => {
            let r = lw.u_reg_with_mov(at, a);
            let x = Xmm::from_u8(r);
            emit_sse(lw.buf, OPC_PUNPCKLDQ, x, x.into());
            r
        }
        Opcode::FPDup1 => {
            let r = lw.u_reg_with_mov(at, a);
            let x = Xmm::from_u8(r);
            emit_sse_ib(lw.buf, OPC_SHUFPS, x, x.into(), 0xE5);
            r
        }
        Opcode::FPMerge00 => {
            let r = lw.reg_with(at, a);
            let src = lw.loc(op2(at, inst));
            emit_sse(lw.buf, OPC_PUNPCKLDQ, Xmm::from_u8(r), src);
            r
        }
        Opcode::FPMerge01 => {
            let r = lw.reg_with(at, op2(at, inst));
            move_low(lw, OPC_MOVSS_VxWx, Xmm::from_u8(r), a);
            r
        }
        Opcode::FPMerge10 => {
            let r = lw.reg_with(at, a);
            let x = Xmm::from_u8(r);
            move_low(lw, OPC_MOVSS_VxWx, x, op2(at, inst));
            emit_sse_ib(lw.buf, OPC_SHUFPS, x, x.into(), 0xF1);
            r
        }
        Opcode::FPMerge11 => {
            let r = lw.reg_with(at, a);
            let x = Xmm::from_u8(r);
            let src = lw.loc(op2(at, inst));
            emit_sse(lw.buf, OPC_PUNPCKLDQ, x, src);
            emit_sse_ib(lw.buf, OPC_SHUFPD, x, x.into(), 1);
            r
        }
        Opcode::InsertDoubleInMReg => {
            let r = lw.reg_with(at, op2(at, inst));
            move_low(lw, OPC_MOVSD_VxWx, Xmm::from_u8(r), a);
            r
        }
        _ => malformed(at, "not a float opcode"),
    };
    lw.bind(r, at);
    lw.release(at);
}

/// Flip the sign bits selected by `mask`.
fn negate(lw: &mut Lowering<'_>, at: InstIdx, a: InstIdx, mask: u64) -> u8 {
    let r = lw.u_reg_with_mov(at, a);
    emit_mov_ri(lw.buf, true, Reg::Rax, mask);
    emit_movd_to_xmm(lw.buf, true, Xmm::Xmm0, Reg::Rax);
    emit_sse(lw.buf, OPC_PXOR, Xmm::from_u8(r), Xmm::Xmm0.into());
    r
}

/// MOVSS/MOVSD of `src`'s low element into `dst`, keeping the rest of
/// `dst`. The memory forms zero the upper part, so slots go through XMM0.
fn move_low(lw: &mut Lowering<'_>, opc: u32, dst: Xmm, src: InstIdx) {
    match lw.loc(src) {
        Rm::Reg(x) => emit_sse(lw.buf, opc, dst, Rm::Reg(x)),
        slot => {
            emit_movapd(lw.buf, Xmm::Xmm0, slot);
            emit_sse(lw.buf, opc, dst, Xmm::Xmm0.into());
        }
    }
}

pub(super) fn lower_conversion(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    let a = op1(at, inst);
    let r = match inst.opc {
        Opcode::SExt8 | Opcode::SExt16 => return super::int::lower_sext(lw, at, inst),
        Opcode::DupSingleToMReg => {
            let input = lw.ensure(a);
            let r = lw.u_reg(at, a);
            let x = Xmm::from_u8(r);
            emit_sse(lw.buf, OPC_CVTSS2SD, x, Rm::Reg(input));
            emit_sse(lw.buf, OPC_UNPCKLPD, x, x.into());
            r
        }
        Opcode::DoubleToSingle => convert(lw, at, a, OPC_CVTSD2SS),
        Opcode::ExpandPackedToMReg => convert(lw, at, a, OPC_CVTPS2PD),
        Opcode::CompactMRegToPacked => convert(lw, at, a, OPC_CVTPD2PS),
        _ => malformed(at, "not a conversion opcode"),
    };
    lw.bind(r, at);
    lw.release(at);
}

fn convert(lw: &mut Lowering<'_>, at: InstIdx, a: InstIdx, opc: u32) -> u8 {
    let r = lw.u_reg(at, a);
    let src = lw.loc(a);
    emit_sse(lw.buf, opc, Xmm::from_u8(r), src);
    r
}

/// Compare two doubles into a CR field value (8 less, 4 greater,
/// 2 equal, 1 unordered), raising the FPSCR invalid-operation bits on
/// the unordered path.
pub(super) fn lower_fdcmp_cr(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    let (a, b) = (op1(at, inst), op2(at, inst));
    let ordered = inst.param != 0;

    let lhs = lw.loc(a);
    emit_sse(lw.buf, OPC_MOVSD_VxWx, Xmm::Xmm0, lhs);
    let rhs = lw.loc(b);
    emit_sse(lw.buf, OPC_UCOMISD, Xmm::Xmm0, rhs);
    let nan = emit_jcc_fwd(lw.buf, X86Cond::Jp);
    let equal = emit_jcc_fwd(lw.buf, X86Cond::Je);
    let less = emit_jcc_fwd(lw.buf, X86Cond::Jb);

    let mut joins = Vec::with_capacity(3);
    emit_mov_ri(lw.buf, false, Reg::Rdx, 4);
    joins.push(emit_jmp_fwd(lw.buf));
    set_jump_target(lw.buf, equal);
    emit_mov_ri(lw.buf, false, Reg::Rdx, 2);
    joins.push(emit_jmp_fwd(lw.buf));
    set_jump_target(lw.buf, less);
    emit_mov_ri(lw.buf, false, Reg::Rdx, 8);
    joins.push(emit_jmp_fwd(lw.buf));

    set_jump_target(lw.buf, nan);
    emit_movd_from_xmm(lw.buf, true, Reg::Rcx, Xmm::Xmm0);
    match rhs {
        Rm::Reg(x) => emit_movd_from_xmm(lw.buf, true, Reg::Rdx, Xmm::from_u8(x)),
        slot => emit_mov_r_rm(lw.buf, true, Reg::Rdx, slot),
    }
    let check_snan = lw.rt.check_snan as usize;
    lw.call_runtime(check_snan, 2);
    emit_test_rr(lw.buf, false, Reg::Rax, Reg::Rax);

    let fpscr = Rm::Mem(ENV_REG, FPSCR_OFFSET);
    let snan_bits = (FPSCR_FX | FPSCR_VXSNAN) as i32;
    let quiet = emit_jcc_fwd(lw.buf, X86Cond::Je);
    emit_arith_rm_i(lw.buf, ArithOp::Or, false, fpscr, snan_bits);
    if ordered {
        // VXVC joins VXSNAN only while invalid-operation traps are off.
        emit_test_rm_i(lw.buf, false, fpscr, FPSCR_VE);
        let trapping = emit_jcc_fwd(lw.buf, X86Cond::Jne);
        emit_arith_rm_i(lw.buf, ArithOp::Or, false, fpscr, FPSCR_VXVC as i32);
        let done = emit_jmp_fwd(lw.buf);
        set_jump_target(lw.buf, quiet);
        emit_arith_rm_i(lw.buf, ArithOp::Or, false, fpscr, (FPSCR_FX | FPSCR_VXVC) as i32);
        set_jump_target(lw.buf, trapping);
        set_jump_target(lw.buf, done);
    } else {
        set_jump_target(lw.buf, quiet);
    }
    emit_mov_ri(lw.buf, false, Reg::Rdx, 1);
    for j in joins {
        set_jump_target(lw.buf, j);
    }

    lw.release(at);
    let r = lw.find_free(RegClass::Int);
    emit_mov_rr(lw.buf, false, Reg::from_u8(r), Reg::Rdx);
    lw.bind(r, at);
}

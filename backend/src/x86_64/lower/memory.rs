//! Guest memory accesses. All of them go through the runtime hooks,
//! which own bounds checking and fault policy.

use jitil_core::{Inst, InstIdx, Opcode};

use super::{malformed, op1, op2, Lowering};
use crate::liveness::{address_mode, AddressMode};
use crate::x86_64::emitter::*;
use crate::x86_64::regs::{Reg, Xmm};
use crate::RegClass;

/// Compute the guest address of a memory access into ECX, folding a
/// constant displacement into `lea`.
fn addr_to_ecx(lw: &mut Lowering<'_>, addr: InstIdx) {
    match address_mode(lw.block, addr) {
        AddressMode::Imm(a) => emit_mov_ri(lw.buf, false, Reg::Rcx, a as u64),
        AddressMode::BaseDisp(base, disp) => match lw.loc(base) {
            Rm::Reg(r) if disp == 0 => emit_mov_rr(lw.buf, false, Reg::Rcx, Reg::from_u8(r)),
            Rm::Reg(r) => emit_lea(lw.buf, false, Reg::Rcx, Reg::from_u8(r), disp as i32),
            slot => {
                emit_mov_r_rm(lw.buf, false, Reg::Rcx, slot);
                if disp != 0 {
                    emit_lea(lw.buf, false, Reg::Rcx, Reg::Rcx, disp as i32);
                }
            }
        },
    }
}

pub(super) fn lower_load(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    let rt = lw.rt;
    let func = match inst.opc {
        Opcode::Load8 => rt.read_u8 as usize,
        Opcode::Load16 => rt.read_u16 as usize,
        Opcode::Load32 | Opcode::LoadSingle => rt.read_u32 as usize,
        Opcode::LoadDouble => rt.read_u64 as usize,
        _ => malformed(at, "not a load opcode"),
    };
    addr_to_ecx(lw, op1(at, inst));
    lw.release(at);
    lw.call_runtime(func, 1);

    if !lw.live.is_used(at) {
        return;
    }
    match inst.opc {
        Opcode::LoadSingle => {
            let r = lw.find_free(RegClass::Float);
            emit_movd_to_xmm(lw.buf, false, Xmm::from_u8(r), Reg::Rax);
            lw.bind(r, at);
        }
        Opcode::LoadDouble => {
            let r = lw.find_free(RegClass::Float);
            emit_movd_to_xmm(lw.buf, true, Xmm::from_u8(r), Reg::Rax);
            lw.bind(r, at);
        }
        _ => {
            let r = lw.find_free(RegClass::Int);
            emit_mov_rr(lw.buf, false, Reg::from_u8(r), Reg::Rax);
            lw.bind(r, at);
        }
    }
}

pub(super) fn lower_store(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    let (val, addr) = (op1(at, inst), op2(at, inst));
    let rt = lw.rt;
    let func = match inst.opc {
        Opcode::Store8 => rt.write_u8 as usize,
        Opcode::Store16 => rt.write_u16 as usize,
        Opcode::Store32 | Opcode::StoreSingle => rt.write_u32 as usize,
        Opcode::StoreDouble => rt.write_u64 as usize,
        _ => malformed(at, "not a store opcode"),
    };

    // Value into EDX/RDX; neither scratch register is allocatable.
    match inst.opc {
        Opcode::StoreSingle | Opcode::StoreDouble => {
            let wide = inst.opc == Opcode::StoreDouble;
            match lw.loc(val) {
                Rm::Reg(x) => emit_movd_from_xmm(lw.buf, wide, Reg::Rdx, Xmm::from_u8(x)),
                slot => emit_mov_r_rm(lw.buf, wide, Reg::Rdx, slot),
            }
        }
        _ if lw.is_imm(val) => {
            let imm = lw.imm(val);
            emit_mov_ri(lw.buf, false, Reg::Rdx, imm as u64);
        }
        _ => {
            let src = lw.loc(val);
            emit_mov_r_rm(lw.buf, false, Reg::Rdx, src);
        }
    }
    addr_to_ecx(lw, addr);
    lw.release(at);
    lw.call_runtime(func, 2);
}

//! Block exits, idle loops, exception checks and the interpreter fallback.

use jitil_core::guest::*;
use jitil_core::{Inst, InstIdx, Opcode};

use super::{malformed, op1, op2, Lowering, Pc};
use crate::exit::ExitTarget;
use crate::x86_64::emitter::*;
use crate::x86_64::regs::{Reg, ENV_REG};
use crate::RegClass;

pub(super) fn lower_branch(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    match inst.opc {
        Opcode::BranchUncond => {
            lw.emit_branch_exit(op1(at, inst));
            lw.release(at);
        }
        Opcode::BranchCond => {
            let (cond, dest) = (op1(at, inst), op2(at, inst));
            let cmp = *lw.block.inst(cond);
            let skip = match cmp.opc.icmp_cond() {
                Some(cc) => {
                    // Branch on the compare itself; the boolean is not built.
                    lw.emit_cmp(op1(cond, &cmp), op2(cond, &cmp));
                    emit_jcc_fwd(lw.buf, X86Cond::from_cond(cc.invert()))
                }
                None => {
                    let src = lw.loc(cond);
                    emit_arith_rm_i(lw.buf, ArithOp::Cmp, false, src, 0);
                    emit_jcc_fwd(lw.buf, X86Cond::Je)
                }
            };
            lw.emit_branch_exit(dest);
            set_jump_target(lw.buf, skip);
            lw.release(at);
        }
        Opcode::IdleBranch => {
            let cmp = *lw.block.inst(op1(at, inst));
            let value = op1(at, &cmp);
            let expected = lw.imm(op2(at, &cmp)) as i32;
            let pc = lw.imm(op2(at, inst));
            let src = lw.loc(value);
            emit_arith_rm_i(lw.buf, ArithOp::Cmp, false, src, expected);
            let busy = emit_jcc_fwd(lw.buf, X86Cond::Jne);
            // Leaving right after: nothing live needs saving.
            let idle = lw.rt.idle as usize;
            lw.emit_call(idle);
            lw.emit_exit(ExitTarget::Exception, Pc::Imm(pc));
            set_jump_target(lw.buf, busy);
            lw.release(at);
        }
        Opcode::ShortIdleLoop => {
            let pc = lw.imm(op1(at, inst));
            let idle = lw.rt.idle as usize;
            lw.emit_call(idle);
            lw.emit_exit(ExitTarget::Exception, Pc::Imm(pc));
        }
        Opcode::InterpreterBranch => {
            emit_load(lw.buf, false, Reg::Rax, ENV_REG, NPC_OFFSET);
            lw.emit_exit(ExitTarget::Dynamic, Pc::Reg(Reg::Rax));
        }
        Opcode::RFIExit => {
            // MSR = (MSR & !mask) | (SRR1 & mask), then clear POW.
            emit_load(lw.buf, false, Reg::Rax, ENV_REG, MSR_OFFSET);
            emit_arith_ri(lw.buf, ArithOp::And, false, Reg::Rax, !RFI_MSR_MASK as i32);
            emit_load(lw.buf, false, Reg::Rcx, ENV_REG, SRR1_OFFSET);
            emit_arith_ri(lw.buf, ArithOp::And, false, Reg::Rcx, RFI_MSR_MASK as i32);
            emit_arith_rr(lw.buf, ArithOp::Or, false, Reg::Rax, Reg::Rcx);
            emit_arith_ri(lw.buf, ArithOp::And, false, Reg::Rax, RFI_MSR_CLEAR as i32);
            emit_store(lw.buf, false, Reg::Rax, ENV_REG, MSR_OFFSET);
            emit_load(lw.buf, false, Reg::Rax, ENV_REG, SRR0_OFFSET);
            emit_store(lw.buf, false, Reg::Rax, ENV_REG, NPC_OFFSET);
            lw.emit_exit(ExitTarget::Exception, Pc::Reg(Reg::Rax));
        }
        _ => malformed(at, "not a branch opcode"),
    }
}

pub(super) fn lower_system(lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    let exceptions = Rm::Mem(ENV_REG, EXCEPTIONS_OFFSET);
    let msr = Rm::Mem(ENV_REG, MSR_OFFSET);
    match inst.opc {
        Opcode::SystemCall => {
            let pc = lw.imm(op1(at, inst));
            emit_arith_rm_i(lw.buf, ArithOp::Or, false, exceptions, EXCEPTION_SYSCALL as i32);
            lw.emit_exit(ExitTarget::Exception, Pc::Imm(pc.wrapping_add(4)));
        }
        Opcode::FallBackToInterpreter => {
            let word = lw.imm(op1(at, inst));
            let pc = lw.imm(op2(at, inst));
            lw.ra.spill_all(lw.cg, lw.buf, RegClass::Int);
            lw.ra.spill_all(lw.cg, lw.buf, RegClass::Float);
            emit_store_imm(lw.buf, false, ENV_REG, PC_OFFSET, pc as i32);
            emit_store_imm(lw.buf, false, ENV_REG, NPC_OFFSET, pc.wrapping_add(4) as i32);
            emit_mov_ri(lw.buf, false, Reg::Rdi, word as u64);
            let interpret = lw.rt.interpret as usize;
            lw.emit_call(interpret);
        }
        Opcode::FPExceptionCheck => {
            let pc = lw.imm(op1(at, inst));
            emit_test_rm_i(lw.buf, false, msr, MSR_FP);
            let enabled = emit_jcc_fwd(lw.buf, X86Cond::Jne);
            let downcount = Rm::Mem(ENV_REG, DOWNCOUNT_OFFSET);
            let cycles = lw.block.downcount as i32;
            emit_arith_rm_i(lw.buf, ArithOp::Sub, false, downcount, cycles);
            emit_arith_rm_i(
                lw.buf,
                ArithOp::Or,
                false,
                exceptions,
                EXCEPTION_FPU_UNAVAILABLE as i32,
            );
            lw.emit_exit(ExitTarget::Exception, Pc::Imm(pc));
            set_jump_target(lw.buf, enabled);
        }
        Opcode::DSIExceptionCheck => {
            let pc = lw.imm(op1(at, inst));
            emit_test_rm_i(lw.buf, false, exceptions, EXCEPTION_DSI);
            let clear = emit_jcc_fwd(lw.buf, X86Cond::Je);
            lw.emit_exit(ExitTarget::Exception, Pc::Imm(pc));
            set_jump_target(lw.buf, clear);
        }
        Opcode::ExtExceptionCheck => {
            let pc = lw.imm(op1(at, inst));
            // Synchronous exceptions are delivered first.
            emit_test_rm_i(lw.buf, false, exceptions, EXCEPTION_SYNC_MASK);
            let sync = emit_jcc_fwd(lw.buf, X86Cond::Jne);
            emit_test_rm_i(lw.buf, false, exceptions, EXCEPTION_EXTERNAL_INT);
            let none = emit_jcc_fwd(lw.buf, X86Cond::Je);
            emit_test_rm_i(lw.buf, false, msr, MSR_EE);
            let masked = emit_jcc_fwd(lw.buf, X86Cond::Je);
            lw.emit_exit(ExitTarget::Exception, Pc::Imm(pc));
            for f in [sync, none, masked] {
                set_jump_target(lw.buf, f);
            }
        }
        _ => malformed(at, "not a system opcode"),
    }
}

//! Instruction selection for x86-64.
//!
//! One forward pass over the block. Instructions whose value is never
//! read and that have no side effect are skipped; every other one is
//! handed to the lowering function of its [`OpCategory`].

mod control;
mod float;
mod int;
mod memory;
mod state;

use jitil_core::guest::PC_OFFSET;
use jitil_core::{Block, Inst, InstIdx, OpCategory};

use crate::code_buffer::CodeBuffer;
use crate::config::BackendConfig;
use crate::exit::{CompiledBlock, ExitStub, ExitTarget};
use crate::liveness::Liveness;
use crate::regalloc::{AllocState, Loc};
use crate::runtime::Runtime;
use crate::x86_64::codegen::X86_64CodeGen;
use crate::x86_64::emitter::*;
use crate::x86_64::regs::{Reg, Xmm, CALLER_SAVED_ALLOC, ENV_REG};
use crate::RegClass;

/// Lowering function of one opcode category.
type LowerFn = fn(&mut Lowering<'_>, InstIdx, &Inst);

fn lower_fn(cat: OpCategory) -> LowerFn {
    match cat {
        OpCategory::NoOp => lower_noop,
        OpCategory::Constant => int::lower_const,
        OpCategory::GuestLoad => state::lower_guest_load,
        OpCategory::GuestStore => state::lower_guest_store,
        OpCategory::Arithmetic => int::lower_arith,
        OpCategory::Shift => int::lower_shift,
        OpCategory::Compare => int::lower_compare,
        OpCategory::Load => memory::lower_load,
        OpCategory::Store => memory::lower_store,
        OpCategory::FloatArith => float::lower_float_arith,
        OpCategory::Conversion => float::lower_conversion,
        OpCategory::Branch => control::lower_branch,
        OpCategory::System => control::lower_system,
    }
}

fn lower_noop(_lw: &mut Lowering<'_>, at: InstIdx, inst: &Inst) {
    if inst.opc == jitil_core::Opcode::Count {
        malformed(at, "opcode sentinel");
    }
}

/// Abort on IR the verifier should have rejected.
fn malformed(at: InstIdx, what: &str) -> ! {
    log::error!("malformed IR at {at}: {what}");
    panic!("malformed IR at {at}: {what}");
}

fn op1(at: InstIdx, inst: &Inst) -> InstIdx {
    inst.op1.unwrap_or_else(|| malformed(at, "missing first operand"))
}

fn op2(at: InstIdx, inst: &Inst) -> InstIdx {
    inst.op2.unwrap_or_else(|| malformed(at, "missing second operand"))
}

/// Source of the guest PC written by an exit.
#[derive(Debug, Clone, Copy)]
enum Pc {
    Imm(u32),
    Value(InstIdx),
    Reg(Reg),
}

/// Code generation context for one block.
struct Lowering<'a> {
    block: &'a Block,
    live: &'a Liveness,
    ra: AllocState<'a>,
    buf: &'a mut CodeBuffer,
    cg: &'a X86_64CodeGen,
    rt: Runtime,
    /// Offsets of the `sub/add rsp, imm32` immediates sized to the frame.
    frame_fixups: Vec<usize>,
    exits: Vec<ExitStub>,
}

/// Generate code for `block` at the current buffer position.
pub(crate) fn lower_block(
    cg: &X86_64CodeGen,
    buf: &mut CodeBuffer,
    block: &Block,
    live: &Liveness,
    config: &BackendConfig,
) -> CompiledBlock {
    let entry = buf.offset();
    let mut lw = Lowering {
        block,
        live,
        ra: AllocState::new(block, live, config),
        buf,
        cg,
        rt: config.runtime,
        frame_fixups: Vec::new(),
        exits: Vec::new(),
    };

    let fixup = emit_arith_ri32(lw.buf, ArithOp::Sub, true, Reg::Rsp, 0);
    lw.frame_fixups.push(fixup);

    for (at, inst) in block.iter() {
        if !live.needs_code(block, at) {
            continue;
        }
        log::trace!("lower {at}: {}", inst.opc.def().name);
        lower_fn(inst.opc.category())(&mut lw, at, inst);
    }

    lw.ra.finish();
    lw.emit_exit(ExitTarget::Known(block.exit_pc), Pc::Imm(block.exit_pc));
    emit_ud2(lw.buf);

    let frame_size = lw.ra.frame_size();
    for &at in &lw.frame_fixups {
        lw.buf.patch_u32(at, frame_size);
    }

    CompiledBlock {
        start_pc: block.start_pc,
        entry,
        size: lw.buf.offset() - entry,
        exits: lw.exits,
        frame_size,
        stats: lw.ra.stats(),
    }
}

impl Lowering<'_> {
    // -- Operands --

    fn is_imm(&self, idx: InstIdx) -> bool {
        self.block.is_imm(idx)
    }

    fn imm(&self, idx: InstIdx) -> u32 {
        self.block.imm_value(idx)
    }

    fn class(&self, idx: InstIdx) -> RegClass {
        self.ra.class_of(idx)
    }

    fn last_use(&self, at: InstIdx, operand: InstIdx) -> bool {
        self.ra.is_last_use(at, operand)
    }

    /// Operand form of `idx`'s current location.
    fn loc(&self, idx: InstIdx) -> Rm {
        match self.ra.location_of(idx) {
            Loc::Reg(r) => Rm::Reg(r),
            Loc::Slot(slot) => Rm::Mem(Reg::Rsp, slot.disp()),
        }
    }

    // -- Allocator shorthands --

    fn find_free(&mut self, class: RegClass) -> u8 {
        self.ra.find_free(self.cg, self.buf, class)
    }

    fn ensure(&mut self, idx: InstIdx) -> u8 {
        self.ra.ensure_in_register(self.cg, self.buf, idx)
    }

    fn bind(&mut self, reg: u8, idx: InstIdx) {
        let class = self.class(idx);
        self.ra.bind(class, reg, idx);
    }

    fn release(&mut self, at: InstIdx) {
        self.ra.release(at);
    }

    /// Copy a value of `class` into `dst`.
    fn copy_into(&mut self, class: RegClass, dst: u8, src: Rm) {
        match class {
            RegClass::Int => {
                if src != Rm::Reg(dst) {
                    emit_mov_r_rm(self.buf, false, Reg::from_u8(dst), src);
                }
            }
            RegClass::Float => emit_movapd(self.buf, Xmm::from_u8(dst), src),
        }
    }

    // -- Destination register choice --

    /// Destination for a unary op that reads its operand through
    /// `loc` before writing the result.
    fn u_reg(&mut self, at: InstIdx, operand: InstIdx) -> u8 {
        if self.last_use(at, operand) {
            if let Some(r) = self.ra.reg_of(operand) {
                return r;
            }
        }
        let class = self.class(at);
        self.find_free(class)
    }

    /// Destination preloaded with `operand`: its own register on its
    /// last use, else a fresh copy.
    fn reg_with(&mut self, at: InstIdx, operand: InstIdx) -> u8 {
        if self.last_use(at, operand) {
            return self.ensure(operand);
        }
        let class = self.class(at);
        let r = self.find_free(class);
        let src = self.loc(operand);
        self.copy_into(class, r, src);
        r
    }

    /// Like [`reg_with`](Self::reg_with) but only takes over a register
    /// the operand already holds.
    fn u_reg_with_mov(&mut self, at: InstIdx, operand: InstIdx) -> u8 {
        if self.last_use(at, operand) {
            if let Some(r) = self.ra.reg_of(operand) {
                return r;
            }
        }
        let class = self.class(at);
        let r = self.find_free(class);
        let src = self.loc(operand);
        self.copy_into(class, r, src);
        r
    }

    /// Destination for an op that reads both operands before writing.
    fn bin_reg(&mut self, at: InstIdx, a: InstIdx, b: InstIdx) -> u8 {
        if self.last_use(at, a) {
            if let Some(r) = self.ra.reg_of(a) {
                return r;
            }
        }
        if !self.is_imm(b) && self.last_use(at, b) {
            if let Some(r) = self.ra.reg_of(b) {
                return r;
            }
        }
        let class = self.class(at);
        self.find_free(class)
    }

    /// Destination of a two-operand op and the operand still to be
    /// folded into it. A commutative op takes over op2's register when
    /// op2 dies here and op1 does not.
    fn bin_dst(&mut self, at: InstIdx, inst: &Inst) -> (u8, InstIdx) {
        let (a, b) = (op1(at, inst), op2(at, inst));
        let commuted = inst.opc.is_commutative()
            && !self.last_use(at, a)
            && !self.is_imm(b)
            && self.last_use(at, b);
        if commuted {
            (self.ensure(b), a)
        } else {
            (self.reg_with(at, a), b)
        }
    }

    /// Two-operand integer instruction `dst = op1 <op> op2`.
    fn emit_bin(&mut self, at: InstIdx, inst: &Inst, op: ArithOp) {
        let (reg, other) = self.bin_dst(at, inst);
        let dst = Reg::from_u8(reg);
        if self.is_imm(other) {
            let imm = self.imm(other) as i32;
            emit_arith_ri(self.buf, op, false, dst, imm);
        } else {
            let src = self.loc(other);
            emit_arith_r_rm(self.buf, op, false, dst, src);
        }
        self.bind(reg, at);
        self.release(at);
    }

    /// Set flags for `a <cond> b`.
    fn emit_cmp(&mut self, a: InstIdx, b: InstIdx) {
        if self.is_imm(b) {
            let lhs = self.loc(a);
            let imm = self.imm(b) as i32;
            emit_arith_rm_i(self.buf, ArithOp::Cmp, false, lhs, imm);
        } else {
            let r = self.ensure(a);
            let rhs = self.loc(b);
            emit_arith_r_rm(self.buf, ArithOp::Cmp, false, Reg::from_u8(r), rhs);
        }
    }

    // -- Runtime calls --

    /// Call `func` with RCX and RDX as the first two arguments.
    ///
    /// Bound caller-saved registers are preserved in an aligned save
    /// area below the spill slots; the result is left in RAX.
    fn call_runtime(&mut self, func: usize, nargs: u8) {
        let ints: Vec<u8> = self
            .ra
            .bound(RegClass::Int)
            .into_iter()
            .map(|(r, _)| r)
            .filter(|&r| CALLER_SAVED_ALLOC.contains(r))
            .collect();
        let xmms: Vec<u8> = self
            .ra
            .bound(RegClass::Float)
            .into_iter()
            .map(|(r, _)| r)
            .collect();
        let int_base = 16 * xmms.len() as i32;
        let size = (int_base + 8 * ints.len() as i32 + 15) & !15;

        if size > 0 {
            emit_arith_ri(self.buf, ArithOp::Sub, true, Reg::Rsp, size);
        }
        for (k, &x) in xmms.iter().enumerate() {
            emit_movapd_store(self.buf, Xmm::from_u8(x), Reg::Rsp, 16 * k as i32);
        }
        for (k, &r) in ints.iter().enumerate() {
            emit_store(self.buf, true, Reg::from_u8(r), Reg::Rsp, int_base + 8 * k as i32);
        }

        if nargs > 0 {
            emit_mov_rr(self.buf, true, Reg::Rdi, Reg::Rcx);
        }
        if nargs > 1 {
            emit_mov_rr(self.buf, true, Reg::Rsi, Reg::Rdx);
        }
        self.emit_call(func);

        for (k, &r) in ints.iter().enumerate() {
            emit_load(self.buf, true, Reg::from_u8(r), Reg::Rsp, int_base + 8 * k as i32);
        }
        for (k, &x) in xmms.iter().enumerate() {
            emit_movapd(self.buf, Xmm::from_u8(x), Rm::Mem(Reg::Rsp, 16 * k as i32));
        }
        if size > 0 {
            emit_arith_ri(self.buf, ArithOp::Add, true, Reg::Rsp, size);
        }
    }

    /// `mov rax, func; call rax` with no register preservation.
    fn emit_call(&mut self, func: usize) {
        emit_mov_ri(self.buf, true, Reg::Rax, func as u64);
        emit_call_reg(self.buf, Reg::Rax);
    }

    // -- Exits --

    /// Write the resume PC, release the frame and jump to the epilogue
    /// with the exit index in EAX.
    fn emit_exit(&mut self, target: ExitTarget, pc: Pc) {
        let pc = match pc {
            Pc::Value(idx) if self.is_imm(idx) => Pc::Imm(self.imm(idx)),
            other => other,
        };
        match pc {
            Pc::Imm(v) => emit_store_imm(self.buf, false, ENV_REG, PC_OFFSET, v as i32),
            Pc::Reg(r) => emit_store(self.buf, false, r, ENV_REG, PC_OFFSET),
            Pc::Value(idx) => match self.loc(idx) {
                Rm::Reg(r) => emit_store(self.buf, false, Reg::from_u8(r), ENV_REG, PC_OFFSET),
                slot => {
                    emit_mov_r_rm(self.buf, false, Reg::Rcx, slot);
                    emit_store(self.buf, false, Reg::Rcx, ENV_REG, PC_OFFSET);
                }
            },
        }

        let fixup = emit_arith_ri32(self.buf, ArithOp::Add, true, Reg::Rsp, 0);
        self.frame_fixups.push(fixup);

        let index = self.ra.next_exit();
        emit_mov_ri(self.buf, false, Reg::Rax, index as u64);
        let jump_offset = self.buf.offset();
        emit_jmp(self.buf, self.cg.tb_ret_offset);
        self.exits.push(ExitStub {
            index,
            target,
            jump_offset,
        });
    }

    /// Exit to the address held by `dest`.
    fn emit_branch_exit(&mut self, dest: InstIdx) {
        if self.is_imm(dest) {
            let pc = self.imm(dest);
            self.emit_exit(ExitTarget::Known(pc), Pc::Imm(pc));
        } else {
            self.emit_exit(ExitTarget::Dynamic, Pc::Value(dest));
        }
    }
}

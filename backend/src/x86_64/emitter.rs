#![allow(non_upper_case_globals)]

use crate::code_buffer::CodeBuffer;
use crate::x86_64::regs::{Reg, Xmm};
use jitil_core::Cond;

// -- Prefix flags --

pub const P_EXT: u32 = 0x100; // 0x0F prefix
pub const P_EXT38: u32 = 0x200; // 0x0F 0x38 prefix
pub const P_DATA16: u32 = 0x400; // 0x66 prefix
pub const P_REXW: u32 = 0x1000; // REX.W = 1
pub const P_REXB_R: u32 = 0x2000; // REG field as byte register
pub const P_REXB_RM: u32 = 0x4000; // R/M field as byte register
pub const P_EXT3A: u32 = 0x10000; // 0x0F 0x3A prefix
pub const P_SIMDF3: u32 = 0x20000; // 0xF3 prefix
pub const P_SIMDF2: u32 = 0x40000; // 0xF2 prefix

// -- Opcode constants (OPC_*) --

// Arithmetic
pub const OPC_ARITH_EvIb: u32 = 0x83;
pub const OPC_ARITH_EvIz: u32 = 0x81;
pub const OPC_ARITH_GvEv: u32 = 0x03;
pub const OPC_ARITH_EvGv: u32 = 0x01;

// Shift
pub const OPC_SHIFT_1: u32 = 0xD1;
pub const OPC_SHIFT_Ib: u32 = 0xC1;
pub const OPC_SHIFT_cl: u32 = 0xD3;

// Data movement
pub const OPC_MOVL_EvGv: u32 = 0x89;
pub const OPC_MOVL_GvEv: u32 = 0x8B;
pub const OPC_MOVL_EvIz: u32 = 0xC7;
pub const OPC_MOVL_Iv: u32 = 0xB8;

// Extensions
pub const OPC_MOVZBL: u32 = 0xB6 | P_EXT;
pub const OPC_MOVSBL: u32 = 0xBE | P_EXT;
pub const OPC_MOVSWL: u32 = 0xBF | P_EXT;
pub const OPC_MOVSLQ: u32 = 0x63 | P_REXW;

// Branch
pub const OPC_JCC_long: u32 = 0x80 | P_EXT;
pub const OPC_JMP_long: u32 = 0xE9;

// Bit operations
pub const OPC_BSR: u32 = 0xBD | P_EXT;

// Compare / conditional
pub const OPC_CMOVCC: u32 = 0x40 | P_EXT;
pub const OPC_SETCC: u32 = 0x90 | P_EXT | P_REXB_RM;
pub const OPC_TESTL: u32 = 0x85;

// Group opcodes
pub const OPC_GRP3_Ev: u32 = 0xF7;
pub const OPC_GRP5: u32 = 0xFF;

// Multiply
pub const OPC_IMUL_GvEv: u32 = 0xAF | P_EXT;
pub const OPC_IMUL_GvEvIb: u32 = 0x6B;
pub const OPC_IMUL_GvEvIz: u32 = 0x69;

// Misc
pub const OPC_LEA: u32 = 0x8D;
pub const OPC_PUSH_r32: u32 = 0x50;
pub const OPC_POP_r32: u32 = 0x58;
pub const OPC_RET: u32 = 0xC3;
pub const OPC_UD2: u32 = 0x0B | P_EXT;

// SSE moves
pub const OPC_MOVUPD_VxWx: u32 = 0x10 | P_EXT | P_DATA16;
pub const OPC_MOVUPD_WxVx: u32 = 0x11 | P_EXT | P_DATA16;
pub const OPC_MOVAPD_VxWx: u32 = 0x28 | P_EXT | P_DATA16;
pub const OPC_MOVAPD_WxVx: u32 = 0x29 | P_EXT | P_DATA16;
pub const OPC_MOVSD_VxWx: u32 = 0x10 | P_EXT | P_SIMDF2;
pub const OPC_MOVSS_VxWx: u32 = 0x10 | P_EXT | P_SIMDF3;
pub const OPC_MOVD_VyEy: u32 = 0x6E | P_EXT | P_DATA16;
pub const OPC_MOVD_EyVy: u32 = 0x7E | P_EXT | P_DATA16;

// SSE arithmetic
pub const OPC_ADDSS: u32 = 0x58 | P_EXT | P_SIMDF3;
pub const OPC_SUBSS: u32 = 0x5C | P_EXT | P_SIMDF3;
pub const OPC_MULSS: u32 = 0x59 | P_EXT | P_SIMDF3;
pub const OPC_ADDSD: u32 = 0x58 | P_EXT | P_SIMDF2;
pub const OPC_SUBSD: u32 = 0x5C | P_EXT | P_SIMDF2;
pub const OPC_MULSD: u32 = 0x59 | P_EXT | P_SIMDF2;
pub const OPC_ADDPS: u32 = 0x58 | P_EXT;
pub const OPC_SUBPS: u32 = 0x5C | P_EXT;
pub const OPC_MULPS: u32 = 0x59 | P_EXT;
pub const OPC_UCOMISD: u32 = 0x2E | P_EXT | P_DATA16;

// SSE shuffles and logic
pub const OPC_PXOR: u32 = 0xEF | P_EXT | P_DATA16;
pub const OPC_PUNPCKLDQ: u32 = 0x62 | P_EXT | P_DATA16;
pub const OPC_UNPCKLPD: u32 = 0x14 | P_EXT | P_DATA16;
pub const OPC_SHUFPS: u32 = 0xC6 | P_EXT;
pub const OPC_SHUFPD: u32 = 0xC6 | P_EXT | P_DATA16;

// SSE conversions
pub const OPC_CVTSS2SD: u32 = 0x5A | P_EXT | P_SIMDF3;
pub const OPC_CVTSD2SS: u32 = 0x5A | P_EXT | P_SIMDF2;
pub const OPC_CVTPS2PD: u32 = 0x5A | P_EXT;
pub const OPC_CVTPD2PS: u32 = 0x5A | P_EXT | P_DATA16;

// -- Sub-operation enums --

/// Arithmetic sub-opcodes (used in /r field of 0x81/0x83 and shifted into GvEv).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ArithOp {
    Add = 0,
    Or = 1,
    Adc = 2,
    Sbb = 3,
    And = 4,
    Sub = 5,
    Xor = 6,
    Cmp = 7,
}

/// Shift sub-opcodes (used in /r field of 0xC1/0xD1/0xD3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShiftOp {
    Rol = 0,
    Ror = 1,
    Shl = 4,
    Shr = 5,
    Sar = 7,
}

/// Group 3 extension codes (used in /r field of 0xF7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Ext3Op {
    Test = 0,
    Not = 2,
    Neg = 3,
    Mul = 4,
    Imul = 5,
}

/// Group 5 extension codes (used in /r field of 0xFF).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Ext5Op {
    CallN = 2,
    JmpN = 4,
}

/// x86 condition codes for Jcc/SETcc/CMOVcc.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum X86Cond {
    Jo = 0x0,
    Jno = 0x1,
    Jb = 0x2,
    Jae = 0x3,
    Je = 0x4,
    Jne = 0x5,
    Jbe = 0x6,
    Ja = 0x7,
    Js = 0x8,
    Jns = 0x9,
    Jp = 0xA,
    Jnp = 0xB,
    Jl = 0xC,
    Jge = 0xD,
    Jle = 0xE,
    Jg = 0xF,
}

impl X86Cond {
    /// Map an IR comparison to the x86 condition code.
    pub const fn from_cond(cond: Cond) -> Self {
        match cond {
            Cond::Eq => X86Cond::Je,
            Cond::Ne => X86Cond::Jne,
            Cond::Ugt => X86Cond::Ja,
            Cond::Ult => X86Cond::Jb,
            Cond::Uge => X86Cond::Jae,
            Cond::Ule => X86Cond::Jbe,
            Cond::Sgt => X86Cond::Jg,
            Cond::Slt => X86Cond::Jl,
            Cond::Sge => X86Cond::Jge,
            Cond::Sle => X86Cond::Jle,
        }
    }

    /// Return the inverted condition.
    pub const fn invert(self) -> Self {
        // Flip the low bit
        Self::from_u8(self as u8 ^ 1)
    }

    const fn from_u8(n: u8) -> Self {
        match n & 0xF {
            0x0 => X86Cond::Jo,
            0x1 => X86Cond::Jno,
            0x2 => X86Cond::Jb,
            0x3 => X86Cond::Jae,
            0x4 => X86Cond::Je,
            0x5 => X86Cond::Jne,
            0x6 => X86Cond::Jbe,
            0x7 => X86Cond::Ja,
            0x8 => X86Cond::Js,
            0x9 => X86Cond::Jns,
            0xA => X86Cond::Jp,
            0xB => X86Cond::Jnp,
            0xC => X86Cond::Jl,
            0xD => X86Cond::Jge,
            0xE => X86Cond::Jle,
            _ => X86Cond::Jg,
        }
    }
}

/// A register or `[base + disp]` memory operand for the ModR/M r/m
/// field. Register numbers are raw (GPR or XMM, depending on opcode).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rm {
    Reg(u8),
    Mem(Reg, i32),
}

impl From<Reg> for Rm {
    fn from(r: Reg) -> Rm {
        Rm::Reg(r as u8)
    }
}

impl From<Xmm> for Rm {
    fn from(x: Xmm) -> Rm {
        Rm::Reg(x as u8)
    }
}

/// Unresolved forward branch: offset of its rel32 field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Fixup(usize);

impl Fixup {
    pub fn offset(self) -> usize {
        self.0
    }
}

// -- Core encoding functions --

/// Helper: return P_REXW if `rexw` is true.
#[inline]
fn rexw_flag(rexw: bool) -> u32 {
    if rexw {
        P_REXW
    } else {
        0
    }
}

/// Emit opcode with REX prefix. `r` is the reg field, `rm` is the r/m field.
/// Both are raw register numbers (0-15). Pass 0 for unused fields.
pub fn emit_opc(buf: &mut CodeBuffer, opc: u32, r: u8, rm: u8) {
    let mut rex: u8 = 0;
    if opc & P_REXW != 0 {
        rex |= 0x08; // REX.W
    }
    if r >= 8 {
        rex |= 0x04; // REX.R
    }
    if rm >= 8 {
        rex |= 0x01; // REX.B
    }
    // SPL/BPL/SIL/DIL need a REX prefix to be addressable as bytes.
    if opc & P_REXB_R != 0 && r >= 4 && rex == 0 {
        rex = 0x40;
    }
    if opc & P_REXB_RM != 0 && rm >= 4 && rex == 0 {
        rex = 0x40;
    }

    // Mandatory prefixes precede REX.
    if opc & P_DATA16 != 0 {
        buf.emit_u8(0x66);
    }
    if opc & P_SIMDF3 != 0 {
        buf.emit_u8(0xF3);
    } else if opc & P_SIMDF2 != 0 {
        buf.emit_u8(0xF2);
    }

    if rex != 0 {
        buf.emit_u8(0x40 | rex);
    }

    if opc & (P_EXT | P_EXT38 | P_EXT3A) != 0 {
        buf.emit_u8(0x0F);
        if opc & P_EXT38 != 0 {
            buf.emit_u8(0x38);
        } else if opc & P_EXT3A != 0 {
            buf.emit_u8(0x3A);
        }
    }

    buf.emit_u8(opc as u8);
}

/// Emit opcode + ModR/M for a register-register operation.
pub fn emit_modrm(buf: &mut CodeBuffer, opc: u32, r: u8, rm: u8) {
    emit_opc(buf, opc, r, rm);
    buf.emit_u8(0xC0 | ((r & 7) << 3) | (rm & 7));
}

/// Emit opcode + ModR/M + displacement for memory [base + offset].
/// RBP/R13 need an explicit disp8, RSP/R12 need a SIB byte.
pub fn emit_modrm_offset(buf: &mut CodeBuffer, opc: u32, r: u8, base: Reg, offset: i32) {
    emit_opc(buf, opc, r, base as u8);

    let r3 = r & 7;
    let b3 = base.low3();

    if offset == 0 && b3 != 5 {
        // [base], mod=00
        if b3 == 4 {
            buf.emit_u8((r3 << 3) | 0x04);
            buf.emit_u8(0x24); // SIB: index=none, base=RSP
        } else {
            buf.emit_u8((r3 << 3) | b3);
        }
    } else if (-128..=127).contains(&offset) {
        // [base + disp8], mod=01
        if b3 == 4 {
            buf.emit_u8(0x44 | (r3 << 3));
            buf.emit_u8(0x24);
        } else {
            buf.emit_u8(0x40 | (r3 << 3) | b3);
        }
        buf.emit_u8(offset as u8);
    } else {
        // [base + disp32], mod=10
        if b3 == 4 {
            buf.emit_u8(0x84 | (r3 << 3));
            buf.emit_u8(0x24);
        } else {
            buf.emit_u8(0x80 | (r3 << 3) | b3);
        }
        buf.emit_u32(offset as u32);
    }
}

/// Emit opcode + ModR/M for either operand form.
pub fn emit_modrm_rm(buf: &mut CodeBuffer, opc: u32, r: u8, rm: Rm) {
    match rm {
        Rm::Reg(n) => emit_modrm(buf, opc, r, n),
        Rm::Mem(base, offset) => emit_modrm_offset(buf, opc, r, base, offset),
    }
}

// -- Arithmetic instructions --

/// Emit arithmetic reg, reg (ADD/SUB/AND/OR/XOR/CMP/ADC/SBB).
pub fn emit_arith_rr(buf: &mut CodeBuffer, op: ArithOp, rexw: bool, dst: Reg, src: Reg) {
    emit_arith_r_rm(buf, op, rexw, dst, src.into());
}

/// Emit arithmetic reg, r/m.
pub fn emit_arith_r_rm(buf: &mut CodeBuffer, op: ArithOp, rexw: bool, dst: Reg, src: Rm) {
    let opc = (OPC_ARITH_GvEv + ((op as u32) << 3)) | rexw_flag(rexw);
    emit_modrm_rm(buf, opc, dst as u8, src);
}

/// Emit arithmetic r/m, reg.
pub fn emit_arith_rm_r(buf: &mut CodeBuffer, op: ArithOp, rexw: bool, dst: Rm, src: Reg) {
    let opc = (OPC_ARITH_EvGv + ((op as u32) << 3)) | rexw_flag(rexw);
    emit_modrm_rm(buf, opc, src as u8, dst);
}

/// Emit arithmetic r/m, imm (auto-selects imm8 vs imm32).
pub fn emit_arith_rm_i(buf: &mut CodeBuffer, op: ArithOp, rexw: bool, dst: Rm, imm: i32) {
    let w = rexw_flag(rexw);
    if (-128..=127).contains(&imm) {
        emit_modrm_rm(buf, OPC_ARITH_EvIb | w, op as u8, dst);
        buf.emit_u8(imm as u8);
    } else {
        emit_modrm_rm(buf, OPC_ARITH_EvIz | w, op as u8, dst);
        buf.emit_u32(imm as u32);
    }
}

/// Emit arithmetic reg, imm (auto-selects imm8 vs imm32).
pub fn emit_arith_ri(buf: &mut CodeBuffer, op: ArithOp, rexw: bool, dst: Reg, imm: i32) {
    emit_arith_rm_i(buf, op, rexw, dst.into(), imm);
}

/// Emit arithmetic reg, imm32 with the long form regardless of the
/// value. Returns the offset of the immediate for later patching.
pub fn emit_arith_ri32(buf: &mut CodeBuffer, op: ArithOp, rexw: bool, dst: Reg, imm: i32) -> usize {
    emit_modrm(buf, OPC_ARITH_EvIz | rexw_flag(rexw), op as u8, dst as u8);
    let at = buf.offset();
    buf.emit_u32(imm as u32);
    at
}

/// Emit NOT reg.
pub fn emit_not(buf: &mut CodeBuffer, rexw: bool, reg: Reg) {
    emit_modrm(buf, OPC_GRP3_Ev | rexw_flag(rexw), Ext3Op::Not as u8, reg as u8);
}

// -- Shift instructions --

/// Emit shift reg, imm8.
pub fn emit_shift_ri(buf: &mut CodeBuffer, op: ShiftOp, rexw: bool, dst: Reg, imm: u8) {
    let w = rexw_flag(rexw);
    if imm == 1 {
        emit_modrm(buf, OPC_SHIFT_1 | w, op as u8, dst as u8);
    } else {
        emit_modrm(buf, OPC_SHIFT_Ib | w, op as u8, dst as u8);
        buf.emit_u8(imm);
    }
}

/// Emit shift reg, CL.
pub fn emit_shift_cl(buf: &mut CodeBuffer, op: ShiftOp, rexw: bool, dst: Reg) {
    emit_modrm(buf, OPC_SHIFT_cl | rexw_flag(rexw), op as u8, dst as u8);
}

// -- Data movement --

/// Emit MOV reg, reg (32-bit or 64-bit).
pub fn emit_mov_rr(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Reg) {
    emit_modrm(buf, OPC_MOVL_EvGv | rexw_flag(rexw), src as u8, dst as u8);
}

/// Emit MOV reg, r/m.
pub fn emit_mov_r_rm(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Rm) {
    match src {
        Rm::Reg(n) => emit_mov_rr(buf, rexw, dst, Reg::from_u8(n)),
        Rm::Mem(base, offset) => emit_load(buf, rexw, dst, base, offset),
    }
}

/// Emit MOV reg, imm (32-bit or 64-bit).
pub fn emit_mov_ri(buf: &mut CodeBuffer, rexw: bool, reg: Reg, val: u64) {
    if val == 0 {
        emit_modrm(buf, 0x31, reg as u8, reg as u8);
    } else if !rexw || val <= u32::MAX as u64 {
        emit_opc(buf, OPC_MOVL_Iv + (reg.low3() as u32), 0, reg as u8);
        buf.emit_u32(val as u32);
    } else if val as i64 >= i32::MIN as i64 && val as i64 <= i32::MAX as i64 {
        emit_modrm(buf, OPC_MOVL_EvIz | P_REXW, 0, reg as u8);
        buf.emit_u32(val as u32);
    } else {
        emit_opc(buf, (OPC_MOVL_Iv + (reg.low3() as u32)) | P_REXW, 0, reg as u8);
        buf.emit_u64(val);
    }
}

/// Emit zero-extend: MOVZBL or MOVZWL.
pub fn emit_movzx(buf: &mut CodeBuffer, opc: u32, dst: Reg, src: Reg) {
    emit_modrm(buf, opc, dst as u8, src as u8);
}

/// Emit sign-extend: MOVSBL, MOVSWL, or MOVSLQ, from a register or memory.
pub fn emit_movsx(buf: &mut CodeBuffer, opc: u32, dst: Reg, src: Rm) {
    emit_modrm_rm(buf, opc, dst as u8, src);
}

// -- Memory operations --

/// Emit MOV reg, [base+offset] (load).
pub fn emit_load(buf: &mut CodeBuffer, rexw: bool, dst: Reg, base: Reg, offset: i32) {
    emit_modrm_offset(buf, OPC_MOVL_GvEv | rexw_flag(rexw), dst as u8, base, offset);
}

/// Emit MOV [base+offset], reg (store).
pub fn emit_store(buf: &mut CodeBuffer, rexw: bool, src: Reg, base: Reg, offset: i32) {
    emit_modrm_offset(buf, OPC_MOVL_EvGv | rexw_flag(rexw), src as u8, base, offset);
}

/// Emit MOV [base+offset], imm32 (store immediate).
pub fn emit_store_imm(buf: &mut CodeBuffer, rexw: bool, base: Reg, offset: i32, imm: i32) {
    emit_modrm_offset(buf, OPC_MOVL_EvIz | rexw_flag(rexw), 0, base, offset);
    buf.emit_u32(imm as u32);
}

/// Emit LEA dst, [base+offset].
pub fn emit_lea(buf: &mut CodeBuffer, rexw: bool, dst: Reg, base: Reg, offset: i32) {
    emit_modrm_offset(buf, OPC_LEA | rexw_flag(rexw), dst as u8, base, offset);
}

// -- Multiply --

/// Emit single-operand MUL (unsigned): EDX:EAX = EAX * r/m.
pub fn emit_mul(buf: &mut CodeBuffer, rexw: bool, src: Rm) {
    emit_modrm_rm(buf, OPC_GRP3_Ev | rexw_flag(rexw), Ext3Op::Mul as u8, src);
}

/// Emit two-operand IMUL: dst = dst * r/m.
pub fn emit_imul_r_rm(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Rm) {
    emit_modrm_rm(buf, OPC_IMUL_GvEv | rexw_flag(rexw), dst as u8, src);
}

/// Emit three-operand IMUL: dst = src * imm.
pub fn emit_imul_ri(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Reg, imm: i32) {
    let w = rexw_flag(rexw);
    if (-128..=127).contains(&imm) {
        emit_modrm(buf, OPC_IMUL_GvEvIb | w, dst as u8, src as u8);
        buf.emit_u8(imm as u8);
    } else {
        emit_modrm(buf, OPC_IMUL_GvEvIz | w, dst as u8, src as u8);
        buf.emit_u32(imm as u32);
    }
}

// -- Bit operations --

/// Emit BSR dst, r/m (bit scan reverse).
pub fn emit_bsr(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Rm) {
    emit_modrm_rm(buf, OPC_BSR | rexw_flag(rexw), dst as u8, src);
}

// -- Branches and comparisons --

/// Emit JMP rel32 to absolute offset.
pub fn emit_jmp(buf: &mut CodeBuffer, target_offset: usize) {
    buf.emit_u8(OPC_JMP_long as u8);
    let after = buf.offset() + 4;
    let disp = target_offset as i64 - after as i64;
    buf.emit_u32(disp as u32);
}

/// Emit Jcc rel32 with an unresolved target.
pub fn emit_jcc_fwd(buf: &mut CodeBuffer, cond: X86Cond) -> Fixup {
    emit_opc(buf, OPC_JCC_long + (cond as u32), 0, 0);
    let at = buf.offset();
    buf.emit_u32(0);
    Fixup(at)
}

/// Emit JMP rel32 with an unresolved target.
pub fn emit_jmp_fwd(buf: &mut CodeBuffer) -> Fixup {
    buf.emit_u8(OPC_JMP_long as u8);
    let at = buf.offset();
    buf.emit_u32(0);
    Fixup(at)
}

/// Resolve a forward branch to the current position.
pub fn set_jump_target(buf: &mut CodeBuffer, fixup: Fixup) {
    let disp = buf.offset() as i64 - (fixup.0 as i64 + 4);
    buf.patch_u32(fixup.0, disp as u32);
}

/// Emit indirect JMP through register.
pub fn emit_jmp_reg(buf: &mut CodeBuffer, reg: Reg) {
    emit_modrm(buf, OPC_GRP5, Ext5Op::JmpN as u8, reg as u8);
}

/// Emit indirect CALL through register.
pub fn emit_call_reg(buf: &mut CodeBuffer, reg: Reg) {
    emit_modrm(buf, OPC_GRP5, Ext5Op::CallN as u8, reg as u8);
}

/// Emit SETcc dst (set byte on condition).
pub fn emit_setcc(buf: &mut CodeBuffer, cond: X86Cond, dst: Reg) {
    emit_modrm(buf, OPC_SETCC + (cond as u32), 0, dst as u8);
}

/// Emit CMOVcc dst, src (conditional move).
pub fn emit_cmovcc(buf: &mut CodeBuffer, cond: X86Cond, rexw: bool, dst: Reg, src: Reg) {
    emit_modrm(buf, (OPC_CMOVCC + (cond as u32)) | rexw_flag(rexw), dst as u8, src as u8);
}

/// Emit TEST reg, reg.
pub fn emit_test_rr(buf: &mut CodeBuffer, rexw: bool, r1: Reg, r2: Reg) {
    emit_modrm(buf, OPC_TESTL | rexw_flag(rexw), r2 as u8, r1 as u8);
}

/// Emit TEST r/m, reg.
pub fn emit_test_rm_r(buf: &mut CodeBuffer, rexw: bool, rm: Rm, reg: Reg) {
    emit_modrm_rm(buf, OPC_TESTL | rexw_flag(rexw), reg as u8, rm);
}

/// Emit TEST r/m, imm32.
pub fn emit_test_rm_i(buf: &mut CodeBuffer, rexw: bool, rm: Rm, imm: u32) {
    emit_modrm_rm(buf, OPC_GRP3_Ev | rexw_flag(rexw), Ext3Op::Test as u8, rm);
    buf.emit_u32(imm);
}

// -- SSE --

/// Emit an SSE instruction `xmm <- op r/m`.
pub fn emit_sse(buf: &mut CodeBuffer, opc: u32, dst: Xmm, src: Rm) {
    emit_modrm_rm(buf, opc, dst as u8, src);
}

/// Emit an SSE instruction with a trailing imm8 (SHUFPS/SHUFPD).
pub fn emit_sse_ib(buf: &mut CodeBuffer, opc: u32, dst: Xmm, src: Rm, imm: u8) {
    emit_modrm_rm(buf, opc, dst as u8, src);
    buf.emit_u8(imm);
}

/// Emit MOVAPD dst, src (register copy or aligned 16-byte load).
pub fn emit_movapd(buf: &mut CodeBuffer, dst: Xmm, src: Rm) {
    if src == Rm::Reg(dst as u8) {
        return;
    }
    emit_sse(buf, OPC_MOVAPD_VxWx, dst, src);
}

/// Emit MOVAPD [base+offset], src (aligned 16-byte store).
pub fn emit_movapd_store(buf: &mut CodeBuffer, src: Xmm, base: Reg, offset: i32) {
    emit_modrm_offset(buf, OPC_MOVAPD_WxVx, src as u8, base, offset);
}

/// Emit MOVUPD dst, [base+offset] (unaligned 16-byte load).
pub fn emit_movupd_load(buf: &mut CodeBuffer, dst: Xmm, base: Reg, offset: i32) {
    emit_modrm_offset(buf, OPC_MOVUPD_VxWx, dst as u8, base, offset);
}

/// Emit MOVUPD [base+offset], src (unaligned 16-byte store).
pub fn emit_movupd_store(buf: &mut CodeBuffer, src: Xmm, base: Reg, offset: i32) {
    emit_modrm_offset(buf, OPC_MOVUPD_WxVx, src as u8, base, offset);
}

/// Emit MOVD/MOVQ xmm, gpr.
pub fn emit_movd_to_xmm(buf: &mut CodeBuffer, rexw: bool, dst: Xmm, src: Reg) {
    emit_modrm(buf, OPC_MOVD_VyEy | rexw_flag(rexw), dst as u8, src as u8);
}

/// Emit MOVD/MOVQ gpr, xmm.
pub fn emit_movd_from_xmm(buf: &mut CodeBuffer, rexw: bool, dst: Reg, src: Xmm) {
    emit_modrm(buf, OPC_MOVD_EyVy | rexw_flag(rexw), src as u8, dst as u8);
}

// -- Miscellaneous --

/// Emit PUSH reg.
pub fn emit_push(buf: &mut CodeBuffer, reg: Reg) {
    emit_opc(buf, OPC_PUSH_r32 + (reg.low3() as u32), 0, reg as u8);
}

/// Emit POP reg.
pub fn emit_pop(buf: &mut CodeBuffer, reg: Reg) {
    emit_opc(buf, OPC_POP_r32 + (reg.low3() as u32), 0, reg as u8);
}

/// Emit RET.
pub fn emit_ret(buf: &mut CodeBuffer) {
    buf.emit_u8(OPC_RET as u8);
}

/// Emit UD2 (undefined instruction trap).
pub fn emit_ud2(buf: &mut CodeBuffer) {
    emit_opc(buf, OPC_UD2, 0, 0);
}

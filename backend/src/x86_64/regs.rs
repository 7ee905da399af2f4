use jitil_core::RegSet;

/// x86-64 general-purpose register indices.
///
/// Encoding matches the x86-64 ModR/M and REX register numbering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Reg {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

const ALL_REGS: [Reg; 16] = [
    Reg::Rax,
    Reg::Rcx,
    Reg::Rdx,
    Reg::Rbx,
    Reg::Rsp,
    Reg::Rbp,
    Reg::Rsi,
    Reg::Rdi,
    Reg::R8,
    Reg::R9,
    Reg::R10,
    Reg::R11,
    Reg::R12,
    Reg::R13,
    Reg::R14,
    Reg::R15,
];

impl Reg {
    /// Register with the given hardware number (low 4 bits).
    #[inline]
    pub const fn from_u8(n: u8) -> Reg {
        ALL_REGS[(n & 0xF) as usize]
    }

    /// Low 3 bits of the register encoding (for ModR/M).
    #[inline]
    pub const fn low3(self) -> u8 {
        (self as u8) & 0x7
    }

    /// Whether this register requires a REX prefix (R8-R15).
    #[inline]
    pub const fn needs_rex(self) -> bool {
        (self as u8) >= 8
    }
}

/// SSE register indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Xmm {
    Xmm0 = 0,
    Xmm1,
    Xmm2,
    Xmm3,
    Xmm4,
    Xmm5,
    Xmm6,
    Xmm7,
    Xmm8,
    Xmm9,
    Xmm10,
    Xmm11,
    Xmm12,
    Xmm13,
    Xmm14,
    Xmm15,
}

const ALL_XMMS: [Xmm; 16] = [
    Xmm::Xmm0,
    Xmm::Xmm1,
    Xmm::Xmm2,
    Xmm::Xmm3,
    Xmm::Xmm4,
    Xmm::Xmm5,
    Xmm::Xmm6,
    Xmm::Xmm7,
    Xmm::Xmm8,
    Xmm::Xmm9,
    Xmm::Xmm10,
    Xmm::Xmm11,
    Xmm::Xmm12,
    Xmm::Xmm13,
    Xmm::Xmm14,
    Xmm::Xmm15,
];

impl Xmm {
    #[inline]
    pub const fn from_u8(n: u8) -> Xmm {
        ALL_XMMS[(n & 0xF) as usize]
    }
}

/// RBP: pointer to the guest state for the whole block.
pub const ENV_REG: Reg = Reg::Rbp;

/// Callee-saved registers that the prologue must save/restore.
/// Order matches the System V ABI callee-saved set.
pub const CALLEE_SAVED: &[Reg] = &[Reg::Rbp, Reg::Rbx, Reg::R12, Reg::R13, Reg::R14, Reg::R15];

/// Function argument registers (System V AMD64 ABI).
pub const CALL_ARG_REGS: &[Reg] = &[Reg::Rdi, Reg::Rsi, Reg::Rdx, Reg::Rcx, Reg::R8, Reg::R9];

/// Allocatable registers clobbered by a call; saved around runtime calls.
pub const CALLER_SAVED_ALLOC: RegSet = RegSet::from_regs(&[
    Reg::Rsi as u8,
    Reg::Rdi as u8,
    Reg::R8 as u8,
    Reg::R9 as u8,
    Reg::R10 as u8,
    Reg::R11 as u8,
]);

/// Integer registers never handed out by the allocator: the stack
/// pointer, the guest-state pointer and the three scratch registers.
pub const RESERVED_REGS: RegSet = RegSet::from_regs(&[
    Reg::Rsp as u8,
    Reg::Rbp as u8,
    Reg::Rax as u8,
    Reg::Rcx as u8,
    Reg::Rdx as u8,
]);

/// Float scratch registers, never allocated.
pub const RESERVED_XMMS: RegSet = RegSet::from_regs(&[Xmm::Xmm0 as u8, Xmm::Xmm1 as u8]);

/// Default integer allocation order: callee-saved first.
pub const INT_ALLOC_ORDER: &[Reg] = &[
    Reg::Rbx,
    Reg::R12,
    Reg::R13,
    Reg::R14,
    Reg::R15,
    Reg::Rsi,
    Reg::Rdi,
    Reg::R8,
    Reg::R9,
    Reg::R10,
    Reg::R11,
];

/// Default float allocation order.
pub const FLOAT_ALLOC_ORDER: &[Xmm] = &[
    Xmm::Xmm2,
    Xmm::Xmm3,
    Xmm::Xmm4,
    Xmm::Xmm5,
    Xmm::Xmm6,
    Xmm::Xmm7,
    Xmm::Xmm8,
    Xmm::Xmm9,
    Xmm::Xmm10,
    Xmm::Xmm11,
    Xmm::Xmm12,
    Xmm::Xmm13,
    Xmm::Xmm14,
    Xmm::Xmm15,
];

pub const STACK_ALIGN: usize = 16;

/// Total push size: return address (implicit) + callee-saved pushes.
pub const PUSH_SIZE: usize = (1 + CALLEE_SAVED.len()) * 8;

/// Stack adjustment after the pushes so that block code runs with
/// a 16-byte aligned stack pointer.
pub const STACK_ADDEND: usize = {
    let aligned = (PUSH_SIZE + STACK_ALIGN - 1) & !(STACK_ALIGN - 1);
    aligned - PUSH_SIZE
};

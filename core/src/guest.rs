//! Guest CPU state layout.
//!
//! Compiled code addresses every field relative to the state pointer
//! held in a fixed host register, so the layout is `repr(C)` and the
//! offsets below are the contract between the front end and the
//! back end.

use std::mem::offset_of;

/// Exception bits in [`GuestState::exceptions`].
pub const EXCEPTION_DECREMENTER: u32 = 0x0000_0001;
pub const EXCEPTION_SYSCALL: u32 = 0x0000_0002;
pub const EXCEPTION_EXTERNAL_INT: u32 = 0x0000_0004;
pub const EXCEPTION_DSI: u32 = 0x0000_0008;
pub const EXCEPTION_ISI: u32 = 0x0000_0010;
pub const EXCEPTION_ALIGNMENT: u32 = 0x0000_0020;
pub const EXCEPTION_FPU_UNAVAILABLE: u32 = 0x0000_0040;
pub const EXCEPTION_PROGRAM: u32 = 0x0000_0080;

/// Exceptions that must be delivered before an external interrupt.
pub const EXCEPTION_SYNC_MASK: u32 = EXCEPTION_ISI
    | EXCEPTION_PROGRAM
    | EXCEPTION_SYSCALL
    | EXCEPTION_FPU_UNAVAILABLE
    | EXCEPTION_DSI
    | EXCEPTION_ALIGNMENT;

/// Carry bit of XER.
pub const XER_CA_SHIFT: u32 = 29;
/// External interrupt enable.
pub const MSR_EE: u32 = 0x0000_8000;
/// Floating point available.
pub const MSR_FP: u32 = 1 << 13;

pub const FPSCR_FX: u32 = 1 << 31;
pub const FPSCR_VXSNAN: u32 = 1 << 24;
pub const FPSCR_VXVC: u32 = 1 << 19;
pub const FPSCR_VE: u32 = 1 << 7;

/// MSR bits restored from SRR1 on return from interrupt.
pub const RFI_MSR_MASK: u32 = 0x87C0_FFFF;
/// MSR bit cleared after the restore.
pub const RFI_MSR_CLEAR: u32 = 0xFFFB_FFFF;

/// Emulated CPU registers.
#[derive(Debug, Clone, Default)]
#[repr(C, align(16))]
pub struct GuestState {
    /// Paired-single / double registers, `[ps0, ps1]`.
    pub ps: [[f64; 2]; 32],
    pub gpr: [u32; 32],
    /// Condition register fields in 64-bit fast form.
    pub cr_val: [u64; 8],
    pub pc: u32,
    pub npc: u32,
    pub msr: u32,
    pub ctr: u32,
    pub lr: u32,
    pub xer: u32,
    pub srr0: u32,
    pub srr1: u32,
    pub fpscr: u32,
    pub exceptions: u32,
    pub downcount: i32,
    pub gqr: [u32; 8],
}

impl GuestState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Carry flag as 0 or 1.
    pub fn carry(&self) -> u32 {
        (self.xer >> XER_CA_SHIFT) & 1
    }

    pub fn set_carry(&mut self, ca: bool) {
        self.xer = (self.xer & !(1 << XER_CA_SHIFT)) | ((ca as u32) << XER_CA_SHIFT);
    }
}

const fn off(field: usize) -> i32 {
    field as i32
}

pub const fn ps_offset(reg: usize) -> i32 {
    off(offset_of!(GuestState, ps) + reg * 16)
}

pub const fn gpr_offset(reg: usize) -> i32 {
    off(offset_of!(GuestState, gpr) + reg * 4)
}

pub const fn cr_offset(field: usize) -> i32 {
    off(offset_of!(GuestState, cr_val) + field * 8)
}

pub const fn gqr_offset(reg: usize) -> i32 {
    off(offset_of!(GuestState, gqr) + reg * 4)
}

pub const fn srr_offset(which: usize) -> i32 {
    if which == 0 {
        off(offset_of!(GuestState, srr0))
    } else {
        off(offset_of!(GuestState, srr1))
    }
}

pub const PC_OFFSET: i32 = off(offset_of!(GuestState, pc));
pub const NPC_OFFSET: i32 = off(offset_of!(GuestState, npc));
pub const MSR_OFFSET: i32 = off(offset_of!(GuestState, msr));
pub const CTR_OFFSET: i32 = off(offset_of!(GuestState, ctr));
pub const LR_OFFSET: i32 = off(offset_of!(GuestState, lr));
pub const XER_OFFSET: i32 = off(offset_of!(GuestState, xer));
pub const SRR0_OFFSET: i32 = off(offset_of!(GuestState, srr0));
pub const SRR1_OFFSET: i32 = off(offset_of!(GuestState, srr1));
pub const FPSCR_OFFSET: i32 = off(offset_of!(GuestState, fpscr));
pub const EXCEPTIONS_OFFSET: i32 = off(offset_of!(GuestState, exceptions));
pub const DOWNCOUNT_OFFSET: i32 = off(offset_of!(GuestState, downcount));

//! Hooks called from compiled code.
//!
//! Every guest memory access, the interpreter fallback, the idle
//! notification and the SNaN test go through these function pointers.
//! The generated code follows the System V ABI: the first argument in
//! RDI, the second in RSI, the result in RAX.

pub type ReadFn = extern "C" fn(addr: u32) -> u32;
pub type Read64Fn = extern "C" fn(addr: u32) -> u64;
pub type WriteFn = extern "C" fn(addr: u32, value: u32);
pub type Write64Fn = extern "C" fn(addr: u32, value: u64);
pub type InterpretFn = extern "C" fn(inst: u32);
pub type IdleFn = extern "C" fn();
pub type CheckSnanFn = extern "C" fn(a: u64, b: u64) -> u32;

/// Table of runtime entry points baked into compiled code.
///
/// Addresses are embedded as 64-bit immediates, so the functions must
/// outlive every block compiled against this table.
#[derive(Debug, Clone, Copy)]
pub struct Runtime {
    pub read_u8: ReadFn,
    pub read_u16: ReadFn,
    pub read_u32: ReadFn,
    pub read_u64: Read64Fn,
    pub write_u8: WriteFn,
    pub write_u16: WriteFn,
    pub write_u32: WriteFn,
    pub write_u64: Write64Fn,
    /// Execute one guest instruction word.
    pub interpret: InterpretFn,
    /// Called when the guest spins in a recognised idle loop.
    pub idle: IdleFn,
    /// Non-zero if either double (raw bits) is a signalling NaN.
    pub check_snan: CheckSnanFn,
}

const DOUBLE_EXP_MASK: u64 = 0x7FF0_0000_0000_0000;
const DOUBLE_FRAC_MASK: u64 = 0x000F_FFFF_FFFF_FFFF;
const DOUBLE_QUIET_BIT: u64 = 0x0008_0000_0000_0000;

/// True if `bits` encodes a signalling NaN.
pub fn is_snan(bits: u64) -> bool {
    bits & DOUBLE_EXP_MASK == DOUBLE_EXP_MASK
        && bits & DOUBLE_FRAC_MASK != 0
        && bits & DOUBLE_QUIET_BIT == 0
}

pub extern "C" fn default_check_snan(a: u64, b: u64) -> u32 {
    (is_snan(a) || is_snan(b)) as u32
}

extern "C" fn read_zero(_addr: u32) -> u32 {
    0
}

extern "C" fn read_zero64(_addr: u32) -> u64 {
    0
}

extern "C" fn write_ignore(_addr: u32, _value: u32) {}

extern "C" fn write_ignore64(_addr: u32, _value: u64) {}

extern "C" fn interpret_ignore(_inst: u32) {}

extern "C" fn idle_ignore() {}

impl Runtime {
    /// Replace the memory hooks, keeping the rest.
    pub fn with_memory(
        mut self,
        read: [ReadFn; 3],
        read_u64: Read64Fn,
        write: [WriteFn; 3],
        write_u64: Write64Fn,
    ) -> Self {
        [self.read_u8, self.read_u16, self.read_u32] = read;
        self.read_u64 = read_u64;
        [self.write_u8, self.write_u16, self.write_u32] = write;
        self.write_u64 = write_u64;
        self
    }

    pub fn with_interpreter(mut self, interpret: InterpretFn) -> Self {
        self.interpret = interpret;
        self
    }

    pub fn with_idle(mut self, idle: IdleFn) -> Self {
        self.idle = idle;
        self
    }
}

impl Default for Runtime {
    /// Hooks that read zero and ignore writes.
    fn default() -> Self {
        Self {
            read_u8: read_zero,
            read_u16: read_zero,
            read_u32: read_zero,
            read_u64: read_zero64,
            write_u8: write_ignore,
            write_u16: write_ignore,
            write_u32: write_ignore,
            write_u64: write_ignore64,
            interpret: interpret_ignore,
            idle: idle_ignore,
            check_snan: default_check_snan,
        }
    }
}

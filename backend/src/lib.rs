pub mod code_buffer;
pub mod config;
pub mod error;
pub mod exit;
pub mod liveness;
pub mod regalloc;
pub mod runtime;
pub mod translate;
pub mod x86_64;

pub use code_buffer::CodeBuffer;
pub use config::{BackendConfig, ConfigError};
pub use error::{BackendError, BackendResult};
pub use exit::{CompiledBlock, ExitStub, ExitTarget};
pub use liveness::Liveness;
pub use regalloc::{AllocState, AllocStats, Loc, SpillSlot};
pub use runtime::Runtime;
pub use translate::{compile_block, Translator};
pub use x86_64::X86_64CodeGen;

use jitil_core::Block;

/// Host register pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegClass {
    /// General-purpose registers.
    Int,
    /// Vector registers holding float and paired-single values.
    Float,
}

/// Trait for host architecture code generators.
///
/// The allocator is host independent and emits its spill traffic
/// through `out_spill` / `out_reload`; everything else a block needs
/// is produced by `lower_block`.
pub trait HostCodeGen {
    /// Emit the prologue: save callee-saved registers, set up the
    /// guest-state pointer, align the stack, jump to block code.
    fn emit_prologue(&mut self, buf: &mut CodeBuffer);

    /// Emit the epilogue every exit jumps to: restore callee-saved
    /// registers and return the exit index to the caller.
    fn emit_epilogue(&mut self, buf: &mut CodeBuffer);

    /// Patch a direct jump at `jump_offset` to point to
    /// `target_offset`. Used for block chaining.
    fn patch_jump(&self, buf: &mut CodeBuffer, jump_offset: usize, target_offset: usize);

    /// Offset of the prologue, the entry point called from Rust.
    fn prologue_offset(&self) -> usize;

    /// Offset of the shared exit path.
    fn epilogue_offset(&self) -> usize;

    /// Store `reg` of `class` to spill slot `slot`.
    fn out_spill(&self, buf: &mut CodeBuffer, class: RegClass, reg: u8, slot: SpillSlot);

    /// Load spill slot `slot` into `reg` of `class`.
    fn out_reload(&self, buf: &mut CodeBuffer, class: RegClass, reg: u8, slot: SpillSlot);

    /// Allocate registers and generate code for a whole block.
    fn lower_block(
        &self,
        buf: &mut CodeBuffer,
        block: &Block,
        live: &Liveness,
        config: &BackendConfig,
    ) -> CompiledBlock;
}

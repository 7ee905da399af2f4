use jitil_core::dump::dump_block_with;
use jitil_core::{Block, GuestState};

use crate::code_buffer::CodeBuffer;
use crate::config::BackendConfig;
use crate::error::{BackendError, BackendResult};
use crate::exit::{CompiledBlock, ExitTarget};
use crate::liveness::Liveness;
use crate::x86_64::X86_64CodeGen;
use crate::HostCodeGen;

/// Upper bound of host bytes per IR instruction, spill traffic and
/// runtime call windows included.
const MAX_BYTES_PER_INST: usize = 512;
/// Frame setup, the final exit and the trap after it.
const BLOCK_OVERHEAD: usize = 64;

/// Bytes reserved before compiling `block`.
pub fn worst_case_size(block: &Block) -> usize {
    block.len() * MAX_BYTES_PER_INST + BLOCK_OVERHEAD
}

/// Full pipeline for one block: liveness, then allocation and
/// instruction selection in a single forward pass.
///
/// The buffer must be writable. Panics if the block fails
/// verification.
pub fn compile_block(
    block: &Block,
    backend: &impl HostCodeGen,
    buf: &mut CodeBuffer,
    config: &BackendConfig,
) -> CompiledBlock {
    if let Err(e) = block.verify() {
        log::error!("block 0x{:08x} rejected: {e}", block.start_pc);
        panic!("block 0x{:08x} failed verification: {e}", block.start_pc);
    }

    let live = Liveness::analyze(block);
    if config.dump_ir {
        log::debug!("{}", annotated_dump(block, &live));
    }

    let compiled = backend.lower_block(buf, block, &live, config);
    log::debug!(
        "compiled block 0x{:08x}: {} insts -> {} bytes at {:#x}, {} exits, frame {}",
        block.start_pc,
        block.len(),
        compiled.size,
        compiled.entry,
        compiled.exits.len(),
        compiled.frame_size,
    );
    compiled
}

fn annotated_dump(block: &Block, live: &Liveness) -> String {
    let mut out = Vec::new();
    let res = dump_block_with(block, &mut out, |idx, w| {
        if live.needs_code(block, idx) {
            Ok(())
        } else {
            write!(w, "  (dead)")
        }
    });
    if let Err(e) = res {
        log::warn!("IR dump failed: {e}");
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Prologue signature: `fn(state, block_code) -> exit_index`.
type EntryFn = unsafe extern "C" fn(*mut u8, *const u8) -> usize;

/// Owns a code buffer with the shared prologue and epilogue, and
/// compiles, chains and runs blocks in it.
///
/// The buffer is executable between calls; compilation and linking
/// flip it to writable for their duration.
pub struct Translator {
    buf: CodeBuffer,
    cg: X86_64CodeGen,
    config: BackendConfig,
}

impl Translator {
    pub fn new(config: BackendConfig) -> BackendResult<Self> {
        config.validate()?;
        let mut buf = CodeBuffer::new(config.code_buffer_size)?;
        let mut cg = X86_64CodeGen::new();
        cg.emit_prologue(&mut buf);
        cg.emit_epilogue(&mut buf);
        buf.set_executable()?;
        log::debug!(
            "translator ready: {} byte buffer, prologue at {:#x}, epilogue at {:#x}",
            buf.capacity(),
            cg.prologue_offset(),
            cg.epilogue_offset(),
        );
        Ok(Self { buf, cg, config })
    }

    /// Compile `block` at the end of the buffer.
    pub fn compile(&mut self, block: &Block) -> BackendResult<CompiledBlock> {
        let needed = worst_case_size(block);
        let remaining = self.buf.remaining();
        if needed > remaining {
            log::warn!(
                "code buffer full compiling 0x{:08x}: need {needed}, {remaining} left",
                block.start_pc
            );
            return Err(BackendError::CodeBufferFull { needed, remaining });
        }
        self.buf.set_writable()?;
        let compiled = compile_block(block, &self.cg, &mut self.buf, &self.config);
        self.buf.set_executable()?;
        Ok(compiled)
    }

    /// Patch exit `exit` of `from` to jump straight into `to`.
    ///
    /// Only exits with a static target equal to `to`'s start address
    /// can be chained.
    pub fn link(&mut self, from: &CompiledBlock, exit: usize, to: &CompiledBlock) -> BackendResult<()> {
        let stub = from.exit(exit).ok_or(BackendError::NoSuchExit {
            exit,
            count: from.exits.len(),
        })?;
        let ExitTarget::Known(expected) = stub.target else {
            return Err(BackendError::NotChainable { exit });
        };
        if expected != to.start_pc {
            return Err(BackendError::TargetMismatch {
                exit,
                expected,
                found: to.start_pc,
            });
        }
        let jump_offset = stub.jump_offset;
        self.buf.set_writable()?;
        self.cg.patch_jump(&mut self.buf, jump_offset, to.entry);
        self.buf.set_executable()?;
        log::trace!(
            "linked 0x{:08x} exit {exit} -> 0x{:08x}",
            from.start_pc,
            to.start_pc
        );
        Ok(())
    }

    /// Run `block` until one of its exits (or a chained block's) is
    /// taken, returning that exit's index.
    ///
    /// # Safety
    /// `block` must have been compiled by this translator, and every
    /// runtime hook in the configuration must be sound to call with
    /// the values the guest code produces.
    pub unsafe fn execute(&self, block: &CompiledBlock, state: &mut GuestState) -> usize {
        debug_assert!(self.buf.is_executable());
        // SAFETY: the prologue at this offset has the EntryFn signature.
        let entry: EntryFn = std::mem::transmute(self.buf.ptr_at(self.cg.prologue_offset()));
        let code = self.buf.ptr_at(block.entry);
        entry(state as *mut GuestState as *mut u8, code)
    }

    pub fn buffer(&self) -> &CodeBuffer {
        &self.buf
    }

    pub fn codegen(&self) -> &X86_64CodeGen {
        &self.cg
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }
}

use crate::regalloc::AllocStats;

/// Where an exit hands control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitTarget {
    /// Guest address known at compile time; the exit can be chained.
    Known(u32),
    /// Guest address computed at run time and written to PC.
    Dynamic,
    /// An exception was raised; PC holds the resume address.
    Exception,
}

/// One block-leaving code path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStub {
    /// Value returned to the dispatcher when this exit is taken.
    pub index: u32,
    pub target: ExitTarget,
    /// Offset of the exit's `jmp rel32`.
    pub jump_offset: usize,
}

/// Result of compiling one block.
#[derive(Debug, Clone)]
pub struct CompiledBlock {
    pub start_pc: u32,
    /// Offset of the first instruction in the code buffer.
    pub entry: usize,
    /// Bytes of code emitted for the block.
    pub size: usize,
    pub exits: Vec<ExitStub>,
    /// Spill area reserved on entry.
    pub frame_size: u32,
    pub stats: AllocStats,
}

impl CompiledBlock {
    pub fn exit(&self, index: usize) -> Option<&ExitStub> {
        self.exits.get(index)
    }

    /// The unconditional exit closing the block.
    pub fn final_exit(&self) -> Option<&ExitStub> {
        self.exits.last()
    }

    pub fn end(&self) -> usize {
        self.entry + self.size
    }
}

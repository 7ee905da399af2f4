pub mod codegen;
pub mod emitter;
mod lower;
pub mod regs;

pub use codegen::X86_64CodeGen;
pub use regs::{Reg, Xmm};

pub mod block;
pub mod dump;
pub mod error;
pub mod guest;
pub mod inst;
pub mod ir_builder;
pub mod opcode;
pub mod types;

pub use block::Block;
pub use error::{IrError, IrResult};
pub use guest::GuestState;
pub use inst::{Inst, InstIdx, OperandSlot};
pub use opcode::{OpCategory, OpDef, OpFlags, Opcode, OPCODE_DEFS};
pub use types::{Cond, RegSet, ValueClass};

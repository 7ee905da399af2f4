//! IR validation errors.

use thiserror::Error;

use crate::inst::InstIdx;
use crate::types::ValueClass;

/// A finding of [`Block::verify`](crate::block::Block::verify).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IrError {
    #[error("{at}: opcode sentinel used as an instruction")]
    InvalidOpcode { at: InstIdx },

    #[error("{at}: {opc} takes {expected} operand(s), found {found}")]
    OperandCount {
        at: InstIdx,
        opc: &'static str,
        expected: u8,
        found: u8,
    },

    #[error("{at}: operand {operand} does not precede its user")]
    ForwardReference { at: InstIdx, operand: InstIdx },

    #[error("{at}: operand {operand} produces no value")]
    VoidOperand { at: InstIdx, operand: InstIdx },

    #[error("{at}: operand {slot} expects a {expected:?} value, {operand} is {found:?}")]
    ClassMismatch {
        at: InstIdx,
        operand: InstIdx,
        slot: u8,
        expected: ValueClass,
        found: ValueClass,
    },

    #[error("{at}: operand {operand} must be a constant")]
    NotConstant { at: InstIdx, operand: InstIdx },

    #[error("{at}: idle branch must test an equality against a constant")]
    IdlePattern { at: InstIdx },

    #[error("{at}: guest register index {index} out of range")]
    RegIndex { at: InstIdx, index: u64 },
}

/// Result type alias for IR operations.
pub type IrResult<T> = Result<T, IrError>;

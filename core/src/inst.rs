use crate::opcode::Opcode;

/// Handle of an instruction: its position in the owning [`Block`].
///
/// Handles are only meaningful for the block that issued them; operand
/// references always point at an earlier position.
///
/// [`Block`]: crate::block::Block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InstIdx(pub u32);

impl InstIdx {
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for InstIdx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Operand position within an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OperandSlot {
    First = 1,
    Second = 2,
}

/// A single IR instruction.
///
/// `param` is the opcode-specific payload: the value of a `Const`,
/// the guest register index of a guest-state access, or the ordered
/// flag of `FDCmpCR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inst {
    pub opc: Opcode,
    pub op1: Option<InstIdx>,
    pub op2: Option<InstIdx>,
    pub param: u64,
}

impl Inst {
    pub const fn new(opc: Opcode) -> Self {
        Self {
            opc,
            op1: None,
            op2: None,
            param: 0,
        }
    }

    pub const fn unary(opc: Opcode, a: InstIdx) -> Self {
        Self {
            opc,
            op1: Some(a),
            op2: None,
            param: 0,
        }
    }

    pub const fn binary(opc: Opcode, a: InstIdx, b: InstIdx) -> Self {
        Self {
            opc,
            op1: Some(a),
            op2: Some(b),
            param: 0,
        }
    }

    pub const fn with_param(mut self, param: u64) -> Self {
        self.param = param;
        self
    }

    /// Operand in the given slot.
    pub const fn operand(&self, slot: OperandSlot) -> Option<InstIdx> {
        match slot {
            OperandSlot::First => self.op1,
            OperandSlot::Second => self.op2,
        }
    }

    /// Iterate over present operands with their slot.
    pub fn operands(&self) -> impl Iterator<Item = (OperandSlot, InstIdx)> {
        let a = self.op1.map(|i| (OperandSlot::First, i));
        let b = self.op2.map(|i| (OperandSlot::Second, i));
        a.into_iter().chain(b)
    }

    pub fn nb_operands(&self) -> u8 {
        self.op1.is_some() as u8 + self.op2.is_some() as u8
    }

    /// Guest register / field index carried in `param`.
    #[inline]
    pub const fn reg_index(&self) -> usize {
        self.param as usize
    }
}

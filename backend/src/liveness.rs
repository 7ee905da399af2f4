use jitil_core::{Block, InstIdx, OperandSlot, Opcode};

/// Number of recorded uses, saturating at `Many`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum UseCount {
    #[default]
    Zero,
    One,
    Many,
}

impl UseCount {
    fn bump(self) -> Self {
        match self {
            UseCount::Zero => UseCount::One,
            _ => UseCount::Many,
        }
    }
}

/// One operand reference marked by an instruction.
///
/// `is_last_use` is set when the marking instruction is the final
/// reader of `operand`, which lets the generator take over the
/// operand's register for its own result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperandUse {
    pub operand: InstIdx,
    pub slot: OperandSlot,
    pub is_last_use: bool,
}

/// Uses marked by one instruction. A conditional branch over a compare
/// marks up to three values (both compare inputs and the destination).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstLife {
    uses: [Option<OperandUse>; 3],
}

impl InstLife {
    fn push(&mut self, u: OperandUse) {
        let Some(free) = self.uses.iter_mut().find(|u| u.is_none()) else {
            log::error!("more than three operand uses on one instruction");
            panic!("operand use table overflow");
        };
        *free = Some(u);
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperandUse> {
        self.uses.iter().flatten()
    }
}

/// How a load or store reaches guest memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressMode {
    /// Constant address.
    Imm(u32),
    /// `base + disp`; `disp` is zero when the address is not an
    /// `Add` of a constant.
    BaseDisp(InstIdx, u32),
}

/// Resolve the address operand of a memory access, folding
/// `Add(base, Const)` into a displacement.
pub fn address_mode(block: &Block, addr: InstIdx) -> AddressMode {
    if block.is_imm(addr) {
        return AddressMode::Imm(block.imm_value(addr));
    }
    let inst = block.inst(addr);
    if inst.opc == Opcode::Add {
        if let (Some(base), Some(disp)) = (inst.op1, inst.op2) {
            if block.is_imm(disp) {
                return AddressMode::BaseDisp(base, block.imm_value(disp));
            }
        }
    }
    AddressMode::BaseDisp(addr, 0)
}

/// Backward liveness over one block.
#[derive(Debug, Clone)]
pub struct Liveness {
    use_count: Vec<UseCount>,
    last_use: Vec<Option<InstIdx>>,
    lives: Vec<InstLife>,
}

impl Liveness {
    /// Walk `block` from last to first instruction, counting uses and
    /// recording for every instruction which operands it reads last.
    pub fn analyze(block: &Block) -> Self {
        let n = block.len();
        let mut live = Self {
            use_count: vec![UseCount::Zero; n],
            last_use: vec![None; n],
            lives: vec![InstLife::default(); n],
        };

        for i in (0..n).rev() {
            let at = InstIdx(i as u32);
            let inst = *block.inst(at);
            let used = live.is_used(at);
            let op1 = inst.op1;
            let op2 = inst.op2;

            use Opcode::*;
            match inst.opc {
                Load8 | Load16 | Load32 => {
                    live.mark_address(block, at, op1, OperandSlot::First);
                }
                LoadSingle | LoadDouble => {
                    if used {
                        live.mark_address(block, at, op1, OperandSlot::First);
                    }
                }
                StoreCR | StoreCarry | StoreFPRF => {
                    live.mark(at, op1, OperandSlot::First);
                }
                StoreGReg | StoreLink | StoreCTR | StoreMSR | StoreGQR | StoreSRR
                | StoreFReg => {
                    live.mark_unless_imm(block, at, op1, OperandSlot::First);
                }
                Add | Sub | And | Or | Xor | Mul | MulHighUnsigned | Rol | Shl | Shrl
                | Sarl | ICmpEq | ICmpNe | ICmpUgt | ICmpUlt | ICmpUge | ICmpUle
                | ICmpSgt | ICmpSlt | ICmpSge | ICmpSle | ICmpCRSigned | ICmpCRUnsigned
                | FSAdd | FSSub | FSMul | FDAdd | FDSub | FDMul | FPAdd | FPSub | FPMul
                | FPMerge00 | FPMerge01 | FPMerge10 | FPMerge11 | FDCmpCR
                | InsertDoubleInMReg => {
                    if used {
                        live.mark(at, op1, OperandSlot::First);
                        live.mark_unless_imm(block, at, op2, OperandSlot::Second);
                    }
                }
                Not | Cntlzw | SExt8 | SExt16 | FastCRSOSet | FastCREQSet | FastCRGTSet
                | FastCRLTSet | FSNeg | FDNeg | FPNeg | FPDup0 | FPDup1 | DupSingleToMReg
                | DoubleToSingle | ExpandPackedToMReg | CompactMRegToPacked => {
                    if used {
                        live.mark(at, op1, OperandSlot::First);
                    }
                }
                Store8 | Store16 | Store32 => {
                    live.mark_unless_imm(block, at, op1, OperandSlot::First);
                    live.mark_address(block, at, op2, OperandSlot::Second);
                }
                StoreSingle | StoreDouble => {
                    live.mark(at, op1, OperandSlot::First);
                    live.mark_address(block, at, op2, OperandSlot::Second);
                }
                BranchUncond => {
                    live.mark_unless_imm(block, at, op1, OperandSlot::First);
                }
                BranchCond => {
                    match op1.map(|c| (c, block.inst(c))) {
                        Some((_, cmp)) if cmp.opc.is_icmp() => {
                            live.mark(at, cmp.op1, OperandSlot::First);
                            live.mark_unless_imm(block, at, cmp.op2, OperandSlot::Second);
                        }
                        _ => live.mark(at, op1, OperandSlot::First),
                    }
                    live.mark_unless_imm(block, at, op2, OperandSlot::Second);
                }
                IdleBranch => {
                    let value = op1.and_then(|cmp| block.inst(cmp).op1);
                    live.mark(at, value, OperandSlot::First);
                }
                Nop | BlockStart | BlockEnd | Const | LoadGReg | LoadCR | LoadCTR
                | LoadLink | LoadMSR | LoadGQR | LoadCarry | LoadFReg | LoadFRegDENToZero
                | InterpreterBranch | ShortIdleLoop | RFIExit | SystemCall
                | FallBackToInterpreter | FPExceptionCheck | DSIExceptionCheck
                | ExtExceptionCheck | Count => {}
            }
        }
        live
    }

    fn mark(&mut self, user: InstIdx, operand: Option<InstIdx>, slot: OperandSlot) {
        let Some(operand) = operand else {
            return;
        };
        let i = operand.index();
        let first = self.use_count[i] == UseCount::Zero;
        self.use_count[i] = self.use_count[i].bump();
        self.last_use[i] = Some(self.last_use[i].map_or(user, |l| l.max(user)));
        self.lives[user.index()].push(OperandUse {
            operand,
            slot,
            is_last_use: first,
        });
    }

    fn mark_unless_imm(
        &mut self,
        block: &Block,
        user: InstIdx,
        operand: Option<InstIdx>,
        slot: OperandSlot,
    ) {
        if let Some(op) = operand {
            if !block.is_imm(op) {
                self.mark(user, Some(op), slot);
            }
        }
    }

    fn mark_address(
        &mut self,
        block: &Block,
        user: InstIdx,
        addr: Option<InstIdx>,
        slot: OperandSlot,
    ) {
        let Some(addr) = addr else {
            return;
        };
        match address_mode(block, addr) {
            AddressMode::Imm(_) => {}
            AddressMode::BaseDisp(base, _) => self.mark(user, Some(base), slot),
        }
    }

    #[inline]
    pub fn use_count(&self, idx: InstIdx) -> UseCount {
        self.use_count[idx.index()]
    }

    #[inline]
    pub fn is_used(&self, idx: InstIdx) -> bool {
        self.use_count(idx) != UseCount::Zero
    }

    /// Position of the last instruction reading `idx`.
    #[inline]
    pub fn last_use(&self, idx: InstIdx) -> Option<InstIdx> {
        self.last_use[idx.index()]
    }

    /// Uses marked by instruction `user`.
    pub fn operand_uses(&self, user: InstIdx) -> impl Iterator<Item = &OperandUse> {
        self.lives[user.index()].iter()
    }

    /// True if `user` is the final reader of `operand`.
    pub fn is_last_use_of(&self, user: InstIdx, operand: InstIdx) -> bool {
        self.operand_uses(user)
            .any(|u| u.operand == operand && u.is_last_use)
    }

    /// Whether code must be generated for `idx`.
    pub fn needs_code(&self, block: &Block, idx: InstIdx) -> bool {
        self.is_used(idx) || block.opc(idx).has_side_effects()
    }

    pub fn len(&self) -> usize {
        self.use_count.len()
    }

    pub fn is_empty(&self) -> bool {
        self.use_count.is_empty()
    }
}

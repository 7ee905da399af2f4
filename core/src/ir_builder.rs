use crate::block::Block;
use crate::inst::{Inst, InstIdx};
use crate::opcode::Opcode;
use crate::types::Cond;

/// Generates `gen_*` constructors for two-operand opcodes.
macro_rules! binary_ops {
    ($($name:ident => $opc:ident),* $(,)?) => {
        $(
            pub fn $name(&mut self, a: InstIdx, b: InstIdx) -> InstIdx {
                self.emit_binary(Opcode::$opc, a, b)
            }
        )*
    };
}

/// Generates `gen_*` constructors for one-operand opcodes.
macro_rules! unary_ops {
    ($($name:ident => $opc:ident),* $(,)?) => {
        $(
            pub fn $name(&mut self, a: InstIdx) -> InstIdx {
                self.emit_unary(Opcode::$opc, a)
            }
        )*
    };
}

impl Block {
    // -- Internal helpers --

    fn emit_unary(&mut self, opc: Opcode, a: InstIdx) -> InstIdx {
        self.push(Inst::unary(opc, a))
    }

    fn emit_binary(&mut self, opc: Opcode, a: InstIdx, b: InstIdx) -> InstIdx {
        self.push(Inst::binary(opc, a, b))
    }

    fn emit_nullary(&mut self, opc: Opcode, param: u64) -> InstIdx {
        self.push(Inst::new(opc).with_param(param))
    }

    // -- Markers and constants --

    pub fn gen_block_start(&mut self) -> InstIdx {
        self.emit_nullary(Opcode::BlockStart, 0)
    }

    pub fn gen_block_end(&mut self) -> InstIdx {
        self.emit_nullary(Opcode::BlockEnd, 0)
    }

    pub fn gen_nop(&mut self) -> InstIdx {
        self.emit_nullary(Opcode::Nop, 0)
    }

    /// 32-bit constant (deduplicated).
    pub fn gen_const(&mut self, val: u32) -> InstIdx {
        self.push_const(val as u64)
    }

    /// 64-bit constant, for fast-CR values.
    pub fn gen_const64(&mut self, val: u64) -> InstIdx {
        self.push_const(val)
    }

    // -- Guest-state loads --

    pub fn gen_load_greg(&mut self, reg: usize) -> InstIdx {
        self.emit_nullary(Opcode::LoadGReg, reg as u64)
    }

    pub fn gen_load_cr(&mut self, field: usize) -> InstIdx {
        self.emit_nullary(Opcode::LoadCR, field as u64)
    }

    pub fn gen_load_ctr(&mut self) -> InstIdx {
        self.emit_nullary(Opcode::LoadCTR, 0)
    }

    pub fn gen_load_link(&mut self) -> InstIdx {
        self.emit_nullary(Opcode::LoadLink, 0)
    }

    pub fn gen_load_msr(&mut self) -> InstIdx {
        self.emit_nullary(Opcode::LoadMSR, 0)
    }

    pub fn gen_load_gqr(&mut self, reg: usize) -> InstIdx {
        self.emit_nullary(Opcode::LoadGQR, reg as u64)
    }

    pub fn gen_load_carry(&mut self) -> InstIdx {
        self.emit_nullary(Opcode::LoadCarry, 0)
    }

    pub fn gen_load_freg(&mut self, reg: usize) -> InstIdx {
        self.emit_nullary(Opcode::LoadFReg, reg as u64)
    }

    pub fn gen_load_freg_den_to_zero(&mut self, reg: usize) -> InstIdx {
        self.emit_nullary(Opcode::LoadFRegDENToZero, reg as u64)
    }

    // -- Guest-state stores --

    pub fn gen_store_greg(&mut self, val: InstIdx, reg: usize) -> InstIdx {
        self.push(Inst::unary(Opcode::StoreGReg, val).with_param(reg as u64))
    }

    pub fn gen_store_cr(&mut self, val: InstIdx, field: usize) -> InstIdx {
        self.push(Inst::unary(Opcode::StoreCR, val).with_param(field as u64))
    }

    pub fn gen_store_gqr(&mut self, val: InstIdx, reg: usize) -> InstIdx {
        self.push(Inst::unary(Opcode::StoreGQR, val).with_param(reg as u64))
    }

    pub fn gen_store_srr(&mut self, val: InstIdx, which: usize) -> InstIdx {
        self.push(Inst::unary(Opcode::StoreSRR, val).with_param(which as u64))
    }

    pub fn gen_store_freg(&mut self, val: InstIdx, reg: usize) -> InstIdx {
        self.push(Inst::unary(Opcode::StoreFReg, val).with_param(reg as u64))
    }

    unary_ops! {
        gen_store_link => StoreLink,
        gen_store_ctr => StoreCTR,
        gen_store_carry => StoreCarry,
        gen_store_fprf => StoreFPRF,
    }

    /// Write MSR, then take a pending external exception at `pc + 4`.
    pub fn gen_store_msr(&mut self, val: InstIdx, pc: u32) -> InstIdx {
        let pc = self.gen_const(pc);
        self.emit_binary(Opcode::StoreMSR, val, pc)
    }

    // -- Integer arithmetic --

    binary_ops! {
        gen_add => Add,
        gen_sub => Sub,
        gen_and => And,
        gen_or => Or,
        gen_xor => Xor,
        gen_mul => Mul,
        gen_mul_high_unsigned => MulHighUnsigned,
        gen_rol => Rol,
        gen_shl => Shl,
        gen_shrl => Shrl,
        gen_sarl => Sarl,
        gen_icmp_cr_signed => ICmpCRSigned,
        gen_icmp_cr_unsigned => ICmpCRUnsigned,
    }

    unary_ops! {
        gen_not => Not,
        gen_cntlzw => Cntlzw,
        gen_sext8 => SExt8,
        gen_sext16 => SExt16,
        gen_fastcr_so_set => FastCRSOSet,
        gen_fastcr_eq_set => FastCREQSet,
        gen_fastcr_gt_set => FastCRGTSet,
        gen_fastcr_lt_set => FastCRLTSet,
    }

    /// `a + imm`, the address pattern folded by loads and stores.
    pub fn gen_add_imm(&mut self, a: InstIdx, imm: u32) -> InstIdx {
        let c = self.gen_const(imm);
        self.gen_add(a, c)
    }

    /// Integer compare producing 0 or 1.
    pub fn gen_icmp(&mut self, cond: Cond, a: InstIdx, b: InstIdx) -> InstIdx {
        self.emit_binary(Opcode::from_cond(cond), a, b)
    }

    /// Float compare into a CR field value; `ordered` selects the
    /// `fcmpo` exception semantics.
    pub fn gen_fdcmp_cr(&mut self, a: InstIdx, b: InstIdx, ordered: bool) -> InstIdx {
        self.push(Inst::binary(Opcode::FDCmpCR, a, b).with_param(ordered as u64))
    }

    // -- Guest memory --

    unary_ops! {
        gen_load8 => Load8,
        gen_load16 => Load16,
        gen_load32 => Load32,
        gen_load_single => LoadSingle,
        gen_load_double => LoadDouble,
    }

    /// Stores take `(value, address)`.
    pub fn gen_store8(&mut self, val: InstIdx, addr: InstIdx) -> InstIdx {
        self.emit_binary(Opcode::Store8, val, addr)
    }

    pub fn gen_store16(&mut self, val: InstIdx, addr: InstIdx) -> InstIdx {
        self.emit_binary(Opcode::Store16, val, addr)
    }

    pub fn gen_store32(&mut self, val: InstIdx, addr: InstIdx) -> InstIdx {
        self.emit_binary(Opcode::Store32, val, addr)
    }

    pub fn gen_store_single(&mut self, val: InstIdx, addr: InstIdx) -> InstIdx {
        self.emit_binary(Opcode::StoreSingle, val, addr)
    }

    pub fn gen_store_double(&mut self, val: InstIdx, addr: InstIdx) -> InstIdx {
        self.emit_binary(Opcode::StoreDouble, val, addr)
    }

    // -- Floating point --

    binary_ops! {
        gen_fsadd => FSAdd,
        gen_fssub => FSSub,
        gen_fsmul => FSMul,
        gen_fdadd => FDAdd,
        gen_fdsub => FDSub,
        gen_fdmul => FDMul,
        gen_fpadd => FPAdd,
        gen_fpsub => FPSub,
        gen_fpmul => FPMul,
        gen_fpmerge00 => FPMerge00,
        gen_fpmerge01 => FPMerge01,
        gen_fpmerge10 => FPMerge10,
        gen_fpmerge11 => FPMerge11,
        gen_insert_double_in_mreg => InsertDoubleInMReg,
    }

    unary_ops! {
        gen_fsneg => FSNeg,
        gen_fdneg => FDNeg,
        gen_fpneg => FPNeg,
        gen_fpdup0 => FPDup0,
        gen_fpdup1 => FPDup1,
        gen_dup_single_to_mreg => DupSingleToMReg,
        gen_double_to_single => DoubleToSingle,
        gen_expand_packed_to_mreg => ExpandPackedToMReg,
        gen_compact_mreg_to_packed => CompactMRegToPacked,
    }

    // -- Branches and exits --

    pub fn gen_branch_uncond(&mut self, dest: InstIdx) -> InstIdx {
        self.emit_unary(Opcode::BranchUncond, dest)
    }

    /// Leave the block for `dest` when `cond` is non-zero.
    pub fn gen_branch_cond(&mut self, cond: InstIdx, dest: InstIdx) -> InstIdx {
        self.emit_binary(Opcode::BranchCond, cond, dest)
    }

    /// Idle loop polling `value == expected`; `pc` is the loop head.
    pub fn gen_idle_branch(&mut self, value: InstIdx, expected: u32, pc: u32) -> InstIdx {
        let expected = self.gen_const(expected);
        let cmp = self.gen_icmp(Cond::Eq, value, expected);
        let pc = self.gen_const(pc);
        self.emit_binary(Opcode::IdleBranch, cmp, pc)
    }

    pub fn gen_interpreter_branch(&mut self) -> InstIdx {
        self.emit_nullary(Opcode::InterpreterBranch, 0)
    }

    pub fn gen_short_idle_loop(&mut self, pc: u32) -> InstIdx {
        let pc = self.gen_const(pc);
        self.emit_unary(Opcode::ShortIdleLoop, pc)
    }

    pub fn gen_rfi_exit(&mut self) -> InstIdx {
        self.emit_nullary(Opcode::RFIExit, 0)
    }

    // -- System --

    pub fn gen_system_call(&mut self, pc: u32) -> InstIdx {
        let pc = self.gen_const(pc);
        self.emit_unary(Opcode::SystemCall, pc)
    }

    /// Run one guest instruction word through the interpreter.
    pub fn gen_fallback_to_interpreter(&mut self, inst: u32, pc: u32) -> InstIdx {
        let inst = self.gen_const(inst);
        let pc = self.gen_const(pc);
        self.emit_binary(Opcode::FallBackToInterpreter, inst, pc)
    }

    pub fn gen_fp_exception_check(&mut self, pc: u32) -> InstIdx {
        let pc = self.gen_const(pc);
        self.emit_unary(Opcode::FPExceptionCheck, pc)
    }

    pub fn gen_dsi_exception_check(&mut self, pc: u32) -> InstIdx {
        let pc = self.gen_const(pc);
        self.emit_unary(Opcode::DSIExceptionCheck, pc)
    }

    pub fn gen_ext_exception_check(&mut self, pc: u32) -> InstIdx {
        let pc = self.gen_const(pc);
        self.emit_unary(Opcode::ExtExceptionCheck, pc)
    }
}

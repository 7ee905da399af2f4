use crate::types::{Cond, ValueClass};

/// IR opcodes.
///
/// Grouped by [`OpCategory`]; the grouping drives both liveness marking
/// and the code generator's dispatch. Integer values are 32 bits wide
/// except for CR fields, which use the 64-bit fast-CR form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    // -- No-ops and block markers --
    Nop = 0,
    BlockStart,
    BlockEnd,

    // -- Constants --
    Const,

    // -- Guest-state loads --
    LoadGReg,
    LoadCR,
    LoadCTR,
    LoadLink,
    LoadMSR,
    LoadGQR,
    LoadCarry,
    LoadFReg,
    LoadFRegDENToZero, // flush denormal to zero before loading

    // -- Guest-state stores --
    StoreGReg,
    StoreCR,
    StoreLink,
    StoreCTR,
    StoreGQR,
    StoreSRR,
    StoreCarry,
    StoreFPRF,
    StoreFReg,
    StoreMSR, // (value, pc)

    // -- Integer arithmetic / logic --
    Add,
    Sub,
    And,
    Or,
    Xor,
    Mul,
    MulHighUnsigned,
    Not,
    Cntlzw,

    // -- Shift / rotate --
    Rol,
    Shl,
    Shrl,
    Sarl,

    // -- Compare --
    ICmpEq,
    ICmpNe,
    ICmpUgt,
    ICmpUlt,
    ICmpUge,
    ICmpUle,
    ICmpSgt,
    ICmpSlt,
    ICmpSge,
    ICmpSle,
    ICmpCRSigned,
    ICmpCRUnsigned,
    FastCRSOSet,
    FastCREQSet,
    FastCRGTSet,
    FastCRLTSet,
    FDCmpCR,

    // -- Guest memory loads (through the runtime hooks) --
    Load8,
    Load16,
    Load32,
    LoadSingle,
    LoadDouble,

    // -- Guest memory stores: (value, address) --
    Store8,
    Store16,
    Store32,
    StoreSingle,
    StoreDouble,

    // -- Floating point / paired single --
    FSAdd,
    FSSub,
    FSMul,
    FDAdd,
    FDSub,
    FDMul,
    FPAdd,
    FPSub,
    FPMul,
    FSNeg,
    FDNeg,
    FPNeg,
    FPDup0,
    FPDup1,
    FPMerge00,
    FPMerge01,
    FPMerge10,
    FPMerge11,
    InsertDoubleInMReg,

    // -- Conversions --
    SExt8,
    SExt16,
    DupSingleToMReg,
    DoubleToSingle,
    ExpandPackedToMReg,
    CompactMRegToPacked,

    // -- Branches / exits --
    BranchUncond,      // (dest)
    BranchCond,        // (cond, dest)
    IdleBranch,        // (ICmpEq(value, const), pc)
    InterpreterBranch, // exit to NPC
    ShortIdleLoop,     // (pc)
    RFIExit,

    // -- System and exception checks --
    SystemCall,            // (pc)
    FallBackToInterpreter, // (inst, pc)
    FPExceptionCheck,      // (pc)
    DSIExceptionCheck,     // (pc)
    ExtExceptionCheck,     // (pc)

    // Sentinel, must be last
    Count,
}

/// Opcode category.
///
/// A closed sum type over the opcode groups; every opcode belongs to
/// exactly one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCategory {
    NoOp,
    Constant,
    GuestLoad,
    GuestStore,
    Arithmetic,
    Shift,
    Compare,
    Load,
    Store,
    FloatArith,
    Conversion,
    Branch,
    System,
}

/// Flags describing properties of an opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpFlags(u16);

impl OpFlags {
    pub const NONE: OpFlags = OpFlags(0);
    /// Has side effects, cannot be eliminated by DCE.
    pub const SIDE_EFFECTS: OpFlags = OpFlags(0x01);
    /// Operands may be swapped.
    pub const COMMUTATIVE: OpFlags = OpFlags(0x02);
    /// May leave the compiled block.
    pub const EXIT: OpFlags = OpFlags(0x04);
    /// Calls into the runtime.
    pub const CALL: OpFlags = OpFlags(0x08);
    /// First operand must be a `Const`.
    pub const CONST_OP1: OpFlags = OpFlags(0x10);
    /// Second operand must be a `Const`.
    pub const CONST_OP2: OpFlags = OpFlags(0x20);

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn contains(self, other: OpFlags) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn union(self, other: OpFlags) -> Self {
        Self(self.0 | other.0)
    }
}

/// Static definition of an opcode: operand classes, result class
/// and flags.
#[derive(Debug, Clone, Copy)]
pub struct OpDef {
    pub name: &'static str,
    /// Expected class of each operand; `ValueClass::None` marks an
    /// absent operand.
    pub operands: [ValueClass; 2],
    pub result: ValueClass,
    pub flags: OpFlags,
}

impl OpDef {
    pub const fn nb_operands(&self) -> u8 {
        let mut n = 0;
        if !matches!(self.operands[0], ValueClass::None) {
            n += 1;
        }
        if !matches!(self.operands[1], ValueClass::None) {
            n += 1;
        }
        n
    }

    pub const fn has_side_effects(&self) -> bool {
        self.flags.contains(OpFlags::SIDE_EFFECTS)
    }
}

const fn f(a: OpFlags, b: OpFlags) -> OpFlags {
    OpFlags(a.0 | b.0)
}

const fn def(
    name: &'static str,
    op1: ValueClass,
    op2: ValueClass,
    result: ValueClass,
    flags: OpFlags,
) -> OpDef {
    OpDef {
        name,
        operands: [op1, op2],
        result,
        flags,
    }
}

const N: ValueClass = ValueClass::None;
const I: ValueClass = ValueClass::Int;
const F: ValueClass = ValueClass::Float;

const NF: OpFlags = OpFlags::NONE;
const SE: OpFlags = OpFlags::SIDE_EFFECTS;
const CM: OpFlags = OpFlags::COMMUTATIVE;
const EX: OpFlags = f(OpFlags::EXIT, OpFlags::SIDE_EFFECTS);
const CL: OpFlags = OpFlags::CALL;
const C1: OpFlags = OpFlags::CONST_OP1;
const C2: OpFlags = OpFlags::CONST_OP2;

/// Static opcode definition table, indexed by `Opcode as usize`.
pub static OPCODE_DEFS: [OpDef; Opcode::Count as usize] = [
    def("nop", N, N, N, NF),
    def("block_start", N, N, N, NF),
    def("block_end", N, N, N, NF),
    def("const", N, N, I, NF),
    // Guest-state loads
    def("load_greg", N, N, I, NF),
    def("load_cr", N, N, I, NF),
    def("load_ctr", N, N, I, NF),
    def("load_link", N, N, I, NF),
    def("load_msr", N, N, I, NF),
    def("load_gqr", N, N, I, NF),
    def("load_carry", N, N, I, NF),
    def("load_freg", N, N, F, NF),
    def("load_freg_den_to_zero", N, N, F, NF),
    // Guest-state stores
    def("store_greg", I, N, N, SE),
    def("store_cr", I, N, N, SE),
    def("store_link", I, N, N, SE),
    def("store_ctr", I, N, N, SE),
    def("store_gqr", I, N, N, SE),
    def("store_srr", I, N, N, SE),
    def("store_carry", I, N, N, SE),
    def("store_fprf", I, N, N, SE),
    def("store_freg", F, N, N, SE),
    def("store_msr", I, I, N, f(EX, C2)),
    // Integer arithmetic
    def("add", I, I, I, CM),
    def("sub", I, I, I, NF),
    def("and", I, I, I, CM),
    def("or", I, I, I, CM),
    def("xor", I, I, I, CM),
    def("mul", I, I, I, CM),
    def("mulhwu", I, I, I, CM),
    def("not", I, N, I, NF),
    def("cntlzw", I, N, I, NF),
    // Shift
    def("rol", I, I, I, NF),
    def("shl", I, I, I, NF),
    def("shrl", I, I, I, NF),
    def("sarl", I, I, I, NF),
    // Compare
    def("icmp_eq", I, I, I, CM),
    def("icmp_ne", I, I, I, CM),
    def("icmp_ugt", I, I, I, NF),
    def("icmp_ult", I, I, I, NF),
    def("icmp_uge", I, I, I, NF),
    def("icmp_ule", I, I, I, NF),
    def("icmp_sgt", I, I, I, NF),
    def("icmp_slt", I, I, I, NF),
    def("icmp_sge", I, I, I, NF),
    def("icmp_sle", I, I, I, NF),
    def("icmp_cr_signed", I, I, I, NF),
    def("icmp_cr_unsigned", I, I, I, NF),
    def("fastcr_so_set", I, N, I, NF),
    def("fastcr_eq_set", I, N, I, NF),
    def("fastcr_gt_set", I, N, I, NF),
    def("fastcr_lt_set", I, N, I, NF),
    def("fdcmp_cr", F, F, I, CL),
    // Guest memory loads
    def("load8", I, N, I, f(SE, CL)),
    def("load16", I, N, I, f(SE, CL)),
    def("load32", I, N, I, f(SE, CL)),
    def("load_single", I, N, F, CL),
    def("load_double", I, N, F, CL),
    // Guest memory stores
    def("store8", I, I, N, f(SE, CL)),
    def("store16", I, I, N, f(SE, CL)),
    def("store32", I, I, N, f(SE, CL)),
    def("store_single", F, I, N, f(SE, CL)),
    def("store_double", F, I, N, f(SE, CL)),
    // Floating point
    def("fsadd", F, F, F, CM),
    def("fssub", F, F, F, NF),
    def("fsmul", F, F, F, CM),
    def("fdadd", F, F, F, CM),
    def("fdsub", F, F, F, NF),
    def("fdmul", F, F, F, CM),
    def("fpadd", F, F, F, CM),
    def("fpsub", F, F, F, NF),
    def("fpmul", F, F, F, CM),
    def("fsneg", F, N, F, NF),
    def("fdneg", F, N, F, NF),
    def("fpneg", F, N, F, NF),
    def("fpdup0", F, N, F, NF),
    def("fpdup1", F, N, F, NF),
    def("fpmerge00", F, F, F, NF),
    def("fpmerge01", F, F, F, NF),
    def("fpmerge10", F, F, F, NF),
    def("fpmerge11", F, F, F, NF),
    def("insert_double_in_mreg", F, F, F, NF),
    // Conversions
    def("sext8", I, N, I, NF),
    def("sext16", I, N, I, NF),
    def("dup_single_to_mreg", F, N, F, NF),
    def("double_to_single", F, N, F, NF),
    def("expand_packed_to_mreg", F, N, F, NF),
    def("compact_mreg_to_packed", F, N, F, NF),
    // Branches
    def("branch_uncond", I, N, N, EX),
    def("branch_cond", I, I, N, EX),
    def("idle_branch", I, I, N, f(f(EX, CL), C2)),
    def("interpreter_branch", N, N, N, EX),
    def("short_idle_loop", I, N, N, f(f(EX, CL), C1)),
    def("rfi_exit", N, N, N, EX),
    // System
    def("system_call", I, N, N, f(EX, C1)),
    def(
        "fallback_to_interpreter",
        I,
        I,
        N,
        f(f(SE, CL), f(C1, C2)),
    ),
    def("fp_exception_check", I, N, N, f(EX, C1)),
    def("dsi_exception_check", I, N, N, f(EX, C1)),
    def("ext_exception_check", I, N, N, f(EX, C1)),
];

impl Opcode {
    /// Look up the static definition for this opcode.
    #[inline]
    pub fn def(self) -> &'static OpDef {
        &OPCODE_DEFS[self as usize]
    }

    #[inline]
    pub fn flags(self) -> OpFlags {
        self.def().flags
    }

    #[inline]
    pub fn has_side_effects(self) -> bool {
        self.def().has_side_effects()
    }

    #[inline]
    pub fn is_commutative(self) -> bool {
        self.flags().contains(OpFlags::COMMUTATIVE)
    }

    #[inline]
    pub fn result_class(self) -> ValueClass {
        self.def().result
    }

    /// Category this opcode is dispatched under.
    pub const fn category(self) -> OpCategory {
        use Opcode::*;
        match self {
            Nop | BlockStart | BlockEnd => OpCategory::NoOp,
            Const => OpCategory::Constant,
            LoadGReg | LoadCR | LoadCTR | LoadLink | LoadMSR | LoadGQR | LoadCarry | LoadFReg
            | LoadFRegDENToZero => OpCategory::GuestLoad,
            StoreGReg | StoreCR | StoreLink | StoreCTR | StoreGQR | StoreSRR | StoreCarry
            | StoreFPRF | StoreFReg | StoreMSR => OpCategory::GuestStore,
            Add | Sub | And | Or | Xor | Mul | MulHighUnsigned | Not | Cntlzw => {
                OpCategory::Arithmetic
            }
            Rol | Shl | Shrl | Sarl => OpCategory::Shift,
            ICmpEq | ICmpNe | ICmpUgt | ICmpUlt | ICmpUge | ICmpUle | ICmpSgt | ICmpSlt
            | ICmpSge | ICmpSle | ICmpCRSigned | ICmpCRUnsigned | FastCRSOSet | FastCREQSet
            | FastCRGTSet | FastCRLTSet | FDCmpCR => OpCategory::Compare,
            Load8 | Load16 | Load32 | LoadSingle | LoadDouble => OpCategory::Load,
            Store8 | Store16 | Store32 | StoreSingle | StoreDouble => OpCategory::Store,
            FSAdd | FSSub | FSMul | FDAdd | FDSub | FDMul | FPAdd | FPSub | FPMul | FSNeg
            | FDNeg | FPNeg | FPDup0 | FPDup1 | FPMerge00 | FPMerge01 | FPMerge10
            | FPMerge11 | InsertDoubleInMReg => OpCategory::FloatArith,
            SExt8 | SExt16 | DupSingleToMReg | DoubleToSingle | ExpandPackedToMReg
            | CompactMRegToPacked => OpCategory::Conversion,
            BranchUncond | BranchCond | IdleBranch | InterpreterBranch | ShortIdleLoop
            | RFIExit => OpCategory::Branch,
            SystemCall | FallBackToInterpreter | FPExceptionCheck | DSIExceptionCheck
            | ExtExceptionCheck => OpCategory::System,
            Count => OpCategory::NoOp,
        }
    }

    /// Condition tested by an `ICmp*` opcode producing a 0/1 value.
    pub const fn icmp_cond(self) -> Option<Cond> {
        match self {
            Opcode::ICmpEq => Some(Cond::Eq),
            Opcode::ICmpNe => Some(Cond::Ne),
            Opcode::ICmpUgt => Some(Cond::Ugt),
            Opcode::ICmpUlt => Some(Cond::Ult),
            Opcode::ICmpUge => Some(Cond::Uge),
            Opcode::ICmpUle => Some(Cond::Ule),
            Opcode::ICmpSgt => Some(Cond::Sgt),
            Opcode::ICmpSlt => Some(Cond::Slt),
            Opcode::ICmpSge => Some(Cond::Sge),
            Opcode::ICmpSle => Some(Cond::Sle),
            _ => None,
        }
    }

    /// The `ICmp*` opcode testing `cond`.
    pub const fn from_cond(cond: Cond) -> Opcode {
        match cond {
            Cond::Eq => Opcode::ICmpEq,
            Cond::Ne => Opcode::ICmpNe,
            Cond::Ugt => Opcode::ICmpUgt,
            Cond::Ult => Opcode::ICmpUlt,
            Cond::Uge => Opcode::ICmpUge,
            Cond::Ule => Opcode::ICmpUle,
            Cond::Sgt => Opcode::ICmpSgt,
            Cond::Slt => Opcode::ICmpSlt,
            Cond::Sge => Opcode::ICmpSge,
            Cond::Sle => Opcode::ICmpSle,
        }
    }

    #[inline]
    pub const fn is_icmp(self) -> bool {
        self.icmp_cond().is_some()
    }
}

/// Integer comparison conditions carried by the `ICmp*` opcodes.
///
/// Signed and unsigned orderings are distinct conditions because the
/// IR works on raw 32-bit values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Cond {
    Eq = 0,
    Ne,
    // Unsigned
    Ugt,
    Ult,
    Uge,
    Ule,
    // Signed
    Sgt,
    Slt,
    Sge,
    Sle,
}

impl Cond {
    /// Return the condition that holds exactly when `self` does not.
    pub const fn invert(self) -> Cond {
        match self {
            Cond::Eq => Cond::Ne,
            Cond::Ne => Cond::Eq,
            Cond::Ugt => Cond::Ule,
            Cond::Ult => Cond::Uge,
            Cond::Uge => Cond::Ult,
            Cond::Ule => Cond::Ugt,
            Cond::Sgt => Cond::Sle,
            Cond::Slt => Cond::Sge,
            Cond::Sge => Cond::Slt,
            Cond::Sle => Cond::Sgt,
        }
    }

    /// Swap operand order (e.g. Ult becomes Ugt).
    pub const fn swap(self) -> Cond {
        match self {
            Cond::Eq | Cond::Ne => self,
            Cond::Ugt => Cond::Ult,
            Cond::Ult => Cond::Ugt,
            Cond::Uge => Cond::Ule,
            Cond::Ule => Cond::Uge,
            Cond::Sgt => Cond::Slt,
            Cond::Slt => Cond::Sgt,
            Cond::Sge => Cond::Sle,
            Cond::Sle => Cond::Sge,
        }
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Cond::Sgt | Cond::Slt | Cond::Sge | Cond::Sle)
    }

    pub const fn is_unsigned(self) -> bool {
        matches!(self, Cond::Ugt | Cond::Ult | Cond::Uge | Cond::Ule)
    }

    /// Evaluate the condition on two 32-bit values.
    pub const fn eval(self, a: u32, b: u32) -> bool {
        let (sa, sb) = (a as i32, b as i32);
        match self {
            Cond::Eq => a == b,
            Cond::Ne => a != b,
            Cond::Ugt => a > b,
            Cond::Ult => a < b,
            Cond::Uge => a >= b,
            Cond::Ule => a <= b,
            Cond::Sgt => sa > sb,
            Cond::Slt => sa < sb,
            Cond::Sge => sa >= sb,
            Cond::Sle => sa <= sb,
        }
    }
}

/// Register class of an IR value: which physical pool holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueClass {
    /// The instruction produces no value.
    None,
    /// General-purpose integer value (32-bit, 64-bit for CR fields).
    Int,
    /// Floating-point / paired-single value held in a vector register.
    Float,
}

/// Bitmap of host registers.
///
/// Supports up to 64 registers; the allocator only uses the low 16.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegSet(u64);

impl RegSet {
    pub const EMPTY: RegSet = RegSet(0);

    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn from_raw(bits: u64) -> Self {
        Self(bits)
    }

    /// Build a set from a list of register numbers.
    pub const fn from_regs(regs: &[u8]) -> Self {
        let mut bits = 0u64;
        let mut i = 0;
        while i < regs.len() {
            bits |= 1u64 << regs[i];
            i += 1;
        }
        Self(bits)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }

    pub const fn set(self, reg: u8) -> Self {
        Self(self.0 | (1u64 << reg))
    }

    pub const fn clear(self, reg: u8) -> Self {
        Self(self.0 & !(1u64 << reg))
    }

    pub const fn contains(self, reg: u8) -> bool {
        self.0 & (1u64 << reg) != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn union(self, other: RegSet) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn intersect(self, other: RegSet) -> Self {
        Self(self.0 & other.0)
    }

    pub const fn subtract(self, other: RegSet) -> Self {
        Self(self.0 & !other.0)
    }

    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Return the lowest set register, or None.
    pub const fn first(self) -> Option<u8> {
        if self.0 == 0 {
            None
        } else {
            Some(self.0.trailing_zeros() as u8)
        }
    }

    /// Iterate over the registers in ascending order.
    pub fn iter(self) -> impl Iterator<Item = u8> {
        let mut bits = self.0;
        std::iter::from_fn(move || {
            if bits == 0 {
                return None;
            }
            let r = bits.trailing_zeros() as u8;
            bits &= bits - 1;
            Some(r)
        })
    }
}

impl Default for RegSet {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl std::fmt::Debug for RegSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RegSet(0x{:016x})", self.0)
    }
}

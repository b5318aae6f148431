use std::fmt;

const ABI_NAMES: [&str; 32] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "fp", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// RV32 register identifiers, numbered the way GDB numbers them: `x0`..`x31`
/// followed by `pc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RiscvReg {
    X(u8),
    Pc,
}

impl RiscvReg {
    pub const ZERO: Self = Self::X(0);
    pub const RA: Self = Self::X(1);
    pub const SP: Self = Self::X(2);
    pub const GP: Self = Self::X(3);
    pub const TP: Self = Self::X(4);
    pub const FP: Self = Self::X(8);

    /// Argument register `a{n}`.
    #[must_use]
    pub const fn a(n: u8) -> Self {
        Self::X(10 + n)
    }

    /// Temporary register `t{n}`.
    #[must_use]
    pub const fn t(n: u8) -> Self {
        if n < 3 { Self::X(5 + n) } else { Self::X(25 + n) }
    }

    /// Saved register `s{n}`; `s0` is the frame pointer.
    #[must_use]
    pub const fn s(n: u8) -> Self {
        if n < 2 { Self::X(8 + n) } else { Self::X(16 + n) }
    }

    /// GDB register number.
    #[must_use]
    pub const fn regno(self) -> u8 {
        match self {
            Self::X(n) => n,
            Self::Pc => 32,
        }
    }
}

impl fmt::Display for RiscvReg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X(n) => match ABI_NAMES.get(usize::from(*n)) {
                Some(name) => f.write_str(name),
                None => write!(f, "x{n}"),
            },
            Self::Pc => f.write_str("pc"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abi_numbering() {
        assert_eq!(RiscvReg::t(0).regno(), 5);
        assert_eq!(RiscvReg::t(2).regno(), 7);
        assert_eq!(RiscvReg::t(3).regno(), 28);
        assert_eq!(RiscvReg::t(6).regno(), 31);
        assert_eq!(RiscvReg::s(1).regno(), 9);
        assert_eq!(RiscvReg::s(2).regno(), 18);
        assert_eq!(RiscvReg::s(11).regno(), 27);
        assert_eq!(RiscvReg::a(7).regno(), 17);
        assert_eq!(RiscvReg::Pc.regno(), 32);
    }

    #[test]
    fn test_abi_names() {
        assert_eq!(RiscvReg::t(4).to_string(), "t4");
        assert_eq!(RiscvReg::s(10).to_string(), "s10");
        assert_eq!(RiscvReg::FP.to_string(), "fp");
        assert_eq!(RiscvReg::ZERO.to_string(), "zero");
    }
}

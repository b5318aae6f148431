//! Logical register namespace shared by every descriptor of a family.
//!
//! A descriptor exposes an ordered subset of these identifiers. The identity of
//! a register never depends on which frame shape captured it, so consumers can
//! address `a1` or `tp` the same way for every thread.

mod riscv;
mod xtensa;

use std::fmt;

pub use riscv::RiscvReg;
pub use xtensa::XtensaReg;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Xtensa(XtensaReg),
    Riscv(RiscvReg),
}

impl Register {
    /// Width of the register in bits.
    #[must_use]
    pub const fn bits(self) -> u16 {
        match self {
            Self::Xtensa(reg) => reg.bits(),
            Self::Riscv(_) => 32,
        }
    }

    /// Width of the register in bytes.
    #[must_use]
    pub const fn size(self) -> usize {
        self.bits() as usize / 8
    }
}

impl From<XtensaReg> for Register {
    fn from(reg: XtensaReg) -> Self {
        Self::Xtensa(reg)
    }
}

impl From<RiscvReg> for Register {
    fn from(reg: RiscvReg) -> Self {
        Self::Riscv(reg)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Xtensa(reg) => reg.fmt(f),
            Self::Riscv(reg) => reg.fmt(f),
        }
    }
}

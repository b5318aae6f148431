//! Target identity: architecture family, chip variant, and per-family
//! thread-local-storage conventions.

use std::fmt;
use std::str::FromStr;

use crate::register::{Register, RiscvReg, XtensaReg};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Arch {
    RiscV,
    Xtensa,
}

impl Arch {
    /// Resolve the family from the architecture name GDB reports for the
    /// target (`riscv:rv32`, `xtensa`, ...). Matching is by prefix only.
    #[must_use]
    pub fn from_gdb_arch(gdb_arch: &str) -> Option<Self> {
        if gdb_arch.starts_with("riscv") {
            Some(Self::RiscV)
        } else if gdb_arch.starts_with("xtensa") {
            Some(Self::Xtensa)
        } else {
            None
        }
    }

    #[must_use]
    pub const fn tls_info(self) -> TlsInfo {
        match self {
            Self::RiscV => TlsInfo {
                register: Register::Riscv(RiscvReg::TP),
                align: 0,
            },
            Self::Xtensa => TlsInfo {
                register: Register::Xtensa(XtensaReg::ThreadPtr),
                align: 16,
            },
        }
    }
}

/// Where a task's thread-local storage base lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsInfo {
    /// Register holding the TLS pointer.
    pub register: Register,
    /// Alignment of the TLS block in bytes, 0 when none is required.
    pub align: u32,
}

/// TLS conventions for the architecture GDB reports, or `None` for a family
/// without FreeRTOS TLS support.
#[must_use]
pub fn tls_info_for(gdb_arch: &str) -> Option<TlsInfo> {
    Arch::from_gdb_arch(gdb_arch).map(Arch::tls_info)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Chip {
    Esp32,
    Esp32S2,
    Esp32S3,
    Esp32C2,
    Esp32C3,
}

impl Chip {
    pub const ALL: [Self; 5] = [
        Self::Esp32,
        Self::Esp32S2,
        Self::Esp32S3,
        Self::Esp32C2,
        Self::Esp32C3,
    ];

    #[must_use]
    pub const fn arch(self) -> Arch {
        match self {
            Self::Esp32 | Self::Esp32S2 | Self::Esp32S3 => Arch::Xtensa,
            Self::Esp32C2 | Self::Esp32C3 => Arch::RiscV,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Esp32 => "esp32",
            Self::Esp32S2 => "esp32s2",
            Self::Esp32S3 => "esp32s3",
            Self::Esp32C2 => "esp32c2",
            Self::Esp32C3 => "esp32c3",
        }
    }
}

impl fmt::Display for Chip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Chip {
    type Err = Error;

    /// Accepts `esp32s3`, `esp32-s3` and `ESP32_S3` spellings.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .map(|c| c.to_ascii_lowercase())
            .collect();
        Self::ALL
            .into_iter()
            .find(|chip| chip.name() == normalized)
            .ok_or_else(|| Error::UnknownChip(s.to_string()))
    }
}

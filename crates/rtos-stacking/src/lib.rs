#![allow(
    clippy::cast_possible_truncation, // target addresses are 32-bit, host arithmetic is u64
    clippy::missing_errors_doc, // every error is a failed target read or a malformed snapshot
    clippy::module_name_repetitions
)]

pub mod arch;
pub mod error;
pub mod memory;
pub mod port;
pub mod register;
pub mod select;
pub mod stacking;
pub mod thread;

/// Frame builders and memory fakes for unit and integration tests.
///
/// This module is only available when running tests or when the
/// `test-harness` feature is enabled.
#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

pub use arch::{Arch, Chip, TlsInfo, tls_info_for};
pub use error::{Error, Result};
pub use memory::{MemorySnapshot, TargetMemory};
pub use port::FreeRtosStacking;
pub use register::{Register, RiscvReg, XtensaReg};
pub use select::{Selection, select_stacking};
pub use stacking::{FrameShape, RegisterOffset, Slot, StackingDescriptor};
pub use thread::{RegisterValue, ThreadId, ThreadRegisters, read_thread_registers};

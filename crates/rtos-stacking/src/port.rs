use crate::Result;
use crate::arch::{Arch, Chip, TlsInfo};
use crate::memory::TargetMemory;
use crate::select::{Selection, select_stacking};
use crate::stacking::{FrameShape, StackingDescriptor, riscv, xtensa};
use crate::thread::{ThreadId, ThreadRegisters, read_thread_registers};

/// Stacking configuration of the FreeRTOS port for one chip, resolved once
/// per debug session.
#[derive(Debug, Clone, Copy)]
pub struct FreeRtosStacking {
    chip: Chip,
    involuntary: &'static StackingDescriptor,
    voluntary: Option<&'static StackingDescriptor>,
}

impl FreeRtosStacking {
    #[must_use]
    pub fn new(chip: Chip) -> Self {
        let (involuntary, voluntary) = match chip {
            Chip::Esp32 => (&*xtensa::ESP32_INVOLUNTARY, Some(&*xtensa::ESP32_VOLUNTARY)),
            Chip::Esp32S2 => (&*xtensa::ESP32S2_INVOLUNTARY, Some(&*xtensa::ESP32S2_VOLUNTARY)),
            Chip::Esp32S3 => (&*xtensa::ESP32S3_INVOLUNTARY, Some(&*xtensa::ESP32S3_VOLUNTARY)),
            Chip::Esp32C2 | Chip::Esp32C3 => (&*riscv::RISCV, None),
        };
        Self {
            chip,
            involuntary,
            voluntary,
        }
    }

    #[must_use]
    pub const fn chip(&self) -> Chip {
        self.chip
    }

    #[must_use]
    pub const fn arch(&self) -> Arch {
        self.chip.arch()
    }

    /// Descriptor for interrupt frames; the only one on single-shape ports.
    #[must_use]
    pub const fn involuntary(&self) -> &'static StackingDescriptor {
        self.involuntary
    }

    #[must_use]
    pub const fn voluntary(&self) -> Option<&'static StackingDescriptor> {
        self.voluntary
    }

    #[must_use]
    pub const fn descriptor(&self, shape: FrameShape) -> Option<&'static StackingDescriptor> {
        match shape {
            FrameShape::Involuntary => Some(self.involuntary),
            FrameShape::Voluntary => self.voluntary,
        }
    }

    #[must_use]
    pub const fn tls_info(&self) -> TlsInfo {
        self.arch().tls_info()
    }

    pub fn select(
        &self,
        memory: Option<&mut dyn TargetMemory>,
        thread: ThreadId,
        stack_addr: u64,
    ) -> Selection {
        select_stacking(self, memory, thread, stack_addr)
    }

    /// Select the frame shape for `thread`, follow the saved stack pointer at
    /// `stack_addr` and decode its registers.
    ///
    /// The running thread is decoded from its stale saved frame like any
    /// other; callers read its live registers from the core instead.
    pub fn read_thread(
        &self,
        memory: &mut dyn TargetMemory,
        thread: ThreadId,
        stack_addr: u64,
    ) -> Result<ThreadRegisters> {
        let selection = self.select(Some(&mut *memory), thread, stack_addr);
        let stack_ptr = u64::from(memory.read_word_32(stack_addr)?);
        let registers = read_thread_registers(memory, selection.descriptor(), thread, stack_ptr)?;
        Ok(registers.with_degraded(selection.is_degraded()))
    }
}

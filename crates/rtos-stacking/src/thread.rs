//! Per-thread register extraction from a decoded frame.

use std::fmt;
use std::fmt::Write;

use crate::memory::TargetMemory;
use crate::register::Register;
use crate::stacking::{FrameShape, StackGrowth, StackingDescriptor};
use crate::{Error, Result};

/// RTOS thread identifier as presented to the debugger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId(pub u64);

impl ThreadId {
    /// The thread currently on the CPU. Its registers come from the core, not
    /// from a saved frame.
    pub const CURRENT: Self = Self(0);

    #[must_use]
    pub const fn is_current(self) -> bool {
        self.0 == Self::CURRENT.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterValue {
    pub register: Register,
    pub bits: u16,
    /// Little-endian contents, or `None` when the frame did not capture the
    /// register.
    pub value: Option<Vec<u8>>,
}

impl RegisterValue {
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.value.is_some()
    }

    /// The value as a 32-bit word, for registers that are 32 bits wide.
    #[must_use]
    pub fn as_u32(&self) -> Option<u32> {
        let bytes: [u8; 4] = self.value.as_deref()?.try_into().ok()?;
        Some(u32::from_le_bytes(bytes))
    }

    /// Hex digits in target byte order; `x` digits for an unavailable value.
    #[must_use]
    pub fn to_hex(&self) -> String {
        match &self.value {
            Some(bytes) => bytes.iter().fold(String::new(), |mut out, byte| {
                let _ = write!(out, "{byte:02x}");
                out
            }),
            None => "xx".repeat(usize::from(self.bits / 8)),
        }
    }
}

/// Registers of one suspended thread.
#[derive(Debug, Clone)]
pub struct ThreadRegisters {
    shape: FrameShape,
    stack_ptr: u64,
    caller_stack_ptr: u64,
    degraded: bool,
    values: Vec<RegisterValue>,
}

impl ThreadRegisters {
    pub(crate) fn with_degraded(mut self, degraded: bool) -> Self {
        self.degraded = degraded;
        self
    }

    /// True when the frame shape was assumed because target memory could not
    /// be read during selection.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }

    #[must_use]
    pub const fn shape(&self) -> FrameShape {
        self.shape
    }

    /// Stack pointer the frame was read from.
    #[must_use]
    pub const fn stack_ptr(&self) -> u64 {
        self.stack_ptr
    }

    /// Stack pointer of the suspended code once the frame is popped.
    #[must_use]
    pub const fn caller_stack_ptr(&self) -> u64 {
        self.caller_stack_ptr
    }

    #[must_use]
    pub fn values(&self) -> &[RegisterValue] {
        &self.values
    }

    #[must_use]
    pub fn get(&self, register: impl Into<Register>) -> Option<&RegisterValue> {
        let register = register.into();
        self.values.iter().find(|value| value.register == register)
    }

    /// Payload of a GDB `g` packet: every register in order, unavailable ones
    /// as `xx` per byte.
    #[must_use]
    pub fn to_gdb_hex(&self) -> String {
        self.values.iter().map(RegisterValue::to_hex).collect()
    }
}

/// Decode the registers saved for `thread` in the frame at `stack_ptr`.
///
/// `stack_ptr` is the task's top-of-stack as recorded by the RTOS. A frame on
/// an upward-growing stack lies below it.
pub fn read_thread_registers(
    memory: &mut dyn TargetMemory,
    descriptor: &StackingDescriptor,
    thread: ThreadId,
    stack_ptr: u64,
) -> Result<ThreadRegisters> {
    if stack_ptr == 0 {
        return Err(Error::NullStackPointer(thread));
    }

    let frame_addr = match descriptor.growth() {
        StackGrowth::Down => stack_ptr,
        StackGrowth::Up => stack_ptr.wrapping_sub(descriptor.frame_size() as u64),
    };
    let frame = descriptor.read_frame(memory, frame_addr)?;
    let caller_stack_ptr = descriptor.caller_stack_pointer(stack_ptr);

    tracing::debug!(
        "thread {thread}: {} frame at {frame_addr:#010x}, caller sp {caller_stack_ptr:#010x}",
        descriptor.name()
    );

    let values = descriptor
        .registers()
        .iter()
        .map(|entry| RegisterValue {
            register: entry.register,
            bits: entry.bits,
            value: entry
                .offset()
                .map(|offset| frame[offset..offset + entry.size()].to_vec()),
        })
        .collect();

    Ok(ThreadRegisters {
        shape: descriptor.shape(),
        stack_ptr,
        caller_stack_ptr,
        degraded: false,
        values,
    })
}

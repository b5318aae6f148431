//! Stacking descriptors: where each logical register lives in a saved task
//! frame, and how that frame is read from the target.
//!
//! Descriptors are static configuration. They are composed once per process
//! from an ordered register layout (a family-wide prefix plus per-variant
//! segments) and an offset map (a per-shape base map plus per-variant
//! overrides), validated, and never mutated afterwards.

pub mod riscv;
pub mod xtensa;

use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::memory::TargetMemory;
use crate::register::Register;
use crate::{Error, Result};

/// How a task came to be switched out, which decides the frame layout.
///
/// The RISC-V port saves a single frame shape, reported as `Involuntary`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameShape {
    /// Preempted by an interrupt or exception; full register snapshot.
    Involuntary,
    /// Cooperative yield; only a minimal register subset was spilled.
    Voluntary,
}

impl fmt::Display for FrameShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Involuntary => f.write_str("involuntary"),
            Self::Voluntary => f.write_str("voluntary"),
        }
    }
}

/// Location of a register inside a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Byte offset from the start of the decoded frame.
    At(u16),
    /// Not captured by this frame shape.
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterOffset {
    pub register: Register,
    pub slot: Slot,
    pub bits: u16,
}

impl RegisterOffset {
    #[must_use]
    pub const fn offset(&self) -> Option<usize> {
        match self.slot {
            Slot::At(offset) => Some(offset as usize),
            Slot::Absent => None,
        }
    }

    #[must_use]
    pub const fn size(&self) -> usize {
        self.bits as usize / 8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackGrowth {
    Up,
    Down,
}

/// Rule applied to the stack pointer computed for the caller once the frame
/// has been popped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackAlign {
    Unaligned,
    /// Round to a multiple of the given power of two. Downward stacks round
    /// up so the result never points back into the popped frame.
    Align(u64),
}

impl StackAlign {
    #[must_use]
    pub const fn apply(self, stack_ptr: u64, growth: StackGrowth) -> u64 {
        match self {
            Self::Unaligned => stack_ptr,
            Self::Align(align) => {
                let aligned = stack_ptr & !(align - 1);
                if aligned != stack_ptr && matches!(growth, StackGrowth::Down) {
                    aligned.wrapping_add(align)
                } else {
                    aligned
                }
            }
        }
    }
}

/// Strategy used to turn target memory into a decoded frame buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameReader {
    /// Copy `frame_size` bytes verbatim.
    Verbatim,
    /// Xtensa interrupt frame with the PS exception bit normalized away.
    XtensaInvoluntary,
    /// Xtensa solicited-yield frame rebuilt from the yield frame and the
    /// caller's register spill area.
    XtensaVoluntary,
}

impl FrameReader {
    fn read(self, memory: &mut dyn TargetMemory, stack_ptr: u64, out: &mut [u8]) -> Result<()> {
        match self {
            Self::Verbatim => memory.read(stack_ptr, out),
            Self::XtensaInvoluntary => xtensa::read_involuntary(memory, stack_ptr, out),
            Self::XtensaVoluntary => xtensa::read_voluntary(memory, stack_ptr, out),
        }
    }
}

/// Configuration bugs caught while building a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("{register} appears more than once in the layout")]
    DuplicateRegister { register: Register },

    #[error("{register} at {offset:#x} does not fit in a {frame_size:#x}-byte frame")]
    OutsideFrame {
        register: Register,
        offset: usize,
        frame_size: usize,
    },

    #[error("{first} and {second} overlap in the frame")]
    Overlap { first: Register, second: Register },
}

#[derive(Debug, Clone)]
pub struct StackingDescriptor {
    name: &'static str,
    shape: FrameShape,
    frame_size: usize,
    growth: StackGrowth,
    align: StackAlign,
    registers: Vec<RegisterOffset>,
    reader: FrameReader,
}

impl StackingDescriptor {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    #[must_use]
    pub const fn shape(&self) -> FrameShape {
        self.shape
    }

    /// Size of the decoded frame in bytes, including synthesized words.
    #[must_use]
    pub const fn frame_size(&self) -> usize {
        self.frame_size
    }

    #[must_use]
    pub const fn growth(&self) -> StackGrowth {
        self.growth
    }

    #[must_use]
    pub const fn align(&self) -> StackAlign {
        self.align
    }

    #[must_use]
    pub const fn reader(&self) -> FrameReader {
        self.reader
    }

    /// Number of logical registers exposed to the consumer.
    #[must_use]
    pub fn num_registers(&self) -> usize {
        self.registers.len()
    }

    /// Register entries in presentation order.
    #[must_use]
    pub fn registers(&self) -> &[RegisterOffset] {
        &self.registers
    }

    #[must_use]
    pub fn entry(&self, register: Register) -> Option<&RegisterOffset> {
        self.registers.iter().find(|entry| entry.register == register)
    }

    /// Byte offset of `register` in the decoded frame, or `None` when this
    /// frame shape does not capture it.
    #[must_use]
    pub fn offset_of(&self, register: impl Into<Register>) -> Option<usize> {
        self.entry(register.into()).and_then(RegisterOffset::offset)
    }

    /// Decode the frame at `stack_ptr` into `out`, which must be exactly
    /// [`frame_size`](Self::frame_size) bytes.
    ///
    /// On a failed read the contents of `out` are unspecified, except for the
    /// voluntary reader's caller-spill step, which leaves the placeholder words
    /// in place.
    pub fn read_frame_into(
        &self,
        memory: &mut dyn TargetMemory,
        stack_ptr: u64,
        out: &mut [u8],
    ) -> Result<()> {
        if out.len() != self.frame_size {
            return Err(Error::FrameBufferSize {
                expected: self.frame_size,
                actual: out.len(),
            });
        }
        self.reader.read(memory, stack_ptr, out)
    }

    /// Decode the frame at `stack_ptr` into a fresh buffer.
    pub fn read_frame(&self, memory: &mut dyn TargetMemory, stack_ptr: u64) -> Result<Vec<u8>> {
        let mut frame = vec![0; self.frame_size];
        self.read_frame_into(memory, stack_ptr, &mut frame)?;
        Ok(frame)
    }

    /// Stack pointer of the interrupted code once this frame is popped.
    #[must_use]
    pub const fn caller_stack_pointer(&self, stack_ptr: u64) -> u64 {
        let popped = match self.growth {
            StackGrowth::Down => stack_ptr.wrapping_add(self.frame_size as u64),
            StackGrowth::Up => stack_ptr.wrapping_sub(self.frame_size as u64),
        };
        self.align.apply(popped, self.growth)
    }

    /// Check the table invariants: unique registers, every present slot
    /// inside the frame, no two present slots overlapping.
    pub fn validate(&self) -> std::result::Result<(), LayoutError> {
        let mut seen = HashSet::with_capacity(self.registers.len());
        for entry in &self.registers {
            if !seen.insert(entry.register) {
                return Err(LayoutError::DuplicateRegister {
                    register: entry.register,
                });
            }
        }

        let mut present: Vec<(usize, &RegisterOffset)> = self
            .registers
            .iter()
            .filter_map(|entry| entry.offset().map(|offset| (offset, entry)))
            .collect();
        present.sort_by_key(|(offset, _)| *offset);

        for (offset, entry) in &present {
            if offset + entry.size() > self.frame_size {
                return Err(LayoutError::OutsideFrame {
                    register: entry.register,
                    offset: *offset,
                    frame_size: self.frame_size,
                });
            }
        }

        for pair in present.windows(2) {
            let (first_offset, first) = pair[0];
            let (second_offset, second) = pair[1];
            if first_offset + first.size() > second_offset {
                return Err(LayoutError::Overlap {
                    first: first.register,
                    second: second.register,
                });
            }
        }

        Ok(())
    }
}

/// Composes a descriptor from a register layout and an offset map.
///
/// Offsets may name registers the layout does not expose; those are ignored
/// so one offset map can serve every variant of a family.
#[derive(Debug)]
pub(crate) struct DescriptorBuilder {
    name: &'static str,
    shape: FrameShape,
    frame_size: usize,
    growth: StackGrowth,
    align: StackAlign,
    reader: FrameReader,
    layout: Vec<Register>,
    offsets: HashMap<Register, u16>,
}

impl DescriptorBuilder {
    pub(crate) fn new(name: &'static str, shape: FrameShape, frame_size: usize) -> Self {
        Self {
            name,
            shape,
            frame_size,
            growth: StackGrowth::Down,
            align: StackAlign::Align(8),
            reader: FrameReader::Verbatim,
            layout: Vec::new(),
            offsets: HashMap::new(),
        }
    }

    pub(crate) fn reader(mut self, reader: FrameReader) -> Self {
        self.reader = reader;
        self
    }

    pub(crate) fn growth(mut self, growth: StackGrowth) -> Self {
        self.growth = growth;
        self
    }

    pub(crate) fn align(mut self, align: StackAlign) -> Self {
        self.align = align;
        self
    }

    /// Append registers to the presentation order.
    pub(crate) fn layout<R: Into<Register>>(
        mut self,
        registers: impl IntoIterator<Item = R>,
    ) -> Self {
        self.layout.extend(registers.into_iter().map(Into::into));
        self
    }

    /// Add offsets, replacing any earlier offset for the same register.
    pub(crate) fn offsets<R: Into<Register>>(
        mut self,
        offsets: impl IntoIterator<Item = (R, u16)>,
    ) -> Self {
        self.offsets
            .extend(offsets.into_iter().map(|(register, offset)| (register.into(), offset)));
        self
    }

    /// # Panics
    ///
    /// Panics if the composed table breaks a [`LayoutError`] invariant. The
    /// tables are static, so this only fires on a broken table edit.
    #[track_caller]
    pub(crate) fn build(self) -> StackingDescriptor {
        let registers = self
            .layout
            .iter()
            .map(|&register| RegisterOffset {
                register,
                slot: self
                    .offsets
                    .get(&register)
                    .map_or(Slot::Absent, |&offset| Slot::At(offset)),
                bits: register.bits(),
            })
            .collect();

        let descriptor = StackingDescriptor {
            name: self.name,
            shape: self.shape,
            frame_size: self.frame_size,
            growth: self.growth,
            align: self.align,
            registers,
            reader: self.reader,
        };

        if let Err(err) = descriptor.validate() {
            panic!("invalid stacking table {}: {err}", descriptor.name);
        }
        descriptor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::{RiscvReg, XtensaReg};

    #[test]
    fn test_align8_rounds_up_for_downward_stack() {
        let align = StackAlign::Align(8);
        assert_eq!(align.apply(0x1000, StackGrowth::Down), 0x1000);
        assert_eq!(align.apply(0x1004, StackGrowth::Down), 0x1008);
        assert_eq!(align.apply(0x1004, StackGrowth::Up), 0x1000);
        assert_eq!(StackAlign::Unaligned.apply(0x1003, StackGrowth::Down), 0x1003);
    }

    #[test]
    fn test_builder_marks_missing_offsets_absent() {
        let descriptor = DescriptorBuilder::new("test", FrameShape::Involuntary, 8)
            .layout([RiscvReg::Pc, RiscvReg::RA, RiscvReg::SP])
            .offsets([(RiscvReg::Pc, 0), (RiscvReg::RA, 4), (RiscvReg::GP, 0x40)])
            .build();

        assert_eq!(descriptor.num_registers(), 3);
        assert_eq!(descriptor.offset_of(RiscvReg::Pc), Some(0));
        assert_eq!(descriptor.offset_of(RiscvReg::RA), Some(4));
        assert_eq!(descriptor.offset_of(RiscvReg::SP), None);
        // GP has an offset but is not part of the layout.
        assert_eq!(descriptor.offset_of(RiscvReg::GP), None);
        assert!(descriptor.entry(RiscvReg::GP.into()).is_none());
    }

    #[test]
    fn test_later_offsets_override_earlier() {
        let descriptor = DescriptorBuilder::new("test", FrameShape::Involuntary, 0x80)
            .layout([XtensaReg::ThreadPtr])
            .offsets([(XtensaReg::ThreadPtr, 0x70)])
            .offsets([(XtensaReg::ThreadPtr, 0x64)])
            .build();
        assert_eq!(descriptor.offset_of(XtensaReg::ThreadPtr), Some(0x64));
    }

    #[test]
    #[should_panic(expected = "does not fit")]
    fn test_builder_rejects_offset_outside_frame() {
        let _ = DescriptorBuilder::new("test", FrameShape::Involuntary, 8)
            .layout([RiscvReg::Pc])
            .offsets([(RiscvReg::Pc, 6)])
            .build();
    }

    #[test]
    #[should_panic(expected = "overlap")]
    fn test_builder_rejects_overlap() {
        let _ = DescriptorBuilder::new("test", FrameShape::Involuntary, 16)
            .layout([RiscvReg::Pc, RiscvReg::RA])
            .offsets([(RiscvReg::Pc, 0), (RiscvReg::RA, 2)])
            .build();
    }

    #[test]
    #[should_panic(expected = "more than once")]
    fn test_builder_rejects_duplicate_register() {
        let _ = DescriptorBuilder::new("test", FrameShape::Involuntary, 16)
            .layout([RiscvReg::Pc, RiscvReg::Pc])
            .build();
    }

    #[test]
    fn test_caller_stack_pointer() {
        let descriptor = DescriptorBuilder::new("test", FrameShape::Involuntary, 0x78)
            .layout([RiscvReg::Pc])
            .build();
        assert_eq!(descriptor.caller_stack_pointer(0x3ffb_8000), 0x3ffb_8078);
        assert_eq!(descriptor.caller_stack_pointer(0x3ffb_8004), 0x3ffb_8080);
    }

    #[test]
    fn test_read_frame_rejects_wrong_buffer_size() {
        let descriptor = DescriptorBuilder::new("test", FrameShape::Involuntary, 8)
            .layout([RiscvReg::Pc])
            .build();
        let mut memory = crate::MemorySnapshot::new().with_region(0, vec![0; 8]);
        let mut out = [0; 4];
        let err = descriptor.read_frame_into(&mut memory, 0, &mut out).unwrap_err();
        assert!(matches!(
            err,
            Error::FrameBufferSize {
                expected: 8,
                actual: 4
            }
        ));
    }
}

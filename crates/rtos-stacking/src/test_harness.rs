//! Test harness for rtos-stacking unit and integration tests.
//!
//! Builds target memory images holding suspended FreeRTOS tasks, and wraps
//! memory to inject read faults or record the reads a decode performs.
//!
//! # Example
//!
//! ```rust
//! use rtos_stacking::test_harness::*;
//! use rtos_stacking::{Chip, FreeRtosStacking, FrameShape, ThreadId};
//!
//! let task = YieldFrame::new(0x800d_1234, 0x3ffb_9000);
//! let mut memory = task.memory();
//!
//! let stacking = FreeRtosStacking::new(Chip::Esp32);
//! let regs = stacking
//!     .read_thread(&mut memory, ThreadId(3), TCB_ADDR)
//!     .expect("decode");
//! assert_eq!(regs.shape(), FrameShape::Voluntary);
//! ```

#![allow(
    clippy::must_use_candidate,
    clippy::missing_panics_doc,
    clippy::cast_possible_truncation
)]

use std::ops::Range;

use crate::memory::{MemorySnapshot, TargetMemory};
use crate::{Error, Result};

/// Address of the task control block; its first word is the saved stack
/// pointer.
pub const TCB_ADDR: u64 = 0x3ffb_1000;

/// Saved stack pointer of the task under test.
pub const STACK_PTR: u64 = 0x3ffb_8000;

/// Pack words little-endian.
pub fn words_to_bytes(words: &[u32]) -> Vec<u8> {
    words.iter().flat_map(|word| word.to_le_bytes()).collect()
}

/// Little-endian word at `offset`.
pub fn word_at(frame: &[u8], offset: usize) -> u32 {
    let bytes: [u8; 4] = frame[offset..offset + 4]
        .try_into()
        .expect("word inside frame");
    u32::from_le_bytes(bytes)
}

/// `len` bytes counting up from `seed`, so every byte of a frame is
/// distinguishable.
pub fn patterned(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

/// A task whose TCB at [`TCB_ADDR`] points at `frame` stored at [`STACK_PTR`].
pub fn task_memory(frame: Vec<u8>) -> MemorySnapshot {
    let mut memory = MemorySnapshot::new().with_region(STACK_PTR, frame);
    memory.write_word_32(TCB_ADDR, STACK_PTR as u32);
    memory
}

/// An Xtensa task suspended in a solicited yield.
#[derive(Debug, Clone)]
pub struct YieldFrame {
    /// a0..a3 of the yielding function, stored just below the stack pointer.
    /// `base_save[1]` is the caller's stack pointer.
    pub base_save: [u32; 4],
    /// Raw return address, call-size bits included.
    pub return_addr: u32,
    pub ps: u32,
    /// Twelve words ending at the caller's stack pointer; the last four are
    /// the caller's own base save area.
    pub caller_spill: [u32; 12],
}

impl YieldFrame {
    pub fn new(return_addr: u32, caller_sp: u32) -> Self {
        let mut caller_spill = [0; 12];
        for (i, word) in caller_spill.iter_mut().enumerate() {
            *word = 0xc000_0000 + i as u32;
        }
        Self {
            base_save: [0xa000_0000, caller_sp, 0xa000_0002, 0xa000_0003],
            return_addr,
            ps: 0x0006_0030,
            caller_spill,
        }
    }

    pub fn caller_sp(&self) -> u64 {
        u64::from(self.base_save[1])
    }

    /// Words `index..index + count` of the caller spill area.
    pub fn spill_words(&self, index: usize, count: usize) -> &[u32] {
        &self.caller_spill[index..index + count]
    }

    /// Memory image with the TCB, the yield frame and the caller spill area.
    pub fn memory(&self) -> MemorySnapshot {
        let mut frame = Vec::with_capacity(0x30);
        frame.extend(words_to_bytes(&self.base_save));
        // exit marker, return address, PS, next, then the unused a0..a3 slots
        frame.extend(words_to_bytes(&[
            0,
            self.return_addr,
            self.ps,
            0,
            0x5050_5050,
            0x5151_5151,
            0x5252_5252,
            0x5353_5353,
        ]));

        let mut memory = MemorySnapshot::new()
            .with_region(STACK_PTR - 0x10, frame)
            .with_region(
                u64::from(self.base_save[1].wrapping_sub(48)),
                words_to_bytes(&self.caller_spill),
            );
        memory.write_word_32(TCB_ADDR, STACK_PTR as u32);
        memory
    }
}

/// Fails every read overlapping `fault`, delegating the rest.
#[derive(Debug)]
pub struct FaultyMemory<M> {
    pub inner: M,
    pub fault: Range<u64>,
}

impl<M> FaultyMemory<M> {
    pub fn new(inner: M, fault: Range<u64>) -> Self {
        Self { inner, fault }
    }
}

impl<M: TargetMemory> TargetMemory for FaultyMemory<M> {
    fn read(&mut self, address: u64, data: &mut [u8]) -> Result<()> {
        let end = address + data.len() as u64;
        if address < self.fault.end && self.fault.start < end {
            return Err(Error::MemoryRead {
                address,
                len: data.len(),
            });
        }
        self.inner.read(address, data)
    }
}

/// Records `(address, len)` of every read, successful or not.
#[derive(Debug)]
pub struct RecordingMemory<M> {
    pub inner: M,
    pub reads: Vec<(u64, usize)>,
}

impl<M> RecordingMemory<M> {
    pub fn new(inner: M) -> Self {
        Self {
            inner,
            reads: Vec::new(),
        }
    }
}

impl<M: TargetMemory> TargetMemory for RecordingMemory<M> {
    fn read(&mut self, address: u64, data: &mut [u8]) -> Result<()> {
        self.reads.push((address, data.len()));
        self.inner.read(address, data)
    }
}

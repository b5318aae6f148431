//! Xtensa FreeRTOS frames (ESP32, ESP32-S2, ESP32-S3).
//!
//! The Xtensa port leaves a task in one of two frame shapes. A task switched
//! out by an interrupt carries a full exception frame. A task that yielded on
//! its own went through a windowed call into the scheduler, which spills only
//! the return address and PS; its remaining live registers sit in the
//! register-window spill areas of its own and its caller's stack frames.
//!
//! Decoded voluntary frame (offsets into the buffer; the yield frame starts at
//! 0x10, which is where the task's saved stack pointer points):
//!
//! ```text
//! 0x00  a0..a3 of the yielding function  (base save area, below SP)
//! 0x10  exit marker, 0 for a solicited yield
//! 0x14  return address into the yielding function (call size in bits 31:30)
//! 0x18  PS at the time of the yield
//! 0x1c  unused
//! 0x20  unused solicited-frame a0..a3, zeroed
//! 0x30  a4..a11 spliced from the caller's spill area, 0xdeadbeef otherwise
//! ```

use std::iter;
use std::sync::LazyLock;

use super::{DescriptorBuilder, FrameReader, FrameShape, StackingDescriptor};
use crate::Result;
use crate::arch::Chip;
use crate::memory::TargetMemory;
use crate::register::XtensaReg::{self, *};

/// PS.EXCM, set while the core runs in exception mode.
pub const PS_EXCM: u8 = 0x10;

/// Placeholder for registers a voluntary frame did not capture.
pub const UNKNOWN_REGISTER: u32 = 0xdead_beef;

/// Decoded size of an ESP32 / ESP32-S3 interrupt frame, covering the MAC16
/// and ESP32 extension slots at its top.
pub const INVOLUNTARY_FRAME_SIZE: usize = 40 * 4;
/// Decoded size of an ESP32-S2 interrupt frame.
pub const INVOLUNTARY_FRAME_SIZE_S2: usize = 30 * 4;
/// Decoded size of a voluntary frame, including the synthesized words.
pub const VOLUNTARY_FRAME_SIZE: usize = 0x50;

const INVOLUNTARY_PS: usize = 0x08;

const VOLUNTARY_BASE_SAVE: u32 = 0x10;
const VOLUNTARY_HEAD_SIZE: usize = 0x20;
const VOLUNTARY_CALLER_SP: usize = 0x04;
const VOLUNTARY_RETURN_ADDR: usize = 0x14;
const VOLUNTARY_PS: usize = 0x18;
const VOLUNTARY_CALLER_SPILL: usize = 0x30;

/// Region the return address of a windowed call is assumed to point into once
/// the call-size bits are stripped.
const RETURN_ADDR_REGION: u32 = 0x4000_0000;
const RETURN_ADDR_MASK: u32 = 0x3fff_ffff;

/// Windowed call variant, encoded in the top two bits of the return address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowCall {
    /// No window rotation; not produced by a windowed call.
    Call0,
    Call4,
    Call8,
    Call12,
}

impl WindowCall {
    #[must_use]
    pub const fn from_return_address(return_addr: u32) -> Self {
        match return_addr >> 30 {
            0 => Self::Call0,
            1 => Self::Call4,
            2 => Self::Call8,
            _ => Self::Call12,
        }
    }

    /// Where the caller spilled the registers this call rotated out of view,
    /// as (bytes below the caller's stack pointer, length).
    const fn caller_spill(self) -> Option<(u32, usize)> {
        match self {
            Self::Call8 => Some((32, 16)),
            Self::Call12 => Some((48, 32)),
            Self::Call0 | Self::Call4 => None,
        }
    }
}

/// Strip the call-size bits from a windowed-call return address.
#[must_use]
pub const fn canonical_return_address(return_addr: u32) -> u32 {
    (return_addr & RETURN_ADDR_MASK) | RETURN_ADDR_REGION
}

/// Read an interrupt frame verbatim and clear PS.EXCM, so the unwinder sees a
/// plain suspended call chain rather than an exception in progress.
pub(super) fn read_involuntary(
    memory: &mut dyn TargetMemory,
    stack_ptr: u64,
    out: &mut [u8],
) -> Result<()> {
    memory.read(stack_ptr, out)?;
    out[INVOLUNTARY_PS] &= !PS_EXCM;
    Ok(())
}

/// Rebuild a solicited-yield frame. See the module docs for the layout.
pub(super) fn read_voluntary(
    memory: &mut dyn TargetMemory,
    stack_ptr: u64,
    out: &mut [u8],
) -> Result<()> {
    // Target addresses are 32 bits wide and wrap as such.
    let base_save = (stack_ptr as u32).wrapping_sub(VOLUNTARY_BASE_SAVE);
    let mut head = [0u8; VOLUNTARY_HEAD_SIZE];
    memory.read(u64::from(base_save), &mut head)?;

    out[..VOLUNTARY_HEAD_SIZE].copy_from_slice(&head);
    out[VOLUNTARY_HEAD_SIZE..VOLUNTARY_CALLER_SPILL].fill(0);
    out[VOLUNTARY_PS] &= !PS_EXCM;

    let return_addr = word(out, VOLUNTARY_RETURN_ADDR);
    let call = WindowCall::from_return_address(return_addr);
    put_word(out, VOLUNTARY_RETURN_ADDR, canonical_return_address(return_addr));

    let caller_sp = word(out, VOLUNTARY_CALLER_SP);

    for slot in out[VOLUNTARY_CALLER_SPILL..].chunks_exact_mut(4) {
        slot.copy_from_slice(&UNKNOWN_REGISTER.to_le_bytes());
    }

    let Some((below, len)) = call.caller_spill() else {
        tracing::warn!(
            "voluntary frame at {stack_ptr:#010x} returns through {call:?}, \
             caller registers unavailable"
        );
        return Ok(());
    };

    tracing::debug!(
        "voluntary frame at {stack_ptr:#010x}: {call:?}, caller sp {caller_sp:#010x}"
    );
    let mut spill = vec![0u8; len];
    memory.read(u64::from(caller_sp.wrapping_sub(below)), &mut spill)?;
    out[VOLUNTARY_CALLER_SPILL..VOLUNTARY_CALLER_SPILL + len].copy_from_slice(&spill);
    Ok(())
}

fn word(frame: &[u8], offset: usize) -> u32 {
    let mut bytes = [0; 4];
    bytes.copy_from_slice(&frame[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

fn put_word(frame: &mut [u8], offset: usize, value: u32) {
    frame[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

// ── Register layouts ──

/// PC and the 64 physical address registers, common to every variant.
fn core() -> impl Iterator<Item = XtensaReg> {
    iter::once(Pc).chain((0..64).map(Ar))
}

const LOOP: [XtensaReg; 3] = [Lbeg, Lend, Lcount];

const SPECIAL: [XtensaReg; 7] = [
    Sar,
    WindowBase,
    WindowStart,
    ConfigId0,
    ConfigId1,
    Ps,
    ThreadPtr,
];

const MAC: [XtensaReg; 8] = [Br, Scompare1, AccLo, AccHi, M(0), M(1), M(2), M(3)];

const ESP32_EXTRA: [XtensaReg; 4] = [ExpState, F64RLo, F64RHi, F64S];

fn fpu() -> impl Iterator<Item = XtensaReg> {
    (0..16).map(F).chain([Fcr, Fsr])
}

fn esp32s3_tie() -> impl Iterator<Item = XtensaReg> {
    (0..2)
        .map(AccX)
        .chain((0..5).map(QaccH))
        .chain((0..5).map(QaccL))
        .chain([SarByte, FftBitWidth])
        .chain((0..4).map(UaState))
        .chain((0..8).map(Q))
}

/// Presentation order of the registers exposed for `chip`.
fn layout(chip: Chip) -> Vec<XtensaReg> {
    let mut regs: Vec<XtensaReg> = core().collect();
    match chip {
        Chip::Esp32S2 => {
            regs.extend(SPECIAL);
            regs.push(GpioOut);
        }
        Chip::Esp32S3 => {
            regs.extend(LOOP);
            regs.extend(SPECIAL);
            regs.extend(MAC);
            regs.push(GpioOut);
            regs.extend(fpu());
            regs.extend(esp32s3_tie());
        }
        // Plain ESP32; the RISC-V chips never reach here.
        _ => {
            regs.extend(LOOP);
            regs.extend(SPECIAL);
            regs.extend(MAC);
            regs.extend(ESP32_EXTRA);
            regs.extend(fpu());
        }
    }
    regs
}

// ── Frame offsets ──

/// `count` consecutive address registers from `a{first}`, one word apart.
fn ar_run(first: u8, count: u8, offset: u16) -> impl Iterator<Item = (XtensaReg, u16)> {
    (0..count).map(move |i| (Ar(first + i), offset + 4 * u16::from(i)))
}

fn involuntary_offsets() -> impl Iterator<Item = (XtensaReg, u16)> {
    [(Pc, 0x04), (Ps, 0x08)]
        .into_iter()
        .chain(ar_run(0, 16, 0x0c))
        .chain([
            (Sar, 0x4c),
            (Lbeg, 0x58),
            (Lend, 0x5c),
            (Lcount, 0x60),
            (ThreadPtr, 0x70),
            (AccLo, 0x74),
            (AccHi, 0x78),
            (Br, 0x7c),
            (Scompare1, 0x80),
            (M(0), 0x84),
            (M(1), 0x88),
            (M(2), 0x8c),
            (M(3), 0x90),
            (F64RLo, 0x94),
            (F64RHi, 0x98),
            (F64S, 0x9c),
        ])
}

/// ESP32-S2 has no loop or MAC16 registers, so THREADPTR sits lower.
const ESP32S2_INVOLUNTARY_DELTA: [(XtensaReg, u16); 1] = [(ThreadPtr, 0x64)];

fn voluntary_offsets() -> impl Iterator<Item = (XtensaReg, u16)> {
    ar_run(0, 4, 0x00)
        .chain([(Pc, 0x14), (Ps, 0x18)])
        .chain(ar_run(4, 8, 0x30))
}

fn involuntary(chip: Chip, name: &'static str) -> StackingDescriptor {
    let frame_size = if chip == Chip::Esp32S2 {
        INVOLUNTARY_FRAME_SIZE_S2
    } else {
        INVOLUNTARY_FRAME_SIZE
    };
    let builder = DescriptorBuilder::new(name, FrameShape::Involuntary, frame_size)
        .reader(FrameReader::XtensaInvoluntary)
        .layout(layout(chip))
        .offsets(involuntary_offsets());
    let builder = if chip == Chip::Esp32S2 {
        builder.offsets(ESP32S2_INVOLUNTARY_DELTA)
    } else {
        builder
    };
    builder.build()
}

fn voluntary(chip: Chip, name: &'static str) -> StackingDescriptor {
    DescriptorBuilder::new(name, FrameShape::Voluntary, VOLUNTARY_FRAME_SIZE)
        .reader(FrameReader::XtensaVoluntary)
        .layout(layout(chip))
        .offsets(voluntary_offsets())
        .build()
}

pub static ESP32_INVOLUNTARY: LazyLock<StackingDescriptor> =
    LazyLock::new(|| involuntary(Chip::Esp32, "esp32"));
pub static ESP32_VOLUNTARY: LazyLock<StackingDescriptor> =
    LazyLock::new(|| voluntary(Chip::Esp32, "esp32 voluntary"));
pub static ESP32S2_INVOLUNTARY: LazyLock<StackingDescriptor> =
    LazyLock::new(|| involuntary(Chip::Esp32S2, "esp32s2"));
pub static ESP32S2_VOLUNTARY: LazyLock<StackingDescriptor> =
    LazyLock::new(|| voluntary(Chip::Esp32S2, "esp32s2 voluntary"));
pub static ESP32S3_INVOLUNTARY: LazyLock<StackingDescriptor> =
    LazyLock::new(|| involuntary(Chip::Esp32S3, "esp32s3"));
pub static ESP32S3_VOLUNTARY: LazyLock<StackingDescriptor> =
    LazyLock::new(|| voluntary(Chip::Esp32S3, "esp32s3 voluntary"));

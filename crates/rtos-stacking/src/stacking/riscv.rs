//! RISC-V FreeRTOS frame (ESP32-C2, ESP32-C3).
//!
//! The port saves every task the same way, so there is one descriptor and the
//! frame is copied verbatim.

use std::sync::LazyLock;

use super::{DescriptorBuilder, FrameShape, StackingDescriptor};
use crate::register::RiscvReg;

pub const FRAME_SIZE: usize = 32 * 4;

fn layout() -> impl Iterator<Item = RiscvReg> {
    (0..32).map(RiscvReg::X).chain([RiscvReg::Pc])
}

fn offsets() -> impl Iterator<Item = (RiscvReg, u16)> {
    let a = (0..8).map(|n| (RiscvReg::a(n), 0x08 + 4 * u16::from(n)));
    let t = (0..7).map(|n| (RiscvReg::t(n), 0x28 + 4 * u16::from(n)));
    let s = (1..12).map(|n| (RiscvReg::s(n), 0x54 + 4 * (u16::from(n) - 1)));

    [(RiscvReg::Pc, 0x00), (RiscvReg::RA, 0x04)]
        .into_iter()
        .chain(a)
        .chain(t)
        .chain([
            (RiscvReg::SP, 0x44),
            (RiscvReg::GP, 0x48),
            (RiscvReg::TP, 0x4c),
            (RiscvReg::FP, 0x50),
        ])
        .chain(s)
}

pub static RISCV: LazyLock<StackingDescriptor> = LazyLock::new(|| {
    DescriptorBuilder::new("riscv", FrameShape::Involuntary, FRAME_SIZE)
        .layout(layout())
        .offsets(offsets())
        .build()
});

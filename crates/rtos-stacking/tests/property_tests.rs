//! Property-based tests for frame selection and the Xtensa frame readers.
//!
//! - Selection depends only on whether the exit marker is zero
//! - Selection is stable across repeated calls at one halt
//! - Interrupt frames differ from target memory only in PS.EXCM
//! - Voluntary frames canonicalize the return address and splice by call size

use proptest::prelude::*;
use rtos_stacking::stacking::xtensa::{
    ESP32_INVOLUNTARY, ESP32_VOLUNTARY, PS_EXCM, UNKNOWN_REGISTER,
};
use rtos_stacking::test_harness::*;
use rtos_stacking::{Chip, FrameShape, FreeRtosStacking, ThreadId, select_stacking};

fn xtensa_chip() -> impl Strategy<Value = Chip> {
    prop_oneof![Just(Chip::Esp32), Just(Chip::Esp32S2), Just(Chip::Esp32S3)]
}

/// Caller stack pointers well clear of the yield frame and the TCB.
fn caller_sp() -> impl Strategy<Value = u32> {
    (0x3ffc_0000u32..0x3ffd_0000).prop_map(|sp| sp & !0xf)
}

proptest! {
    #[test]
    fn selection_follows_exit_marker(
        chip in xtensa_chip(),
        marker in any::<u32>(),
        thread in 1u64..64,
    ) {
        let stacking = FreeRtosStacking::new(chip);
        let mut memory = task_memory(words_to_bytes(&[marker]));

        let selection = select_stacking(&stacking, Some(&mut memory), ThreadId(thread), TCB_ADDR);

        let expected = if marker == 0 { FrameShape::Voluntary } else { FrameShape::Involuntary };
        prop_assert_eq!(selection.descriptor().shape(), expected);
        prop_assert!(!selection.is_degraded());
    }

    #[test]
    fn selection_is_stable(chip in xtensa_chip(), marker in prop_oneof![Just(0u32), any::<u32>()]) {
        let stacking = FreeRtosStacking::new(chip);
        let mut memory = task_memory(words_to_bytes(&[marker]));

        let first = stacking.select(Some(&mut memory), ThreadId(9), TCB_ADDR);
        let second = stacking.select(Some(&mut memory), ThreadId(9), TCB_ADDR);

        prop_assert_eq!(first.descriptor().name(), second.descriptor().name());
        prop_assert_eq!(first.is_degraded(), second.is_degraded());
    }

    #[test]
    fn involuntary_frame_only_clears_excm(raw in prop::collection::vec(any::<u8>(), 0xa0)) {
        let mut memory = task_memory(raw.clone());

        let frame = ESP32_INVOLUNTARY.read_frame(&mut memory, STACK_PTR).unwrap();

        let mut expected = raw;
        expected[0x08] &= !PS_EXCM;
        prop_assert_eq!(frame, expected);
    }

    #[test]
    fn voluntary_frame_splices_by_call_size(return_addr in any::<u32>(), caller_sp in caller_sp()) {
        let task = YieldFrame::new(return_addr, caller_sp);
        let mut memory = task.memory();

        let frame = ESP32_VOLUNTARY.read_frame(&mut memory, STACK_PTR).unwrap();

        prop_assert_eq!(word_at(&frame, 0x14), (return_addr & 0x3fff_ffff) | 0x4000_0000);
        prop_assert_eq!(word_at(&frame, 0x04), caller_sp);

        let spill: Vec<u32> = (0x30..0x50).step_by(4).map(|o| word_at(&frame, o)).collect();
        let expected: Vec<u32> = match return_addr >> 30 {
            2 => task
                .spill_words(4, 4)
                .iter()
                .copied()
                .chain([UNKNOWN_REGISTER; 4])
                .collect(),
            3 => task.spill_words(0, 8).to_vec(),
            _ => vec![UNKNOWN_REGISTER; 8],
        };
        prop_assert_eq!(spill, expected);
    }

    #[test]
    fn caller_stack_pointer_is_aligned(sp in 0x3ffb_0000u64..0x3ffc_0000) {
        for chip in Chip::ALL {
            let stacking = FreeRtosStacking::new(chip);
            let caller = stacking.involuntary().caller_stack_pointer(sp);
            prop_assert_eq!(caller % 8, 0);
            prop_assert!(caller >= sp + stacking.involuntary().frame_size() as u64);
        }
    }
}

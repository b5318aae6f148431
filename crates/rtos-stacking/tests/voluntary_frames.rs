//! Solicited-yield frame reconstruction on Xtensa.

use rtos_stacking::stacking::xtensa::{ESP32_VOLUNTARY, ESP32S3_VOLUNTARY, UNKNOWN_REGISTER};
use rtos_stacking::test_harness::*;
use rtos_stacking::{Error, TargetMemory};

const CALLER_SP: u32 = 0x3ffb_9000;

const RETURN_ADDR: usize = 0x14;
const PS: usize = 0x18;
const SPILL: usize = 0x30;

fn spill_slots(frame: &[u8]) -> Vec<u32> {
    (SPILL..0x50).step_by(4).map(|o| word_at(frame, o)).collect()
}

#[test]
fn test_call8_splices_four_caller_registers() {
    let task = YieldFrame::new(0x800d_1234, CALLER_SP);
    let mut memory = task.memory();

    let frame = ESP32_VOLUNTARY.read_frame(&mut memory, STACK_PTR).unwrap();

    assert_eq!(word_at(&frame, RETURN_ADDR), 0x400d_1234);
    // caller_sp - 32 is word 4 of the twelve-word spill area.
    let mut expected = task.spill_words(4, 4).to_vec();
    expected.extend([UNKNOWN_REGISTER; 4]);
    assert_eq!(spill_slots(&frame), expected);
}

#[test]
fn test_call12_splices_eight_caller_registers() {
    let task = YieldFrame::new(0xc00d_5678, CALLER_SP);
    let mut memory = task.memory();

    let frame = ESP32S3_VOLUNTARY.read_frame(&mut memory, STACK_PTR).unwrap();

    assert_eq!(word_at(&frame, RETURN_ADDR), 0x400d_5678);
    assert_eq!(spill_slots(&frame), task.spill_words(0, 8));
}

#[test]
fn test_unhandled_call_size_keeps_placeholders() {
    for return_addr in [0x000d_0100, 0x400d_0100] {
        let task = YieldFrame::new(return_addr, CALLER_SP);
        let mut memory = RecordingMemory::new(task.memory());

        let frame = ESP32_VOLUNTARY.read_frame(&mut memory, STACK_PTR).unwrap();

        assert_eq!(spill_slots(&frame), vec![UNKNOWN_REGISTER; 8]);
        assert_eq!(word_at(&frame, RETURN_ADDR), 0x400d_0100);
        // Only the yield frame itself is read.
        assert_eq!(memory.reads, vec![(STACK_PTR - 0x10, 0x20)]);
    }
}

#[test]
fn test_head_words_pass_through() {
    let task = YieldFrame::new(0x800d_1234, CALLER_SP);
    let mut memory = task.memory();

    let frame = ESP32_VOLUNTARY.read_frame(&mut memory, STACK_PTR).unwrap();

    assert_eq!(word_at(&frame, 0x00), task.base_save[0]);
    assert_eq!(word_at(&frame, 0x04), CALLER_SP);
    assert_eq!(word_at(&frame, 0x08), task.base_save[2]);
    assert_eq!(word_at(&frame, 0x0c), task.base_save[3]);
    assert_eq!(word_at(&frame, 0x10), 0, "exit marker");
    // Unused solicited-frame slots are not exposed and read back as zero.
    for offset in (0x20..0x30).step_by(4) {
        assert_eq!(word_at(&frame, offset), 0);
    }
}

#[test]
fn test_ps_exception_bit_cleared() {
    let mut task = YieldFrame::new(0x800d_1234, CALLER_SP);
    task.ps = 0x0006_0f3f;
    let mut memory = task.memory();

    let frame = ESP32_VOLUNTARY.read_frame(&mut memory, STACK_PTR).unwrap();

    assert_eq!(word_at(&frame, PS), 0x0006_0f2f);
}

#[test]
fn test_yield_frame_read_failure_is_fatal() {
    let task = YieldFrame::new(0x800d_1234, CALLER_SP);
    let mut memory = FaultyMemory::new(task.memory(), STACK_PTR - 0x10..STACK_PTR);

    let err = ESP32_VOLUNTARY.read_frame(&mut memory, STACK_PTR).unwrap_err();

    assert!(matches!(
        err,
        Error::MemoryRead { address, len: 0x20 } if address == STACK_PTR - 0x10
    ));
}

#[test]
fn test_caller_spill_failure_keeps_placeholders() {
    let task = YieldFrame::new(0xc00d_5678, CALLER_SP);
    let caller_sp = task.caller_sp();
    let mut memory = FaultyMemory::new(task.memory(), caller_sp - 48..caller_sp);

    let mut out = vec![0; ESP32_VOLUNTARY.frame_size()];
    let err = ESP32_VOLUNTARY
        .read_frame_into(&mut memory, STACK_PTR, &mut out)
        .unwrap_err();

    assert!(matches!(err, Error::MemoryRead { len: 32, .. }));
    assert_eq!(spill_slots(&out), vec![UNKNOWN_REGISTER; 8]);
    assert_eq!(word_at(&out, RETURN_ADDR), 0x400d_5678);
}

#[test]
fn test_reads_issued_for_call12() {
    let task = YieldFrame::new(0xc00d_5678, CALLER_SP);
    let mut memory = RecordingMemory::new(task.memory());

    ESP32_VOLUNTARY.read_frame(&mut memory, STACK_PTR).unwrap();

    assert_eq!(
        memory.reads,
        vec![
            (STACK_PTR - 0x10, 0x20),
            (u64::from(CALLER_SP) - 48, 32)
        ]
    );
    assert!(memory.read_word_32(TCB_ADDR).is_ok());
}

#[test]
fn test_caller_spill_below_address_zero_wraps_to_top_of_memory() {
    let task = YieldFrame::new(0xc00d_5678, 0x20);
    let mut memory = RecordingMemory::new(task.memory());

    let frame = ESP32_VOLUNTARY.read_frame(&mut memory, STACK_PTR).unwrap();

    assert_eq!(memory.reads[1], (0xffff_fff0, 32));
    assert_eq!(spill_slots(&frame), task.spill_words(0, 8));
}

//! Frame-shape selection for a suspended thread.

use crate::memory::TargetMemory;
use crate::port::FreeRtosStacking;
use crate::stacking::StackingDescriptor;
use crate::thread::ThreadId;

/// Descriptor chosen for one thread at one halt.
#[derive(Debug, Clone, Copy)]
pub struct Selection {
    descriptor: &'static StackingDescriptor,
    degraded: bool,
}

impl Selection {
    const fn exact(descriptor: &'static StackingDescriptor) -> Self {
        Self {
            descriptor,
            degraded: false,
        }
    }

    const fn fallback(descriptor: &'static StackingDescriptor) -> Self {
        Self {
            descriptor,
            degraded: true,
        }
    }

    #[must_use]
    pub const fn descriptor(&self) -> &'static StackingDescriptor {
        self.descriptor
    }

    /// True when target memory could not be read and the default descriptor
    /// was assumed rather than observed.
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        self.degraded
    }
}

/// Pick the descriptor for `thread`, whose TCB records its saved stack
/// pointer at `stack_addr`.
///
/// Single-shape ports never touch memory. Otherwise the word at the saved
/// stack pointer is the frame's exit marker: non-zero for an interrupt frame,
/// zero for a solicited yield. Without memory access, for the running thread,
/// or when either read fails, the interrupt-frame descriptor is returned. The
/// result is only valid for the current halt.
pub fn select_stacking(
    stacking: &FreeRtosStacking,
    memory: Option<&mut dyn TargetMemory>,
    thread: ThreadId,
    stack_addr: u64,
) -> Selection {
    let involuntary = stacking.involuntary();
    let Some(voluntary) = stacking.voluntary() else {
        return Selection::exact(involuntary);
    };
    let Some(memory) = memory else {
        return Selection::exact(involuntary);
    };
    if thread.is_current() {
        return Selection::exact(involuntary);
    }

    let stack_ptr = match memory.read_word_32(stack_addr) {
        Ok(stack_ptr) => u64::from(stack_ptr),
        Err(err) => {
            tracing::warn!(
                "thread {thread}: cannot read saved stack pointer ({err}), assuming {}",
                involuntary.name()
            );
            return Selection::fallback(involuntary);
        }
    };

    match memory.read_word_32(stack_ptr) {
        Ok(0) => {
            tracing::debug!("thread {thread}: solicited yield frame at {stack_ptr:#010x}");
            Selection::exact(voluntary)
        }
        Ok(_) => Selection::exact(involuntary),
        Err(err) => {
            tracing::warn!(
                "thread {thread}: cannot read exit marker ({err}), assuming {}",
                involuntary.name()
            );
            Selection::fallback(involuntary)
        }
    }
}

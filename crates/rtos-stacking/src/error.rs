use crate::thread::ThreadId;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to read {len} bytes of target memory at {address:#010x}")]
    MemoryRead { address: u64, len: usize },

    #[error("thread {0} has a null stack pointer")]
    NullStackPointer(ThreadId),

    #[error("frame buffer is {actual} bytes, descriptor needs {expected}")]
    FrameBufferSize { expected: usize, actual: usize },

    #[error("Unknown chip: {0}")]
    UnknownChip(String),

    #[error("memory snapshot line {line}: {message}")]
    Snapshot { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, Error>;

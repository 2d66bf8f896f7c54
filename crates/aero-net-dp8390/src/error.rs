use thiserror::Error;

/// Construction-time failures. The chip itself never fails once attached.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("packet memory size must be non-zero")]
    EmptyMemory,

    #[error("packet memory start {start:#x} and size {size:#x} must be multiples of 256")]
    UnalignedMemory { start: u32, size: u32 },

    #[error("packet memory end {end:#x} exceeds the 64KiB chip address space")]
    MemoryOutOfRange { end: u32 },

    #[error("address wrap {wrap:#x} must be a power of two no smaller than memory end {end:#x}")]
    InvalidWrap { wrap: u32, end: u32 },

    #[error("failed to allocate {size} bytes of packet memory")]
    AllocationFailed { size: usize },
}

/// Errors returned while restoring a chip snapshot.
#[cfg(feature = "io-snapshot")]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    #[error("snapshot truncated")]
    UnexpectedEof,

    #[error("snapshot magic mismatch")]
    InvalidMagic,

    #[error("snapshot device id mismatch: expected {expected:?}, found {found:?}")]
    DeviceIdMismatch { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported snapshot major version {found} (expected {expected})")]
    UnsupportedVersion { expected: u16, found: u16 },

    #[error("duplicate snapshot field tag {0}")]
    DuplicateFieldTag(u16),

    #[error("invalid field encoding: {0}")]
    InvalidFieldEncoding(&'static str),
}

#[cfg(feature = "io-snapshot")]
pub type SnapshotResult<T> = Result<T, SnapshotError>;

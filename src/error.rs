//! Error types for candlestore
//!
//! One top-level error with a nested kind per failure class. Every operation
//! is fail-fast: nothing is retried internally, the caller decides how to
//! report.

use thiserror::Error;

/// Result type alias using CandleError
pub type Result<T> = std::result::Result<T, CandleError>;

/// Unified error type for candlestore operations
#[derive(Debug, Error)]
pub enum CandleError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Binary Format Errors
    // -------------------------------------------------------------------------
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    // -------------------------------------------------------------------------
    // Access Errors
    // -------------------------------------------------------------------------
    #[error("Permission error: {0}")]
    Permission(#[from] PermissionError),

    #[error("Range error: {0}")]
    Range(#[from] RangeError),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Capacity error: {0}")]
    Capacity(#[from] CapacityError),

    // -------------------------------------------------------------------------
    // Allocation Errors
    // -------------------------------------------------------------------------
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Symbol not found: {0}")]
    SymbolNotFound(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

/// The file violates the binary contract
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid magic 0x{found:08x}")]
    InvalidMagic { found: u32 },

    #[error("unsupported format version {found}")]
    UnsupportedVersion { found: u16 },

    #[error("file is {size} bytes, smaller than the {required} byte header")]
    FileTooSmall { size: u64, required: u64 },

    #[error("header checksum mismatch: stored 0x{stored:08x}, computed 0x{computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("corrupt file: {0}")]
    Corrupt(String),
}

/// Mutation attempted without write capability
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PermissionError {
    #[error("storage is mapped read-only")]
    ReadOnly,

    #[error("another writer holds {0}")]
    WriterLocked(String),
}

/// Access outside mapped or logical bounds
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error("range {offset}+{len} exceeds mapped length {mapped}")]
    OffsetOutOfBounds { offset: u64, len: u64, mapped: u64 },

    #[error("seek to row {row} beyond {count} rows")]
    SeekOutOfRange { row: u64, count: u64 },
}

/// Encode buffer too small or integer range exceeded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CapacityError {
    #[error("output holds {available} elements, {required} needed")]
    OutputTooSmall { required: usize, available: usize },

    #[error("delta {delta} at index {index} does not fit in 32 bits")]
    DeltaOverflow { index: usize, delta: i64 },
}

/// Allocation failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    #[error("out of memory allocating {0}")]
    OutOfMemory(&'static str),
}

impl From<bincode::Error> for CandleError {
    fn from(e: bincode::Error) -> Self {
        CandleError::Serialization(e.to_string())
    }
}

impl From<std::collections::TryReserveError> for CandleError {
    fn from(_: std::collections::TryReserveError) -> Self {
        CandleError::Resource(ResourceError::OutOfMemory("buffer"))
    }
}

//! Storage Module
//!
//! Memory-mapped persistence for columnar candle files.
//!
//! ## Responsibilities
//! - Own the file descriptor and the shared mapping
//! - Bounds-checked, zero-copy byte access
//! - Page-aligned growth with explicit slice invalidation
//! - Header validation on open, checksum stamping on flush
//! - Single writer per file
//!
//! ## File Format (V1)
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │ Header (4096 bytes, little-endian)                     │
//! │   0  Magic "OHLC" u32      4  Version u16              │
//! │   6  Flags u16             8  RowCount u64             │
//! │   16 ColumnOffsets [u64;6] 64 IndexOffset u64          │
//! │   72 Checksum u32 (CRC32, 0 = unset) ... zero padding  │
//! ├────────────────────────────────────────────────────────┤
//! │ Column blocks (x6: ts, open, high, low, close, volume) │
//! │   [ColumnHeader 64 bytes][payload]                     │
//! ├────────────────────────────────────────────────────────┤
//! │ Index block                                            │
//! │   [ByteLen: u64][bincode checkpoints]                  │
//! └────────────────────────────────────────────────────────┘
//! ```

mod header;
mod lock;
mod mmap;

pub use header::{
    header_checksum, ColumnHeader, ColumnType, Compression, FileHeader, FLAG_BITPACK, FLAG_DELTA,
    FLAG_INDEX,
};
pub use lock::WriterLock;
pub use mmap::FileStorage;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying a candle file ("OHLC" read as little-endian u32)
pub const MAGIC: u32 = u32::from_le_bytes(*b"OHLC");

/// Current format version
pub const VERSION: u16 = 1;

/// Header page size
pub const HEADER_SIZE: usize = 4096;

/// Column header size (one cache line)
pub const COLUMN_HEADER_SIZE: usize = 64;

/// Columns per file: timestamp, open, high, low, close, volume
pub const COLUMN_COUNT: usize = 6;

/// Growth granularity of the backing file
pub const PAGE_SIZE: u64 = 4096;

/// Round `size` up to a whole number of pages
pub fn page_align(size: u64) -> u64 {
    size.div_ceil(PAGE_SIZE) * PAGE_SIZE
}

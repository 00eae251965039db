//! Table Module
//!
//! One candle file: the write path and the read path over the core.
//!
//! ## Write Path
//! ```text
//! candles ──► codec (per column deltas) ──► FileStorage column blocks
//!                                       └─► index block (checkpoints)
//!                                       └─► header (row count, offsets, flags)
//! ```
//!
//! ## Read Path
//! ```text
//! BTree range ──► row span ──► FileStorage slices ──► codec decode ──► candles
//! ```
//!
//! ## Column Payloads
//! ```text
//! Timestamp  Delta         [i64 LE; n]   deltas, slot 0 = first timestamp
//!            DeltaBitpack  bitpack block of i32 deltas, base in base_value
//! Price/Vol  Delta         [i32 LE; n]   deltas, slot 0 = sentinel
//!            DeltaBitpack  bitpack block of the same i32 deltas
//!            None          [f64 LE; n]   raw values (deltas overflowed)
//! ```
//!
//! Checkpoints persisted every `checkpoint_stride` rows hold each column's
//! fixed-point value at that row, so a query decodes from the nearest
//! checkpoint instead of from row 0.

mod column;
mod reader;
mod writer;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub use reader::TableReader;
pub use writer::TableWriter;

/// Decode anchor persisted in the index block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Row this checkpoint describes
    pub row: u64,
    pub timestamp: i64,
    /// Fixed-point value per float column (open, high, low, close, volume);
    /// 0 for columns stored without deltas
    pub fixed: [i64; 5],
}

/// Outcome of `TableWriter::finish`
#[derive(Debug, Clone, PartialEq)]
pub struct TableSummary {
    pub rows: u64,
    /// Size of the backing file (page aligned)
    pub file_size: u64,
    /// Six 8-byte columns per row
    pub raw_bytes: u64,
    /// Column payload bytes actually stored
    pub compressed_bytes: u64,
    pub compression_ratio: f64,
}

/// Per-column description reported by `TableReader::info`
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    pub name: &'static str,
    pub compression: crate::storage::Compression,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
}

/// Everything `info` reports about a table
#[derive(Debug, Clone, PartialEq)]
pub struct TableInfo {
    pub path: PathBuf,
    pub rows: u64,
    pub file_size: u64,
    pub raw_bytes: u64,
    pub compressed_bytes: u64,
    pub compression_ratio: f64,
    pub min_timestamp: Option<i64>,
    pub max_timestamp: Option<i64>,
    pub checkpoints: usize,
    pub columns: Vec<ColumnInfo>,
}

/// Bytes one row occupies uncompressed
pub(crate) const RAW_ROW_BYTES: u64 = 6 * 8;

/// Column blocks and the index block start on 8-byte boundaries
pub(crate) fn align8(offset: u64) -> u64 {
    offset.div_ceil(8) * 8
}

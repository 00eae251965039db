//! # candlestore
//!
//! A columnar, memory-mapped store for OHLCV candle data with:
//! - Fixed-point delta compression, optionally bit-packed
//! - A vectorized price encoder (AVX / NEON) with a scalar reference
//! - An in-memory B-tree from timestamp to row
//! - Single-writer, multi-reader files with header validation
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       CandleStore                           │
//! │              ({data_dir}/{SYMBOL}.ohlcv files)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │               TableWriter / TableReader                     │
//! └───────┬─────────────────────┬─────────────────────┬─────────┘
//!         │                     │                     │
//!         ▼                     ▼                     ▼
//!   ┌─────────────┐      ┌─────────────┐      ┌─────────────┐
//!   │    Codec    │      │    BTree    │      │ FileStorage │
//!   │ (delta/SIMD)│      │ (ts → row)  │      │   (mmap)    │
//!   └─────────────┘      └─────────────┘      └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod config;
pub mod error;

pub mod candle;
pub mod codec;
pub mod engine;
pub mod index;
pub mod ingest;
pub mod storage;
pub mod table;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use candle::{Candle, ColumnId};
pub use config::Config;
pub use engine::CandleStore;
pub use error::{CandleError, Result};
pub use index::BTree;
pub use storage::FileStorage;
pub use table::{TableInfo, TableReader, TableSummary, TableWriter};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of candlestore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Engine Module
//!
//! `CandleStore` maps symbols to candle files under one data directory.
//!
//! ## Responsibilities
//! - Validate symbols and resolve them to `{data_dir}/{SYMBOL}.ohlcv`
//! - Replace a symbol's file atomically on write
//! - Open read-only tables for queries and reports

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::candle::Candle;
use crate::config::Config;
use crate::error::{CandleError, Result};
use crate::table::{TableInfo, TableReader, TableSummary, TableWriter};

/// A directory of per-symbol candle files
///
/// ## Concurrency Model
///
/// - **Writes** (write/append): serialized by `write_lock` inside one
///   process; the per-file writer lock rejects writers in other processes
/// - **Reads** (query/info/reader): lock-free, each opens its own read-only
///   mapping
///
/// A write builds the new table beside the old one and renames it into
/// place, so a reader never sees a half-written file and existing mappings
/// keep the previous contents.
pub struct CandleStore {
    config: Config,

    /// Serializes write operations
    write_lock: Mutex<()>,
}

impl CandleStore {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const EXTENSION: &'static str = "ohlcv";
    const TEMP_SUFFIX: &'static str = "ohlcv.tmp";

    /// Open or create a store rooted at `config.data_dir`
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        tracing::debug!(data_dir = %config.data_dir.display(), "opened candle store");
        Ok(Self {
            config,
            write_lock: Mutex::new(()),
        })
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Replace `symbol`'s table with `candles`
    pub fn write(&self, symbol: &str, candles: &[Candle]) -> Result<TableSummary> {
        validate_symbol(symbol)?;
        let _guard = self.write_lock.lock();
        self.replace(symbol, candles)
    }

    /// Add `candles` after the rows already stored for `symbol`.
    ///
    /// The first new timestamp must be later than the last stored one.
    pub fn append(&self, symbol: &str, candles: &[Candle]) -> Result<TableSummary> {
        validate_symbol(symbol)?;
        let _guard = self.write_lock.lock();

        let path = self.path_for(symbol);
        if !path.exists() {
            return self.replace(symbol, candles);
        }

        let mut merged = TableReader::open(&path, &self.config)?.scan()?;
        if let (Some(last), Some(first)) = (merged.last(), candles.first()) {
            if first.timestamp <= last.timestamp {
                return Err(CandleError::InvalidInput(format!(
                    "appended timestamp {} does not follow stored {}",
                    first.timestamp, last.timestamp
                )));
            }
        }
        merged.try_reserve(candles.len())?;
        merged.extend_from_slice(candles);

        self.replace(symbol, &merged)
    }

    fn replace(&self, symbol: &str, candles: &[Candle]) -> Result<TableSummary> {
        let path = self.path_for(symbol);
        let temp = self
            .config
            .data_dir
            .join(format!("{}.{}", symbol, Self::TEMP_SUFFIX));

        let summary = match Self::write_table(&temp, candles, &self.config) {
            Ok(summary) => summary,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp) {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            path = %temp.display(),
                            error = %cleanup,
                            "failed to remove temporary table"
                        );
                    }
                }
                return Err(e);
            }
        };
        fs::rename(&temp, &path)?;

        tracing::info!(
            symbol,
            rows = summary.rows,
            ratio = summary.compression_ratio,
            "wrote candle table"
        );
        Ok(summary)
    }

    fn write_table(path: &Path, candles: &[Candle], config: &Config) -> Result<TableSummary> {
        let mut writer = TableWriter::create(path, config)?;
        writer.append(candles)?;
        writer.finish()
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Candles for `symbol` with `start <= timestamp <= end`
    pub fn query(&self, symbol: &str, start: i64, end: i64) -> Result<Vec<Candle>> {
        self.reader(symbol)?.query(start, end)
    }

    /// Size and range report for `symbol`
    pub fn info(&self, symbol: &str) -> Result<TableInfo> {
        Ok(self.reader(symbol)?.info())
    }

    /// Open `symbol`'s table read-only
    pub fn reader(&self, symbol: &str) -> Result<TableReader> {
        validate_symbol(symbol)?;
        let path = self.path_for(symbol);
        if !path.exists() {
            return Err(CandleError::SymbolNotFound(symbol.to_string()));
        }
        TableReader::open(&path, &self.config)
    }

    /// Symbols with a table in the data directory, sorted
    pub fn symbols(&self) -> Result<Vec<String>> {
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.config.data_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(Self::EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if validate_symbol(stem).is_ok() {
                    symbols.push(stem.to_string());
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// File backing `symbol` (which may not exist yet)
    pub fn path_for(&self, symbol: &str) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.{}", symbol, Self::EXTENSION))
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

/// ASCII letters, digits, `-`, `_` and `.`; not empty, not a dot name
fn validate_symbol(symbol: &str) -> Result<()> {
    let valid = !symbol.is_empty()
        && symbol != "."
        && symbol != ".."
        && symbol
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.'));
    if !valid {
        return Err(CandleError::InvalidInput(format!(
            "invalid symbol {:?}",
            symbol
        )));
    }
    Ok(())
}

//! Table reader
//!
//! Opens a candle file read-only, decodes the timestamp column once to build
//! the B-tree index, and decodes float columns lazily per query.

use std::path::Path;

use bytes::Buf;

use crate::candle::{Candle, ColumnId};
use crate::codec::compression_ratio;
use crate::config::Config;
use crate::error::{FormatError, RangeError, Result};
use crate::index::BTree;
use crate::storage::{FileHeader, FileStorage, COLUMN_COUNT, FLAG_INDEX};

use super::column::ColumnBlock;
use super::{Checkpoint, ColumnInfo, TableInfo, RAW_ROW_BYTES};

/// Read access to one candle file
pub struct TableReader {
    storage: FileStorage,
    header: FileHeader,
    /// Empty when the table holds no rows
    columns: Vec<ColumnBlock>,
    timestamps: Vec<i64>,
    index: BTree,
    checkpoints: Vec<Checkpoint>,
    price_scale: f64,
    volume_scale: f64,
}

impl TableReader {
    /// Open `path` and build the timestamp index.
    ///
    /// `config` supplies the scales for files that do not record their own.
    pub fn open<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self> {
        config.validate()?;
        let storage = FileStorage::open(path, false)?;
        let header = storage.header()?;

        let mut reader = Self {
            storage,
            header,
            columns: Vec::new(),
            timestamps: Vec::new(),
            index: BTree::new(),
            checkpoints: Vec::new(),
            price_scale: config.price_scale,
            volume_scale: config.volume_scale,
        };
        if header.row_count > 0 {
            reader.load()?;
        }

        tracing::debug!(
            path = %reader.storage.path().display(),
            rows = header.row_count,
            checkpoints = reader.checkpoints.len(),
            "opened candle table"
        );
        Ok(reader)
    }

    fn load(&mut self) -> Result<()> {
        let rows = self.header.row_count;

        let mut columns = Vec::with_capacity(COLUMN_COUNT);
        for (id, &offset) in ColumnId::ALL.iter().zip(&self.header.column_offsets) {
            let block = ColumnBlock::read(&self.storage, offset)?;
            if block.header.count != rows {
                return Err(FormatError::Corrupt(format!(
                    "{} column holds {} rows, header says {}",
                    id.name(),
                    block.header.count,
                    rows
                ))
                .into());
            }
            if block.header.column_type != id.column_type() {
                return Err(FormatError::Corrupt(format!(
                    "{} column tagged {:?}",
                    id.name(),
                    block.header.column_type
                ))
                .into());
            }
            columns.push(block);
        }

        let timestamps = columns[ColumnId::Timestamp.index()].read_timestamps(&self.storage)?;
        if let Some(w) = timestamps.windows(2).find(|w| w[0] >= w[1]) {
            return Err(FormatError::Corrupt(format!(
                "timestamps out of order: {} then {}",
                w[0], w[1]
            ))
            .into());
        }

        self.index = BTree::from_entries(
            timestamps
                .iter()
                .enumerate()
                .map(|(row, &ts)| (ts, row as u64)),
        )?;
        self.columns = columns;
        self.timestamps = timestamps;

        if self.header.has_flag(FLAG_INDEX) {
            self.checkpoints = self.load_checkpoints()?;
        }
        Ok(())
    }

    fn load_checkpoints(&self) -> Result<Vec<Checkpoint>> {
        let offset = self.header.index_offset as usize;
        let mut prefix = self.storage.slice(offset, 8)?;
        let len = prefix.get_u64_le() as usize;
        let bytes = self.storage.slice(offset + 8, len)?;
        let checkpoints: Vec<Checkpoint> = bincode::deserialize(bytes)?;

        let mut prev: Option<u64> = None;
        for cp in &checkpoints {
            let matches = usize::try_from(cp.row)
                .ok()
                .and_then(|row| self.timestamps.get(row))
                .is_some_and(|&ts| ts == cp.timestamp);
            if !matches || prev.is_some_and(|p| p >= cp.row) {
                return Err(FormatError::Corrupt(format!(
                    "checkpoint for row {} does not match the timestamp column",
                    cp.row
                ))
                .into());
            }
            prev = Some(cp.row);
        }
        Ok(checkpoints)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Candles with `start <= timestamp <= end`, ascending
    pub fn query(&self, start: i64, end: i64) -> Result<Vec<Candle>> {
        let hits = self.index.range_query(start, end);
        match (hits.first(), hits.last()) {
            (Some(first), Some(last)) => self.read_rows(first.value, last.value + 1),
            _ => Ok(Vec::new()),
        }
    }

    /// The candle stamped exactly `timestamp`
    pub fn get(&self, timestamp: i64) -> Result<Option<Candle>> {
        let Some(row) = self.index.search(timestamp) else {
            return Ok(None);
        };
        if self.timestamps.get(row as usize) != Some(&timestamp) {
            return Ok(None);
        }
        Ok(self.read_rows(row, row + 1)?.pop())
    }

    /// Every candle in the table
    pub fn scan(&self) -> Result<Vec<Candle>> {
        self.read_rows(0, self.header.row_count)
    }

    /// Rows `start..end` by position
    pub fn read_rows(&self, start: u64, end: u64) -> Result<Vec<Candle>> {
        let count = self.header.row_count;
        if start > end || end > count {
            return Err(RangeError::SeekOutOfRange {
                row: if end > count { end } else { start },
                count,
            }
            .into());
        }
        let (start, end) = (start as usize, end as usize);

        let mut candles: Vec<Candle> = Vec::new();
        candles.try_reserve_exact(end - start)?;
        candles.extend(
            self.timestamps[start..end]
                .iter()
                .map(|&timestamp| Candle {
                    timestamp,
                    ..Candle::default()
                }),
        );
        if candles.is_empty() {
            return Ok(candles);
        }

        for (k, id) in ColumnId::VALUES.iter().enumerate() {
            let block = &self.columns[id.index()];
            let values = block.read_values(
                &self.storage,
                start,
                end,
                self.anchor(start, k),
                self.default_scale(*id),
            )?;
            for (candle, value) in candles.iter_mut().zip(values) {
                id.set_value(candle, value);
            }
        }

        Ok(candles)
    }

    /// Nearest checkpoint at or before `row` for float column `k`
    fn anchor(&self, row: usize, k: usize) -> Option<(usize, i64)> {
        let after = self.checkpoints.partition_point(|cp| cp.row as usize <= row);
        let cp = self.checkpoints.get(after.checked_sub(1)?)?;
        Some((cp.row as usize, cp.fixed[k]))
    }

    fn default_scale(&self, id: ColumnId) -> f64 {
        match id {
            ColumnId::Volume => self.volume_scale,
            _ => self.price_scale,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn row_count(&self) -> u64 {
        self.header.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.header.row_count == 0
    }

    pub fn min_timestamp(&self) -> Option<i64> {
        self.index.min()
    }

    pub fn max_timestamp(&self) -> Option<i64> {
        self.index.max()
    }

    pub fn index(&self) -> &BTree {
        &self.index
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    pub fn path(&self) -> &Path {
        self.storage.path()
    }

    /// Size, compression and range summary
    pub fn info(&self) -> TableInfo {
        let rows = self.header.row_count;
        let raw_bytes = rows * RAW_ROW_BYTES;
        let columns: Vec<ColumnInfo> = ColumnId::ALL
            .iter()
            .zip(&self.columns)
            .map(|(id, block)| ColumnInfo {
                name: id.name(),
                compression: block.header.compression,
                compressed_size: block.header.compressed_size,
                uncompressed_size: block.header.uncompressed_size,
            })
            .collect();
        let compressed_bytes = columns.iter().map(|c| c.compressed_size).sum();

        TableInfo {
            path: self.storage.path().to_path_buf(),
            rows,
            file_size: self.storage.len() as u64,
            raw_bytes,
            compressed_bytes,
            compression_ratio: compression_ratio(raw_bytes as usize, compressed_bytes as usize),
            min_timestamp: self.min_timestamp(),
            max_timestamp: self.max_timestamp(),
            checkpoints: self.checkpoints.len(),
            columns,
        }
    }
}

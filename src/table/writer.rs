//! Table writer
//!
//! Buffers candles in memory and lays the whole file out on `finish`.

use std::path::Path;

use bytes::BufMut;

use crate::candle::{Candle, ColumnId};
use crate::codec::{compression_ratio, to_fixed};
use crate::config::Config;
use crate::error::{CandleError, Result};
use crate::storage::{
    Compression, FileStorage, FLAG_BITPACK, FLAG_DELTA, FLAG_INDEX, HEADER_SIZE,
};

use super::column::{encode_timestamp_column, encode_value_column, EncodedColumn, ValueEncoding};
use super::{align8, Checkpoint, TableSummary, RAW_ROW_BYTES};

/// Writes one candle file
pub struct TableWriter {
    storage: FileStorage,
    config: Config,
    candles: Vec<Candle>,
}

impl TableWriter {
    /// Create (or truncate) the file at `path` and take its writer lock
    pub fn create<P: AsRef<Path>>(path: P, config: &Config) -> Result<Self> {
        config.validate()?;
        let storage = FileStorage::create(path, config.initial_file_size)?;
        Ok(Self {
            storage,
            config: config.clone(),
            candles: Vec::new(),
        })
    }

    /// Buffer `candles`; timestamps must keep strictly increasing
    pub fn append(&mut self, candles: &[Candle]) -> Result<()> {
        let mut last = self.candles.last().map(|c| c.timestamp);
        for (i, candle) in candles.iter().enumerate() {
            if let Some(prev) = last {
                if candle.timestamp <= prev {
                    return Err(CandleError::InvalidInput(format!(
                        "timestamp {} at batch row {} does not follow {}",
                        candle.timestamp, i, prev
                    )));
                }
            }
            last = Some(candle.timestamp);
        }

        self.candles.try_reserve(candles.len())?;
        self.candles.extend_from_slice(candles);
        Ok(())
    }

    /// Rows buffered so far
    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    /// Encode every column, write the file and flush it
    pub fn finish(mut self) -> Result<TableSummary> {
        let rows = self.candles.len();

        let timestamps: Vec<i64> = self.candles.iter().map(|c| c.timestamp).collect();
        let mut columns = Vec::with_capacity(ColumnId::ALL.len());
        columns.push(encode_timestamp_column(&timestamps, self.config.bitpack)?);

        for id in ColumnId::VALUES {
            let values: Vec<f64> = self.candles.iter().map(|c| id.value_of(c)).collect();
            let encoding = ValueEncoding {
                scale: self.scale_for(id),
                bitpack: self.config.bitpack,
                use_simd: self.config.use_simd,
            };
            columns.push(encode_value_column(id.column_type(), &values, encoding)?);
        }

        let index_block = if self.config.persist_index && rows > 0 {
            Some(self.index_block(&columns)?)
        } else {
            None
        };

        // Layout: header page, then 8-aligned column blocks, then the index
        let mut column_offsets = [0u64; 6];
        let mut cursor = HEADER_SIZE as u64;
        for (slot, column) in column_offsets.iter_mut().zip(&columns) {
            cursor = align8(cursor);
            *slot = cursor;
            cursor += column.block_len();
        }
        let index_offset = match &index_block {
            Some(block) => {
                let offset = align8(cursor);
                cursor = offset + block.len() as u64;
                offset
            }
            None => 0,
        };

        self.storage.expand(cursor)?;

        for (&offset, column) in column_offsets.iter().zip(&columns) {
            write_column(&mut self.storage, offset, column)?;
        }
        if let Some(block) = &index_block {
            self.storage
                .slice_mut(index_offset as usize, block.len())?
                .copy_from_slice(block);
        }

        let mut flags = 0u16;
        if columns.iter().any(|c| c.header.compression != Compression::None) {
            flags |= FLAG_DELTA;
        }
        if columns
            .iter()
            .any(|c| c.header.compression == Compression::DeltaBitpack)
        {
            flags |= FLAG_BITPACK;
        }
        if index_block.is_some() {
            flags |= FLAG_INDEX;
        }

        self.storage.update_header(|header| {
            header.row_count = rows as u64;
            header.column_offsets = column_offsets;
            header.index_offset = index_offset;
            header.flags = flags;
        })?;
        self.storage.flush()?;

        let raw_bytes = rows as u64 * RAW_ROW_BYTES;
        let compressed_bytes: u64 = columns.iter().map(|c| c.payload.len() as u64).sum();
        let summary = TableSummary {
            rows: rows as u64,
            file_size: self.storage.len() as u64,
            raw_bytes,
            compressed_bytes,
            compression_ratio: compression_ratio(raw_bytes as usize, compressed_bytes as usize),
        };

        tracing::debug!(
            path = %self.storage.path().display(),
            rows,
            file_size = summary.file_size,
            ratio = summary.compression_ratio,
            "finished candle table"
        );
        Ok(summary)
    }

    fn scale_for(&self, id: ColumnId) -> f64 {
        match id {
            ColumnId::Volume => self.config.volume_scale,
            _ => self.config.price_scale,
        }
    }

    /// `[byte_len: u64][bincode Vec<Checkpoint>]`
    fn index_block(&self, columns: &[EncodedColumn]) -> Result<Vec<u8>> {
        let stride = self.config.checkpoint_stride as usize;
        let checkpoints: Vec<Checkpoint> = self
            .candles
            .iter()
            .enumerate()
            .step_by(stride)
            .map(|(row, candle)| {
                let mut fixed = [0i64; 5];
                for (k, id) in ColumnId::VALUES.iter().enumerate() {
                    let column = &columns[id.index()];
                    if column.header.compression != Compression::None {
                        fixed[k] = to_fixed(id.value_of(candle), column.header.scale);
                    }
                }
                Checkpoint {
                    row: row as u64,
                    timestamp: candle.timestamp,
                    fixed,
                }
            })
            .collect();

        let encoded = bincode::serialize(&checkpoints)?;
        let mut block = Vec::with_capacity(8 + encoded.len());
        block.put_u64_le(encoded.len() as u64);
        block.extend_from_slice(&encoded);
        Ok(block)
    }
}

fn write_column(storage: &mut FileStorage, offset: u64, column: &EncodedColumn) -> Result<()> {
    let offset = offset as usize;
    let header = column.header.encode();
    storage
        .slice_mut(offset, header.len())?
        .copy_from_slice(&header);
    storage
        .slice_mut(offset + header.len(), column.payload.len())?
        .copy_from_slice(&column.payload);
    Ok(())
}

//! Column block encoding and decoding
//!
//! A column block is a `ColumnHeader` followed by its payload. The encoder
//! picks the tightest representation the data allows and falls back to a
//! wider one when the narrow form cannot hold it.

use bytes::{Buf, BufMut};

use crate::codec::{
    decode_prices, decode_timestamps, encode_prices, encode_prices_simd, encode_timestamps, pack,
    unpack,
};
use crate::error::{CandleError, FormatError, Result};
use crate::storage::{ColumnHeader, ColumnType, Compression, FileStorage, COLUMN_HEADER_SIZE};

/// A column ready to be written: header plus payload bytes
#[derive(Debug)]
pub(super) struct EncodedColumn {
    pub header: ColumnHeader,
    pub payload: Vec<u8>,
}

impl EncodedColumn {
    /// Header and payload together
    pub fn block_len(&self) -> u64 {
        (COLUMN_HEADER_SIZE + self.payload.len()) as u64
    }
}

/// How the value encoder should run
#[derive(Debug, Clone, Copy)]
pub(super) struct ValueEncoding {
    pub scale: f64,
    pub bitpack: bool,
    pub use_simd: bool,
}

// =============================================================================
// Encoding
// =============================================================================

/// Encode the timestamp column.
///
/// Bit-packed when every delta fits in 32 bits and the first timestamp is
/// exactly representable in `base_value`; plain i64 deltas otherwise.
pub(super) fn encode_timestamp_column(timestamps: &[i64], bitpack: bool) -> Result<EncodedColumn> {
    let n = timestamps.len();
    let mut deltas = zeroed::<i64>(n)?;
    encode_timestamps(timestamps, &mut deltas)?;

    let base = deltas.first().copied().unwrap_or(0);
    let narrow: Option<Vec<i32>> = if bitpack && exact_in_f64(base) {
        std::iter::once(Some(0))
            .chain(deltas.iter().skip(1).map(|&d| i32::try_from(d).ok()))
            .take(n)
            .collect()
    } else {
        None
    };

    let (compression, base_value, payload) = match narrow {
        Some(narrow) => {
            let mut payload = Vec::new();
            pack(&narrow, &mut payload);
            (Compression::DeltaBitpack, base as f64, payload)
        }
        None => {
            let mut payload = Vec::with_capacity(n * 8);
            for &d in &deltas {
                payload.put_i64_le(d);
            }
            (Compression::Delta, 0.0, payload)
        }
    };

    Ok(EncodedColumn {
        header: ColumnHeader {
            column_type: ColumnType::Timestamp,
            compression,
            base_value,
            count: n as u64,
            compressed_size: payload.len() as u64,
            uncompressed_size: (n * 8) as u64,
            scale: 0.0,
        },
        payload,
    })
}

/// Encode one price or volume column.
///
/// Non-finite values, values whose fixed-point form leaves the i64 range,
/// deltas beyond 32 bits and bases that do not survive the trip through
/// `base_value` all store the raw f64 values instead.
pub(super) fn encode_value_column(
    column_type: ColumnType,
    values: &[f64],
    encoding: ValueEncoding,
) -> Result<EncodedColumn> {
    let n = values.len();
    let raw = |reason: &str| {
        tracing::debug!(?column_type, rows = n, reason, "storing column uncompressed");
        let mut payload = Vec::with_capacity(n * 8);
        for &v in values {
            payload.put_f64_le(v);
        }
        EncodedColumn {
            header: ColumnHeader {
                column_type,
                compression: Compression::None,
                base_value: values.first().copied().unwrap_or(0.0),
                count: n as u64,
                compressed_size: payload.len() as u64,
                uncompressed_size: (n * 8) as u64,
                scale: encoding.scale,
            },
            payload,
        }
    };

    if values.iter().any(|v| !v.is_finite()) {
        return Ok(raw("non-finite value"));
    }
    if values.iter().any(|&v| !fits_fixed(v, encoding.scale)) {
        return Ok(raw("value beyond fixed-point range"));
    }

    let mut deltas = zeroed::<i32>(n)?;
    let encoded = if encoding.use_simd {
        encode_prices_simd(values, &mut deltas, encoding.scale)
    } else {
        encode_prices(values, &mut deltas, encoding.scale)
    };

    let base = match encoded {
        Ok(base) => base,
        Err(CandleError::Capacity(_)) => return Ok(raw("delta overflow")),
        Err(e) => return Err(e),
    };
    if !exact_in_f64(base) {
        return Ok(raw("base not representable"));
    }

    let (compression, payload) = if encoding.bitpack {
        let mut payload = Vec::new();
        pack(&deltas, &mut payload);
        (Compression::DeltaBitpack, payload)
    } else {
        let mut payload = Vec::with_capacity(n * 4);
        for &d in &deltas {
            payload.put_i32_le(d);
        }
        (Compression::Delta, payload)
    };

    Ok(EncodedColumn {
        header: ColumnHeader {
            column_type,
            compression,
            base_value: base as f64,
            count: n as u64,
            compressed_size: payload.len() as u64,
            uncompressed_size: (n * 8) as u64,
            scale: encoding.scale,
        },
        payload,
    })
}

// =============================================================================
// Decoding
// =============================================================================

/// A column block located inside a mapped file
#[derive(Debug, Clone, Copy)]
pub(super) struct ColumnBlock {
    pub header: ColumnHeader,
    payload_offset: usize,
    payload_len: usize,
}

impl ColumnBlock {
    /// Decode the header at `offset` and check the payload lies in the file
    pub fn read(storage: &FileStorage, offset: u64) -> Result<Self> {
        let offset = to_usize(offset, "column offset")?;
        let header = ColumnHeader::decode(storage.slice(offset, COLUMN_HEADER_SIZE)?)?;

        let payload_offset = offset + COLUMN_HEADER_SIZE;
        let payload_len = to_usize(header.compressed_size, "column size")?;
        storage.slice(payload_offset, payload_len)?;

        let block = Self {
            header,
            payload_offset,
            payload_len,
        };
        block.check_payload_len()?;
        Ok(block)
    }

    fn check_payload_len(&self) -> Result<()> {
        let count = to_usize(self.header.count, "column count")?;
        let expected = match (self.header.column_type, self.header.compression) {
            (_, Compression::None) => count.checked_mul(8),
            (ColumnType::Timestamp, Compression::Delta) => count.checked_mul(8),
            (_, Compression::Delta) => count.checked_mul(4),
            // Width lives inside the block; `unpack` checks it
            (_, Compression::DeltaBitpack) => None,
        };
        match expected {
            Some(expected) if expected != self.payload_len => Err(FormatError::Corrupt(format!(
                "{:?} column holds {} bytes, expected {}",
                self.header.column_type, self.payload_len, expected
            ))
            .into()),
            _ => Ok(()),
        }
    }

    fn payload<'a>(&self, storage: &'a FileStorage) -> Result<&'a [u8]> {
        storage.slice(self.payload_offset, self.payload_len)
    }

    /// Decode every timestamp in the column
    pub fn read_timestamps(&self, storage: &FileStorage) -> Result<Vec<i64>> {
        let count = to_usize(self.header.count, "column count")?;
        let payload = self.payload(storage)?;

        let deltas: Vec<i64> = match self.header.compression {
            Compression::Delta => {
                let mut buf = payload;
                let mut deltas = Vec::new();
                deltas.try_reserve_exact(count)?;
                for _ in 0..count {
                    deltas.push(buf.get_i64_le());
                }
                deltas
            }
            Compression::DeltaBitpack => {
                let mut narrow = zeroed::<i32>(count)?;
                unpack(payload, 0, &mut narrow)?;
                let mut deltas: Vec<i64> = narrow.into_iter().map(i64::from).collect();
                if let Some(first) = deltas.first_mut() {
                    *first = self.header.base_value as i64;
                }
                deltas
            }
            Compression::None => {
                return Err(FormatError::Corrupt(
                    "timestamp column must be delta encoded".to_string(),
                )
                .into());
            }
        };

        let mut timestamps = zeroed::<i64>(count)?;
        decode_timestamps(&deltas, &mut timestamps)?;
        Ok(timestamps)
    }

    /// Decode rows `start..end`.
    ///
    /// `anchor` is `(row, fixed_value)` with `row <= start`; decoding runs
    /// forward from there. Without one it starts at row 0 from the base.
    pub fn read_values(
        &self,
        storage: &FileStorage,
        start: usize,
        end: usize,
        anchor: Option<(usize, i64)>,
        default_scale: f64,
    ) -> Result<Vec<f64>> {
        let payload = self.payload(storage)?;
        let len = end - start;

        if self.header.compression == Compression::None {
            let mut buf = &payload[start * 8..end * 8];
            let mut values = Vec::new();
            values.try_reserve_exact(len)?;
            for _ in 0..len {
                values.push(buf.get_f64_le());
            }
            return Ok(values);
        }

        let scale = if self.header.scale > 0.0 {
            self.header.scale
        } else {
            default_scale
        };
        let (from, fixed) = anchor.unwrap_or((0, self.header.base_value as i64));

        let mut deltas = zeroed::<i32>(end - from)?;
        match self.header.compression {
            Compression::Delta => {
                let mut buf = &payload[from * 4..end * 4];
                for slot in deltas.iter_mut() {
                    *slot = buf.get_i32_le();
                }
            }
            _ => unpack(payload, from, &mut deltas)?,
        }

        let mut values = zeroed::<f64>(end - from)?;
        decode_prices(&deltas, &mut values, fixed, scale)?;
        values.drain(..start - from);
        Ok(values)
    }
}

/// 2^63: the first magnitude `as i64` can no longer represent
const FIXED_LIMIT: f64 = 9_223_372_036_854_775_808.0;

/// Whether `round(value * scale)` converts to i64 without saturating
fn fits_fixed(value: f64, scale: f64) -> bool {
    (value * scale).round().abs() < FIXED_LIMIT
}

fn exact_in_f64(value: i64) -> bool {
    (value as f64) as i64 == value && value != i64::MAX
}

fn zeroed<T: Default + Clone>(len: usize) -> Result<Vec<T>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(len)?;
    buf.resize(len, T::default());
    Ok(buf)
}

fn to_usize(value: u64, what: &str) -> Result<usize> {
    usize::try_from(value)
        .map_err(|_| FormatError::Corrupt(format!("{} {} exceeds address space", what, value)).into())
}

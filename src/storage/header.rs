//! File and column headers
//!
//! Explicit little-endian encode/decode over byte slices; mapped memory is
//! never reinterpreted as a struct.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{FormatError, Result};

use super::{COLUMN_COUNT, COLUMN_HEADER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Byte offset of the checksum field inside the file header
pub(crate) const CHECKSUM_OFFSET: usize = 72;

/// Header flag: columns are delta encoded
pub const FLAG_DELTA: u16 = 1 << 0;

/// Header flag: at least one column is bit-packed
pub const FLAG_BITPACK: u16 = 1 << 1;

/// Header flag: an index block is present at `index_offset`
pub const FLAG_INDEX: u16 = 1 << 2;

// =============================================================================
// File Header
// =============================================================================

/// The 4096-byte header page at the start of every file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub magic: u32,
    pub version: u16,
    pub flags: u16,
    pub row_count: u64,
    /// timestamp, open, high, low, close, volume
    pub column_offsets: [u64; COLUMN_COUNT],
    pub index_offset: u64,
    pub checksum: u32,
}

impl Default for FileHeader {
    fn default() -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            row_count: 0,
            column_offsets: [0; COLUMN_COUNT],
            index_offset: 0,
            checksum: 0,
        }
    }
}

impl FileHeader {
    /// Serialize into a full header page (zero padded)
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(HEADER_SIZE);
        buf.put_u32_le(self.magic);
        buf.put_u16_le(self.version);
        buf.put_u16_le(self.flags);
        buf.put_u64_le(self.row_count);
        for offset in &self.column_offsets {
            buf.put_u64_le(*offset);
        }
        buf.put_u64_le(self.index_offset);
        debug_assert_eq!(buf.len(), CHECKSUM_OFFSET);
        buf.put_u32_le(self.checksum);
        buf.resize(HEADER_SIZE, 0);
        buf
    }

    /// Parse a header page.
    ///
    /// Magic is checked first, then version; no other field is trusted
    /// before both match.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::FileTooSmall {
                size: bytes.len() as u64,
                required: HEADER_SIZE as u64,
            }
            .into());
        }

        let mut buf = &bytes[..HEADER_SIZE];

        let magic = buf.get_u32_le();
        if magic != MAGIC {
            return Err(FormatError::InvalidMagic { found: magic }.into());
        }

        let version = buf.get_u16_le();
        if version != VERSION {
            return Err(FormatError::UnsupportedVersion { found: version }.into());
        }

        let flags = buf.get_u16_le();
        let row_count = buf.get_u64_le();
        let mut column_offsets = [0u64; COLUMN_COUNT];
        for offset in column_offsets.iter_mut() {
            *offset = buf.get_u64_le();
        }
        let index_offset = buf.get_u64_le();
        let checksum = buf.get_u32_le();

        Ok(Self {
            magic,
            version,
            flags,
            row_count,
            column_offsets,
            index_offset,
            checksum,
        })
    }

    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }
}

/// CRC32 of a header page with its checksum field read as zero
pub fn header_checksum(page: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&page[..CHECKSUM_OFFSET]);
    hasher.update(&[0u8; 4]);
    hasher.update(&page[CHECKSUM_OFFSET + 4..HEADER_SIZE]);
    hasher.finalize()
}

// =============================================================================
// Column Header
// =============================================================================

/// What a column stores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ColumnType {
    Timestamp = 0,
    Price = 1,
    Volume = 2,
}

impl TryFrom<u8> for ColumnType {
    type Error = FormatError;

    fn try_from(tag: u8) -> std::result::Result<Self, Self::Error> {
        match tag {
            0 => Ok(ColumnType::Timestamp),
            1 => Ok(ColumnType::Price),
            2 => Ok(ColumnType::Volume),
            other => Err(FormatError::Corrupt(format!("unknown column type {}", other))),
        }
    }
}

/// How a column payload is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Compression {
    None = 0,
    Delta = 1,
    DeltaBitpack = 2,
}

impl TryFrom<u8> for Compression {
    type Error = FormatError;

    fn try_from(tag: u8) -> std::result::Result<Self, Self::Error> {
        match tag {
            0 => Ok(Compression::None),
            1 => Ok(Compression::Delta),
            2 => Ok(Compression::DeltaBitpack),
            other => Err(FormatError::Corrupt(format!("unknown compression {}", other))),
        }
    }
}

/// 64-byte header in front of every column payload
///
/// ```text
/// 0  column_type u8 | 1 compression u8 | 2..8 reserved
/// 8  base_value f64
/// 16 count u64
/// 24 compressed_size u64
/// 32 uncompressed_size u64
/// 40 scale f64 (0 = not recorded)
/// 48..64 reserved
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnHeader {
    pub column_type: ColumnType,
    pub compression: Compression,
    pub base_value: f64,
    pub count: u64,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub scale: f64,
}

impl ColumnHeader {
    pub fn encode(&self) -> [u8; COLUMN_HEADER_SIZE] {
        let mut out = [0u8; COLUMN_HEADER_SIZE];
        let mut buf = &mut out[..];
        buf.put_u8(self.column_type as u8);
        buf.put_u8(self.compression as u8);
        buf.put_bytes(0, 6);
        buf.put_f64_le(self.base_value);
        buf.put_u64_le(self.count);
        buf.put_u64_le(self.compressed_size);
        buf.put_u64_le(self.uncompressed_size);
        buf.put_f64_le(self.scale);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < COLUMN_HEADER_SIZE {
            return Err(FormatError::Corrupt(format!(
                "column header truncated to {} bytes",
                bytes.len()
            ))
            .into());
        }

        let mut buf = &bytes[..COLUMN_HEADER_SIZE];
        let column_type = ColumnType::try_from(buf.get_u8())?;
        let compression = Compression::try_from(buf.get_u8())?;
        buf.advance(6);

        Ok(Self {
            column_type,
            compression,
            base_value: buf.get_f64_le(),
            count: buf.get_u64_le(),
            compressed_size: buf.get_u64_le(),
            uncompressed_size: buf.get_u64_le(),
            scale: buf.get_f64_le(),
        })
    }
}

//! # Memory-Mapped File Storage
//!
//! `FileStorage` owns one candle file: the descriptor, the shared mapping and,
//! for writable handles, the single-writer lock.
//!
//! ## Slice Invalidation
//!
//! `expand()` remaps the file, which invalidates every slice handed out
//! before it. Slices borrow `&self` / `&mut self` and `expand()` takes
//! `&mut self`, so the borrow checker rejects any slice held across a remap:
//!
//! ```text
//! slice(&self) -> &[u8]
//! slice_mut(&mut self) -> &mut [u8]
//! expand(&mut self)
//! ```
//!
//! ## Durability
//!
//! `flush()` stamps the header checksum and `msync`s the mapping. Dropping a
//! writable handle flushes; errors there can only be logged.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapMut};

use crate::error::{FormatError, PermissionError, RangeError, Result};

use super::header::{header_checksum, FileHeader, CHECKSUM_OFFSET};
use super::lock::WriterLock;
use super::{page_align, HEADER_SIZE};

#[derive(Debug)]
enum Mapping {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

impl Mapping {
    fn bytes(&self) -> &[u8] {
        match self {
            Mapping::ReadOnly(map) => &map[..],
            Mapping::ReadWrite(map) => &map[..],
        }
    }
}

/// A memory-mapped candle file
#[derive(Debug)]
pub struct FileStorage {
    path: PathBuf,
    file: File,
    mapping: Mapping,
    /// Held for the lifetime of a writable handle; released on drop
    writer: Option<WriterLock>,
}

impl FileStorage {
    /// Create (or truncate) a file of at least `initial_size` bytes, rounded
    /// up to whole pages, and write a fresh header.
    pub fn create<P: AsRef<Path>>(path: P, initial_size: u64) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        // Lock before truncating so a live writer's file is left intact
        let writer = WriterLock::acquire(path, &file)?;

        let size = page_align(initial_size.max(HEADER_SIZE as u64));
        file.set_len(0)?;
        file.set_len(size)?;

        // SAFETY: MmapMut::map_mut is unsafe because the file could be modified
        // externally. This is safe because:
        // 1. We hold the exclusive writer lock for this file
        // 2. The mapping lives inside FileStorage, so it cannot outlive the file
        // 3. All access goes through slice()/slice_mut(), which bounds-check
        let mapping = unsafe { MmapMut::map_mut(&file)? };

        let mut storage = Self {
            path: path.to_path_buf(),
            file,
            mapping: Mapping::ReadWrite(mapping),
            writer: Some(writer),
        };
        storage.write_header(&FileHeader::default())?;

        tracing::debug!(path = %path.display(), size, "created candle file");
        Ok(storage)
    }

    /// Open an existing file and validate its header.
    ///
    /// Writable handles take the single-writer lock; read-only handles don't.
    pub fn open<P: AsRef<Path>>(path: P, writable: bool) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new().read(true).write(writable).open(path)?;

        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(FormatError::FileTooSmall {
                size,
                required: HEADER_SIZE as u64,
            }
            .into());
        }

        let writer = if writable {
            Some(WriterLock::acquire(path, &file)?)
        } else {
            None
        };

        // SAFETY: see `create`. Read-only handles rely on the single-writer
        // contract: a concurrent writer may change bytes but never shrinks
        // the file below what was mapped here.
        let mapping = unsafe {
            if writable {
                Mapping::ReadWrite(MmapMut::map_mut(&file)?)
            } else {
                Mapping::ReadOnly(Mmap::map(&file)?)
            }
        };

        // Validate before wrapping: a rejected file must not be flushed on drop
        let header = FileHeader::decode(mapping.bytes())?;
        verify_checksum(&header, mapping.bytes())?;

        let storage = Self {
            path: path.to_path_buf(),
            file,
            mapping,
            writer,
        };

        tracing::debug!(
            path = %path.display(),
            size,
            writable,
            rows = header.row_count,
            "opened candle file"
        );
        Ok(storage)
    }

    // =========================================================================
    // Header Access
    // =========================================================================

    /// Decode the header page
    pub fn header(&self) -> Result<FileHeader> {
        FileHeader::decode(self.slice(0, HEADER_SIZE)?)
    }

    /// Encode `header` into the header page
    pub fn write_header(&mut self, header: &FileHeader) -> Result<()> {
        let encoded = header.encode();
        self.slice_mut(0, HEADER_SIZE)?.copy_from_slice(&encoded);
        Ok(())
    }

    /// Read-modify-write the header
    pub fn update_header<F>(&mut self, f: F) -> Result<FileHeader>
    where
        F: FnOnce(&mut FileHeader),
    {
        let mut header = self.header()?;
        f(&mut header);
        self.write_header(&header)?;
        Ok(header)
    }

    // =========================================================================
    // Byte Access
    // =========================================================================

    /// Borrow `len` bytes at `offset`
    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let bytes = self.mapping.bytes();
        let end = checked_end(offset, len, bytes.len())?;
        Ok(&bytes[offset..end])
    }

    /// Mutably borrow `len` bytes at `offset`
    pub fn slice_mut(&mut self, offset: usize, len: usize) -> Result<&mut [u8]> {
        match &mut self.mapping {
            Mapping::ReadOnly(_) => Err(PermissionError::ReadOnly.into()),
            Mapping::ReadWrite(map) => {
                let end = checked_end(offset, len, map.len())?;
                Ok(&mut map[offset..end])
            }
        }
    }

    // =========================================================================
    // Growth and Durability
    // =========================================================================

    /// Grow the file to at least `new_size` bytes (page aligned) and remap.
    ///
    /// Never shrinks. Every slice obtained before this call is invalid
    /// afterwards, which `&mut self` enforces.
    pub fn expand(&mut self, new_size: u64) -> Result<()> {
        if !self.is_writable() {
            return Err(PermissionError::ReadOnly.into());
        }

        let new_size = page_align(new_size);
        let old_size = self.len() as u64;
        if new_size <= old_size {
            return Ok(());
        }

        self.flush()?;
        self.file.set_len(new_size)?;

        // SAFETY: see `create`; the old mapping is dropped on assignment, and
        // no slice into it can be alive because we hold `&mut self`.
        let remapped = unsafe { MmapMut::map_mut(&self.file)? };
        self.mapping = Mapping::ReadWrite(remapped);

        tracing::debug!(path = %self.path.display(), old_size, new_size, "expanded candle file");
        Ok(())
    }

    /// Stamp the header checksum and synchronously write the mapping to disk
    pub fn flush(&mut self) -> Result<()> {
        let Mapping::ReadWrite(map) = &mut self.mapping else {
            return Ok(());
        };

        let checksum = header_checksum(&map[..HEADER_SIZE]);
        map[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&checksum.to_le_bytes());
        map.flush()?;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Mapped length in bytes
    pub fn len(&self) -> usize {
        self.mapping.bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.mapping, Mapping::ReadWrite(_))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path under the writer lock, if this handle holds it
    pub fn writer_path(&self) -> Option<&Path> {
        self.writer.as_ref().map(WriterLock::path)
    }
}

impl Drop for FileStorage {
    fn drop(&mut self) {
        if let Err(e) = self.flush() {
            tracing::warn!(path = %self.path.display(), error = %e, "flush on close failed");
        }
    }
}

/// A zero checksum was never stamped and is accepted as-is
fn verify_checksum(header: &FileHeader, page: &[u8]) -> Result<()> {
    if header.checksum == 0 {
        return Ok(());
    }
    let computed = header_checksum(page);
    if computed != header.checksum {
        return Err(FormatError::ChecksumMismatch {
            stored: header.checksum,
            computed,
        }
        .into());
    }
    Ok(())
}

fn checked_end(offset: usize, len: usize, mapped: usize) -> Result<usize> {
    match offset.checked_add(len) {
        Some(end) if end <= mapped => Ok(end),
        _ => Err(RangeError::OffsetOutOfBounds {
            offset: offset as u64,
            len: len as u64,
            mapped: mapped as u64,
        }
        .into()),
    }
}

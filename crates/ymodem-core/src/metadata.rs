//! File metadata parsing and write-offset tracking.
//!
//! The first block (sequence 0) of every file carries a NUL-terminated
//! name followed by a NUL-terminated decimal size. A block whose name
//! field starts with NUL ends the batch.

use std::fmt;

use crate::protocol::constants::FILE_NAME_CAPACITY;
use crate::storage::StorageError;

/// Fixed-capacity file name as received from the sender.
///
/// At most `FILE_NAME_CAPACITY - 1` bytes are kept; longer names are cut
/// at the field boundary.
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct FileName {
    bytes: [u8; FILE_NAME_CAPACITY],
    len: usize,
}

impl FileName {
    pub const MAX_LEN: usize = FILE_NAME_CAPACITY - 1;

    /// Take the name from the leading field of a metadata chunk.
    pub fn from_field(field: &[u8]) -> Self {
        let field = &field[..field.len().min(Self::MAX_LEN)];
        let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let mut bytes = [0u8; FILE_NAME_CAPACITY];
        bytes[..len].copy_from_slice(&field[..len]);
        Self { bytes, len }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Lossy UTF-8 view for logging and path building.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(self.as_bytes()).into_owned()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// An empty name marks the end of the batch.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl fmt::Debug for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileName({:?})", self.to_string_lossy())
    }
}

impl fmt::Display for FileName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.to_string_lossy())
    }
}

/// Metadata carried by the first block of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileInfo {
    pub name: FileName,
    /// Declared size in bytes. Zero means unknown.
    pub size: u32,
}

impl FileInfo {
    /// Parse the first payload chunk of a sequence-0 block.
    pub fn parse(chunk: &[u8]) -> Self {
        let name = FileName::from_field(chunk);
        if name.is_empty() {
            return Self { name, size: 0 };
        }

        let size = chunk
            .iter()
            .position(|&b| b == 0)
            .map(|nul| parse_decimal(&chunk[nul + 1..]))
            .unwrap_or(0);

        Self { name, size }
    }

    /// Batch terminator: no more files follow.
    pub fn is_batch_end(&self) -> bool {
        self.name.is_empty()
    }
}

/// Leading whitespace, then the longest run of digits. Anything that does
/// not yield a `u32` is treated as an unknown size.
fn parse_decimal(field: &[u8]) -> u32 {
    let start = field
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(field.len());
    let digits = &field[start..];
    let end = digits
        .iter()
        .position(|b| !b.is_ascii_digit())
        .unwrap_or(digits.len());

    std::str::from_utf8(&digits[..end])
        .ok()
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(0)
}

/// Write position of the file currently being received.
///
/// `committed <= offset` always holds. The two are equal whenever no block
/// is in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileTracker {
    info: FileInfo,
    offset: u32,
    committed: u32,
}

impl FileTracker {
    /// Start a new file at offset zero.
    pub fn start(info: FileInfo) -> Self {
        Self {
            info,
            offset: 0,
            committed: 0,
        }
    }

    pub fn info(&self) -> &FileInfo {
        &self.info
    }

    pub fn name(&self) -> &FileName {
        &self.info.name
    }

    pub fn size(&self) -> u32 {
        self.info.size
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn committed(&self) -> u32 {
        self.committed
    }

    /// Bytes written since the last commit.
    pub fn in_flight(&self) -> u32 {
        self.offset - self.committed
    }

    /// How many bytes of a `chunk_len` chunk belong to the file.
    ///
    /// Unknown size accepts the whole chunk. Past the declared size
    /// nothing is written.
    pub fn writable(&self, chunk_len: usize) -> usize {
        if self.info.size == 0 {
            return chunk_len;
        }
        let remaining = self.info.size.saturating_sub(self.offset) as usize;
        remaining.min(chunk_len)
    }

    /// Move the write position past `written` bytes. Fails without
    /// moving when the file would outgrow a 32-bit offset.
    pub fn advance(&mut self, written: usize) -> Result<(), StorageError> {
        self.offset = u32::try_from(written)
            .ok()
            .and_then(|n| self.offset.checked_add(n))
            .ok_or(StorageError::OffsetOverflow {
                offset: self.offset,
                len: written,
            })?;
        Ok(())
    }

    /// Accept everything written so far. Returns the size of the block
    /// just committed.
    pub fn commit(&mut self) -> u32 {
        let len = self.in_flight();
        self.committed = self.offset;
        len
    }

    /// Drop uncommitted bytes. Returns true if anything was rolled back.
    pub fn rollback(&mut self) -> bool {
        let dirty = self.offset != self.committed;
        self.offset = self.committed;
        dirty
    }

    /// Undo an already committed block of `len` bytes so it can be
    /// received again.
    pub fn rewind(&mut self, len: u32) {
        self.offset = self.committed.saturating_sub(len);
        self.committed = self.offset;
    }
}

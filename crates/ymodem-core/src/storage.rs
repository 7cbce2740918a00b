//! Storage abstraction behind the save primitive.

use std::collections::HashMap;

use thiserror::Error;

use crate::metadata::FileName;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("Storage rejected write: {0}")]
    Rejected(String),

    #[error("File too large: {len} bytes past offset {offset}")]
    OffsetOverflow { offset: u32, len: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination for received file data.
pub trait FileSink {
    /// Write `data` at `offset` into `name`.
    ///
    /// `None` truncates the destination to `offset` bytes. This both
    /// creates a new file (offset 0) and rolls back unverified writes.
    fn save(&mut self, name: &FileName, offset: u32, data: Option<&[u8]>)
    -> Result<(), StorageError>;
}

/// One recorded save call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveCall {
    Write { name: String, offset: u32, len: usize },
    Truncate { name: String, offset: u32 },
}

/// In-memory sink that records every call.
#[derive(Debug, Default)]
pub struct MemorySink {
    files: HashMap<String, Vec<u8>>,
    calls: Vec<SaveCall>,
    fail_at: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the `n`-th save call (zero based) and every call after it.
    pub fn failing_at(n: usize) -> Self {
        Self {
            fail_at: Some(n),
            ..Self::default()
        }
    }

    pub fn file(&self, name: &str) -> Option<&[u8]> {
        self.files.get(name).map(Vec::as_slice)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn calls(&self) -> &[SaveCall] {
        &self.calls
    }

    /// Sum of bytes passed in write calls.
    pub fn bytes_written(&self) -> usize {
        self.calls
            .iter()
            .map(|c| match c {
                SaveCall::Write { len, .. } => *len,
                SaveCall::Truncate { .. } => 0,
            })
            .sum()
    }
}

impl FileSink for MemorySink {
    fn save(
        &mut self,
        name: &FileName,
        offset: u32,
        data: Option<&[u8]>,
    ) -> Result<(), StorageError> {
        if self.fail_at.is_some_and(|n| self.calls.len() >= n) {
            return Err(StorageError::Rejected(format!("{} at {}", name, offset)));
        }

        let key = name.to_string_lossy();
        let offset_usize = offset as usize;
        let file = self.files.entry(key.clone()).or_default();

        match data {
            Some(bytes) => {
                let end = offset_usize + bytes.len();
                if file.len() < end {
                    file.resize(end, 0);
                }
                file[offset_usize..end].copy_from_slice(bytes);
                self.calls.push(SaveCall::Write {
                    name: key,
                    offset,
                    len: bytes.len(),
                });
            }
            None => {
                file.resize(offset_usize, 0);
                self.calls.push(SaveCall::Truncate { name: key, offset });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> FileName {
        FileName::from_field(s.as_bytes())
    }

    #[test]
    fn test_write_and_truncate() {
        let mut sink = MemorySink::new();
        let f = name("a.txt");
        sink.save(&f, 0, None).unwrap();
        sink.save(&f, 0, Some(b"hello")).unwrap();
        sink.save(&f, 5, Some(b" world")).unwrap();
        assert_eq!(sink.file("a.txt").unwrap(), b"hello world");

        sink.save(&f, 5, None).unwrap();
        assert_eq!(sink.file("a.txt").unwrap(), b"hello");
        assert_eq!(sink.bytes_written(), 11);
        assert_eq!(sink.calls().len(), 4);
    }

    #[test]
    fn test_overwrite_in_place() {
        let mut sink = MemorySink::new();
        let f = name("b");
        sink.save(&f, 0, Some(b"aaaa")).unwrap();
        sink.save(&f, 1, Some(b"bb")).unwrap();
        assert_eq!(sink.file("b").unwrap(), b"abba");
    }

    #[test]
    fn test_injected_failure() {
        let mut sink = MemorySink::failing_at(1);
        let f = name("c");
        assert!(sink.save(&f, 0, None).is_ok());
        assert!(matches!(
            sink.save(&f, 0, Some(b"x")),
            Err(StorageError::Rejected(_))
        ));
    }
}

//! File sinks used by `ymrecv`.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use ymodem_core::{FileName, FileSink, StorageError};

/// Writes received files into a directory. Directory components in the
/// sender's name are dropped so nothing lands outside `root`.
pub struct DirectorySink {
    root: PathBuf,
    open: Option<(String, File)>,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            open: None,
        }
    }

    fn resolve(&self, name: &FileName) -> Result<PathBuf, StorageError> {
        let raw = name.to_string_lossy();
        let base = Path::new(&raw)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part),
                _ => None,
            })
            .last()
            .ok_or_else(|| StorageError::InvalidName(raw.clone()))?;
        Ok(self.root.join(base))
    }

    fn file_for(&mut self, name: &FileName) -> Result<&mut File, StorageError> {
        let key = name.to_string_lossy();
        let reopen = !matches!(&self.open, Some((open_name, _)) if *open_name == key);
        if reopen {
            let path = self.resolve(name)?;
            debug!("Opening {}", path.display());
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)?;
            self.open = Some((key, file));
        }
        match &mut self.open {
            Some((_, file)) => Ok(file),
            None => Err(StorageError::Rejected("no open file".into())),
        }
    }
}

impl FileSink for DirectorySink {
    fn save(&mut self, name: &FileName, offset: u32, data: Option<&[u8]>) -> Result<(), StorageError> {
        let file = self.file_for(name)?;
        match data {
            Some(bytes) => {
                file.seek(SeekFrom::Start(offset as u64))?;
                file.write_all(bytes)?;
            }
            None => {
                file.set_len(offset as u64)?;
                file.seek(SeekFrom::Start(offset as u64))?;
            }
        }
        Ok(())
    }
}

/// Prints each save call instead of touching the filesystem.
pub struct ListingSink<W: Write> {
    out: W,
}

impl<W: Write> ListingSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write> FileSink for ListingSink<W> {
    fn save(&mut self, name: &FileName, offset: u32, data: Option<&[u8]>) -> Result<(), StorageError> {
        let len = data.map_or(0, <[u8]>::len);
        writeln!(self.out, "{:>11} {:>4} bytes at {:>6}", name, len, offset)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn name(s: &str) -> FileName {
        FileName::from_field(s.as_bytes())
    }

    #[test]
    fn test_writes_at_offsets() {
        let dir = tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path());
        let n = name("a.bin");

        sink.save(&n, 0, None).unwrap();
        sink.save(&n, 0, Some(b"hello ")).unwrap();
        sink.save(&n, 6, Some(b"world")).unwrap();

        assert_eq!(fs::read(dir.path().join("a.bin")).unwrap(), b"hello world");
    }

    #[test]
    fn test_truncate_discards_tail() {
        let dir = tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path());
        let n = name("t.bin");

        sink.save(&n, 0, Some(&[1u8; 256])).unwrap();
        sink.save(&n, 128, None).unwrap();
        sink.save(&n, 128, Some(&[2u8; 4])).unwrap();

        let content = fs::read(dir.path().join("t.bin")).unwrap();
        assert_eq!(content.len(), 132);
        assert_eq!(&content[128..], &[2u8; 4]);
    }

    #[test]
    fn test_metadata_save_resets_existing_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("old.txt"), b"stale contents").unwrap();
        let mut sink = DirectorySink::new(dir.path());

        sink.save(&name("old.txt"), 0, None).unwrap();
        assert!(fs::read(dir.path().join("old.txt")).unwrap().is_empty());
    }

    #[test]
    fn test_strips_directory_components() {
        let dir = tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path());

        sink.save(&name("../up.bin"), 0, Some(b"x")).unwrap();
        sink.save(&name("/etc/pw"), 0, Some(b"y")).unwrap();

        assert_eq!(fs::read(dir.path().join("up.bin")).unwrap(), b"x");
        assert_eq!(fs::read(dir.path().join("pw")).unwrap(), b"y");
    }

    #[test]
    fn test_rejects_names_without_a_file_part() {
        let dir = tempdir().unwrap();
        let mut sink = DirectorySink::new(dir.path());

        let err = sink.save(&name(".."), 0, None).unwrap_err();
        assert!(matches!(err, StorageError::InvalidName(_)));
    }

    #[test]
    fn test_listing_format() {
        let mut out = Vec::new();
        {
            let mut sink = ListingSink::new(&mut out);
            sink.save(&name("demo.txt"), 0, None).unwrap();
            sink.save(&name("demo.txt"), 128, Some(&[0u8; 72])).unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "   demo.txt    0 bytes at      0");
        assert_eq!(lines[1], "   demo.txt   72 bytes at    128");
    }
}

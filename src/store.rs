//! The dual-handle file wrapper underneath each segment: a long-lived
//! append-only writer and a long-lived read-only reader, so that positioned
//! reads never pay an `open()` cost.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Owns the two file handles for a single segment file plus the current
/// write offset. The reader handle is behind a `Mutex` (seek-then-read is
/// not atomic on its own) so that `read` can take `&self` and be served
/// under the KVStore's shared read lock rather than its exclusive one.
#[derive(Debug)]
pub struct Store {
    path: PathBuf,
    writer: Option<File>,
    reader: Mutex<File>,
    current_offset: u64,
}

impl Store {
    /// Creates (or truncates) the file at `path` and opens both handles.
    pub fn create(path: impl Into<PathBuf>) -> Result<Store> {
        let path = path.into();
        OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        let writer = OpenOptions::new().append(true).open(&path)?;
        let reader = OpenOptions::new().read(true).open(&path)?;
        Ok(Store {
            path,
            writer: Some(writer),
            reader: Mutex::new(reader),
            current_offset: 0,
        })
    }

    /// Opens an existing file in read-only mode, with the write offset seeded
    /// from its current length. Used to mount pre-existing segment files at
    /// start-up; such a `Store` may only serve reads, never append.
    pub fn reload(path: impl Into<PathBuf>) -> Result<Store> {
        let path = path.into();
        let reader = OpenOptions::new().read(true).open(&path)?;
        let current_offset = fs::metadata(&path)?.len();
        Ok(Store {
            path,
            writer: None,
            reader: Mutex::new(reader),
            current_offset,
        })
    }

    /// Appends `bytes` and returns the offset at which they start.
    pub fn append(&mut self, bytes: &[u8]) -> Result<u64> {
        let writer = self.writer.as_mut().ok_or_else(|| Error::ShortWrite {
            path: self.path.display().to_string(),
            expected: bytes.len(),
            actual: 0,
        })?;
        let offset = self.current_offset;
        let written = writer.write(bytes)?;
        if written < bytes.len() {
            return Err(Error::ShortWrite {
                path: self.path.display().to_string(),
                expected: bytes.len(),
                actual: written,
            });
        }
        self.current_offset += written as u64;
        Ok(offset)
    }

    /// Reads exactly `size` bytes starting at `offset`.
    pub fn read(&self, offset: u64, size: u64) -> Result<Vec<u8>> {
        let mut reader = self.reader.lock().expect("store reader lock poisoned");
        reader.seek(SeekFrom::Start(offset))?;
        let mut bytes = vec![0u8; size as usize];
        reader.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    /// Reads the entire file from the start.
    pub fn read_full(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }

    /// Current number of bytes appended since open or reload.
    pub fn size_in_bytes(&self) -> u64 {
        self.current_offset
    }

    /// Fsyncs the writer, if one is open.
    pub fn sync(&self) -> Result<()> {
        if let Some(writer) = &self.writer {
            writer.sync_all()?;
        }
        Ok(())
    }

    /// Closes the writer. Subsequent appends fail.
    pub fn stop_writes(&mut self) {
        self.writer = None;
    }

    /// Unlinks the file.
    pub fn remove(&self) -> Result<()> {
        fs::remove_file(&self.path)?;
        Ok(())
    }

    /// The path backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

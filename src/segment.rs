//! A single append-only log file, identified by its file id.

use std::path::{Path, PathBuf};

use crate::clock::Clock;
use crate::error::Result;
use crate::key::BitcaskKey;
use crate::record::{self, MappedStoredEntry, StoredEntry};
use crate::store::Store;

/// Location and length of a record just appended to a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppendEntryResponse {
    /// The segment the record was written to.
    pub file_id: u64,
    /// Offset, within that segment, at which the record starts.
    pub offset: u64,
    /// Total encoded length of the record.
    pub entry_length: u32,
}

/// One segment file: a file id, its path, and the `Store` backing it.
#[derive(Debug)]
pub struct Segment {
    file_id: u64,
    file_path: PathBuf,
    store: Store,
}

impl Segment {
    /// Creates a brand-new, writable segment file named `<fileId>_bitcask.data`.
    pub fn create(file_id: u64, directory: &Path) -> Result<Segment> {
        let file_path = segment_path(file_id, directory);
        let store = Store::create(&file_path)?;
        Ok(Segment {
            file_id,
            file_path,
            store,
        })
    }

    /// Mounts a pre-existing segment file in read-only mode.
    pub fn reload_inactive(file_id: u64, directory: &Path) -> Result<Segment> {
        let file_path = segment_path(file_id, directory);
        let store = Store::reload(&file_path)?;
        Ok(Segment {
            file_id,
            file_path,
            store,
        })
    }

    /// This segment's file id.
    pub fn file_id(&self) -> u64 {
        self.file_id
    }

    /// Appends a record for `key`/`value`, returning its on-disk location.
    pub fn append<K: BitcaskKey>(
        &mut self,
        key: &K,
        value: &[u8],
        deleted: bool,
        timestamp: Option<u32>,
        clock: &dyn Clock,
    ) -> Result<AppendEntryResponse> {
        let encoded = record::encode_for(key, value, deleted, timestamp, clock);
        let offset = self.store.append(&encoded)?;
        Ok(AppendEntryResponse {
            file_id: self.file_id,
            offset,
            entry_length: encoded.len() as u32,
        })
    }

    /// Reads and decodes a single record at `offset`/`size`.
    pub fn read(&self, offset: u64, size: u32) -> Result<StoredEntry> {
        let bytes = self.store.read(offset, size as u64)?;
        record::decode_one(&bytes)
    }

    /// Reads and decodes every record in this segment.
    pub fn read_full<K>(&self, key_mapper: &dyn Fn(&[u8]) -> K) -> Result<Vec<MappedStoredEntry<K>>> {
        let bytes = self.store.read_full()?;
        record::decode_all(&bytes, key_mapper)
    }

    /// Current size of the segment in bytes.
    pub fn size_in_bytes(&self) -> u64 {
        self.store.size_in_bytes()
    }

    /// Fsyncs the underlying file.
    pub fn sync(&self) -> Result<()> {
        self.store.sync()
    }

    /// Closes the writer so the segment becomes inactive.
    pub fn stop_writes(&mut self) {
        self.store.stop_writes()
    }

    /// Unlinks the segment file.
    pub fn remove(&self) -> Result<()> {
        self.store.remove()
    }

    /// The path backing this segment.
    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

fn segment_path(file_id: u64, directory: &Path) -> PathBuf {
    directory.join(format!("{}_bitcask.data", file_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use tempfile::TempDir;

    #[test]
    fn append_and_read_round_trips() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new();
        let mut segment = Segment::create(1, dir.path()).unwrap();

        let response = segment
            .append(&"topic".to_owned(), b"microservices", false, None, &clock)
            .unwrap();
        assert_eq!(response.file_id, 1);
        assert_eq!(response.offset, 0);

        let entry = segment.read(response.offset, response.entry_length).unwrap();
        assert_eq!(entry.value, b"microservices".to_vec());
        assert!(!entry.deleted);
    }

    #[test]
    fn read_full_decodes_every_record_with_key_mapper() {
        let dir = TempDir::new().unwrap();
        let clock = ManualClock::new();
        let mut segment = Segment::create(1, dir.path()).unwrap();
        segment
            .append(&"a".to_owned(), b"1", false, None, &clock)
            .unwrap();
        segment
            .append(&"b".to_owned(), b"2", false, None, &clock)
            .unwrap();

        let entries = segment
            .read_full(&|bytes: &[u8]| String::from_utf8(bytes.to_vec()).unwrap())
            .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "a");
        assert_eq!(entries[1].key, "b");
    }

    #[test]
    fn segment_filename_matches_fileid_bitcask_data() {
        let dir = TempDir::new().unwrap();
        let segment = Segment::create(42, dir.path()).unwrap();
        assert_eq!(segment.path().file_name().unwrap(), "42_bitcask.data");
    }
}

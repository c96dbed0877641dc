//! The in-memory key directory: a typed key to on-disk location index.

use std::collections::HashMap;

use crate::key::BitcaskKey;
use crate::record::MappedStoredEntry;
use crate::segment::AppendEntryResponse;
use crate::segments::WriteBackResponse;

/// Where the most recent live record for a key lives on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Segment the record lives in.
    pub file_id: u64,
    /// Offset, within that segment, the record starts at.
    pub offset: u64,
    /// Total encoded length of the record.
    pub entry_length: u32,
}

impl From<AppendEntryResponse> for DirectoryEntry {
    fn from(response: AppendEntryResponse) -> Self {
        DirectoryEntry {
            file_id: response.file_id,
            offset: response.offset,
            entry_length: response.entry_length,
        }
    }
}

/// Maps typed keys to their current on-disk location.
#[derive(Debug)]
pub struct Directory<K> {
    entry_by_key: HashMap<K, DirectoryEntry>,
}

impl<K: BitcaskKey> Directory<K> {
    /// Creates an empty directory sized to `initial_capacity`.
    pub fn new(initial_capacity: usize) -> Directory<K> {
        Directory {
            entry_by_key: HashMap::with_capacity(initial_capacity),
        }
    }

    /// Records `key`'s current location.
    pub fn put(&mut self, key: K, entry: DirectoryEntry) {
        self.entry_by_key.insert(key, entry);
    }

    /// Alias of `put`, kept for call-site clarity at update sites.
    pub fn update(&mut self, key: K, entry: DirectoryEntry) {
        self.put(key, entry);
    }

    /// Removes `key` from the directory. The tombstone record itself stays on disk.
    pub fn delete(&mut self, key: &K) {
        self.entry_by_key.remove(key);
    }

    /// Looks up `key`'s current location.
    pub fn get(&self, key: &K) -> Option<DirectoryEntry> {
        self.entry_by_key.get(key).copied()
    }

    /// Applies every write-back response as a `put`.
    pub fn bulk_update(&mut self, changes: &[WriteBackResponse<K>]) {
        for change in changes {
            self.put(change.key.clone(), change.entry.into());
        }
    }

    /// Installs every entry decoded from a freshly discovered inactive
    /// segment. The deleted flag is not consulted here: a tombstoned key
    /// that reappears this way will be resolved at the next merge.
    pub fn reload(&mut self, file_id: u64, entries: &[MappedStoredEntry<K>]) {
        for entry in entries {
            self.put(
                entry.key.clone(),
                DirectoryEntry {
                    file_id,
                    offset: entry.key_offset as u64,
                    entry_length: entry.entry_length,
                },
            );
        }
    }

    /// Number of keys currently tracked.
    pub fn len(&self) -> usize {
        self.entry_by_key.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.entry_by_key.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(file_id: u64) -> DirectoryEntry {
        DirectoryEntry {
            file_id,
            offset: 0,
            entry_length: 10,
        }
    }

    #[test]
    fn put_then_get_returns_entry() {
        let mut directory: Directory<String> = Directory::new(16);
        directory.put("topic".to_owned(), entry(1));
        assert_eq!(directory.get(&"topic".to_owned()), Some(entry(1)));
    }

    #[test]
    fn delete_removes_the_key() {
        let mut directory: Directory<String> = Directory::new(16);
        directory.put("topic".to_owned(), entry(1));
        directory.delete(&"topic".to_owned());
        assert_eq!(directory.get(&"topic".to_owned()), None);
    }

    #[test]
    fn get_on_missing_key_returns_none() {
        let directory: Directory<String> = Directory::new(16);
        assert_eq!(directory.get(&"missing".to_owned()), None);
    }

    #[test]
    fn reload_installs_entries_by_offset_regardless_of_deleted_flag() {
        let mut directory: Directory<String> = Directory::new(16);
        let entries = vec![MappedStoredEntry {
            key: "topic".to_owned(),
            value: vec![],
            deleted: true,
            timestamp: 1,
            key_offset: 37,
            entry_length: 12,
        }];
        directory.reload(3, &entries);
        let found = directory.get(&"topic".to_owned()).unwrap();
        assert_eq!(found.file_id, 3);
        assert_eq!(found.offset, 37);
    }
}

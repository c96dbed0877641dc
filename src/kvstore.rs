//! The concurrency-safe façade over `Segments` and `Directory`: a single
//! reader-writer lock guards both as one unit.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::clock::Clock;
use crate::config::Config;
use crate::directory::Directory;
use crate::error::{Error, Result};
use crate::key::BitcaskKey;
use crate::record::MappedStoredEntry;
use crate::segments::{Segments, WriteBackResponse};

struct Inner<K: BitcaskKey> {
    segments: Segments,
    directory: Directory<K>,
}

/// The externally-visible Get/Put/Update/Delete surface, serialized by a
/// single `RwLock` over both the segment set and the key directory.
pub struct KVStore<K: BitcaskKey> {
    inner: RwLock<Inner<K>>,
}

impl<K: BitcaskKey> KVStore<K> {
    /// Opens a store: builds the segment set (which discovers any
    /// pre-existing segment files), builds an empty directory, then reloads
    /// every discovered inactive segment into the directory.
    pub fn open(config: &Config<K>) -> Result<KVStore<K>> {
        let clock: Arc<dyn Clock> = config.clock.clone();
        let segments = Segments::open(config.directory.clone(), config.max_segment_size_bytes, clock)?;
        let mut directory: Directory<K> = Directory::new(config.key_directory_capacity);

        let key_mapper = config.merge.key_mapper.as_ref();
        let file_ids: Vec<u64> = segments.all_inactive().keys().copied().collect();
        for file_id in file_ids {
            let segment = segments
                .all_inactive()
                .get(&file_id)
                .expect("file id came from this same map");
            let entries = segment.read_full(key_mapper)?;
            directory.reload(file_id, &entries);
        }

        info!(live_keys = directory.len(), "reloaded key directory from disk");

        Ok(KVStore {
            inner: RwLock::new(Inner { segments, directory }),
        })
    }

    /// Writes `value` for `key`, overwriting any previous value.
    pub fn put(&self, key: K, value: &[u8]) -> Result<()> {
        let mut inner = self.inner.write().expect("kvstore lock poisoned");
        let response = inner.segments.append(&key, value)?;
        inner.directory.put(key, response.into());
        Ok(())
    }

    /// Alias of `put`.
    pub fn update(&self, key: K, value: &[u8]) -> Result<()> {
        self.put(key, value)
    }

    /// Appends a tombstone for `key` and removes it from the directory.
    pub fn delete(&self, key: K) -> Result<()> {
        let mut inner = self.inner.write().expect("kvstore lock poisoned");
        inner.segments.append_deleted(&key)?;
        inner.directory.delete(&key);
        Ok(())
    }

    /// Returns the value for `key`, or `Error::KeyNotFound`/`Error::KeyReadError`.
    pub fn get(&self, key: &K) -> Result<Vec<u8>> {
        let inner = self.inner.read().expect("kvstore lock poisoned");
        let entry = inner.directory.get(key).ok_or(Error::KeyNotFound)?;
        inner
            .segments
            .read(entry.file_id, entry.offset, entry.entry_length)
            .map(|stored| stored.value)
            .map_err(|e| Error::KeyReadError(e.to_string()))
    }

    /// The infallible sibling of `get`: collapses any failure to `None`.
    pub fn silent_get(&self, key: &K) -> Option<Vec<u8>> {
        let inner = self.inner.read().expect("kvstore lock poisoned");
        let entry = inner.directory.get(key)?;
        inner
            .segments
            .read(entry.file_id, entry.offset, entry.entry_length)
            .ok()
            .map(|stored| stored.value)
    }

    /// Reads up to `total_segments` inactive segments in full.
    pub fn read_inactive_segments(
        &self,
        total_segments: usize,
        key_mapper: &dyn Fn(&[u8]) -> K,
    ) -> Result<(Vec<u64>, Vec<Vec<MappedStoredEntry<K>>>)> {
        let inner = self.inner.read().expect("kvstore lock poisoned");
        inner.segments.read_inactive(total_segments, key_mapper)
    }

    /// Reads every inactive segment in full.
    pub fn read_all_inactive_segments(
        &self,
        key_mapper: &dyn Fn(&[u8]) -> K,
    ) -> Result<(Vec<u64>, Vec<Vec<MappedStoredEntry<K>>>)> {
        let inner = self.inner.read().expect("kvstore lock poisoned");
        inner.segments.read_all_inactive(key_mapper)
    }

    /// Atomically writes back merged survivors to new segments, bulk-updates
    /// the directory, and removes the superseded segments.
    pub fn write_back(&self, old_file_ids: &[u64], changes: HashMap<K, MappedStoredEntry<K>>) -> Result<()> {
        let mut inner = self.inner.write().expect("kvstore lock poisoned");
        let responses: Vec<WriteBackResponse<K>> = inner.segments.write_back(changes)?;
        inner.directory.bulk_update(&responses);
        inner.segments.remove(old_file_ids)?;
        Ok(())
    }

    /// Removes every segment file, active and inactive.
    pub fn clear_log(&self) -> Result<()> {
        let inner = self.inner.write().expect("kvstore lock poisoned");
        inner.segments.remove_active()?;
        inner.segments.remove_all_inactive()?;
        Ok(())
    }

    /// Fsyncs every segment.
    pub fn sync(&self) -> Result<()> {
        let inner = self.inner.write().expect("kvstore lock poisoned");
        inner.segments.sync()
    }

    /// Drops in-memory segment handles without unlinking files.
    pub fn shutdown(&self) {
        let mut inner = self.inner.write().expect("kvstore lock poisoned");
        inner.segments.shutdown();
    }
}

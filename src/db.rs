//! The top-level façade wiring a `KVStore` to its background compaction worker.

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::key::BitcaskKey;
use crate::kvstore::KVStore;
use crate::worker::Worker;

/// An embedded, append-only key/value store.
///
/// ```
/// # use bitcask::{Config, Db, MergeConfig};
/// # use std::sync::Arc;
/// # use std::time::Duration;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// # let dir = tempfile::TempDir::new()?;
/// let merge = MergeConfig::full(
///     Duration::from_secs(300),
///     Arc::new(|bytes: &[u8]| String::from_utf8(bytes.to_vec()).unwrap()),
/// );
/// let config = Config::new(dir.path(), 64 * 1024 * 1024, 1024, merge);
/// let db: Db<String> = Db::open(config)?;
/// db.put("topic".to_owned(), b"microservices")?;
/// assert_eq!(db.get(&"topic".to_owned())?, b"microservices".to_vec());
/// # Ok(())
/// # }
/// ```
pub struct Db<K: BitcaskKey> {
    kv_store: Arc<KVStore<K>>,
    worker: Worker,
}

impl<K: BitcaskKey> Db<K> {
    /// Opens a database at the directory named in `config`, reloading any
    /// existing segments and starting the background compaction worker.
    pub fn open(config: Config<K>) -> Result<Db<K>> {
        let kv_store = Arc::new(KVStore::open(&config)?);
        let worker = Worker::start(kv_store.clone(), config.merge);
        Ok(Db { kv_store, worker })
    }

    /// Writes `value` for `key`, overwriting any previous value.
    pub fn put(&self, key: K, value: &[u8]) -> Result<()> {
        self.kv_store.put(key, value)
    }

    /// Alias of `put`.
    pub fn update(&self, key: K, value: &[u8]) -> Result<()> {
        self.kv_store.update(key, value)
    }

    /// Removes `key`.
    pub fn delete(&self, key: K) -> Result<()> {
        self.kv_store.delete(key)
    }

    /// Returns the value for `key`, or `Error::KeyNotFound`.
    pub fn get(&self, key: &K) -> Result<Vec<u8>> {
        self.kv_store.get(key)
    }

    /// The infallible sibling of `get`.
    pub fn silent_get(&self, key: &K) -> Option<Vec<u8>> {
        self.kv_store.silent_get(key)
    }

    /// Fsyncs every segment to disk.
    pub fn sync(&self) -> Result<()> {
        self.kv_store.sync()
    }

    /// Removes every segment file, active and inactive. Intended for tests
    /// and for callers that want to discard the store entirely.
    pub fn clear_log(&self) -> Result<()> {
        self.kv_store.clear_log()
    }

    /// Stops the compaction worker and releases in-memory segment handles.
    /// Callers should stop the worker before shutdown; a merge in flight is
    /// not waited on beyond the worker's own join.
    pub fn shutdown(&mut self) {
        self.worker.stop();
        self.kv_store.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::MergeConfig;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn string_mapper() -> Arc<dyn Fn(&[u8]) -> String + Send + Sync> {
        Arc::new(|bytes: &[u8]| String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn put_get_delete_round_trip() {
        let dir = TempDir::new().unwrap();
        let merge = MergeConfig::full(Duration::from_secs(300), string_mapper());
        let config = Config::with_clock(dir.path(), 1024 * 1024, 16, merge, Arc::new(ManualClock::new()));
        let mut db: Db<String> = Db::open(config).unwrap();

        db.put("topic".to_owned(), b"microservices").unwrap();
        assert_eq!(db.get(&"topic".to_owned()).unwrap(), b"microservices".to_vec());

        db.delete("topic".to_owned()).unwrap();
        assert_eq!(db.silent_get(&"topic".to_owned()), None);

        db.shutdown();
    }

    #[test]
    fn reopen_after_sync_and_shutdown_preserves_data() {
        let dir = TempDir::new().unwrap();
        {
            let merge = MergeConfig::full(Duration::from_secs(300), string_mapper());
            let config = Config::with_clock(dir.path(), 1024 * 1024, 16, merge, Arc::new(ManualClock::new()));
            let mut db: Db<String> = Db::open(config).unwrap();
            for i in 0..100 {
                db.put(format!("key{}", i), format!("value{}", i).as_bytes()).unwrap();
            }
            db.sync().unwrap();
            db.shutdown();
        }

        let merge = MergeConfig::full(Duration::from_secs(300), string_mapper());
        let config = Config::with_clock(dir.path(), 1024 * 1024, 16, merge, Arc::new(ManualClock::new()));
        let db: Db<String> = Db::open(config).unwrap();
        for i in 0..100 {
            assert_eq!(
                db.silent_get(&format!("key{}", i)),
                Some(format!("value{}", i).as_bytes().to_vec())
            );
        }
    }
}

//! The background compaction thread: periodically folds inactive segments
//! into fewer segments retaining only the latest live value per key.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::config::MergeConfig;
use crate::key::BitcaskKey;
use crate::kvstore::KVStore;
use crate::merge::MergedState;

/// Owns the background thread that drives periodic compaction.
pub struct Worker {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawns the compaction thread, ticking every `merge.run_merge_every`.
    pub fn start<K: BitcaskKey>(kv_store: Arc<KVStore<K>>, merge: MergeConfig<K>) -> Worker {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let interval = merge.run_merge_every;

        let handle = std::thread::spawn(move || {
            info!(?interval, "compaction worker started");
            loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        begin_merge(&kv_store, &merge);
                    }
                }
            }
            info!("compaction worker stopped");
        });

        Worker {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Signals the thread to stop after its current wait and joins it.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn begin_merge<K: BitcaskKey>(kv_store: &KVStore<K>, merge: &MergeConfig<K>) {
    let key_mapper = merge.key_mapper.as_ref();
    let read_result = if merge.should_read_all_segments {
        kv_store.read_all_inactive_segments(key_mapper)
    } else {
        kv_store.read_inactive_segments(merge.total_segments_to_read, key_mapper)
    };

    let (file_ids, mut segment_entries) = match read_result {
        Ok(result) => result,
        Err(err) => {
            warn!(error = %err, "merge cycle skipped: could not read inactive segments");
            return;
        }
    };

    if segment_entries.len() < 2 {
        debug!(segments = segment_entries.len(), "merge cycle skipped: fewer than two segments to fold");
        return;
    }

    let mut merged_state: MergedState<K> = MergedState::new();
    merged_state.take_all(segment_entries.remove(0));
    for entries in segment_entries {
        merged_state.merge_with(entries);
    }

    let live_count = merged_state.live_len();
    let live = merged_state.into_live();

    match kv_store.write_back(&file_ids, live) {
        Ok(()) => debug!(segments_folded = file_ids.len(), keys_retained = live_count, "merge cycle completed"),
        Err(err) => error!(error = %err, "merge cycle failed during write-back"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::{Config, MergeConfig};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn string_mapper() -> Arc<dyn Fn(&[u8]) -> String + Send + Sync> {
        Arc::new(|bytes: &[u8]| String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[test]
    fn begin_merge_does_nothing_with_fewer_than_two_segments() {
        let dir = TempDir::new().unwrap();
        let merge = MergeConfig::full(Duration::from_secs(60), string_mapper());
        let config = Config::with_clock(dir.path(), 8, 16, merge.clone(), Arc::new(ManualClock::new()));
        let store = KVStore::open(&config).unwrap();
        store.put("topic".to_owned(), b"microservices").unwrap();

        begin_merge(&store, &merge);
        assert_eq!(store.get(&"topic".to_owned()).unwrap(), b"microservices".to_vec());
    }

    #[test]
    fn begin_merge_folds_segments_and_keeps_latest_value() {
        let dir = TempDir::new().unwrap();
        let merge = MergeConfig::full(Duration::from_secs(60), string_mapper());
        let config = Config::with_clock(dir.path(), 8, 16, merge.clone(), Arc::new(ManualClock::new()));
        let store = KVStore::open(&config).unwrap();

        store.put("topic".to_owned(), b"microservices").unwrap();
        store.put("topic".to_owned(), b"bitcask").unwrap();
        store.put("disk".to_owned(), b"ssd").unwrap();

        begin_merge(&store, &merge);

        assert_eq!(store.get(&"topic".to_owned()).unwrap(), b"bitcask".to_vec());
        assert_eq!(store.get(&"disk".to_owned()).unwrap(), b"ssd".to_vec());
    }

    #[test]
    fn worker_start_and_stop_does_not_hang() {
        let dir = TempDir::new().unwrap();
        let merge = MergeConfig::full(Duration::from_millis(50), string_mapper());
        let config = Config::with_clock(dir.path(), 1024, 16, merge.clone(), Arc::new(ManualClock::new()));
        let store = Arc::new(KVStore::open(&config).unwrap());

        let mut worker = Worker::start(store, merge);
        std::thread::sleep(Duration::from_millis(75));
        worker.stop();
    }
}

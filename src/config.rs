//! User-facing configuration for opening a `Db`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::clock::{Clock, SystemClock};

/// Configuration for the compaction worker.
#[derive(Clone)]
pub struct MergeConfig<K> {
    pub(crate) total_segments_to_read: usize,
    pub(crate) should_read_all_segments: bool,
    pub(crate) run_merge_every: Duration,
    pub(crate) key_mapper: Arc<dyn Fn(&[u8]) -> K + Send + Sync>,
}

impl<K> MergeConfig<K> {
    /// A merge cycle reads `total_segments_to_read` inactive segments at a time.
    pub fn partial(
        total_segments_to_read: usize,
        run_merge_every: Duration,
        key_mapper: Arc<dyn Fn(&[u8]) -> K + Send + Sync>,
    ) -> MergeConfig<K> {
        MergeConfig {
            total_segments_to_read,
            should_read_all_segments: false,
            run_merge_every,
            key_mapper,
        }
    }

    /// A merge cycle reads every inactive segment that currently exists.
    pub fn full(
        run_merge_every: Duration,
        key_mapper: Arc<dyn Fn(&[u8]) -> K + Send + Sync>,
    ) -> MergeConfig<K> {
        MergeConfig {
            total_segments_to_read: 0,
            should_read_all_segments: true,
            run_merge_every,
            key_mapper,
        }
    }
}

/// Top-level configuration handed to `Db::open`.
#[derive(Clone)]
pub struct Config<K> {
    pub(crate) directory: PathBuf,
    pub(crate) max_segment_size_bytes: u64,
    pub(crate) key_directory_capacity: usize,
    pub(crate) merge: MergeConfig<K>,
    pub(crate) clock: Arc<dyn Clock>,
}

impl<K> Config<K> {
    /// Builds a configuration with the system clock as the time source.
    pub fn new(
        directory: impl Into<PathBuf>,
        max_segment_size_bytes: u64,
        key_directory_capacity: usize,
        merge: MergeConfig<K>,
    ) -> Config<K> {
        Config::with_clock(
            directory,
            max_segment_size_bytes,
            key_directory_capacity,
            merge,
            Arc::new(SystemClock::new()),
        )
    }

    /// Builds a configuration with an explicit clock, for deterministic tests.
    pub fn with_clock(
        directory: impl Into<PathBuf>,
        max_segment_size_bytes: u64,
        key_directory_capacity: usize,
        merge: MergeConfig<K>,
        clock: Arc<dyn Clock>,
    ) -> Config<K> {
        Config {
            directory: directory.into(),
            max_segment_size_bytes,
            key_directory_capacity,
            merge,
            clock,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::sync::Arc;

    #[test]
    fn full_merge_config_reads_all_segments() {
        let merge: MergeConfig<String> = MergeConfig::full(
            Duration::from_secs(1),
            Arc::new(|bytes: &[u8]| String::from_utf8(bytes.to_vec()).unwrap()),
        );
        assert!(merge.should_read_all_segments);
    }

    #[test]
    fn partial_merge_config_carries_requested_count() {
        let merge: MergeConfig<String> = MergeConfig::partial(
            3,
            Duration::from_secs(1),
            Arc::new(|bytes: &[u8]| String::from_utf8(bytes.to_vec()).unwrap()),
        );
        assert_eq!(merge.total_segments_to_read, 3);
        assert!(!merge.should_read_all_segments);
    }

    #[test]
    fn config_defaults_to_system_clock() {
        let merge: MergeConfig<String> = MergeConfig::full(
            Duration::from_secs(1),
            Arc::new(|bytes: &[u8]| String::from_utf8(bytes.to_vec()).unwrap()),
        );
        let config = Config::new("/tmp/bitcask-config-test", 1024, 16, merge);
        let _: Arc<dyn Clock> = config.clock;
    }

    #[test]
    fn config_accepts_explicit_clock() {
        let merge: MergeConfig<String> = MergeConfig::full(
            Duration::from_secs(1),
            Arc::new(|bytes: &[u8]| String::from_utf8(bytes.to_vec()).unwrap()),
        );
        let clock = Arc::new(ManualClock::new());
        let config = Config::with_clock("/tmp/bitcask-config-test-2", 1024, 16, merge, clock);
        assert_eq!(config.clock.now(), 0);
    }
}

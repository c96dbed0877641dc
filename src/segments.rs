//! The segment set: one active segment plus a fleet of inactive segments,
//! with transparent rollover and start-up discovery of pre-existing files.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::id::FileIdGenerator;
use crate::key::BitcaskKey;
use crate::record::MappedStoredEntry;
use crate::segment::{AppendEntryResponse, Segment};

/// Pairs a key with the on-disk location its write-back landed at.
#[derive(Debug, Clone)]
pub struct WriteBackResponse<K> {
    /// The key that was written back.
    pub key: K,
    /// Where the re-written record ended up.
    pub entry: AppendEntryResponse,
}

/// Owns the active segment and every inactive segment, and knows how to
/// roll over, discover, merge-write-back, and remove segment files.
pub struct Segments {
    active_segment: Segment,
    inactive_segments: HashMap<u64, Segment>,
    file_id_generator: FileIdGenerator,
    clock: Arc<dyn Clock>,
    max_segment_size_bytes: u64,
    directory: PathBuf,
}

impl Segments {
    /// Opens a segment set at `directory`, creating it if absent and
    /// discovering any pre-existing `<fileId>_bitcask.data` files, mounting
    /// them read-only and seeding the file id generator past the highest one
    /// found so a restarted process never reissues an id already on disk.
    pub fn open(directory: impl Into<PathBuf>, max_segment_size_bytes: u64, clock: Arc<dyn Clock>) -> Result<Segments> {
        let directory = directory.into();
        fs::create_dir_all(&directory)?;

        let mut discovered: Vec<u64> = Vec::new();
        for entry in fs::read_dir(&directory)? {
            let path = entry?.path();
            if let Some(file_id) = parse_segment_file_id(&path) {
                discovered.push(file_id);
            }
        }
        discovered.sort_unstable();

        let max_discovered = discovered.last().copied().unwrap_or(0);
        let file_id_generator = if discovered.is_empty() {
            FileIdGenerator::new()
        } else {
            FileIdGenerator::starting_after(max_discovered)
        };

        let mut inactive_segments = HashMap::new();
        for file_id in &discovered {
            let segment = Segment::reload_inactive(*file_id, &directory)?;
            inactive_segments.insert(*file_id, segment);
        }

        let active_segment = Segment::create(file_id_generator.next(), &directory)?;

        info!(
            directory = %directory.display(),
            discovered = discovered.len(),
            active_file_id = active_segment.file_id(),
            "opened segment set"
        );

        Ok(Segments {
            active_segment,
            inactive_segments,
            file_id_generator,
            clock,
            max_segment_size_bytes,
            directory,
        })
    }

    /// Appends a live record for `key`/`value` to the active segment,
    /// rolling over first if the active segment has crossed the threshold.
    pub fn append<K: BitcaskKey>(&mut self, key: &K, value: &[u8]) -> Result<AppendEntryResponse> {
        self.maybe_rollover_active()?;
        self.active_segment.append(key, value, false, None, self.clock.as_ref())
    }

    /// Appends a tombstone record for `key`.
    pub fn append_deleted<K: BitcaskKey>(&mut self, key: &K) -> Result<AppendEntryResponse> {
        self.maybe_rollover_active()?;
        self.active_segment.append(key, &[], true, None, self.clock.as_ref())
    }

    /// Reads a single record by its `(file_id, offset, size)` address.
    pub fn read(&self, file_id: u64, offset: u64, size: u32) -> Result<crate::record::StoredEntry> {
        if file_id == self.active_segment.file_id() {
            return self.active_segment.read(offset, size);
        }
        match self.inactive_segments.get(&file_id) {
            Some(segment) => segment.read(offset, size),
            None => Err(Error::UnknownSegment(file_id)),
        }
    }

    /// Reads up to `total_segments` inactive segments in full. Returns only
    /// the segments actually read: right-sized vectors, not padded to the
    /// requested count.
    pub fn read_inactive<K>(
        &self,
        total_segments: usize,
        key_mapper: &dyn Fn(&[u8]) -> K,
    ) -> Result<(Vec<u64>, Vec<Vec<MappedStoredEntry<K>>>)> {
        let mut file_ids = Vec::new();
        let mut contents = Vec::new();
        for segment in self.inactive_segments.values().take(total_segments) {
            contents.push(segment.read_full(key_mapper)?);
            file_ids.push(segment.file_id());
        }
        Ok((file_ids, contents))
    }

    /// Reads every inactive segment in full.
    pub fn read_all_inactive<K>(
        &self,
        key_mapper: &dyn Fn(&[u8]) -> K,
    ) -> Result<(Vec<u64>, Vec<Vec<MappedStoredEntry<K>>>)> {
        self.read_inactive(self.inactive_segments.len(), key_mapper)
    }

    /// Writes every surviving `(key, entry)` change to one or more fresh
    /// inactive segments, preserving each entry's original timestamp, and
    /// registers the new segments. Rolls over to an additional new segment
    /// whenever the segment being written to crosses the size threshold.
    pub fn write_back<K: BitcaskKey>(
        &mut self,
        changes: HashMap<K, MappedStoredEntry<K>>,
    ) -> Result<Vec<WriteBackResponse<K>>> {
        let mut segment = Segment::create(self.file_id_generator.next(), &self.directory)?;
        let mut segment_id = segment.file_id();

        let mut responses = Vec::with_capacity(changes.len());
        for (key, mapped) in changes {
            let entry = segment.append(
                &key,
                &mapped.value,
                mapped.deleted,
                Some(mapped.timestamp),
                self.clock.as_ref(),
            )?;
            responses.push(WriteBackResponse { key, entry });

            if segment.size_in_bytes() >= self.max_segment_size_bytes {
                self.inactive_segments.insert(segment_id, segment);
                segment = Segment::create(self.file_id_generator.next(), &self.directory)?;
                segment_id = segment.file_id();
            }
        }
        self.inactive_segments.insert(segment_id, segment);
        Ok(responses)
    }

    /// Unlinks and forgets the named inactive segments; unknown ids are ignored.
    pub fn remove(&mut self, file_ids: &[u64]) -> Result<()> {
        for file_id in file_ids {
            if let Some(segment) = self.inactive_segments.remove(file_id) {
                segment.remove()?;
            }
        }
        Ok(())
    }

    /// Unlinks the active segment's file.
    pub fn remove_active(&self) -> Result<()> {
        self.active_segment.remove()
    }

    /// Unlinks every inactive segment's file.
    pub fn remove_all_inactive(&self) -> Result<()> {
        for segment in self.inactive_segments.values() {
            segment.remove()?;
        }
        Ok(())
    }

    /// The inactive segments, for callers (e.g. the reload pass) that need
    /// to read every one of them.
    pub fn all_inactive(&self) -> &HashMap<u64, Segment> {
        &self.inactive_segments
    }

    /// Fsyncs the active segment and every inactive segment.
    pub fn sync(&self) -> Result<()> {
        self.active_segment.sync()?;
        for segment in self.inactive_segments.values() {
            segment.sync()?;
        }
        Ok(())
    }

    /// Drops in-memory handles without unlinking any file.
    pub fn shutdown(&mut self) {
        self.inactive_segments.clear();
    }

    fn maybe_rollover_active(&mut self) -> Result<()> {
        if self.active_segment.size_in_bytes() >= self.max_segment_size_bytes {
            let old_id = self.active_segment.file_id();
            self.active_segment.stop_writes();
            let new_segment = Segment::create(self.file_id_generator.next(), &self.directory)?;
            debug!(old_file_id = old_id, new_file_id = new_segment.file_id(), "rolled over active segment");
            let old_segment = std::mem::replace(&mut self.active_segment, new_segment);
            self.inactive_segments.insert(old_id, old_segment);
        }
        Ok(())
    }
}

fn parse_segment_file_id(path: &Path) -> Option<u64> {
    let file_name = path.file_name()?.to_str()?;
    let stem = file_name.strip_suffix("_bitcask.data")?;
    stem.parse::<u64>().ok()
}

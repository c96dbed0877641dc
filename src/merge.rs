//! Latest-timestamp-wins reduction of several segments' decoded records into
//! one per-key surviving state, used by the compaction worker.

use std::collections::HashMap;
use std::hash::Hash;

use crate::record::MappedStoredEntry;

/// Reduces record lists from multiple segments into a single `live` map
/// (records to write back) and a `deleted` map (tombstones still being
/// tracked in case a later segment resurrects the key with a newer write).
#[derive(Debug)]
pub struct MergedState<K> {
    live: HashMap<K, MappedStoredEntry<K>>,
    deleted: HashMap<K, MappedStoredEntry<K>>,
}

impl<K: Eq + Hash + Clone> MergedState<K> {
    /// Creates an empty merged state.
    pub fn new() -> MergedState<K> {
        MergedState {
            live: HashMap::new(),
            deleted: HashMap::new(),
        }
    }

    /// Seeds the state unconditionally from the first segment's entries,
    /// routing each into `live` or `deleted` by its tombstone flag.
    pub fn take_all(&mut self, entries: Vec<MappedStoredEntry<K>>) {
        for entry in entries {
            if entry.deleted {
                self.deleted.insert(entry.key.clone(), entry);
            } else {
                self.live.insert(entry.key.clone(), entry);
            }
        }
    }

    /// Folds in a subsequent segment's entries, resolving conflicts by
    /// latest timestamp.
    pub fn merge_with(&mut self, entries: Vec<MappedStoredEntry<K>>) {
        for entry in entries {
            if let Some(existing) = self.live.get(&entry.key).cloned() {
                self.maybe_update(&existing, entry);
            } else if let Some(deleted) = self.deleted.get(&entry.key).cloned() {
                let key = entry.key.clone();
                self.maybe_update(&deleted, entry);
                // Touched once per merge cycle, regardless of whether the
                // new entry's timestamp won: a key never stays tracked as
                // `deleted` past the segment that resolves it.
                self.deleted.remove(&key);
            } else {
                // No prior state for this key in this merge cycle: it is
                // installed into `live` unconditionally, even if tombstoned.
                // This mirrors the reference merge algorithm exactly.
                self.live.insert(entry.key.clone(), entry);
            }
        }
    }

    /// Only ever touches `live`: a newer tombstone removes the key from
    /// `live` and is otherwise forgotten, it is never recorded in `deleted`.
    fn maybe_update(&mut self, existing: &MappedStoredEntry<K>, new_entry: MappedStoredEntry<K>) {
        if new_entry.timestamp > existing.timestamp {
            if new_entry.deleted {
                self.live.remove(&existing.key);
            } else {
                self.live.insert(existing.key.clone(), new_entry);
            }
        }
    }

    /// Consumes the state, returning the surviving live records to write back.
    pub fn into_live(self) -> HashMap<K, MappedStoredEntry<K>> {
        self.live
    }

    /// Number of surviving live keys, for logging.
    pub fn live_len(&self) -> usize {
        self.live.len()
    }
}

impl<K: Eq + Hash + Clone> Default for MergedState<K> {
    fn default() -> Self {
        Self::new()
    }
}

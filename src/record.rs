//! The on-disk record format: a fixed five-field little-endian layout with
//! the tombstone marker folded into the value bytes.
//!
//! ```text
//! ┌───────────┬──────────┬────────────┬─────┬───────┬───────────┐
//! │ timestamp │ key_size │ value_size │ key │ value │ tombstone │
//! └───────────┴──────────┴────────────┴─────┴───────┴───────────┘
//! ```
//!
//! `value_size` covers the value bytes plus the trailing tombstone byte.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Write;

use crate::error::{Error, Result};
use crate::key::BitcaskKey;

const HEADER_SIZE: usize = 4 + 4 + 4;
const TOMBSTONE_LIVE: u8 = 0;
const TOMBSTONE_DELETED: u8 = 1;

/// A decoded record with its key and value still as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEntry {
    /// The serialized key bytes as written to disk.
    pub key: Vec<u8>,
    /// The value bytes, tombstone marker stripped.
    pub value: Vec<u8>,
    /// Whether this record is a deletion marker.
    pub deleted: bool,
    /// The timestamp stamped at append time.
    pub timestamp: u32,
}

/// A decoded record whose key has been mapped back to its typed form, plus
/// enough positional information to drive reload and merge write-back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedStoredEntry<K> {
    /// The typed key, produced by a caller-supplied key mapper.
    pub key: K,
    /// The value bytes, tombstone marker stripped.
    pub value: Vec<u8>,
    /// Whether this record is a deletion marker.
    pub deleted: bool,
    /// The timestamp stamped at append time.
    pub timestamp: u32,
    /// Offset, within the segment, at which this record starts.
    pub key_offset: u32,
    /// Total encoded length of this record.
    pub entry_length: u32,
}

/// Encodes a record. `timestamp = None` asks the caller's clock for "now";
/// `timestamp = Some(ts)` preserves a timestamp from an earlier record, used
/// during merge write-back so latest-wins ordering survives compaction.
pub fn encode(
    key: &[u8],
    value: &[u8],
    deleted: bool,
    timestamp: Option<u32>,
    clock: &dyn crate::clock::Clock,
) -> Vec<u8> {
    let timestamp = timestamp.unwrap_or_else(|| clock.now() as u32);
    let key_size = key.len() as u32;
    let value_size = value.len() as u32 + 1;

    let mut encoded = Vec::with_capacity(HEADER_SIZE + key.len() + value.len() + 1);
    encoded
        .write_u32::<LittleEndian>(timestamp)
        .expect("writes to a Vec never fail");
    encoded
        .write_u32::<LittleEndian>(key_size)
        .expect("writes to a Vec never fail");
    encoded
        .write_u32::<LittleEndian>(value_size)
        .expect("writes to a Vec never fail");
    encoded.write_all(key).expect("writes to a Vec never fail");
    encoded
        .write_all(value)
        .expect("writes to a Vec never fail");
    encoded.push(if deleted {
        TOMBSTONE_DELETED
    } else {
        TOMBSTONE_LIVE
    });
    encoded
}

/// Decodes a single record starting at byte 0 of `buffer`.
pub fn decode_one(buffer: &[u8]) -> Result<StoredEntry> {
    let (entry, _) = decode_from(buffer, 0)?;
    Ok(entry)
}

/// Decodes every record in `buffer`, stamping each with its typed key (via
/// `key_mapper`), its start offset, and its encoded length. Used when a
/// segment must be read in full: reload and merge.
pub fn decode_all<K>(
    buffer: &[u8],
    key_mapper: &dyn Fn(&[u8]) -> K,
) -> Result<Vec<MappedStoredEntry<K>>> {
    let mut offset = 0usize;
    let mut entries = Vec::new();
    while offset < buffer.len() {
        let (entry, next_offset) = decode_from(buffer, offset)?;
        entries.push(MappedStoredEntry {
            key: key_mapper(&entry.key),
            value: entry.value,
            deleted: entry.deleted,
            timestamp: entry.timestamp,
            key_offset: offset as u32,
            entry_length: (next_offset - offset) as u32,
        });
        offset = next_offset;
    }
    Ok(entries)
}

fn decode_from(buffer: &[u8], offset: usize) -> Result<(StoredEntry, usize)> {
    if buffer.len() < offset + HEADER_SIZE {
        return Err(Error::MalformedRecord(format!(
            "record header at offset {} needs {} bytes but buffer has {}",
            offset,
            HEADER_SIZE,
            buffer.len() - offset.min(buffer.len())
        )));
    }
    let mut cursor = &buffer[offset..];
    let timestamp = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| Error::MalformedRecord(e.to_string()))?;
    let key_size = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| Error::MalformedRecord(e.to_string()))? as usize;
    let value_size = cursor
        .read_u32::<LittleEndian>()
        .map_err(|e| Error::MalformedRecord(e.to_string()))? as usize;

    let key_start = offset + HEADER_SIZE;
    let key_end = key_start + key_size;
    let value_end = key_end + value_size;
    if buffer.len() < value_end {
        return Err(Error::MalformedRecord(format!(
            "record at offset {} declares {} key bytes and {} value bytes but buffer has {} remaining",
            offset,
            key_size,
            value_size,
            buffer.len() - key_end.min(buffer.len())
        )));
    }

    let key = buffer[key_start..key_end].to_vec();
    let value_with_tombstone = &buffer[key_end..value_end];
    let tombstone = value_with_tombstone[value_with_tombstone.len() - 1];
    let value = value_with_tombstone[..value_with_tombstone.len() - 1].to_vec();

    Ok((
        StoredEntry {
            key,
            value,
            deleted: tombstone & 0x01 == 0x01,
            timestamp,
        },
        value_end,
    ))
}

/// Convenience wrapper combining a typed key's serialization with `encode`.
pub fn encode_for<K: BitcaskKey>(
    key: &K,
    value: &[u8],
    deleted: bool,
    timestamp: Option<u32>,
    clock: &dyn crate::clock::Clock,
) -> Vec<u8> {
    encode(&key.serialize(), value, deleted, timestamp, clock)
}

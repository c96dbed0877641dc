//! The key type requirements for the directory and the merge path.

use std::hash::Hash;

/// Keys stored in this crate must be equality-comparable, hashable, cheap to
/// clone, and serializable to the bytes that actually reach disk.
pub trait BitcaskKey: Eq + Hash + Clone + Send + Sync + 'static {
    /// Serializes the key to the bytes written into the record's key field.
    fn serialize(&self) -> Vec<u8>;
}

impl BitcaskKey for String {
    fn serialize(&self) -> Vec<u8> {
        self.as_bytes().to_vec()
    }
}

impl BitcaskKey for Vec<u8> {
    fn serialize(&self) -> Vec<u8> {
        self.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_key_serializes_to_utf8_bytes() {
        let key = "topic".to_owned();
        assert_eq!(key.serialize(), b"topic".to_vec());
    }

    #[test]
    fn byte_key_serializes_to_itself() {
        let key = vec![1u8, 2, 3];
        assert_eq!(key.serialize(), vec![1u8, 2, 3]);
    }
}

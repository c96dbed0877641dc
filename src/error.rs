use thiserror::Error;

/// The `Error` type for this crate's storage engine.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("An IO error occurred: {0}")]
    Io(#[from] std::io::Error),

    /// A write reached the kernel but fewer bytes landed than were requested.
    #[error("Short write to {path}: expected {expected} bytes, wrote {actual}")]
    ShortWrite {
        /// Path of the segment file being written.
        path: String,
        /// Bytes the caller asked to write.
        expected: usize,
        /// Bytes actually written.
        actual: usize,
    },

    /// Key not found error.
    #[error("Key not found")]
    KeyNotFound,

    /// The directory pointed at a record that could not be read back.
    #[error("Could not read stored value: {0}")]
    KeyReadError(String),

    /// A read was issued against a file id that is neither the active nor an inactive segment.
    #[error("Unknown segment file id {0}")]
    UnknownSegment(u64),

    /// A record could not be decoded from a segment's bytes.
    #[error("Malformed record: {0}")]
    MalformedRecord(String),
}

/// The `Result` type for this crate's storage engine.
pub type Result<T> = std::result::Result<T, Error>;

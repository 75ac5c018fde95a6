//! Error types for the journal subsystem.

use std::fmt;
use std::path::PathBuf;

/// Errors that can occur within the journal subsystem.
#[derive(Debug)]
#[non_exhaustive]
pub enum JournalError {
    /// An I/O error occurred while reading or writing the journal file.
    Io {
        message: String,
        path: Option<PathBuf>,
    },

    /// A journal entry failed CRC32 integrity verification.
    CorruptEntry {
        sequence: u64,
        expected_crc: u32,
        actual_crc: u32,
    },

    /// The journal entry payload could not be deserialized.
    DeserializationError { sequence: u64, message: String },

    /// The journal entry payload could not be serialized.
    SerializationError { message: String },

    /// The journal directory does not exist or is not accessible.
    InvalidDirectory { path: PathBuf },

    /// An internal mutex was poisoned (another thread panicked while
    /// holding the lock).
    MutexPoisoned,

    /// The requested sequence number was not found in the journal.
    SequenceNotFound { sequence: u64 },

    /// The journal entry has an invalid header (truncated or malformed).
    InvalidEntryHeader { offset: u64, message: String },
}

impl fmt::Display for JournalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JournalError::Io { message, path } => {
                if let Some(p) = path {
                    write!(f, "journal I/O error at {}: {message}", p.display())
                } else {
                    write!(f, "journal I/O error: {message}")
                }
            }
            JournalError::CorruptEntry {
                sequence,
                expected_crc,
                actual_crc,
            } => write!(
                f,
                "corrupt journal entry at sequence {sequence}: expected CRC {expected_crc:#010x}, got {actual_crc:#010x}"
            ),
            JournalError::DeserializationError { sequence, message } => {
                write!(f, "journal deserialization error at sequence {sequence}: {message}")
            }
            JournalError::SerializationError { message } => {
                write!(f, "journal serialization error: {message}")
            }
            JournalError::InvalidDirectory { path } => {
                write!(f, "invalid journal directory: {}", path.display())
            }
            JournalError::MutexPoisoned => write!(f, "journal internal mutex poisoned"),
            JournalError::SequenceNotFound { sequence } => {
                write!(f, "sequence {sequence} not found in journal")
            }
            JournalError::InvalidEntryHeader { offset, message } => {
                write!(f, "invalid journal entry header at offset {offset}: {message}")
            }
        }
    }
}

impl std::error::Error for JournalError {}

impl From<std::io::Error> for JournalError {
    #[cold]
    fn from(err: std::io::Error) -> Self {
        JournalError::Io {
            message: err.to_string(),
            path: None,
        }
    }
}

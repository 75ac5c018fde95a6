//! Append-only event journal trait for deterministic replay.
//!
//! The [`Journal`] trait defines the contract for persisting
//! [`EventEnvelope`]s to durable storage, independent of the matching hot
//! path (spec.md §6: the journal is an external, best-effort consumer of
//! the event stream, never a dependency of `MatchingEngine::process`).
//! Implementations must guarantee write-ahead semantics: an event is
//! considered committed only after [`append`](Journal::append) returns
//! `Ok(())`.
//!
//! See [`super::file_journal::FileJournal`] for the default single-file
//! implementation (behind the `journal` feature).

use super::error::JournalError;
use crate::engine::EventEnvelope;

/// Size of the fixed-size entry header in bytes: `[4 bytes entry_length][8
/// bytes sequence_num][8 bytes timestamp_ns]`.
pub const ENTRY_HEADER_SIZE: usize = 4 + 8 + 8;

/// Size of the CRC32 trailer appended to each entry in bytes.
pub const ENTRY_CRC_SIZE: usize = 4;

/// Total overhead per journal entry (header + CRC trailer) in bytes.
pub const ENTRY_OVERHEAD: usize = ENTRY_HEADER_SIZE + ENTRY_CRC_SIZE;

/// A single journal entry as read back from storage.
#[derive(Debug, Clone)]
pub struct JournalEntry {
    /// The deserialized event.
    pub event: EventEnvelope,
    /// The CRC32 checksum that was stored alongside the entry.
    pub stored_crc: u32,
}

/// Type alias for the iterator returned by [`Journal::read_from`].
pub type JournalReadIter = Box<dyn Iterator<Item = Result<JournalEntry, JournalError>>>;

/// An append-only event journal for deterministic replay.
///
/// Implementations must provide durable, ordered storage of
/// [`EventEnvelope`]s. Every event must be persisted before its result is
/// considered durable.
///
/// # Thread Safety
///
/// The trait requires `Send + Sync`; the intended usage is single-writer
/// (the owning symbol's event loop) with concurrent readers (replay,
/// monitoring, audit).
pub trait Journal: Send + Sync {
    /// Append an event to the journal. Must be durably persisted before
    /// this method returns.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if serialization, I/O, or flushing fails.
    fn append(&self, event: &EventEnvelope) -> Result<(), JournalError>;

    /// Read events starting from the given sequence number (inclusive). An
    /// empty iterator if `sequence` is beyond the last written entry.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the journal file cannot be opened or the
    /// starting position cannot be located.
    fn read_from(&self, sequence: u64) -> Result<JournalReadIter, JournalError>;

    /// The sequence number of the last entry in the journal, `None` if
    /// empty.
    #[must_use]
    fn last_sequence(&self) -> Option<u64>;

    /// Verify the integrity of the entire journal by checking every
    /// entry's CRC32 checksum.
    ///
    /// # Errors
    ///
    /// Returns the first [`JournalError::CorruptEntry`] encountered, or an
    /// I/O error if the file cannot be read.
    fn verify_integrity(&self) -> Result<(), JournalError>;
}

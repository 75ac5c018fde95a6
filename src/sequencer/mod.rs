//! Journal abstraction over the outbound event stream.
//!
//! This is not on the matching hot path: `MatchingEngine::process` never
//! touches a `Journal`. It exists for the external consumers spec.md §6
//! names (persistence/audit, replay, market-data fanout) to durably record
//! the `EventEnvelope` stream a symbol's engine produces.
//!
//! The [`Journal`] trait is always available; [`FileJournal`] additionally
//! requires the `journal` feature (pulls in `crc32fast`).

pub mod error;
pub mod journal;

#[cfg(feature = "journal")]
pub mod file_journal;

pub use error::JournalError;
#[cfg(feature = "journal")]
pub use file_journal::FileJournal;
pub use journal::{ENTRY_CRC_SIZE, ENTRY_HEADER_SIZE, ENTRY_OVERHEAD, Journal, JournalEntry, JournalReadIter};

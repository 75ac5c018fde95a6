//! Memory-mapped, single-file journal implementation.
//!
//! [`FileJournal`] persists [`EventEnvelope`]s to one append-only file on
//! disk, memory-mapped for writing and reading, framed with a CRC32 trailer
//! per entry. The file grows (doubling capacity, zero-padded) as entries are
//! appended rather than rotating across multiple segments — this journal is
//! an external audit/replay sink, off the matching hot path (spec.md §6:
//! "best-effort, off the matching hot path"), so the single-file layout is
//! preferred over segment management for a component this simple.
//!
//! # On-Disk Entry Format (little-endian)
//!
//! ```text
//! [4 bytes: entry_length][8 bytes: sequence_num][8 bytes: timestamp_ns]
//! [N bytes: JSON payload][4 bytes: CRC32]
//! ```
//!
//! `entry_length` is the byte count following itself (sequence + timestamp
//! + payload + CRC). CRC32 covers everything between the length prefix and
//! the trailer, i.e. `sequence_num ‖ timestamp_ns ‖ payload`. A zero
//! `entry_length` marks the boundary between written entries and the file's
//! zero-padded, not-yet-written tail.

use super::error::JournalError;
use super::journal::{ENTRY_CRC_SIZE, Journal, JournalEntry, JournalReadIter};
use crate::engine::EventEnvelope;
use memmap2::{Mmap, MmapMut};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Initial file size; doubled whenever an append would overflow it.
const INITIAL_CAPACITY: usize = 64 * 1024;

fn encode_entry(event: &EventEnvelope) -> Result<Vec<u8>, JournalError> {
    let payload = serde_json::to_vec(event).map_err(|e| JournalError::SerializationError {
        message: e.to_string(),
    })?;
    let mut body = Vec::with_capacity(16 + payload.len());
    body.extend_from_slice(&event.seq.to_le_bytes());
    body.extend_from_slice(&event.ts_ns.to_le_bytes());
    body.extend_from_slice(&payload);

    let crc = crc32fast::hash(&body);
    let entry_length = u32::try_from(body.len() + ENTRY_CRC_SIZE)
        .map_err(|_| JournalError::SerializationError {
            message: "entry exceeds u32::MAX bytes".into(),
        })?;

    let mut out = Vec::with_capacity(4 + body.len() + ENTRY_CRC_SIZE);
    out.extend_from_slice(&entry_length.to_le_bytes());
    out.extend_from_slice(&body);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

/// Decode one entry at `offset`. `Ok(None)` means `offset` has reached the
/// zero-padded tail (or the end of the mapping) — a legitimate stopping
/// point, not corruption. `Err` means a non-zero but malformed or
/// CRC-mismatched entry was found.
fn decode_entry(buf: &[u8], offset: usize) -> Result<Option<(JournalEntry, usize)>, JournalError> {
    if offset + 4 > buf.len() {
        return Ok(None);
    }
    let entry_length = u32::from_le_bytes(buf[offset..offset + 4].try_into().unwrap()) as usize;
    if entry_length == 0 {
        return Ok(None);
    }
    if entry_length < 16 + ENTRY_CRC_SIZE {
        return Err(JournalError::InvalidEntryHeader {
            offset: offset as u64,
            message: "entry shorter than the fixed header + CRC trailer".into(),
        });
    }
    let start = offset + 4;
    let end = start
        .checked_add(entry_length)
        .ok_or(JournalError::InvalidEntryHeader {
            offset: offset as u64,
            message: "entry length overflows".into(),
        })?;
    if end > buf.len() {
        return Err(JournalError::InvalidEntryHeader {
            offset: offset as u64,
            message: "entry extends past end of file".into(),
        });
    }

    let framed = &buf[start..end];
    let crc_at = framed.len() - ENTRY_CRC_SIZE;
    let body = &framed[..crc_at];
    let stored_crc = u32::from_le_bytes(framed[crc_at..].try_into().unwrap());
    let seq = u64::from_le_bytes(body[0..8].try_into().unwrap());
    let ts_ns = u64::from_le_bytes(body[8..16].try_into().unwrap());

    let actual_crc = crc32fast::hash(body);
    if actual_crc != stored_crc {
        return Err(JournalError::CorruptEntry {
            sequence: seq,
            expected_crc: stored_crc,
            actual_crc,
        });
    }

    let payload = &body[16..];
    let mut event: EventEnvelope =
        serde_json::from_slice(payload).map_err(|e| JournalError::DeserializationError {
            sequence: seq,
            message: e.to_string(),
        })?;
    event.seq = seq;
    event.ts_ns = ts_ns;

    Ok(Some((JournalEntry { event, stored_crc }, end)))
}

/// Tolerant scan used at `open()`: advances past every cleanly decodable
/// entry and stops — without raising an error — at the first `Ok(None)`
/// (legitimate end of written data) or `Err` (a torn write left behind by a
/// crash mid-append is not itself a fatal invariant violation; the journal
/// simply resumes after the last good entry, spec.md §7).
fn scan_written_region(data: &[u8]) -> (usize, Option<u64>) {
    let mut offset = 0usize;
    let mut last_seq = None;
    loop {
        match decode_entry(data, offset) {
            Ok(Some((entry, next))) => {
                last_seq = Some(entry.event.seq);
                offset = next;
            }
            _ => break,
        }
    }
    (offset, last_seq)
}

struct Writer {
    file: File,
    mmap: MmapMut,
    write_pos: usize,
    capacity: usize,
}

impl Writer {
    fn grow_to_fit(&mut self, needed: usize, path: &Path) -> Result<(), JournalError> {
        if needed <= self.capacity {
            return Ok(());
        }
        let mut new_capacity = self.capacity.max(INITIAL_CAPACITY);
        while new_capacity < needed {
            new_capacity = new_capacity.saturating_mul(2);
        }
        self.mmap.flush().map_err(|e| JournalError::Io {
            message: e.to_string(),
            path: Some(path.to_path_buf()),
        })?;
        self.file
            .set_len(new_capacity as u64)
            .map_err(|e| JournalError::Io {
                message: e.to_string(),
                path: Some(path.to_path_buf()),
            })?;
        // SAFETY: this process exclusively owns the file; no other process
        // or thread truncates or writes to it while the mapping is live.
        self.mmap = unsafe {
            MmapMut::map_mut(&self.file).map_err(|e| JournalError::Io {
                message: e.to_string(),
                path: Some(path.to_path_buf()),
            })?
        };
        self.capacity = new_capacity;
        Ok(())
    }
}

/// A single-file, memory-mapped, append-only [`Journal`] with CRC32-checked
/// framing.
///
/// Opens (or creates) one file and scans it on open to recover the last
/// written sequence number, tolerating a truncated trailing entry left by
/// a crash mid-write.
pub struct FileJournal {
    path: PathBuf,
    writer: Mutex<Writer>,
    last_seq: Mutex<Option<u64>>,
}

impl FileJournal {
    /// Open or create a journal file at `path`, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`JournalError`] if the parent directory cannot be created,
    /// the file cannot be opened, or it cannot be memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, JournalError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| JournalError::Io {
                    message: e.to_string(),
                    path: Some(parent.to_path_buf()),
                })?;
            }
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)
            .map_err(|e| JournalError::Io {
                message: e.to_string(),
                path: Some(path.clone()),
            })?;

        let len = file
            .metadata()
            .map_err(|e| JournalError::Io {
                message: e.to_string(),
                path: Some(path.clone()),
            })?
            .len() as usize;
        let capacity = if len == 0 { INITIAL_CAPACITY } else { len };
        if len == 0 {
            file.set_len(capacity as u64).map_err(|e| JournalError::Io {
                message: e.to_string(),
                path: Some(path.clone()),
            })?;
        }

        // SAFETY: this process exclusively owns the file; no other process
        // or thread truncates or writes to it while the mapping is live.
        let mmap = unsafe {
            MmapMut::map_mut(&file).map_err(|e| JournalError::Io {
                message: e.to_string(),
                path: Some(path.clone()),
            })?
        };

        let (write_pos, last_seq) = scan_written_region(&mmap);

        Ok(Self {
            path,
            writer: Mutex::new(Writer {
                file,
                mmap,
                write_pos,
                capacity,
            }),
            last_seq: Mutex::new(last_seq),
        })
    }

    /// Read-only mapping of the whole file, for `read_from`/`verify_integrity`.
    fn map_readonly(&self) -> Result<Mmap, JournalError> {
        let file = File::open(&self.path).map_err(|e| JournalError::Io {
            message: e.to_string(),
            path: Some(self.path.clone()),
        })?;
        // SAFETY: read-only mapping; the single writer only appends past the
        // current write position, never mutating already-written bytes.
        unsafe {
            Mmap::map(&file).map_err(|e| JournalError::Io {
                message: e.to_string(),
                path: Some(self.path.clone()),
            })
        }
    }
}

impl Journal for FileJournal {
    fn append(&self, event: &EventEnvelope) -> Result<(), JournalError> {
        let bytes = encode_entry(event)?;
        let mut writer = self.writer.lock().map_err(|_| JournalError::MutexPoisoned)?;

        let end = writer.write_pos + bytes.len();
        writer.grow_to_fit(end, &self.path)?;

        writer.mmap[writer.write_pos..end].copy_from_slice(&bytes);
        writer
            .mmap
            .flush_range(writer.write_pos, bytes.len())
            .map_err(|e| JournalError::Io {
                message: e.to_string(),
                path: Some(self.path.clone()),
            })?;
        writer.write_pos = end;
        drop(writer);

        let mut last_seq = self.last_seq.lock().map_err(|_| JournalError::MutexPoisoned)?;
        *last_seq = Some(event.seq);
        Ok(())
    }

    fn read_from(&self, sequence: u64) -> Result<JournalReadIter, JournalError> {
        let mmap = self.map_readonly()?;
        let mut entries = Vec::new();
        let mut offset = 0usize;
        loop {
            match decode_entry(&mmap, offset)? {
                None => break,
                Some((entry, next)) => {
                    if entry.event.seq >= sequence {
                        entries.push(Ok(entry));
                    }
                    offset = next;
                }
            }
        }
        Ok(Box::new(entries.into_iter()))
    }

    fn last_sequence(&self) -> Option<u64> {
        *self.last_seq.lock().expect("journal mutex poisoned")
    }

    fn verify_integrity(&self) -> Result<(), JournalError> {
        let mmap = self.map_readonly()?;
        let mut offset = 0usize;
        loop {
            match decode_entry(&mmap, offset)? {
                None => break,
                Some((_entry, next)) => offset = next,
            }
        }
        Ok(())
    }
}

//! # Logfile - on-disk formats and file primitives
//!
//! The byte-level layer of the Firkin storage engine: entry and hint-record
//! codecs plus the two file types they live in. Nothing in this crate knows
//! about the key directory or locking; it deals in files, offsets, and bytes.
//!
//! ## Entry Format
//!
//! Every mutation is one entry appended to a log file:
//!
//! ```text
//! [mark: u8][key_len: u32 BE][val_len: u32 BE][key bytes][value bytes]
//! ```
//!
//! `mark` is `0` for a normal put and `1` for a tombstone; tombstones carry
//! `val_len = 0` and no value bytes. All integers are big-endian.
//!
//! ## Hint Record Format
//!
//! Hint files are sidecars written next to a rewritten log file so that a
//! restart can rebuild the index without touching values:
//!
//! ```text
//! [fid: u32 BE][offset: u32 BE][key_len: u32 BE][key bytes]
//! ```
//!
//! Records appear in strictly increasing `offset` order and never describe
//! tombstones.
//!
//! ## File Types
//!
//! * [`LogFile`] - one append-only data file, read with positional I/O.
//!   New files are pre-truncated to their maximum size, so replay detects the
//!   end of valid data by the first normal entry with a zero-length key (the
//!   sparse tail reads back as zeroes).
//! * [`HintFile`] - the compact index sidecar, created exclusively by a
//!   rewrite and replayed sequentially on open.

mod entry;
mod hint;
mod log;

pub use entry::{Entry, HintRecord, Mark, ENTRY_HEADER_SIZE, HINT_HEADER_SIZE};
pub use hint::HintFile;
pub use log::LogFile;

use std::io;

use thiserror::Error;

/// Location of an entry: file id plus byte offset within that file.
///
/// Stored by value in the key directory: two words, no allocation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogOffset {
    pub fid: u32,
    pub offset: u32,
}

/// Errors from the file layer.
#[derive(Debug, Error)]
pub enum Error {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// An entry failed to decode.
    #[error("corrupt entry: {0}")]
    CorruptEntry(String),

    /// A hint record failed to decode or records were out of order.
    #[error("corrupt hint: {0}")]
    CorruptHint(String),

    /// A positional read ran past the end of the file. This is the normal
    /// terminator during iteration, not a failure.
    #[error("end of log")]
    Eof,
}

pub type Result<T> = std::result::Result<T, Error>;

use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Errors surfaced by the database API.
#[derive(Debug, Error)]
pub enum Error {
    /// `Options::log_file_size` lies outside the permitted range.
    #[error("invalid log_file_size, must be between 1 MiB and 2 GiB")]
    InvalidLogFileSize,

    /// The database has been closed.
    #[error("database already closed")]
    DatabaseClosed,

    /// Keys must be at least one byte long.
    #[error("key cannot be empty")]
    EmptyKey,

    #[error("key not found")]
    KeyNotFound,

    /// The key directory names a file id the file set no longer holds.
    /// Indicates an internal bug.
    #[error("log file {0} not found")]
    FileNotFound(u32),

    /// The file set has no tail to append to. Indicates an internal bug.
    #[error("no active log file")]
    NoActiveFile,

    /// Two directory entries parsed to the same file id.
    #[error("found log file {0} twice")]
    DuplicateFileId(u32),

    /// A `.log` file whose name does not parse as a file id.
    #[error("invalid log file name: {0}")]
    InvalidFileName(String),

    /// A merge is already in progress.
    #[error("gc is working")]
    GcWorking,

    /// A lock was poisoned by a panicking thread.
    #[error("lock poisoned")]
    LockPoisoned,

    /// A failure in the file layer (corrupt entry/hint or raw I/O there).
    #[error(transparent)]
    Log(#[from] logfile::Error),

    /// An OS-level failure, with a description of the operation that hit it.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Error::LockPoisoned
    }
}

/// Attaches an operation description to raw I/O results.
pub(crate) trait IoContext<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;
    fn with_context(self, f: impl FnOnce() -> String) -> Result<T>;
}

impl<T> IoContext<T> for std::result::Result<T, io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| Error::Io {
            context: context.into(),
            source,
        })
    }

    fn with_context(self, f: impl FnOnce() -> String) -> Result<T> {
        self.map_err(|source| Error::Io {
            context: f(),
            source,
        })
    }
}

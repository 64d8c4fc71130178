//! # Engine - the Firkin storage engine
//!
//! A Bitcask-style embedded key/value store: every write appends to a log
//! file, an in-memory key directory maps each key to the file and offset of
//! its live entry, and a background-free merge rewrites sealed files to
//! reclaim superseded data while the store keeps serving traffic.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌──────────────────────────────────────────────────┐
//! │                       DB                         │
//! │                                                  │
//! │ write.rs → append entry → point KeyDir at it     │
//! │              |                                   │
//! │              |  (offset past log_file_size?)     │
//! │              v            yes                    │
//! │           seal active file, create successor     │
//! │                                                  │
//! │ read.rs  → KeyDir lookup → pread at (fid,offset) │
//! │                                                  │
//! │ compaction.rs → rewrite sealed files in place,   │
//! │                 emit hint sidecars               │
//! │                                                  │
//! │ recovery.rs → replay logs (or hints) on open     │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Directory Layout
//!
//! ```text
//! <dir>/LOCK           advisory pid file; the directory itself is flocked
//! <dir>/000000.log     sealed log file
//! <dir>/000000.index   its hint sidecar (written by merge)
//! <dir>/000001.log     active log file (highest fid, pre-truncated, sparse)
//! ```
//!
//! ## Locking
//!
//! | Lock | Held by |
//! |---|---|
//! | RW-lock over (files, key dir) | read: `get`, merge liveness checks; write: `put`, `delete`, merge commit, `close` |
//! | merge mutex (`try_lock`) | one merge at a time; overlap returns [`Error::GcWorking`] |
//! | directory flock | the whole `Db` lifetime, process-exclusive |
//!
//! Writes become durable only at sync boundaries: sealing a file, a completed
//! merge, or close. A crash may lose the unsynced tail of the active file;
//! replay stops cleanly at the first zeroed header, so a torn tail never
//! corrupts the index.
//!
//! ## Example
//!
//! ```rust,no_run
//! use engine::{Db, Options};
//!
//! let db = Db::open(Options::new("./data")).unwrap();
//! db.put(b"name", b"lion").unwrap();
//! assert_eq!(db.get(b"name").unwrap(), b"lion");
//! db.delete(b"name").unwrap();
//! db.merge().unwrap();
//! db.close().unwrap();
//! ```

mod compaction;
mod error;
mod fileset;
mod flock;
mod keydir;
mod options;
mod read;
mod recovery;
mod sync;
mod write;

pub use error::{Error, Result};
pub use logfile::LogOffset;
pub use options::{Options, MAX_LOG_FILE_SIZE, MIN_LOG_FILE_SIZE};

use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use tracing::{info, warn};

use crate::error::IoContext;
use crate::fileset::FileSet;
use crate::flock::DirLockGuard;
use crate::keydir::KeyDir;
use crate::sync::sync_dir;

/// Name of the advisory pid file inside the database directory.
const LOCK_FILE: &str = "LOCK";

/// An open database. Share it across threads behind an `Arc`; every method
/// takes `&self`.
#[derive(Debug)]
pub struct Db {
    opts: Options,
    inner: RwLock<Inner>,
    /// Serializes merges. Try-locked so an overlapping merge fails fast
    /// instead of queueing.
    gc_lock: Mutex<()>,
    closed: AtomicBool,
}

#[derive(Debug)]
struct Inner {
    files: FileSet,
    key_dir: KeyDir,
    dir_lock: Option<DirLockGuard>,
}

impl Db {
    /// Opens the database in `opts.dir`, creating the directory if missing.
    ///
    /// Acquires the exclusive directory lock, then rebuilds the key
    /// directory by replaying log files (preferring hint sidecars for
    /// sealed files).
    pub fn open(opts: Options) -> Result<Db> {
        if let Err(e) = std::fs::metadata(&opts.dir) {
            if e.kind() != io::ErrorKind::NotFound {
                return Err(e).with_context(|| format!("invalid dir {}", opts.dir.display()));
            }
            create_db_dir(&opts.dir)
                .with_context(|| format!("unable to create dir {}", opts.dir.display()))?;
        }

        let dir_lock = DirLockGuard::acquire(&opts.dir, LOCK_FILE)
            .with_context(|| format!("while locking directory {}", opts.dir.display()))?;

        if !(MIN_LOG_FILE_SIZE..=MAX_LOG_FILE_SIZE).contains(&opts.log_file_size) {
            return Err(Error::InvalidLogFileSize);
        }

        info!(dir = %opts.dir.display(), "database opening");

        let files = FileSet::open_or_create(&opts.dir, opts.log_file_size)?;
        let mut key_dir = KeyDir::new();
        recovery::replay(&files, &mut key_dir)?;

        info!(keys = key_dir.len(), files = files.len(), "database opened");
        Ok(Db {
            opts,
            inner: RwLock::new(Inner {
                files,
                key_dir,
                dir_lock: Some(dir_lock),
            }),
            gc_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        })
    }

    /// Closes the database: syncs and drops every file, releases the
    /// directory lock, and syncs the directory so pending unlinks and
    /// renames survive. Idempotent; calls after the first return `Ok`.
    ///
    /// Teardown continues past individual failures; the first error observed
    /// is returned.
    pub fn close(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            warn!("database already closed");
            return Ok(());
        }
        info!("database closing");

        let mut first: Option<Error> = None;
        {
            let mut inner = self.inner.write()?;
            if let Err(e) = inner.files.close_all() {
                first.get_or_insert(e);
            }
            if let Some(guard) = inner.dir_lock.take() {
                if let Err(e) = guard.release() {
                    first.get_or_insert(Error::Io {
                        context: "while releasing directory lock".into(),
                        source: e,
                    });
                }
            }
            if let Err(e) = sync_dir(&self.opts.dir) {
                first.get_or_insert(e);
            }
            inner.key_dir.clear();
        }

        let _ = self
            .closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst);
        info!("database closed");
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::DatabaseClosed);
        }
        Ok(())
    }
}

/// Best-effort close on drop. Errors are discarded here; everything reachable
/// here is also recoverable from the logs on the next open.
impl Drop for Db {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn create_db_dir(dir: &Path) -> io::Result<()> {
    let mut builder = std::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir)
}

#[cfg(test)]
mod tests;

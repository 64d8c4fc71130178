//! Merge: online garbage collection of sealed log files.
//!
//! Each sealed file is rewritten out-of-place into a `.tmp` sibling holding
//! only the entries the key directory still references; tombstones and
//! superseded versions are dropped. A hint sidecar is produced alongside.
//! The rewrite runs while the database keeps serving traffic:
//!
//! * each liveness check takes the read lock, so puts and gets proceed
//!   between entries;
//! * the commit (delete old file, rename temp in, reopen, repoint the index)
//!   takes the write lock, so readers see either the old file or the new
//!   one, never a torn state.
//!
//! A put landing between a liveness check and the commit moves the key to
//! the active file; the fid guard in the index update then declines the
//! stale relocation, so no update is lost. A crash before the commit leaves
//! the original file intact and only `.tmp` garbage behind, which the next
//! open sweeps away.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, TryLockError};

use logfile::{Entry, HintFile, HintRecord, LogFile, LogOffset};
use tracing::{debug, info};

use crate::error::{Error, IoContext, Result};
use crate::fileset::hint_file_path;
use crate::sync::sync_dir;
use crate::Db;

fn temp_path(path: &Path) -> PathBuf {
    let mut os = path.as_os_str().to_os_string();
    os.push(".tmp");
    PathBuf::from(os)
}

impl Db {
    /// Garbage-collects every sealed log file.
    ///
    /// Returns [`Error::GcWorking`] if another merge is already running.
    /// An error aborts the merge, but files rewritten before the failure
    /// stay committed, since each file's rewrite is independently atomic.
    pub fn merge(&self) -> Result<()> {
        self.check_open()?;
        let _guard = match self.gc_lock.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(Error::GcWorking),
            Err(TryLockError::Poisoned(_)) => return Err(Error::LockPoisoned),
        };

        let sealed: Vec<Arc<LogFile>> = {
            let inner = self.inner.read()?;
            if inner.files.len() < 2 {
                return Ok(());
            }
            inner.files.sealed().to_vec()
        };

        info!(files = sealed.len(), "merge started");
        for lf in &sealed {
            self.run_gc(lf)?;
        }
        info!("merge finished");
        Ok(())
    }

    /// Rewrites one sealed file, cleaning up its temp files on failure.
    fn run_gc(&self, lf: &Arc<LogFile>) -> Result<()> {
        let result = self.rewrite_file(lf);
        if result.is_err() {
            let _ = std::fs::remove_file(temp_path(lf.path()));
            let _ = std::fs::remove_file(temp_path(&hint_file_path(&self.opts.dir, lf.fid())));
        }
        result
    }

    fn rewrite_file(&self, lf: &Arc<LogFile>) -> Result<()> {
        let fid = lf.fid();
        let dir = self.opts.dir.as_path();

        let tmp_log_path = temp_path(lf.path());
        let tmp_log = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_log_path)
            .with_context(|| format!("while creating {}", tmp_log_path.display()))?;

        let hint_path = hint_file_path(dir, fid);
        let tmp_hint_path = temp_path(&hint_path);
        let mut hint = HintFile::create(&tmp_hint_path, fid)?;

        sync_dir(dir)?;

        let mut offset: u32 = 0;
        let mut rewrite_offset: u32 = 0;
        let mut rewrites: HashMap<Vec<u8>, LogOffset> = HashMap::new();

        loop {
            let entry = match lf.read(offset) {
                Ok(e) => e,
                Err(logfile::Error::Eof) => break,
                Err(e) => return Err(e.into()),
            };
            if entry.is_tombstone() {
                offset += entry.size();
                continue;
            }
            if self.copy_if_live(&entry, fid, offset, &tmp_log, rewrite_offset)? {
                hint.write(&HintRecord::new(fid, rewrite_offset, entry.key()))?;
                // The index still points at the old file; remember the new
                // location for the one-shot update after the swap.
                rewrites.insert(
                    entry.key().to_vec(),
                    LogOffset {
                        fid,
                        offset: rewrite_offset,
                    },
                );
                rewrite_offset += entry.size();
            }
            offset += entry.size();
        }

        tmp_log
            .set_len(rewrite_offset as u64)
            .with_context(|| format!("while truncating {}", tmp_log_path.display()))?;
        tmp_log
            .sync_all()
            .with_context(|| format!("while syncing {}", tmp_log_path.display()))?;
        drop(tmp_log);
        hint.finish()?;

        // Commit under the write lock: nothing can read or append while the
        // old file gives way to its rewrite. The fid keeps its identity
        // through the rename.
        let mut inner = self.inner.write()?;
        lf.remove()?;
        std::fs::rename(&tmp_log_path, lf.path())
            .with_context(|| format!("while renaming {}", tmp_log_path.display()))?;
        let reopened = LogFile::open_rw(lf.path(), fid)?;
        inner.files.replace(fid, Arc::new(reopened))?;
        inner.key_dir.update_from_merge(rewrites);
        std::fs::rename(&tmp_hint_path, &hint_path)
            .with_context(|| format!("while renaming {}", tmp_hint_path.display()))?;

        debug!(fid, live_bytes = rewrite_offset, "log file rewritten");
        Ok(())
    }

    /// Copies `entry` into the rewrite iff the key directory still names this
    /// exact `(fid, offset)` as the live version.
    ///
    /// Runs under the read lock: a concurrent put serializes either before
    /// the check (the entry is superseded and dropped here) or after it (the
    /// fid guard in the final index update declines the stale relocation).
    fn copy_if_live(
        &self,
        entry: &Entry,
        fid: u32,
        offset: u32,
        tmp_log: &File,
        rewrite_offset: u32,
    ) -> Result<bool> {
        let inner = self.inner.read()?;
        match inner.key_dir.get(entry.key()) {
            Some(lo) if lo.fid == fid && lo.offset == offset => {
                tmp_log
                    .write_all_at(&entry.encode(), rewrite_offset as u64)
                    .context("while writing entry to temp log file")?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

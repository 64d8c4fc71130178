use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use logfile::{Entry, LogFile, LogOffset};
use tracing::{debug, info};

use crate::error::{Error, IoContext, Result};
use crate::sync::sync_dir;

const LOG_EXT: &str = "log";
const TEMP_EXT: &str = "tmp";

pub(crate) fn log_file_path(dir: &Path, fid: u32) -> PathBuf {
    dir.join(format!("{fid:06}.log"))
}

pub(crate) fn hint_file_path(dir: &Path, fid: u32) -> PathBuf {
    dir.join(format!("{fid:06}.index"))
}

/// The ordered collection of log files backing one database.
///
/// The highest fid is the active file and the only one that accepts appends;
/// everything before it is sealed. `max_ptr` packs `(max fid << 32 | writable
/// offset)` into one atomic word so concurrent readers always observe a
/// consistent pair. Mutation of the file list itself happens only under the
/// database write lock.
#[derive(Debug)]
pub(crate) struct FileSet {
    dir: PathBuf,
    log_file_size: u64,
    files: Vec<Arc<LogFile>>,
    max_ptr: AtomicU64,
}

impl FileSet {
    /// Scans `dir` for log files, opening them all, or creates fid 0 in an
    /// empty directory.
    pub fn open_or_create(dir: &Path, log_file_size: u64) -> Result<FileSet> {
        let mut set = FileSet {
            dir: dir.to_path_buf(),
            log_file_size,
            files: Vec::new(),
            max_ptr: AtomicU64::new(0),
        };
        set.open_or_create_files()?;
        Ok(set)
    }

    fn open_or_create_files(&mut self) -> Result<()> {
        let entries = std::fs::read_dir(&self.dir)
            .with_context(|| format!("while reading directory {}", self.dir.display()))?;

        let mut fids: Vec<u32> = Vec::new();
        let mut seen: HashSet<u32> = HashSet::new();
        for entry in entries {
            let entry = entry.context("while scanning directory")?;
            let path = entry.path();
            let ext = path.extension().and_then(|e| e.to_str());
            if ext == Some(TEMP_EXT) {
                // Leftover from an interrupted rewrite; safe to discard.
                debug!(path = %path.display(), "removing stale temp file");
                let _ = std::fs::remove_file(&path);
                continue;
            }
            if ext != Some(LOG_EXT) {
                continue;
            }
            let fid: u32 = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| Error::InvalidFileName(path.display().to_string()))?;
            if !seen.insert(fid) {
                return Err(Error::DuplicateFileId(fid));
            }
            fids.push(fid);
        }

        fids.sort_unstable();
        let max_fid = match fids.last() {
            Some(&fid) => fid,
            None => return self.create_log_file(0),
        };
        self.max_ptr.store((max_fid as u64) << 32, Ordering::SeqCst);

        // Open newest first. Older files of size zero are rewrite leftovers
        // whose every entry was dead; drop them with their hint sidecars.
        // The active file is kept even when empty.
        for &fid in fids.iter().rev() {
            let path = log_file_path(&self.dir, fid);
            let lf = LogFile::open_rw(&path, fid)?;
            if lf.size() == 0 && fid != max_fid {
                info!(path = %path.display(), "deleting empty log file");
                lf.remove()?;
                let hint = hint_file_path(&self.dir, fid);
                if let Err(e) = std::fs::remove_file(&hint) {
                    if e.kind() != io::ErrorKind::NotFound {
                        return Err(e).with_context(|| {
                            format!("while removing hint file {}", hint.display())
                        });
                    }
                }
                continue;
            }
            self.files.push(Arc::new(lf));
        }
        self.files.sort_by_key(|lf| lf.fid());
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<LogFile>> {
        self.files.iter()
    }

    /// Every file except the active tail.
    pub fn sealed(&self) -> &[Arc<LogFile>] {
        match self.files.len() {
            0 => &[],
            n => &self.files[..n - 1],
        }
    }

    pub fn max_fid(&self) -> u32 {
        (self.max_ptr.load(Ordering::SeqCst) >> 32) as u32
    }

    pub fn writable_offset(&self) -> u32 {
        self.max_ptr.load(Ordering::SeqCst) as u32
    }

    /// ORs the replayed tail offset into `max_ptr` once recovery has located
    /// the end of valid data in the active file.
    pub fn publish_tail_offset(&self, offset: u32) {
        self.max_ptr.fetch_or(offset as u64, Ordering::SeqCst);
    }

    /// Appends `e` to the active file, returning the location it landed at.
    ///
    /// The returned offset is the one *before* the bump of `max_ptr`, i.e. it
    /// addresses this entry's header. Once the writable offset passes the
    /// configured size the active file is sealed and a successor created.
    /// Caller must hold the database write lock.
    pub fn write(&mut self, e: &Entry) -> Result<LogOffset> {
        let active = match self.files.last() {
            Some(lf) => Arc::clone(lf),
            None => return Err(Error::NoActiveFile),
        };

        let offset = self.writable_offset();
        active.append(e, offset)?;
        let lo = LogOffset {
            fid: active.fid(),
            offset,
        };
        self.max_ptr.fetch_add(e.size() as u64, Ordering::SeqCst);

        if self.writable_offset() as u64 > self.log_file_size {
            let end = self.writable_offset();
            active.seal(end)?;
            debug!(fid = active.fid(), size = end, "sealed active log file");
            self.create_log_file(self.max_fid() + 1)?;
        }
        Ok(lo)
    }

    /// Exclusively creates the log file for `fid`, pre-truncated to the
    /// configured size, syncs the directory, and makes it the active tail.
    pub fn create_log_file(&mut self, fid: u32) -> Result<()> {
        self.max_ptr.store((fid as u64) << 32, Ordering::SeqCst);

        let path = log_file_path(&self.dir, fid);
        let lf = LogFile::create(&path, fid, self.log_file_size)?;
        sync_dir(&self.dir)?;
        debug!(fid, path = %path.display(), "created log file");

        self.files.push(Arc::new(lf));
        Ok(())
    }

    /// Locates the file holding `fid`. Newest-first scan: a merge swaps
    /// handles in place, so the live handle for a recently rewritten fid is
    /// found without walking history.
    pub fn get(&self, fid: u32) -> Result<Arc<LogFile>> {
        for lf in self.files.iter().rev() {
            if lf.fid() == fid {
                return Ok(Arc::clone(lf));
            }
        }
        Err(Error::FileNotFound(fid))
    }

    /// Reads the entry at `lo`.
    pub fn read(&self, lo: LogOffset) -> Result<Entry> {
        let lf = self.get(lo.fid)?;
        Ok(lf.read(lo.offset)?)
    }

    /// Swaps the slot for `fid` with a freshly opened handle. Merge commit
    /// path; caller must hold the database write lock.
    pub fn replace(&mut self, fid: u32, lf: Arc<LogFile>) -> Result<()> {
        for slot in self.files.iter_mut().rev() {
            if slot.fid() == fid {
                *slot = lf;
                return Ok(());
            }
        }
        Err(Error::FileNotFound(fid))
    }

    /// Syncs every file and drops the handles. Continues past individual
    /// failures and reports the first one.
    pub fn close_all(&mut self) -> Result<()> {
        let mut first: Option<Error> = None;
        for lf in &self.files {
            if let Err(e) = lf.sync_data() {
                if first.is_none() {
                    first = Some(e.into());
                }
            }
        }
        self.files.clear();
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

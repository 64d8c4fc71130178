//! Cold-start replay: rebuilding the key directory from disk.
//!
//! Files are replayed in fid order so later versions of a key overwrite
//! earlier ones. Sealed files prefer their hint sidecar when one exists:
//! hints carry only `(fid, offset, key)` and skip every value byte, which is
//! what makes reopening a large merged database cheap. The active file never
//! has a hint and is always scanned directly, because its scan also locates
//! the end of valid data.

use std::path::Path;

use logfile::{HintFile, LogFile};
use tracing::debug;

use crate::error::Result;
use crate::fileset::{hint_file_path, FileSet};
use crate::keydir::KeyDir;

/// Replays every log file into `key_dir` and publishes the active file's
/// logical end into the file set's writable offset.
pub(crate) fn replay(files: &FileSet, key_dir: &mut KeyDir) -> Result<()> {
    let max_fid = files.max_fid();
    let mut tail_offset = 0;
    for lf in files.iter() {
        let end = replay_file(files.dir(), lf, max_fid, key_dir)?;
        if lf.fid() == max_fid {
            tail_offset = end;
        }
    }
    files.publish_tail_offset(tail_offset);
    Ok(())
}

fn replay_file(dir: &Path, lf: &LogFile, max_fid: u32, key_dir: &mut KeyDir) -> Result<u32> {
    if lf.fid() != max_fid {
        let hint_path = hint_file_path(dir, lf.fid());
        if hint_path.metadata().is_ok() {
            debug!(fid = lf.fid(), "replaying from hint file");
            let hf = HintFile::open_read_only(&hint_path, lf.fid())?;
            // Hints never describe tombstones, so every record is an insert.
            return Ok(hf.iterate(|key, lo| key_dir.put(key.to_vec(), lo))?);
        }
    }

    debug!(fid = lf.fid(), "replaying from log file");
    let end = lf.iterate(|key, lo| match lo {
        Some(lo) => key_dir.put(key.to_vec(), lo),
        None => key_dir.remove(key),
    })?;
    Ok(end)
}

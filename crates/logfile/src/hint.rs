use std::fs::{File, OpenOptions};
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::entry::{HintRecord, HINT_HEADER_SIZE};
use crate::{Error, LogOffset, Result};

/// Index sidecar for a sealed log file.
///
/// Written exclusively by a rewrite (the sidecar is always born fresh, never
/// appended to across runs) and read back sequentially on open. Hint files
/// never contain tombstones; a rewrite only emits live entries.
#[derive(Debug)]
pub struct HintFile {
    fid: u32,
    path: PathBuf,
    file: File,
    size: u32,
}

impl HintFile {
    /// Exclusively creates a hint file for writing. A collision means a
    /// previous rewrite's temp file was left behind.
    pub fn create(path: impl AsRef<Path>, fid: u32) -> Result<HintFile> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;
        Ok(HintFile {
            fid,
            path,
            file,
            size: 0,
        })
    }

    /// Opens an existing hint file for replay.
    pub fn open_read_only(path: impl AsRef<Path>, fid: u32) -> Result<HintFile> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;
        let size = file.metadata()?.len() as u32;
        Ok(HintFile {
            fid,
            path,
            file,
            size,
        })
    }

    pub fn fid(&self) -> u32 {
        self.fid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bytes written so far (write path) or on-disk size (read path).
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Appends one record.
    pub fn write(&mut self, rec: &HintRecord) -> Result<()> {
        self.file.write_all_at(&rec.encode(), self.size as u64)?;
        self.size += rec.size();
        Ok(())
    }

    /// Reads every record, invoking `apply(key, location)` for each.
    ///
    /// Offsets must be strictly increasing from the second record onward;
    /// the first record legitimately sits at offset 0. Returns the offset
    /// carried by the last record.
    pub fn iterate<F>(&self, mut apply: F) -> Result<u32>
    where
        F: FnMut(&[u8], LogOffset),
    {
        let mut pos = 0u64;
        let mut last: Option<u32> = None;
        loop {
            let mut header = [0u8; HINT_HEADER_SIZE];
            match self.file.read_exact_at(&mut header, pos) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(Error::Io(e)),
            }
            let rec = HintRecord::decode(&header)?;

            let mut key = vec![0u8; rec.klen() as usize];
            match self.file.read_exact_at(&mut key, pos + HINT_HEADER_SIZE as u64) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(Error::Io(e)),
            }

            if let Some(prev) = last {
                if rec.offset() <= prev {
                    return Err(Error::CorruptHint(format!(
                        "offset {} not greater than previous {}",
                        rec.offset(),
                        prev
                    )));
                }
            }
            apply(
                &key,
                LogOffset {
                    fid: rec.fid(),
                    offset: rec.offset(),
                },
            );
            last = Some(rec.offset());
            pos += HINT_HEADER_SIZE as u64 + rec.klen() as u64;
        }
        Ok(last.unwrap_or(0))
    }

    /// Truncates to the bytes written, fsyncs, and closes. Write path only.
    pub fn finish(self) -> Result<()> {
        self.file.set_len(self.size as u64)?;
        self.file.sync_all()?;
        Ok(())
    }
}

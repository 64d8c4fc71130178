use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use crate::entry::{Entry, ENTRY_HEADER_SIZE};
use crate::{Error, LogOffset, Result};

/// One append-only data file.
///
/// All I/O is positional (`pread`/`pwrite`); the fd's seek cursor is never
/// used, so a shared handle can serve concurrent readers. Appends are not
/// synced here; durability comes from [`seal`](LogFile::seal), from the
/// database close path, or from a completed rewrite.
#[derive(Debug)]
pub struct LogFile {
    fid: u32,
    path: PathBuf,
    file: File,
    size: u32,
}

/// Positional reads report a short read as `UnexpectedEof`; iteration treats
/// that as the end of the file.
fn read_err(e: io::Error) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Eof
    } else {
        Error::Io(e)
    }
}

impl LogFile {
    /// Opens an existing file read-write and records its on-disk size.
    pub fn open_rw(path: impl AsRef<Path>, fid: u32) -> Result<LogFile> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let size = file.metadata()?.len() as u32;
        Ok(LogFile {
            fid,
            path,
            file,
            size,
        })
    }

    /// Exclusively creates a new file and pre-truncates it to `len` bytes.
    ///
    /// The pre-truncation produces a sparse region past the data; replay
    /// relies on it reading back as zeroes. A name collision is a bug in fid
    /// assignment and surfaces as `AlreadyExists`.
    pub fn create(path: impl AsRef<Path>, fid: u32, len: u64) -> Result<LogFile> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&path)?;
        file.set_len(len)?;
        Ok(LogFile {
            fid,
            path,
            file,
            size: len as u32,
        })
    }

    pub fn fid(&self) -> u32 {
        self.fid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// On-disk size at open time. The logical end of data in the active file
    /// is tracked by the file set, not by this value.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Appends `e` at `offset`. Not synced.
    pub fn append(&self, e: &Entry, offset: u32) -> Result<()> {
        self.file.write_all_at(&e.encode(), offset as u64)?;
        Ok(())
    }

    /// Reads the entry at `offset`.
    ///
    /// Returns [`Error::Eof`] when the header (or payload) lies past the end
    /// of the file; iteration uses that as its terminator.
    pub fn read(&self, offset: u32) -> Result<Entry> {
        let mut header = [0u8; ENTRY_HEADER_SIZE];
        self.file
            .read_exact_at(&mut header, offset as u64)
            .map_err(read_err)?;
        let mut e = Entry::decode(&header)?;

        let payload_len = e.klen() + e.vlen();
        if payload_len > 0 {
            let mut payload = vec![0u8; payload_len as usize];
            self.file
                .read_exact_at(&mut payload, offset as u64 + ENTRY_HEADER_SIZE as u64)
                .map_err(read_err)?;
            e.set_payload(payload);
        }
        Ok(e)
    }

    /// Replays every entry from offset 0.
    ///
    /// Tombstones invoke `apply(key, None)`; live entries invoke
    /// `apply(key, Some(location))`. A normal entry with a zero-length key
    /// marks the sparse tail of a pre-truncated file and stops the scan;
    /// the public API rejects empty keys, so no real entry looks like that.
    /// Returns the logical end of data.
    pub fn iterate<F>(&self, mut apply: F) -> Result<u32>
    where
        F: FnMut(&[u8], Option<LogOffset>),
    {
        let mut offset = 0u32;
        loop {
            let e = match self.read(offset) {
                Ok(e) => e,
                Err(Error::Eof) => break,
                Err(e) => return Err(e),
            };
            if e.is_tombstone() {
                apply(e.key(), None);
                offset += e.size();
                continue;
            }
            if e.klen() == 0 {
                break;
            }
            apply(
                e.key(),
                Some(LogOffset {
                    fid: self.fid,
                    offset,
                }),
            );
            offset += e.size();
        }
        Ok(offset)
    }

    /// Truncates to the logical end of data and fsyncs. Called when the file
    /// stops being the active one.
    pub fn seal(&self, offset: u32) -> Result<()> {
        self.file.set_len(offset as u64)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// `fdatasync`. Used on the close path where metadata staleness is fine.
    pub fn sync_data(&self) -> Result<()> {
        self.file.sync_data()?;
        Ok(())
    }

    /// Truncates to zero and unlinks.
    ///
    /// The truncate invalidates the contents immediately even if the unlink
    /// is delayed by the filesystem; the fd itself closes when the last
    /// handle drops.
    pub fn remove(&self) -> Result<()> {
        self.file.set_len(0)?;
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Advisory, process-exclusive lock on a database directory.
///
/// The lock is a `flock` on the directory fd itself and lives as long as the
/// guard; the pid file written next to the data is informational only. The
/// OS drops the flock when the fd closes, so an exiting or crashing process
/// never leaves the directory wedged.
#[derive(Debug)]
pub struct DirLockGuard {
    _dir: File,
    pid_path: PathBuf,
}

impl DirLockGuard {
    /// Locks `dir` and writes the current pid to `dir/<pid_file>`.
    ///
    /// Fails if another process holds the lock. A pre-existing pid file is
    /// happily overwritten; the flock, not the file, is the mechanism.
    pub fn acquire(dir: &Path, pid_file: &str) -> io::Result<DirLockGuard> {
        let handle = File::open(dir)?;
        Self::try_lock(&handle)?;

        let pid_path = dir.join(pid_file);
        std::fs::write(&pid_path, format!("{}\n", std::process::id()))?;

        Ok(DirLockGuard {
            _dir: handle,
            pid_path,
        })
    }

    #[cfg(unix)]
    fn try_lock(file: &File) -> io::Result<()> {
        use std::os::unix::io::AsRawFd;

        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn try_lock(_file: &File) -> io::Result<()> {
        Ok(())
    }

    /// Removes the pid file; dropping the guard releases the flock itself.
    pub fn release(self) -> io::Result<()> {
        std::fs::remove_file(&self.pid_path)
    }
}

use logfile::Entry;

use crate::error::{Error, Result};
use crate::Db;

impl Db {
    /// Inserts or overwrites a key/value pair.
    ///
    /// The entry is appended to the active log file first, then the index is
    /// pointed at it; both happen under the write lock, so readers never see
    /// an index entry for bytes that are not in place yet.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_open()?;
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let entry = Entry::put(key, value);
        let mut inner = self.inner.write()?;
        let lo = inner.files.write(&entry)?;
        inner.key_dir.put(key.to_vec(), lo);
        Ok(())
    }

    /// Deletes `key` by appending a tombstone and dropping the index binding.
    ///
    /// Deleting an absent key succeeds without writing anything.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_open()?;
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let mut inner = self.inner.write()?;
        if !inner.key_dir.contains(key) {
            return Ok(());
        }

        let entry = Entry::tombstone(key);
        inner.files.write(&entry)?;
        inner.key_dir.remove(key);
        Ok(())
    }
}

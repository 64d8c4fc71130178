use crate::error::{Error, Result};
use crate::Db;

impl Db {
    /// Looks up `key` and returns its current value.
    ///
    /// The read lock is held across both the index lookup and the positional
    /// file read, so a concurrent merge cannot swap the file out from under
    /// the read.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        self.check_open()?;
        if key.is_empty() {
            return Err(Error::EmptyKey);
        }

        let inner = self.inner.read()?;
        let lo = inner.key_dir.get(key).ok_or(Error::KeyNotFound)?;
        let entry = inner.files.read(lo)?;
        Ok(entry.into_value())
    }
}

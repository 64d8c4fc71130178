use std::collections::HashMap;

use logfile::LogOffset;

/// In-memory index from key bytes to the location of the live entry.
///
/// Tombstones are never stored; deleting a key simply removes its binding.
/// All access happens under the database lock, so the map itself needs no
/// synchronization. Locations are two-word values, stored inline.
#[derive(Debug, Default)]
pub(crate) struct KeyDir {
    map: HashMap<Vec<u8>, LogOffset>,
}

impl KeyDir {
    pub fn new() -> KeyDir {
        KeyDir::default()
    }

    pub fn get(&self, key: &[u8]) -> Option<LogOffset> {
        self.map.get(key).copied()
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    pub fn put(&mut self, key: Vec<u8>, lo: LogOffset) {
        self.map.insert(key, lo);
    }

    pub fn remove(&mut self, key: &[u8]) {
        self.map.remove(key);
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> HashMap<Vec<u8>, LogOffset> {
        self.map.clone()
    }

    /// Applies the relocations produced by rewriting one file.
    ///
    /// A binding is replaced only while it still points into the rewritten
    /// file: a concurrent put may have moved the key to the active file
    /// between the rewrite and this update, and that newer location must win.
    pub fn update_from_merge(&mut self, rewrites: HashMap<Vec<u8>, LogOffset>) {
        for (key, new_lo) in rewrites {
            if let Some(cur) = self.map.get_mut(&key) {
                if cur.fid == new_lo.fid {
                    *cur = new_lo;
                }
            }
        }
    }
}

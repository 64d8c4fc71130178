use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use crate::{Db, LogOffset, Options};

pub fn test_options(dir: &Path) -> Options {
    Options::new(dir)
}

pub fn count_files_with_ext(dir: &Path, ext: &str) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .and_then(|s| s.to_str())
                .map(|x| x == ext)
                .unwrap_or(false)
        })
        .count()
}

pub fn count_log_files(dir: &Path) -> usize {
    count_files_with_ext(dir, "log")
}

pub fn count_hint_files(dir: &Path) -> usize {
    count_files_with_ext(dir, "index")
}

/// Number of live keys in the index.
pub fn key_count(db: &Db) -> usize {
    db.inner.read().unwrap().key_dir.len()
}

/// Where the index currently locates `key`.
pub fn location_of(db: &Db, key: &[u8]) -> Option<LogOffset> {
    db.inner.read().unwrap().key_dir.get(key)
}

pub fn key_dir_snapshot(db: &Db) -> HashMap<Vec<u8>, LogOffset> {
    db.inner.read().unwrap().key_dir.snapshot()
}

pub fn writable_offset(db: &Db) -> u32 {
    db.inner.read().unwrap().files.writable_offset()
}

/// Name → size listing of the data directory, for before/after comparisons.
pub fn dir_snapshot(dir: &Path) -> BTreeMap<String, u64> {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| {
            (
                e.file_name().to_string_lossy().into_owned(),
                e.metadata().unwrap().len(),
            )
        })
        .collect()
}

use std::fs;

use anyhow::Result;
use tempfile::tempdir;

use super::helpers::*;
use crate::{Db, Error};

// --------------------- Open ---------------------

#[test]
fn open_creates_directory_and_first_file() -> Result<()> {
    let dir = tempdir()?;
    let path = dir.path().join("nested").join("db");

    let db = Db::open(test_options(&path))?;
    assert!(path.join("000000.log").exists());
    assert!(path.join("LOCK").exists());
    assert_eq!(count_log_files(&path), 1);
    db.close()?;
    Ok(())
}

#[test]
fn log_file_size_range_is_enforced() {
    let dir = tempdir().unwrap();

    let too_small = test_options(dir.path()).log_file_size((1 << 20) - 1);
    assert!(matches!(
        Db::open(too_small).unwrap_err(),
        Error::InvalidLogFileSize
    ));

    let too_large = test_options(dir.path()).log_file_size((2 << 30) + 1);
    assert!(matches!(
        Db::open(too_large).unwrap_err(),
        Error::InvalidLogFileSize
    ));
}

#[test]
fn second_open_fails_while_locked() -> Result<()> {
    let dir = tempdir()?;
    let _db = Db::open(test_options(dir.path()))?;

    assert!(
        Db::open(test_options(dir.path())).is_err(),
        "directory lock must be exclusive"
    );
    Ok(())
}

#[test]
fn directory_can_be_reopened_after_close() -> Result<()> {
    let dir = tempdir()?;
    let db = Db::open(test_options(dir.path()))?;
    db.close()?;

    let db = Db::open(test_options(dir.path()))?;
    db.close()?;
    Ok(())
}

// --------------------- Replay ---------------------

#[test]
fn restart_preserves_final_state() -> Result<()> {
    let dir = tempdir()?;
    {
        let db = Db::open(test_options(dir.path()))?;
        db.put(b"keyA", b"valA")?;
        db.put(b"keyB", b"valB")?;
        db.delete(b"keyA")?;
        db.close()?;
    }

    let db = Db::open(test_options(dir.path()))?;
    assert_eq!(db.get(b"keyB")?, b"valB");
    assert!(matches!(db.get(b"keyA").unwrap_err(), Error::KeyNotFound));
    assert_eq!(key_count(&db), 1);
    Ok(())
}

#[test]
fn restart_after_rollover_keeps_appending() -> Result<()> {
    let dir = tempdir()?;
    let opts = test_options(dir.path()).log_file_size(1 << 20);
    let value = vec![0xAB; 128 * 1024];
    {
        let db = Db::open(opts.clone())?;
        for i in 0..20 {
            db.put(format!("key{i:03}").as_bytes(), &value)?;
        }
        db.close()?;
    }
    assert!(count_log_files(dir.path()) >= 2, "rollover must have happened");

    let db = Db::open(opts)?;
    for i in 0..20 {
        assert_eq!(db.get(format!("key{i:03}").as_bytes())?, value);
    }

    // New writes land past the replayed tail without clobbering anything.
    db.put(b"after-restart", b"fresh")?;
    assert_eq!(db.get(b"after-restart")?, b"fresh");
    assert_eq!(db.get(b"key019")?, value);
    Ok(())
}

#[test]
fn stale_temp_files_are_swept_on_open() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("000000.log.tmp"), b"junk")?;
    fs::write(dir.path().join("000000.index.tmp"), b"junk")?;

    let db = Db::open(test_options(dir.path()))?;
    assert!(!dir.path().join("000000.log.tmp").exists());
    assert!(!dir.path().join("000000.index.tmp").exists());
    db.close()?;
    Ok(())
}

#[test]
fn duplicate_file_ids_are_rejected() -> Result<()> {
    let dir = tempdir()?;
    // Same id, different zero padding.
    fs::write(dir.path().join("7.log"), b"")?;
    fs::write(dir.path().join("000007.log"), b"")?;

    let err = Db::open(test_options(dir.path())).unwrap_err();
    assert!(matches!(err, Error::DuplicateFileId(7)), "got {err:?}");
    Ok(())
}

#[test]
fn unparsable_log_file_name_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    fs::write(dir.path().join("garbage.log"), b"")?;

    let err = Db::open(test_options(dir.path())).unwrap_err();
    assert!(matches!(err, Error::InvalidFileName(_)), "got {err:?}");
    Ok(())
}

// --------------------- Hint files ---------------------

#[test]
fn hint_replay_matches_log_replay() -> Result<()> {
    let dir = tempdir()?;
    let opts = test_options(dir.path()).log_file_size(1 << 20);
    let value = vec![0x5C; 128 * 1024];
    {
        let db = Db::open(opts.clone())?;
        for i in 0..24 {
            db.put(format!("key{i:03}").as_bytes(), &value)?;
        }
        for i in 0..8 {
            db.delete(format!("key{i:03}").as_bytes())?;
        }
        db.merge()?;
        db.close()?;
    }
    assert!(count_hint_files(dir.path()) > 0, "merge must emit hint files");

    // Replay once with hints present.
    let with_hints = {
        let db = Db::open(opts.clone())?;
        let snap = key_dir_snapshot(&db);
        db.close()?;
        snap
    };

    // Drop every hint sidecar and replay again from the logs alone.
    for entry in fs::read_dir(dir.path())? {
        let path = entry?.path();
        if path.extension().map(|e| e == "index").unwrap_or(false) {
            fs::remove_file(path)?;
        }
    }
    let without_hints = {
        let db = Db::open(opts)?;
        let snap = key_dir_snapshot(&db);
        db.close()?;
        snap
    };

    assert_eq!(
        with_hints, without_hints,
        "hint replay must rebuild the exact same index"
    );
    Ok(())
}

#[test]
fn emptied_files_are_deleted_on_reopen() -> Result<()> {
    let dir = tempdir()?;
    let opts = test_options(dir.path()).log_file_size(1 << 20);
    let value = vec![0x11; 600 * 1024];
    {
        let db = Db::open(opts.clone())?;
        db.put(b"k1", &value)?; // file 0
        db.put(b"k2", &value)?; // crosses the threshold, seals file 0
        db.put(b"k3", &value)?; // file 1
        db.delete(b"k1")?;
        db.delete(b"k2")?;
        db.merge()?; // file 0 rewrites down to nothing

        // The emptied file lingers until the next open.
        assert_eq!(count_log_files(dir.path()), 2);
        assert_eq!(fs::metadata(dir.path().join("000000.log"))?.len(), 0);
        db.close()?;
    }

    let db = Db::open(opts)?;
    assert_eq!(count_log_files(dir.path()), 1, "empty file swept on open");
    assert!(!dir.path().join("000000.log").exists());
    assert!(!dir.path().join("000000.index").exists());
    assert_eq!(db.get(b"k3")?, value);
    Ok(())
}

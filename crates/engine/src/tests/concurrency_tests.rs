use std::sync::Arc;
use std::thread;

use anyhow::Result;
use tempfile::tempdir;

use super::helpers::*;
use crate::Db;

fn key(writer: usize, i: usize) -> Vec<u8> {
    format!("w{writer}-key{i:03}").into_bytes()
}

fn value(writer: usize, i: usize, round: usize) -> Vec<u8> {
    format!("w{writer}-key{i:03}-round{round}-").repeat(400).into_bytes()
}

// --------------------- Reads and writes racing a merge ---------------------

#[test]
fn merge_never_loses_a_concurrent_update() -> Result<()> {
    const WRITERS: usize = 4;
    const KEYS: usize = 64;
    const ROUNDS: usize = 3;

    let dir = tempdir()?;
    let db = Arc::new(Db::open(test_options(dir.path()).log_file_size(1 << 20))?);

    // Seed every key so the store spans several files before merging starts.
    for w in 0..WRITERS {
        for i in 0..KEYS {
            db.put(&key(w, i), &value(w, i, 0))?;
        }
    }
    assert!(count_log_files(dir.path()) >= 2);

    // Each writer overwrites its own keys while merges run underneath.
    let mut handles = Vec::new();
    for w in 0..WRITERS {
        let db = Arc::clone(&db);
        handles.push(thread::spawn(move || {
            for round in 1..=ROUNDS {
                for i in 0..KEYS {
                    db.put(&key(w, i), &value(w, i, round)).unwrap();
                    // Only this thread writes these keys, so the read must
                    // observe its own latest put no matter what the merge
                    // is doing.
                    assert_eq!(db.get(&key(w, i)).unwrap(), value(w, i, round));
                }
            }
        }));
    }

    let merger = {
        let db = Arc::clone(&db);
        thread::spawn(move || {
            for _ in 0..ROUNDS {
                db.merge().unwrap();
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    merger.join().unwrap();

    // Every key holds its writer's final round.
    for w in 0..WRITERS {
        for i in 0..KEYS {
            assert_eq!(db.get(&key(w, i))?, value(w, i, ROUNDS));
        }
    }

    // A quiescent merge afterwards must preserve exactly that state.
    db.merge()?;
    for w in 0..WRITERS {
        for i in 0..KEYS {
            assert_eq!(db.get(&key(w, i))?, value(w, i, ROUNDS));
        }
    }
    assert_eq!(key_count(&db), WRITERS * KEYS);
    Ok(())
}

#[test]
fn concurrent_readers_share_the_store() -> Result<()> {
    let dir = tempdir()?;
    let db = Arc::new(Db::open(test_options(dir.path()))?);
    for i in 0..500 {
        db.put(format!("key{i}").as_bytes(), format!("val{i}").as_bytes())?;
    }

    let mut handles = Vec::new();
    for _ in 0..8 {
        let db = Arc::clone(&db);
        handles.push(thread::spawn(move || {
            for i in 0..500 {
                assert_eq!(
                    db.get(format!("key{i}").as_bytes()).unwrap(),
                    format!("val{i}").into_bytes()
                );
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
    Ok(())
}

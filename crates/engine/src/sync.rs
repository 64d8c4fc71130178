use std::fs::File;
use std::path::Path;

use crate::error::{IoContext, Result};

/// Fsyncs a directory.
///
/// Creating, deleting, or renaming a file only becomes durable once the
/// directory entry itself is synced; without this a crash can lose the file
/// even though its contents were flushed.
pub(crate) fn sync_dir(dir: &Path) -> Result<()> {
    let f = File::open(dir).with_context(|| format!("while opening directory {}", dir.display()))?;
    f.sync_all()
        .with_context(|| format!("while syncing directory {}", dir.display()))
}

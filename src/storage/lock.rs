//! Single-writer capability
//!
//! A writable `FileStorage` holds a `WriterLock`: an entry in a per-process
//! registry plus an exclusive `flock` on the file. Both are released on drop.

use std::collections::BTreeSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;

use crate::error::{PermissionError, Result};

/// Canonical paths with a live writer in this process
static ACTIVE_WRITERS: Mutex<BTreeSet<PathBuf>> = Mutex::new(BTreeSet::new());

/// Proof that the holder is the only writer of a file
#[derive(Debug)]
pub struct WriterLock {
    path: PathBuf,
    file: File,
}

impl WriterLock {
    /// Claim the writer slot for `path`, whose handle is `file`
    pub fn acquire(path: &Path, file: &File) -> Result<Self> {
        let canonical = path.canonicalize()?;

        {
            let mut writers = ACTIVE_WRITERS.lock();
            if !writers.insert(canonical.clone()) {
                return Err(PermissionError::WriterLocked(canonical.display().to_string()).into());
            }
        }

        let claimed = file
            .try_clone()
            .and_then(|handle| handle.try_lock_exclusive().map(|_| handle));

        match claimed {
            Ok(file) => Ok(Self {
                path: canonical,
                file,
            }),
            Err(e) => {
                ACTIVE_WRITERS.lock().remove(&canonical);
                tracing::debug!(path = %canonical.display(), error = %e, "writer lock refused");
                Err(PermissionError::WriterLocked(canonical.display().to_string()).into())
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WriterLock {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release file lock");
        }
        ACTIVE_WRITERS.lock().remove(&self.path);
    }
}

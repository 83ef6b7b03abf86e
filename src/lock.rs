//! Run lock: at most one active run per state directory.
//!
//! Overlapping scheduled invocations are refused up front; the pipeline
//! itself assumes single-run execution. The lock is advisory (fs2) and is
//! released when the guard drops, including on panic.

use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;

use fs2::FileExt;

use crate::error::AgentError;

pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Take the exclusive lock or fail fast if another run holds it.
    pub fn acquire(path: PathBuf) -> Result<Self, AgentError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&path)?;

        file.try_lock_exclusive()
            .map_err(|_| AgentError::LockHeld(path.clone()))?;

        Ok(Self { file, path })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
        // Best-effort cleanup; a leftover file is harmless since the lock
        // itself is advisory.
        let _ = fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.lock");

        let _held = RunLock::acquire(path.clone()).unwrap();
        let second = RunLock::acquire(path);
        assert!(matches!(second, Err(AgentError::LockHeld(_))));
    }

    #[test]
    fn test_reacquire_after_release() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.lock");

        drop(RunLock::acquire(path.clone()).unwrap());
        assert!(RunLock::acquire(path).is_ok());
    }
}

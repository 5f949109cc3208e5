//! Scoped advisory file locking.
//!
//! Every read-modify-write cycle on a shared artifact (counter state, the
//! JSON index, document moves) runs under a [`FileLock`]. Locks are advisory:
//! they serialize cooperating taskward processes but do not protect against
//! arbitrary external writers.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("IO error: {0}")]
    Io(std::io::Error),
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),
}

/// Exclusive advisory lock on a lock file, released on drop.
pub struct FileLock {
    file: File,
    path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock on `path`, creating the lock file (and its
    /// parent directory) if needed. Blocks until the lock is available.
    pub fn acquire(path: &Path) -> Result<FileLock, LockError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| classify(e, parent))?;
        }

        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| classify(e, path))?;

        file.lock_exclusive().map_err(|e| classify(e, path))?;
        debug!("Acquired lock on {}", path.display());

        Ok(FileLock {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Failed to release lock on {}: {}", self.path.display(), e);
        }
    }
}

/// Conventional lock-file path for a given artifact: `index.json` is locked
/// via `index.json.lock` next to it.
pub fn lock_path_for(artifact: &Path) -> PathBuf {
    let mut name = artifact
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    artifact.with_file_name(name)
}

fn classify(e: std::io::Error, path: &Path) -> LockError {
    if e.kind() == std::io::ErrorKind::PermissionDenied {
        LockError::PermissionDenied(path.to_path_buf())
    } else {
        LockError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn lock_can_be_reacquired_after_release() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("state.json.lock");

        let first = FileLock::acquire(&path).unwrap();
        drop(first);

        let second = FileLock::acquire(&path).unwrap();
        drop(second);

        assert!(path.exists());
    }

    #[test]
    fn lock_creates_missing_parent_directories() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested/dir/state.lock");

        let _lock = FileLock::acquire(&path).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn lock_path_appends_suffix() {
        assert_eq!(
            lock_path_for(Path::new("/a/b/index.json")),
            PathBuf::from("/a/b/index.json.lock")
        );
        assert_eq!(
            lock_path_for(Path::new("counter.json")),
            PathBuf::from("counter.json.lock")
        );
    }
}

//! Advisory lock held for the duration of an upload run.
//!
//! Two overlapping scheduled runs would otherwise both read the same cursor
//! and publish the same item.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Another run holds the lock {0}")]
    Busy(PathBuf),

    #[error("Failed to open lock file {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Exclusive lock on `<state_file>.lock`, released on drop
#[derive(Debug)]
pub struct RunLock {
    file: File,
    path: PathBuf,
}

impl RunLock {
    /// Lock file path for a state file
    pub fn path_for(state_file: &Path) -> PathBuf {
        let mut name = state_file.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Take the lock without waiting
    pub fn acquire(state_file: &Path) -> Result<Self, LockError> {
        let path = Self::path_for(state_file);
        let open_error = |source| LockError::Open {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(open_error)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(open_error)?;

        file.try_lock_exclusive()
            .map_err(|_| LockError::Busy(path.clone()))?;

        Ok(Self { file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_second_lock_is_busy() {
        let temp = TempDir::new().unwrap();
        let state = temp.path().join("state.json");

        let first = RunLock::acquire(&state).unwrap();
        assert_eq!(first.path(), temp.path().join("state.json.lock"));
        assert!(matches!(RunLock::acquire(&state), Err(LockError::Busy(_))));

        drop(first);
        assert!(RunLock::acquire(&state).is_ok());
    }
}

//! Moves published files out of the download area.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Path has no file name: {0}")]
    NoFileName(PathBuf),

    #[error("Failed to create archive directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("Failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// Move `file` into `archive_dir`, keeping its file name.
///
/// Falls back to copy + remove when a rename is impossible (e.g. the two
/// directories live on different filesystems).
pub async fn archive_file(file: &Path, archive_dir: &Path) -> Result<PathBuf, ArchiveError> {
    let name = file
        .file_name()
        .ok_or_else(|| ArchiveError::NoFileName(file.to_path_buf()))?;

    fs::create_dir_all(archive_dir)
        .await
        .map_err(|source| ArchiveError::CreateDir {
            path: archive_dir.to_path_buf(),
            source,
        })?;

    let dest = archive_dir.join(name);
    let move_error = |source| ArchiveError::Move {
        from: file.to_path_buf(),
        to: dest.clone(),
        source,
    };

    if let Err(e) = fs::rename(file, &dest).await {
        debug!(error = %e, from = %file.display(), "Rename failed, copying instead");
        fs::copy(file, &dest).await.map_err(move_error)?;
        fs::remove_file(file).await.map_err(move_error)?;
    }

    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_archive_moves_file() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("downloads").join("C0ffee.mp4");
        fs::create_dir_all(src.parent().unwrap()).await.unwrap();
        fs::write(&src, b"video").await.unwrap();

        let archive = temp.path().join("uploaded_videos");
        let dest = archive_file(&src, &archive).await.unwrap();

        assert_eq!(dest, archive.join("C0ffee.mp4"));
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).await.unwrap(), b"video");
    }

    #[tokio::test]
    async fn test_archive_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        let result = archive_file(&temp.path().join("gone.mp4"), temp.path()).await;
        assert!(matches!(result, Err(ArchiveError::Move { .. })));
    }

    #[tokio::test]
    async fn test_failed_fallback_keeps_source_file() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("C0ffee.mp4");
        fs::write(&src, b"video").await.unwrap();

        // A non-empty directory already occupies the destination name
        let archive = temp.path().join("uploaded_videos");
        fs::create_dir_all(archive.join("C0ffee.mp4").join("inner"))
            .await
            .unwrap();

        let result = archive_file(&src, &archive).await;

        assert!(matches!(result, Err(ArchiveError::Move { .. })));
        assert_eq!(fs::read(&src).await.unwrap(), b"video");
    }
}

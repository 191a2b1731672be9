//! Adapter interfaces for external systems.
//!
//! The orchestrator only sees these traits:
//! - `Fetcher`: lists a profile's video posts and downloads one of them
//! - `Publisher`: exchanges credentials and uploads a video
//! - `AdvanceHook`: side effect run after the cursor moved (e.g. a git commit)

pub mod git;
pub mod youtube;
pub mod ytdlp;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{FetchedVideo, SourceItem, Visibility};

// Re-export the concrete adapters
pub use git::GitCommitHook;
pub use youtube::YouTubePublisher;
pub use ytdlp::YtDlpFetcher;

/// Errors from the fetch collaborator
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("{program} timed out after {seconds}s")]
    Timeout { program: String, seconds: u64 },

    #[error("{program} exited with code {code}: {stderr}")]
    Exit {
        program: String,
        code: i32,
        stderr: String,
    },

    #[error("Unexpected downloader output: {0}")]
    Output(String),

    #[error("Downloaded file not found for item {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the publish collaborator
#[derive(Debug, Error)]
pub enum PublishError {
    /// Credential exchange failed; nothing was uploaded
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from a post-advance hook
#[derive(Debug, Error)]
pub enum HookError {
    #[error("Failed to run {program}: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },
}

/// Short-lived credential returned by [`Publisher::authorize`]
#[derive(Clone)]
pub struct AccessToken(pub String);

impl AccessToken {
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Everything the publisher needs for one upload
#[derive(Debug, Clone)]
pub struct PublishRequest<'a> {
    pub file: &'a Path,
    pub title: &'a str,
    pub description: &'a str,
    pub tags: &'a [String],
    pub visibility: Visibility,
}

/// Upload progress notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    /// Whole percent, 100 for an empty file
    pub fn percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 100;
        }
        ((self.bytes_sent.min(self.total_bytes) * 100) / self.total_bytes) as u8
    }
}

/// Progress callback passed to [`Publisher::publish`]
pub type ProgressFn<'a> = &'a (dyn Fn(UploadProgress) + Send + Sync);

/// Source of video posts
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Human-readable fetcher name
    fn name(&self) -> &str;

    /// All video posts of `profile`, oldest first
    async fn list_items(&self, profile: &str) -> Result<Vec<SourceItem>, FetchError>;

    /// Download `item` into `dest_dir`
    async fn fetch(&self, item: &SourceItem, dest_dir: &Path) -> Result<FetchedVideo, FetchError>;
}

/// Destination video platform
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Human-readable publisher name
    fn name(&self) -> &str;

    /// Exchange long-lived credentials for an access token.
    ///
    /// Failures must be reported as [`PublishError::Auth`].
    async fn authorize(&self) -> Result<AccessToken, PublishError>;

    /// Upload a file and return the platform's video id
    async fn publish(
        &self,
        token: &AccessToken,
        request: &PublishRequest<'_>,
        progress: ProgressFn<'_>,
    ) -> Result<String, PublishError>;

    /// Public URL for a published video id
    fn video_url(&self, video_id: &str) -> String {
        video_id.to_string()
    }
}

/// Side effect invoked after every persisted cursor advance
#[async_trait]
pub trait AdvanceHook: Send + Sync {
    fn name(&self) -> &str;

    async fn after_advance(&self, state_file: &Path, next_index: u64) -> Result<(), HookError>;
}

/// Output directory for one item's download
pub fn item_download_dir(base: &Path, item: &SourceItem) -> PathBuf {
    let safe: String = item
        .id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if safe.is_empty() {
        base.to_path_buf()
    } else {
        base.join(safe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percent() {
        let p = UploadProgress {
            bytes_sent: 512,
            total_bytes: 1024,
        };
        assert_eq!(p.percent(), 50);
        assert_eq!(
            UploadProgress {
                bytes_sent: 0,
                total_bytes: 0
            }
            .percent(),
            100
        );
    }

    #[test]
    fn test_access_token_debug_is_redacted() {
        let token = AccessToken("ya29.secret".to_string());
        assert_eq!(format!("{:?}", token), "AccessToken(***)");
    }

    #[test]
    fn test_item_download_dir_strips_separators() {
        let base = Path::new("/tmp/downloads");
        let item = SourceItem::new("../C0_f-fee");
        assert_eq!(
            item_download_dir(base, &item),
            PathBuf::from("/tmp/downloads/C0_f-fee")
        );
    }
}

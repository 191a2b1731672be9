//! Instagram fetcher backed by the `yt-dlp` binary.
//!
//! Listing runs `yt-dlp --dump-json` against the profile page (one JSON
//! object per post on stdout); fetching downloads a single post page with
//! `--print-json` so the caption and final file name come back in one go.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tempfile::NamedTempFile;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use super::{item_download_dir, FetchError, Fetcher};
use crate::domain::{FetchedVideo, SourceItem};

const INSTAGRAM_BASE: &str = "https://www.instagram.com";

/// Extensions accepted when locating a download on disk
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv"];

/// Optional login for restricted profiles
#[derive(Clone)]
pub struct SourceCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceCredentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Subset of yt-dlp's info JSON this crate reads
#[derive(Debug, Deserialize)]
struct InfoJson {
    id: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default, rename = "_filename")]
    filename: Option<String>,
    #[serde(default)]
    requested_downloads: Vec<RequestedDownload>,
}

#[derive(Debug, Deserialize)]
struct RequestedDownload {
    #[serde(default)]
    filepath: Option<String>,
}

impl InfoJson {
    /// Post shortcode, from `id` or the `/p/<code>/` or `/reel/<code>/` URL
    fn shortcode(&self) -> Option<String> {
        if let Some(id) = self.id.as_deref().filter(|s| !s.is_empty()) {
            return Some(id.to_string());
        }
        self.webpage_url
            .as_deref()
            .or(self.url.as_deref())
            .and_then(shortcode_from_url)
    }

    fn is_video(&self) -> bool {
        self.vcodec.as_deref() != Some("none")
    }

    fn posted_at(&self) -> Option<DateTime<Utc>> {
        self.timestamp.and_then(|ts| Utc.timestamp_opt(ts, 0).single())
    }

    fn downloaded_path(&self) -> Option<PathBuf> {
        self.requested_downloads
            .iter()
            .find_map(|d| d.filepath.clone())
            .or_else(|| self.filename.clone())
            .map(PathBuf::from)
    }
}

/// Extract the shortcode from an Instagram post URL
pub fn shortcode_from_url(url: &str) -> Option<String> {
    let mut segments = url.split('/').filter(|s| !s.is_empty());
    while let Some(segment) = segments.next() {
        if matches!(segment, "p" | "reel" | "reels" | "tv") {
            return segments
                .next()
                .map(|s| s.split('?').next().unwrap_or(s).to_string())
                .filter(|s| !s.is_empty());
        }
    }
    None
}

/// Fetcher that shells out to yt-dlp
pub struct YtDlpFetcher {
    /// Path to the yt-dlp binary (default: "yt-dlp")
    binary_path: String,

    credentials: Option<SourceCredentials>,

    /// Per-invocation timeout
    timeout: Duration,
}

impl YtDlpFetcher {
    pub fn new(
        binary_path: impl Into<String>,
        credentials: Option<SourceCredentials>,
        timeout: Duration,
    ) -> Self {
        let fetcher = Self {
            binary_path: binary_path.into(),
            credentials,
            timeout,
        };

        match &fetcher.credentials {
            Some(creds) => info!(username = %creds.username, "Fetching with Instagram login"),
            None => info!("No Instagram login provided, using guest mode (public posts only)"),
        }

        fetcher
    }

    /// Write the login to a private yt-dlp config file so the password
    /// never shows up in the process list. The file lives as long as the
    /// returned handle.
    fn login_file(&self) -> Result<Option<NamedTempFile>, FetchError> {
        let Some(creds) = &self.credentials else {
            return Ok(None);
        };

        let mut file = tempfile::Builder::new()
            .prefix("reposter-ytdlp-")
            .suffix(".conf")
            .tempfile()?;
        file.write_all(login_config(creds).as_bytes())?;
        file.flush()?;
        Ok(Some(file))
    }

    fn base_args(&self, login_file: Option<&NamedTempFile>) -> Vec<String> {
        let mut args = vec!["--no-warnings".to_string(), "--ignore-config".to_string()];
        if let Some(file) = login_file {
            args.extend([
                "--config-locations".to_string(),
                file.path().to_string_lossy().to_string(),
            ]);
        }
        args
    }

    /// Run yt-dlp and return stdout
    async fn run(&self, args: &[String]) -> Result<String, FetchError> {
        debug!(binary = %self.binary_path, "Running yt-dlp");

        let child = Command::new(&self.binary_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| FetchError::Spawn {
                program: self.binary_path.clone(),
                source,
            })?;

        let output = timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| FetchError::Timeout {
                program: self.binary_path.clone(),
                seconds: self.timeout.as_secs(),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(FetchError::Exit {
                program: self.binary_path.clone(),
                code: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        String::from_utf8(output.stdout)
            .map_err(|_| FetchError::Output("yt-dlp output is not valid UTF-8".to_string()))
    }
}

#[async_trait]
impl Fetcher for YtDlpFetcher {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn list_items(&self, profile: &str) -> Result<Vec<SourceItem>, FetchError> {
        let login = self.login_file()?;
        let mut args = self.base_args(login.as_ref());
        args.extend([
            "--dump-json".to_string(),
            "--ignore-errors".to_string(),
            format!("{}/{}/", INSTAGRAM_BASE, profile.trim_start_matches('@')),
        ]);

        let stdout = self.run(&args).await?;
        let items = parse_listing(&stdout)?;

        info!(profile, count = items.len(), "Listed video posts");
        Ok(items)
    }

    async fn fetch(&self, item: &SourceItem, dest_dir: &Path) -> Result<FetchedVideo, FetchError> {
        let dir = item_download_dir(dest_dir, item);
        tokio::fs::create_dir_all(&dir).await?;

        let template = dir.join("%(id)s.%(ext)s");
        let login = self.login_file()?;
        let mut args = self.base_args(login.as_ref());
        args.extend([
            "--no-simulate".to_string(),
            "--print-json".to_string(),
            "--no-playlist".to_string(),
            "-f".to_string(),
            "mp4/best".to_string(),
            "-o".to_string(),
            template.to_string_lossy().to_string(),
            format!("{}/p/{}/", INSTAGRAM_BASE, item.id),
        ]);

        let stdout = self.run(&args).await?;
        let info: InfoJson = stdout
            .lines()
            .rev()
            .find(|l| l.trim_start().starts_with('{'))
            .ok_or_else(|| FetchError::Output("no JSON printed for download".to_string()))
            .and_then(|l| {
                serde_json::from_str(l).map_err(|e| FetchError::Output(e.to_string()))
            })?;

        let path = match info.downloaded_path().filter(|p| p.exists()) {
            Some(path) => path,
            None => {
                warn!(item = %item.id, "Reported download path missing, scanning directory");
                find_video_file(&dir, &item.id)
                    .await?
                    .ok_or_else(|| FetchError::MissingFile(item.id.clone()))?
            }
        };

        let caption = info
            .description
            .or_else(|| item.caption.clone())
            .unwrap_or_default();

        Ok(FetchedVideo { path, caption })
    }
}

/// yt-dlp config file body carrying the login options
fn login_config(creds: &SourceCredentials) -> String {
    format!(
        "--username {}\n--password {}\n",
        shell_quote(&creds.username),
        shell_quote(&creds.password)
    )
}

/// Single-quote `value` the way yt-dlp's shlex-based config parser expects
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\"'\"'"))
}

/// Parse `--dump-json` output into video items ordered oldest → newest
fn parse_listing(stdout: &str) -> Result<Vec<SourceItem>, FetchError> {
    let mut items = Vec::new();

    for line in stdout.lines().filter(|l| !l.trim().is_empty()) {
        let info: InfoJson =
            serde_json::from_str(line).map_err(|e| FetchError::Output(e.to_string()))?;

        if !info.is_video() {
            continue;
        }
        let Some(id) = info.shortcode() else {
            continue;
        };
        if items.iter().any(|i: &SourceItem| i.id == id) {
            continue;
        }

        items.push(SourceItem {
            id,
            caption: info.description.clone(),
            posted_at: info.posted_at(),
        });
    }

    // Profiles list newest first
    items.reverse();
    if items.iter().all(|i| i.posted_at.is_some()) {
        items.sort_by_key(|i| i.posted_at);
    }

    Ok(items)
}

/// Find a video file in `dir`, preferring one whose name contains `id`
async fn find_video_file(dir: &Path, id: &str) -> Result<Option<PathBuf>, FetchError> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut fallback = None;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_video = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| VIDEO_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if !is_video {
            continue;
        }

        let name = entry.file_name().to_string_lossy().to_string();
        if name.contains(id) {
            return Ok(Some(path));
        }
        if fallback.is_none() {
            fallback = Some(path);
        }
    }

    Ok(fallback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_shortcode_from_url() {
        assert_eq!(
            shortcode_from_url("https://www.instagram.com/p/C0ffee123/"),
            Some("C0ffee123".to_string())
        );
        assert_eq!(
            shortcode_from_url("https://www.instagram.com/reel/Xyz?igsh=abc"),
            Some("Xyz".to_string())
        );
        assert_eq!(shortcode_from_url("https://www.instagram.com/someone/"), None);
    }

    #[test]
    fn test_parse_listing_orders_oldest_first_and_skips_images() {
        let stdout = [
            r#"{"id":"new","timestamp":1700000300,"description":"newest"}"#,
            r#"{"id":"photo","timestamp":1700000200,"vcodec":"none"}"#,
            r#"{"id":"old","timestamp":1700000100,"description":"oldest"}"#,
            "",
        ]
        .join("\n");

        let items = parse_listing(&stdout).unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["old", "new"]);
        assert_eq!(items[0].caption.as_deref(), Some("oldest"));
    }

    #[test]
    fn test_parse_listing_without_timestamps_reverses() {
        let stdout = r#"{"url":"https://www.instagram.com/p/BBB/"}
{"url":"https://www.instagram.com/p/AAA/"}"#;
        let items = parse_listing(stdout).unwrap();
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["AAA", "BBB"]);
    }

    #[test]
    fn test_parse_listing_rejects_garbage() {
        assert!(matches!(
            parse_listing("not json"),
            Err(FetchError::Output(_))
        ));
    }

    #[tokio::test]
    async fn test_find_video_file_prefers_matching_name() {
        let temp = TempDir::new().unwrap();
        tokio::fs::write(temp.path().join("other.mp4"), b"x").await.unwrap();
        tokio::fs::write(temp.path().join("C0ffee.mp4"), b"x").await.unwrap();
        tokio::fs::write(temp.path().join("C0ffee.txt"), b"x").await.unwrap();

        let found = find_video_file(temp.path(), "C0ffee").await.unwrap();
        assert_eq!(found, Some(temp.path().join("C0ffee.mp4")));

        let fallback = find_video_file(temp.path(), "missing").await.unwrap();
        assert!(fallback.is_some());
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let fetcher = YtDlpFetcher::new(
            "/nonexistent/yt-dlp-binary",
            None,
            Duration::from_secs(5),
        );
        let result = fetcher.list_items("someone").await;
        assert!(matches!(result, Err(FetchError::Spawn { .. })));
    }

    #[test]
    fn test_login_stays_off_the_command_line() {
        let fetcher = YtDlpFetcher::new(
            "yt-dlp",
            Some(SourceCredentials {
                username: "me".to_string(),
                password: "hunter2".to_string(),
            }),
            Duration::from_secs(5),
        );

        let login = fetcher.login_file().unwrap().unwrap();
        let args = fetcher.base_args(Some(&login));

        assert!(!args.iter().any(|a| a.contains("hunter2")));
        assert!(!args.iter().any(|a| a == "--password"));
        let position = args.iter().position(|a| a == "--config-locations").unwrap();
        assert_eq!(args[position + 1], login.path().to_string_lossy());

        let written = std::fs::read_to_string(login.path()).unwrap();
        assert_eq!(written, "--username 'me'\n--password 'hunter2'\n");
    }

    #[test]
    fn test_guest_mode_writes_no_login_file() {
        let fetcher = YtDlpFetcher::new("yt-dlp", None, Duration::from_secs(5));
        assert!(fetcher.login_file().unwrap().is_none());
        assert!(!fetcher
            .base_args(None)
            .iter()
            .any(|a| a == "--config-locations"));
    }

    #[test]
    fn test_login_config_quotes_single_quotes() {
        let creds = SourceCredentials {
            username: "o'neil".to_string(),
            password: "a b'c".to_string(),
        };
        assert_eq!(
            login_config(&creds),
            "--username 'o'\"'\"'neil'\n--password 'a b'\"'\"'c'\n"
        );
    }
}

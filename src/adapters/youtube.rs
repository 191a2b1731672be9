//! YouTube Data API v3 publisher.
//!
//! Credentials are a Google OAuth client (id + secret) plus a long-lived
//! refresh token obtained once with `reposter authorize`. Each run trades
//! the refresh token for an access token, opens a resumable upload session
//! with the video metadata, then PUTs the file in fixed-size chunks.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tracing::{debug, info};

use super::{AccessToken, ProgressFn, PublishError, PublishRequest, Publisher, UploadProgress};

pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/youtube/v3/videos?uploadType=resumable&part=snippet,status";
pub const UPLOAD_SCOPE: &str = "https://www.googleapis.com/auth/youtube.upload";

/// Redirect used by the installed-app flow; the code is copied from the address bar
pub const INSTALLED_APP_REDIRECT: &str = "http://localhost";

/// Resumable chunks must be multiples of 256 KiB
const CHUNK_GRANULARITY: usize = 256 * 1024;

/// Default chunk size (8 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 32 * CHUNK_GRANULARITY;

/// OAuth client and refresh token
#[derive(Clone, Serialize, Deserialize)]
pub struct PublishCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl std::fmt::Debug for PublishCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublishCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("refresh_token", &"***")
            .finish()
    }
}

/// Response from the token endpoint
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_description: Option<String>,
}

impl TokenResponse {
    fn error_message(&self) -> String {
        match (&self.error, &self.error_description) {
            (Some(e), Some(d)) => format!("{}: {}", e, d),
            (Some(e), None) => e.clone(),
            _ => "no access token in response".to_string(),
        }
    }
}

/// Video resource body sent when opening the upload session
#[derive(Debug, Serialize)]
struct VideoResource<'a> {
    snippet: Snippet<'a>,
    status: Status<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Snippet<'a> {
    title: &'a str,
    description: &'a str,
    tags: &'a [String],
    category_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Status<'a> {
    privacy_status: &'a str,
    self_declared_made_for_kids: bool,
}

/// Response after the final chunk
#[derive(Debug, Deserialize)]
struct UploadedVideo {
    id: String,
}

/// YouTube publisher
pub struct YouTubePublisher {
    credentials: PublishCredentials,

    /// `snippet.categoryId` ("22" = People & Blogs)
    category_id: String,

    chunk_size: usize,

    token_url: String,
    upload_url: String,

    client: reqwest::Client,
}

impl YouTubePublisher {
    pub fn new(credentials: PublishCredentials, category_id: impl Into<String>) -> Self {
        Self {
            credentials,
            category_id: category_id.into(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            token_url: TOKEN_URL.to_string(),
            upload_url: UPLOAD_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Override the chunk size, rounded down to the 256 KiB granularity
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = (chunk_size / CHUNK_GRANULARITY).max(1) * CHUNK_GRANULARITY;
        self
    }

    /// Point the client at different endpoints
    pub fn with_endpoints(
        mut self,
        token_url: impl Into<String>,
        upload_url: impl Into<String>,
    ) -> Self {
        self.token_url = token_url.into();
        self.upload_url = upload_url.into();
        self
    }

    /// Open a resumable session and return its upload URL
    async fn start_session(
        &self,
        token: &AccessToken,
        request: &PublishRequest<'_>,
        total_bytes: u64,
    ) -> Result<String, PublishError> {
        let body = VideoResource {
            snippet: Snippet {
                title: request.title,
                description: request.description,
                tags: request.tags,
                category_id: &self.category_id,
            },
            status: Status {
                privacy_status: request.visibility.as_str(),
                self_declared_made_for_kids: false,
            },
        };

        let response = self
            .client
            .post(&self.upload_url)
            .bearer_auth(token.secret())
            .header("X-Upload-Content-Type", video_mime(request.file))
            .header("X-Upload-Content-Length", total_bytes)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PublishError::Upload(format!(
                "session request returned {}: {}",
                status, text
            )));
        }

        response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| PublishError::Upload("no upload session URL in response".to_string()))
    }

    /// Send one chunk; `Complete` once the server has the whole file
    async fn put_chunk(
        &self,
        session_url: &str,
        token: &AccessToken,
        chunk: Vec<u8>,
        offset: u64,
        total_bytes: u64,
    ) -> Result<ChunkResult, PublishError> {
        let len = chunk.len() as u64;
        let range = if len == 0 {
            format!("bytes */{}", total_bytes)
        } else {
            format!("bytes {}-{}/{}", offset, offset + len - 1, total_bytes)
        };

        let response = self
            .client
            .put(session_url)
            .bearer_auth(token.secret())
            .header(CONTENT_LENGTH, len)
            .header(CONTENT_RANGE, range)
            .body(chunk)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::PERMANENT_REDIRECT {
            let next = response
                .headers()
                .get(RANGE)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_range_end)
                .map(|end| end + 1)
                .unwrap_or(0);
            return Ok(ChunkResult::Incomplete { next_offset: next });
        }

        if status.is_success() {
            let video: UploadedVideo = response
                .json()
                .await
                .map_err(|e| PublishError::Upload(format!("unreadable upload response: {}", e)))?;
            return Ok(ChunkResult::Complete(video.id));
        }

        let text = response.text().await.unwrap_or_default();
        Err(PublishError::Upload(format!(
            "chunk at offset {} returned {}: {}",
            offset, status, text
        )))
    }

    /// Consent URL for the installed-app flow
    pub fn authorization_url(client_id: &str) -> Result<String, PublishError> {
        let url = reqwest::Url::parse_with_params(
            AUTH_URL,
            &[
                ("client_id", client_id),
                ("redirect_uri", INSTALLED_APP_REDIRECT),
                ("response_type", "code"),
                ("scope", UPLOAD_SCOPE),
                ("access_type", "offline"),
                ("prompt", "consent"),
            ],
        )
        .map_err(|e| PublishError::Auth(e.to_string()))?;
        Ok(url.to_string())
    }

    /// Exchange an authorization code for a refresh token
    pub async fn exchange_code(
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<String, PublishError> {
        let response = reqwest::Client::new()
            .post(TOKEN_URL)
            .form(&[
                ("client_id", client_id),
                ("client_secret", client_secret),
                ("code", code),
                ("grant_type", "authorization_code"),
                ("redirect_uri", INSTALLED_APP_REDIRECT),
            ])
            .send()
            .await
            .map_err(|e| PublishError::Auth(e.to_string()))?;

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Auth(format!("unreadable token response: {}", e)))?;

        let message = token.error_message();
        token.refresh_token.ok_or(PublishError::Auth(message))
    }
}

enum ChunkResult {
    Incomplete { next_offset: u64 },
    Complete(String),
}

#[async_trait]
impl Publisher for YouTubePublisher {
    fn name(&self) -> &str {
        "youtube"
    }

    async fn authorize(&self) -> Result<AccessToken, PublishError> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| PublishError::Auth(e.to_string()))?;

        let status = response.status();
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| PublishError::Auth(format!("token endpoint returned {}: {}", status, e)))?;

        match token.access_token {
            Some(access) if status.is_success() => {
                debug!("Obtained YouTube access token");
                Ok(AccessToken(access))
            }
            _ => Err(PublishError::Auth(token.error_message())),
        }
    }

    async fn publish(
        &self,
        token: &AccessToken,
        request: &PublishRequest<'_>,
        progress: ProgressFn<'_>,
    ) -> Result<String, PublishError> {
        let mut file = File::open(request.file).await?;
        let total_bytes = file.metadata().await?.len();

        let session_url = self.start_session(token, request, total_bytes).await?;
        debug!(total_bytes, "Opened resumable upload session");

        let mut offset = 0u64;
        loop {
            file.seek(SeekFrom::Start(offset)).await?;
            let mut chunk = Vec::with_capacity(self.chunk_size);
            (&mut file)
                .take(self.chunk_size as u64)
                .read_to_end(&mut chunk)
                .await?;
            let sent = chunk.len() as u64;

            match self
                .put_chunk(&session_url, token, chunk, offset, total_bytes)
                .await?
            {
                ChunkResult::Complete(video_id) => {
                    progress(UploadProgress {
                        bytes_sent: total_bytes,
                        total_bytes,
                    });
                    info!(%video_id, "Upload complete");
                    return Ok(video_id);
                }
                ChunkResult::Incomplete { next_offset } => {
                    if sent == 0 || next_offset <= offset {
                        return Err(PublishError::Upload(format!(
                            "upload stalled at offset {} of {}",
                            offset, total_bytes
                        )));
                    }
                    offset = next_offset;
                    progress(UploadProgress {
                        bytes_sent: offset,
                        total_bytes,
                    });
                }
            }
        }
    }

    fn video_url(&self, video_id: &str) -> String {
        format!("https://youtu.be/{}", video_id)
    }
}

/// Last byte index from a `Range: bytes=0-12345` header
fn parse_range_end(header: &str) -> Option<u64> {
    header
        .trim()
        .strip_prefix("bytes=")?
        .split('-')
        .nth(1)?
        .trim()
        .parse()
        .ok()
}

fn video_mime(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        _ => "video/mp4",
    }
}

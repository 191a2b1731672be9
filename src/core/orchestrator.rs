//! Upload orchestrator.
//!
//! Drives each selected item through
//! `Select → Fetch → GenerateSeo → Publish → Archive → Advance → Done`
//! and decides, per failure, whether the cursor moves:
//!
//! | Failure            | Cursor                          | Run        |
//! |--------------------|---------------------------------|------------|
//! | fetch              | advanced (item skipped for good)| continues  |
//! | credential exchange| untouched                       | stops      |
//! | upload (`Retry`)   | untouched                       | stops      |
//! | upload (`Skip`)    | advanced                        | continues  |
//! | archive            | advanced                        | continues  |
//! | post-advance hook  | already advanced                | continues  |

use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{AdvanceHook, Fetcher, PublishRequest, Publisher, UploadProgress};
use crate::config::{PublishFailurePolicy, Settings};
use crate::domain::{ItemOutcome, RunSummary, SourceItem, Stage, Visibility};
use crate::seo;

use super::archive::archive_file;
use super::cursor::{Cursor, CursorError, CursorStore};
use super::source::{SourceError, SourceList};

/// Fatal run errors. Per-item failures are reported as [`ItemOutcome`]s.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Source list is empty, nothing to upload")]
    EmptySource,

    #[error(transparent)]
    Cursor(#[from] CursorError),
}

/// Run parameters taken from [`Settings`]
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub items_per_run: u32,
    /// Pause between consecutive items
    pub delay: Duration,
    pub visibility: Visibility,
    pub on_publish_failure: PublishFailurePolicy,
    pub download_dir: PathBuf,
    pub uploaded_dir: PathBuf,
}

impl RunOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            items_per_run: settings.items_per_run,
            delay: settings.delay,
            visibility: settings.visibility,
            on_publish_failure: settings.on_publish_failure,
            download_dir: settings.paths.download_dir.clone(),
            uploaded_dir: settings.paths.uploaded_dir.clone(),
        }
    }
}

/// Main upload orchestrator
pub struct Orchestrator<F, P> {
    fetcher: F,
    publisher: P,
    cursor_store: CursorStore,
    hook: Option<Box<dyn AdvanceHook>>,
    options: RunOptions,
}

impl<F: Fetcher, P: Publisher> Orchestrator<F, P> {
    /// Create a new orchestrator
    pub fn new(fetcher: F, publisher: P, cursor_store: CursorStore, options: RunOptions) -> Self {
        Self {
            fetcher,
            publisher,
            cursor_store,
            hook: None,
            options,
        }
    }

    /// Run `hook` after every persisted advance
    pub fn with_hook(mut self, hook: Box<dyn AdvanceHook>) -> Self {
        self.hook = Some(hook);
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn cursor_store(&self) -> &CursorStore {
        &self.cursor_store
    }

    /// Process up to `items_per_run` items from `source`.
    ///
    /// The list is resolved once and not re-read between items. A credential
    /// failure, or an upload failure that left the cursor in place, ends the
    /// run early; the next invocation is the retry.
    #[instrument(skip_all, fields(run_id = %Uuid::new_v4()))]
    pub async fn run(&self, source: &SourceList) -> Result<RunSummary, RunError> {
        info!(
            source = %source.describe(),
            fetcher = self.fetcher.name(),
            publisher = self.publisher.name(),
            items_per_run = self.options.items_per_run,
            "Upload run started"
        );

        let items = source.resolve(&self.fetcher).await?;
        if items.is_empty() {
            return Err(RunError::EmptySource);
        }

        let mut summary = RunSummary::default();
        for attempt in 0..self.options.items_per_run {
            if attempt > 0 && !self.options.delay.is_zero() {
                tokio::time::sleep(self.options.delay).await;
            }

            let outcome = self.process_next(&items).await?;
            let stop_reason = match &outcome {
                ItemOutcome::Aborted { .. } => Some("credential failure"),
                ItemOutcome::Failed {
                    next_index: None, ..
                } => Some("upload failure, item kept for the next run"),
                _ => None,
            };
            summary.outcomes.push(outcome);

            if let Some(reason) = stop_reason {
                warn!(reason, "Stopping run");
                break;
            }
        }

        info!(
            published = summary.published(),
            skipped = summary.skipped(),
            failed = summary.failures(),
            "Upload run finished"
        );
        Ok(summary)
    }

    /// Push the item under the cursor through the whole state machine
    #[instrument(skip_all, fields(items = items.len()))]
    pub async fn process_next(&self, items: &[SourceItem]) -> Result<ItemOutcome, RunError> {
        // Select
        let cursor = self.cursor_store.load()?;
        let index = cursor.select(items.len()).map_err(|e| match e {
            CursorError::EmptyList => RunError::EmptySource,
            other => RunError::Cursor(other),
        })?;
        let item = items[index].clone();
        info!(stage = %Stage::Select, index, item = %item.id, "Selected item");

        // Fetch
        let video = match self.fetcher.fetch(&item, &self.options.download_dir).await {
            Ok(video) => {
                info!(
                    stage = %Stage::Fetch,
                    item = %item.id,
                    path = %video.path.display(),
                    "Downloaded video"
                );
                video
            }
            Err(e) => {
                error!(
                    stage = %Stage::Fetch,
                    item = %item.id,
                    error = %e,
                    "Download failed, skipping item"
                );
                let next_index = self.advance(&cursor, items.len()).await?;
                return Ok(ItemOutcome::Skipped {
                    item,
                    index,
                    error: e.to_string(),
                    next_index,
                });
            }
        };

        // Generate SEO
        let metadata = seo::generate(&video.caption);
        info!(stage = %Stage::GenerateSeo, title = %metadata.title, "Generated title");
        info!(stage = %Stage::GenerateSeo, tags = ?metadata.tags, "Generated tags");

        // Publish
        let token = match self.publisher.authorize().await {
            Ok(token) => token,
            Err(e) => {
                error!(
                    stage = %Stage::Publish,
                    item = %item.id,
                    error = %e,
                    "Publisher authorization failed"
                );
                return Ok(ItemOutcome::Aborted {
                    item,
                    index,
                    error: e.to_string(),
                });
            }
        };

        let request = PublishRequest {
            file: &video.path,
            title: &metadata.title,
            description: &metadata.description,
            tags: &metadata.tags,
            visibility: self.options.visibility,
        };

        let last_percent = AtomicU8::new(u8::MAX);
        let progress = |p: UploadProgress| {
            let percent = p.percent();
            if last_percent.swap(percent, Ordering::Relaxed) != percent {
                info!(stage = %Stage::Publish, percent, "Upload progress");
            }
        };

        let video_id = match self.publisher.publish(&token, &request, &progress).await {
            Ok(video_id) => {
                info!(
                    stage = %Stage::Publish,
                    item = %item.id,
                    %video_id,
                    url = %self.publisher.video_url(&video_id),
                    "Uploaded video"
                );
                video_id
            }
            Err(e) => {
                error!(stage = %Stage::Publish, item = %item.id, error = %e, "Upload failed");
                let next_index = match self.options.on_publish_failure {
                    PublishFailurePolicy::Skip => Some(self.advance(&cursor, items.len()).await?),
                    PublishFailurePolicy::Retry => {
                        info!(item = %item.id, "Cursor left in place for the next run");
                        None
                    }
                };
                return Ok(ItemOutcome::Failed {
                    item,
                    index,
                    error: e.to_string(),
                    next_index,
                });
            }
        };

        // Archive
        let archived = match archive_file(&video.path, &self.options.uploaded_dir).await {
            Ok(dest) => {
                info!(stage = %Stage::Archive, dest = %dest.display(), "Moved uploaded file");
                true
            }
            Err(e) => {
                warn!(
                    stage = %Stage::Archive,
                    item = %item.id,
                    error = %e,
                    "Failed to archive uploaded file"
                );
                false
            }
        };

        // Advance
        let next_index = self.advance(&cursor, items.len()).await?;

        info!(stage = %Stage::Done, item = %item.id, "Item published");
        Ok(ItemOutcome::Published {
            item,
            index,
            video_id,
            archived,
            next_index,
        })
    }

    /// Persist the advanced cursor, then run the hook
    async fn advance(&self, cursor: &Cursor, len: usize) -> Result<u64, RunError> {
        let next = cursor.advance(len)?;
        self.cursor_store.save(&next)?;
        info!(stage = %Stage::Advance, next_index = next.next_index, "Updated cursor");

        if let Some(hook) = &self.hook {
            if let Err(e) = hook
                .after_advance(self.cursor_store.path(), next.next_index)
                .await
            {
                warn!(hook = hook.name(), error = %e, "Post-advance hook failed");
            }
        }

        Ok(next.next_index)
    }
}

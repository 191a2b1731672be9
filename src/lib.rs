//! reposter - republish short Instagram videos to YouTube
//!
//! Each invocation picks the next item from an ordered source list,
//! downloads the video, builds a title, description and tags from its
//! caption, uploads it, and moves a persisted cursor forward so the next
//! run continues where this one stopped.
//!
//! # Modules
//!
//! - `seo`: Caption sanitizing and metadata generation
//! - `core`: Cursor store, source resolution and the upload orchestrator
//! - `adapters`: yt-dlp fetcher, YouTube publisher, git commit hook
//! - `domain`: Items and per-item outcomes
//! - `config`: Layered settings (config file, `.env`, environment)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Upload the next item
//! reposter run
//!
//! # Show where the cursor points
//! reposter status --list
//!
//! # Preview metadata for a caption
//! echo "Sunset #travel" | reposter seo
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod logging;
pub mod seo;

pub use crate::core::{CursorStore, Orchestrator, RunOptions, SourceList};
pub use config::Settings;
pub use domain::{ItemOutcome, RunSummary, SourceItem};
pub use seo::{generate, sanitize, SeoMetadata};

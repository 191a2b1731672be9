//! Core upload logic.
//!
//! This module contains:
//! - Cursor: Persistent position in the source list
//! - Source: Resolving the ordered list of items
//! - Archive: Moving published files aside
//! - Lock: Single-run guard around the state file
//! - Orchestrator: Per-item state machine

pub mod archive;
pub mod cursor;
pub mod lock;
pub mod orchestrator;
pub mod source;

pub use archive::{archive_file, ArchiveError};
pub use cursor::{Cursor, CursorError, CursorStore};
pub use lock::{LockError, RunLock};
pub use orchestrator::{Orchestrator, RunError, RunOptions};
pub use source::{parse_queue, SourceError, SourceList};

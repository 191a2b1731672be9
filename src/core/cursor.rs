//! Durable cursor into the ordered source list.
//!
//! The state file is a small JSON document holding `next_index`. Keys this
//! crate does not know about are carried through every save untouched.
//!
//! Writes go to a temp file in the same directory which is synced and then
//! renamed over the target, so readers see either the old or the new
//! document, never a truncated one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from reading or writing the state file
#[derive(Debug, Error)]
pub enum CursorError {
    #[error("Failed to read state file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to write state file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("State file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("Cannot advance over an empty source list")]
    EmptyList,
}

/// Persisted pointer to the next item to process
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(default)]
    pub next_index: u64,

    /// Unrecognized keys, preserved across saves
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Cursor {
    pub fn new(next_index: u64) -> Self {
        Self {
            next_index,
            extra: serde_json::Map::new(),
        }
    }

    /// Index into a list of `len` items. Self-heals when the list shrank.
    pub fn select(&self, len: usize) -> Result<usize, CursorError> {
        if len == 0 {
            return Err(CursorError::EmptyList);
        }
        Ok((self.next_index % len as u64) as usize)
    }

    /// Cursor pointing one past the current item, wrapping at `len`
    pub fn advance(&self, len: usize) -> Result<Cursor, CursorError> {
        let current = self.select(len)? as u64;
        Ok(Cursor {
            next_index: (current + 1) % len as u64,
            extra: self.extra.clone(),
        })
    }
}

/// File-backed cursor store
#[derive(Debug, Clone)]
pub struct CursorStore {
    path: PathBuf,
}

impl CursorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the cursor, creating `{"next_index": 0}` on first use
    pub fn load(&self) -> Result<Cursor, CursorError> {
        if !self.path.exists() {
            let cursor = Cursor::default();
            self.save(&cursor)?;
            info!(path = %self.path.display(), "Initialized state file");
            return Ok(cursor);
        }

        let content = fs::read_to_string(&self.path).map_err(|source| CursorError::Read {
            path: self.path.clone(),
            source,
        })?;

        let cursor: Cursor =
            serde_json::from_str(&content).map_err(|source| CursorError::Parse {
                path: self.path.clone(),
                source,
            })?;

        debug!(next_index = cursor.next_index, "Loaded cursor");
        Ok(cursor)
    }

    /// Atomically replace the whole state document
    pub fn save(&self, cursor: &Cursor) -> Result<(), CursorError> {
        self.write_atomic(cursor).map_err(|source| CursorError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn write_atomic(&self, cursor: &Cursor) -> io::Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut content = serde_json::to_string_pretty(cursor).map_err(io::Error::from)?;
        content.push('\n');

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;

        Ok(())
    }
}

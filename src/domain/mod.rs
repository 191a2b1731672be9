//! Domain types for the reposter.
//!
//! - Item: source posts, fetched files, visibility
//! - Outcome: per-item stages and run results

pub mod item;
pub mod outcome;

// Re-export commonly used types
pub use item::{FetchedVideo, SourceItem, Visibility};
pub use outcome::{ItemOutcome, RunSummary, Stage};

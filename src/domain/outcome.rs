//! Per-item stages and outcomes of an upload run.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::item::SourceItem;

/// Stage of the per-item state machine.
///
/// ```text
/// Select → Fetch → GenerateSeo → Publish → Archive → Advance → Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Select,
    Fetch,
    GenerateSeo,
    Publish,
    Archive,
    Advance,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Select => "select",
            Stage::Fetch => "fetch",
            Stage::GenerateSeo => "generate_seo",
            Stage::Publish => "publish",
            Stage::Archive => "archive",
            Stage::Advance => "advance",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// What happened to one selected item
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    /// Uploaded; cursor advanced
    Published {
        item: SourceItem,
        index: usize,
        video_id: String,
        /// False when the local file could not be moved to the archive
        archived: bool,
        next_index: u64,
    },

    /// Fetch failed; cursor advanced past the item
    Skipped {
        item: SourceItem,
        index: usize,
        error: String,
        next_index: u64,
    },

    /// Upload failed; `next_index` is `Some` only if the cursor moved on
    Failed {
        item: SourceItem,
        index: usize,
        error: String,
        next_index: Option<u64>,
    },

    /// Credential exchange failed; cursor untouched, run stopped
    Aborted {
        item: SourceItem,
        index: usize,
        error: String,
    },
}

impl ItemOutcome {
    pub fn item(&self) -> &SourceItem {
        match self {
            Self::Published { item, .. }
            | Self::Skipped { item, .. }
            | Self::Failed { item, .. }
            | Self::Aborted { item, .. } => item,
        }
    }

    /// Stage the item stopped at
    pub fn stage(&self) -> Stage {
        match self {
            Self::Published { .. } => Stage::Done,
            Self::Skipped { .. } => Stage::Fetch,
            Self::Failed { .. } | Self::Aborted { .. } => Stage::Publish,
        }
    }

    pub fn is_published(&self) -> bool {
        matches!(self, Self::Published { .. })
    }

    /// Failed or aborted outcomes need attention; skips do not
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Aborted { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Published { .. } => "published",
            Self::Skipped { .. } => "skipped",
            Self::Failed { .. } => "failed",
            Self::Aborted { .. } => "aborted",
        }
    }
}

/// Outcomes of one invocation, in processing order
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub outcomes: Vec<ItemOutcome>,
}

impl RunSummary {
    pub fn published(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_published()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, ItemOutcome::Skipped { .. }))
            .count()
    }

    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failure()).count()
    }

    /// True if any item failed or the run was aborted
    pub fn has_failures(&self) -> bool {
        self.failures() > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary {
            outcomes: vec![
                ItemOutcome::Published {
                    item: SourceItem::new("A"),
                    index: 0,
                    video_id: "vid".to_string(),
                    archived: true,
                    next_index: 1,
                },
                ItemOutcome::Skipped {
                    item: SourceItem::new("B"),
                    index: 1,
                    error: "gone".to_string(),
                    next_index: 2,
                },
            ],
        };

        assert_eq!(summary.published(), 1);
        assert_eq!(summary.skipped(), 1);
        assert!(!summary.has_failures());
        assert_eq!(summary.outcomes[1].stage(), Stage::Fetch);
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&Stage::GenerateSeo).unwrap();
        assert_eq!(json, "\"generate_seo\"");
    }

    #[test]
    fn test_stage_display_pads_in_tables() {
        assert_eq!(format!("{:<8}|", Stage::Fetch), "fetch   |");
    }
}

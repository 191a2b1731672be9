//! Where the ordered item list comes from.
//!
//! Either the fetch collaborator lists a profile (oldest post first), or a
//! hand-maintained queue file names the items explicitly. The queue file
//! takes one item per line: a bare shortcode or a post URL. Blank lines and
//! `#` comments are ignored.

use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

use crate::adapters::ytdlp::shortcode_from_url;
use crate::adapters::{FetchError, Fetcher};
use crate::config::Settings;
use crate::domain::SourceItem;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to list profile posts: {0}")]
    Fetch(#[from] FetchError),

    #[error("Failed to read queue file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Configured origin of the source list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceList {
    /// Explicit item list on disk
    QueueFile(PathBuf),
    /// Every video post of a profile
    Profile(String),
}

impl SourceList {
    /// Queue file wins over the profile when both are set
    pub fn from_settings(settings: &Settings) -> Option<Self> {
        if let Some(path) = &settings.queue_file {
            return Some(Self::QueueFile(path.clone()));
        }
        settings.profile.clone().map(Self::Profile)
    }

    pub fn describe(&self) -> String {
        match self {
            Self::QueueFile(path) => format!("queue file {}", path.display()),
            Self::Profile(profile) => format!("profile @{}", profile),
        }
    }

    /// Resolve the ordered item list
    pub async fn resolve(&self, fetcher: &dyn Fetcher) -> Result<Vec<SourceItem>, SourceError> {
        let items = match self {
            Self::QueueFile(path) => {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|source| SourceError::Read {
                        path: path.clone(),
                        source,
                    })?;
                parse_queue(&content)
            }
            Self::Profile(profile) => fetcher.list_items(profile).await?,
        };

        info!(source = %self.describe(), count = items.len(), "Resolved source list");
        Ok(items)
    }
}

/// Parse a queue file body into items, keeping file order
pub fn parse_queue(content: &str) -> Vec<SourceItem> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or_default().trim())
        .filter(|line| !line.is_empty())
        .map(|line| {
            if line.contains('/') {
                shortcode_from_url(line).unwrap_or_else(|| line.to_string())
            } else {
                line.to_string()
            }
        })
        .map(SourceItem::new)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_queue() {
        let content = "\
# uploads, oldest first
AAA
https://www.instagram.com/p/BBB/   # trailing comment

  CCC  
";
        let ids: Vec<String> = parse_queue(content).into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["AAA", "BBB", "CCC"]);
    }

    #[test]
    fn test_parse_empty_queue() {
        assert!(parse_queue("# nothing yet\n\n").is_empty());
    }
}

//! Commits the state file after each cursor advance.
//!
//! Scheduled CI runs start from a fresh checkout, so the cursor only
//! survives between runs if it is committed back to the repository.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use chrono::Utc;
use tokio::process::Command;
use tracing::{debug, info};

use super::{AdvanceHook, HookError};

/// Post-advance hook running `git add`, `git commit` and optionally `git push`
pub struct GitCommitHook {
    /// Repository working directory
    repo_dir: PathBuf,

    /// Push after committing
    push: bool,

    binary_path: String,
}

impl GitCommitHook {
    pub fn new(repo_dir: impl Into<PathBuf>, push: bool) -> Self {
        Self {
            repo_dir: repo_dir.into(),
            push,
            binary_path: "git".to_string(),
        }
    }

    /// Use a custom git binary
    pub fn with_binary_path(mut self, binary_path: impl Into<String>) -> Self {
        self.binary_path = binary_path.into();
        self
    }

    async fn git(&self, args: &[&str]) -> Result<String, HookError> {
        debug!(args = ?args, "Running git");

        let output = Command::new(&self.binary_path)
            .args(args)
            .current_dir(&self.repo_dir)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| HookError::Spawn {
                program: self.binary_path.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(HookError::Command {
                command: format!("git {}", args.join(" ")),
                stderr: format!("{}{}", stdout.trim(), stderr.trim()),
            });
        }

        Ok(stdout)
    }
}

/// Commit message for a cursor update
pub fn commit_message(next_index: u64) -> String {
    format!(
        "Update upload state: next_index={} [{}]",
        next_index,
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    )
}

#[async_trait]
impl AdvanceHook for GitCommitHook {
    fn name(&self) -> &str {
        "git-commit"
    }

    async fn after_advance(&self, state_file: &Path, next_index: u64) -> Result<(), HookError> {
        let state = state_file.to_string_lossy().to_string();
        self.git(&["add", "--", &state]).await?;

        let staged = self
            .git(&["diff", "--cached", "--name-only", "--", &state])
            .await?;
        if staged.trim().is_empty() {
            debug!("State file unchanged, nothing to commit");
            return Ok(());
        }

        let message = commit_message(next_index);
        self.git(&["commit", "-m", &message, "--", &state]).await?;
        info!(next_index, "Committed state file");

        if self.push {
            self.git(&["push"]).await?;
            info!("Pushed state commit");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_commit_message_mentions_index() {
        assert!(commit_message(4).starts_with("Update upload state: next_index=4"));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let temp = TempDir::new().unwrap();
        let hook = GitCommitHook::new(temp.path(), false).with_binary_path("/nonexistent/git");
        let result = hook
            .after_advance(&temp.path().join("state.json"), 1)
            .await;
        assert!(matches!(result, Err(HookError::Spawn { .. })));
    }
}

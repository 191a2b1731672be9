//! Command-line interface for reposter.
//!
//! Provides commands for running an upload pass, inspecting and resetting
//! the cursor, previewing generated metadata, and obtaining a refresh token.

use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::adapters::{GitCommitHook, YouTubePublisher, YtDlpFetcher};
use crate::config::Settings;
use crate::core::{
    Cursor, CursorError, CursorStore, Orchestrator, RunLock, RunOptions, SourceList,
};
use crate::domain::{ItemOutcome, RunSummary};
use crate::logging;
use crate::seo;

/// reposter - Republish short videos to YouTube, one item per step
#[derive(Parser, Debug)]
#[command(name = "reposter")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload the next item(s) under the cursor
    Run {
        /// Items to process this run (overrides UPLOAD_COUNT)
        #[arg(short, long)]
        count: Option<u32>,
    },

    /// Show the cursor position
    Status {
        /// Resolve the source list and mark the next item
        #[arg(short, long)]
        list: bool,
    },

    /// Print generated title, description and tags as JSON
    Seo {
        /// Caption file (reads from stdin if not provided)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Point the cursor at a specific index
    Reset {
        /// New value for next_index
        #[arg(default_value = "0")]
        index: u64,
    },

    /// Show resolved configuration (secrets redacted)
    Config,

    /// Obtain a YouTube refresh token interactively
    Authorize {
        /// OAuth client id
        #[arg(long, env = "YT_CLIENT_ID")]
        client_id: String,

        /// OAuth client secret
        #[arg(long, env = "YT_CLIENT_SECRET", hide_env_values = true)]
        client_secret: String,
    },
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run { count } => run_uploads(count).await,
            Commands::Status { list } => {
                logging::init(None)?;
                show_status(list).await
            }
            Commands::Seo { input } => preview_seo(input),
            Commands::Reset { index } => {
                logging::init(None)?;
                reset_cursor(index)
            }
            Commands::Config => show_config(),
            Commands::Authorize {
                client_id,
                client_secret,
            } => authorize(&client_id, &client_secret).await,
        }
    }
}

/// A validated run, ready to start
pub struct PreparedRun {
    pub orchestrator: Orchestrator<YtDlpFetcher, YouTubePublisher>,
    pub source: SourceList,
    /// Held until the run finishes
    pub lock: RunLock,
}

/// Validate `settings` and build the orchestrator.
///
/// Nothing is written next to the state file unless validation passes.
pub fn prepare_run(settings: &Settings) -> Result<PreparedRun> {
    let credentials = settings.validate_for_run()?;
    let source = SourceList::from_settings(settings).context("No source configured")?;

    let lock = RunLock::acquire(&settings.paths.state_file)?;

    let fetcher = YtDlpFetcher::new(
        settings.ytdlp_path.clone(),
        settings.source_credentials.clone(),
        settings.fetch_timeout,
    );
    let publisher = YouTubePublisher::new(credentials, settings.category_id.clone());

    let mut orchestrator = Orchestrator::new(
        fetcher,
        publisher,
        CursorStore::new(settings.paths.state_file.clone()),
        RunOptions::from_settings(settings),
    );
    if settings.hooks.commit_state {
        orchestrator = orchestrator.with_hook(Box::new(GitCommitHook::new(
            settings.paths.base_dir.clone(),
            settings.hooks.push,
        )));
    }

    Ok(PreparedRun {
        orchestrator,
        source,
        lock,
    })
}

/// Run one upload pass
async fn run_uploads(count: Option<u32>) -> Result<()> {
    let mut settings = Settings::load()?;
    if let Some(count) = count {
        settings.items_per_run = count;
    }

    // The log file is only opened for a valid configuration
    settings.validate_for_run()?;
    logging::init(Some(&settings.paths.log_file))?;

    let run = prepare_run(&settings)?;
    let summary = run.orchestrator.run(&run.source).await?;
    print_summary(&summary);

    if summary.has_failures() {
        drop(run.lock);
        std::process::exit(1);
    }

    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    println!(
        "{:<10} {:<13} {:<6} {:<16} DETAILS",
        "RESULT", "STAGE", "INDEX", "ITEM"
    );
    println!("{}", "-".repeat(86));

    for outcome in &summary.outcomes {
        let (index, details) = match outcome {
            ItemOutcome::Published {
                index,
                video_id,
                archived,
                next_index,
                ..
            } => {
                let note = if *archived { "" } else { " (not archived)" };
                (*index, format!("{} -> next {}{}", video_id, next_index, note))
            }
            ItemOutcome::Skipped {
                index,
                error,
                next_index,
                ..
            } => (*index, format!("{} -> next {}", error, next_index)),
            ItemOutcome::Failed {
                index,
                error,
                next_index,
                ..
            } => match next_index {
                Some(next) => (*index, format!("{} -> next {}", error, next)),
                None => (*index, format!("{} (will retry)", error)),
            },
            ItemOutcome::Aborted { index, error, .. } => (*index, error.clone()),
        };
        println!(
            "{:<10} {:<13} {:<6} {:<16} {}",
            outcome.label(),
            outcome.stage(),
            index,
            outcome.item().id,
            details
        );
    }

    println!();
    println!(
        "{} published, {} skipped, {} failed",
        summary.published(),
        summary.skipped(),
        summary.failures()
    );
}

/// Show the cursor and optionally the resolved list
async fn show_status(list: bool) -> Result<()> {
    let settings = Settings::load()?;
    let store = CursorStore::new(settings.paths.state_file.clone());

    let next_index = if store.path().exists() {
        store.load()?.next_index
    } else {
        0
    };

    println!("State file: {}", store.path().display());
    if !store.path().exists() {
        println!("  (not created yet)");
    }
    println!("Next index: {}", next_index);

    let Some(source) = SourceList::from_settings(&settings) else {
        println!("Source:     (not configured)");
        return Ok(());
    };
    println!("Source:     {}", source.describe());

    if !list {
        return Ok(());
    }

    let fetcher = YtDlpFetcher::new(
        settings.ytdlp_path.clone(),
        settings.source_credentials.clone(),
        settings.fetch_timeout,
    );
    let items = source.resolve(&fetcher).await?;
    if items.is_empty() {
        println!("\nSource list is empty");
        return Ok(());
    }

    let selected = Cursor::new(next_index).select(items.len())?;
    println!("\n{} items:", items.len());
    for (i, item) in items.iter().enumerate() {
        let marker = if i == selected { "->" } else { "  " };
        let posted = item
            .posted_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_default();
        println!("{} {:>4}  {:<16} {}", marker, i, item.id, posted);
    }

    Ok(())
}

/// Print metadata generated from a caption
fn preview_seo(input_file: Option<PathBuf>) -> Result<()> {
    let caption = if let Some(path) = input_file {
        std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read input file: {}", path.display()))?
    } else if !io::stdin().is_terminal() {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read from stdin")?;
        buffer
    } else {
        anyhow::bail!("No caption provided. Use --input <file> or pipe to stdin");
    };

    let metadata = seo::generate(&caption);
    println!("{}", serde_json::to_string_pretty(&metadata)?);
    Ok(())
}

/// Overwrite next_index, keeping any other keys in the state file
fn reset_cursor(index: u64) -> Result<()> {
    let settings = Settings::load()?;
    let _lock = RunLock::acquire(&settings.paths.state_file)?;
    let store = CursorStore::new(settings.paths.state_file.clone());

    let mut cursor = match store.load() {
        Ok(cursor) => cursor,
        Err(e @ CursorError::Parse { .. }) => {
            tracing::warn!(error = %e, "Replacing unreadable state file");
            Cursor::default()
        }
        Err(e) => return Err(e.into()),
    };
    let previous = cursor.next_index;
    cursor.next_index = index;
    store.save(&cursor)?;

    println!(
        "Cursor reset: {} -> {} ({})",
        previous,
        index,
        store.path().display()
    );
    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let settings = Settings::load()?;
    let set = |v: &Option<String>| if v.is_some() { "(set)" } else { "(not set)" };

    let config_file = settings
        .config_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none - using defaults)".to_string());
    let queue_file = settings
        .queue_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(not set)".to_string());
    let login = settings
        .source_credentials
        .as_ref()
        .map(|c| c.username.as_str())
        .unwrap_or("(guest)");

    println!("Config file: {}", config_file);
    println!();
    println!("Source:");
    println!(
        "  Profile:        {}",
        settings.profile.as_deref().unwrap_or("(not set)")
    );
    println!("  Queue file:     {}", queue_file);
    println!("  Login:          {}", login);
    println!("  yt-dlp:         {}", settings.ytdlp_path);
    println!("  Timeout:        {}s", settings.fetch_timeout.as_secs());
    println!();
    println!("Publish:");
    println!(
        "  Client id:      {}",
        settings.publish_client_id.as_deref().unwrap_or("(not set)")
    );
    println!("  Client secret:  {}", set(&settings.publish_client_secret));
    println!("  Refresh token:  {}", set(&settings.publish_refresh_token));
    println!("  Visibility:     {}", settings.visibility);
    println!("  Category:       {}", settings.category_id);
    println!();
    println!("Run:");
    println!("  Items per run:  {}", settings.items_per_run);
    println!("  Delay:          {}s", settings.delay.as_secs());
    println!("  Publish failure: {:?}", settings.on_publish_failure);
    println!();
    println!("Paths:");
    println!("  State file:     {}", settings.paths.state_file.display());
    println!("  Downloads:      {}", settings.paths.download_dir.display());
    println!("  Uploaded:       {}", settings.paths.uploaded_dir.display());
    println!("  Log file:       {}", settings.paths.log_file.display());
    println!();
    println!("Hooks:");
    println!("  Commit state:   {}", settings.hooks.commit_state);
    println!("  Push:           {}", settings.hooks.push);

    Ok(())
}

/// Installed-app consent flow
async fn authorize(client_id: &str, client_secret: &str) -> Result<()> {
    let url = YouTubePublisher::authorization_url(client_id)?;

    println!("Open this URL in a browser and grant access:");
    println!();
    println!("  {}", url);
    println!();
    println!("After approving, the browser is redirected to http://localhost/?code=...");
    print!("Paste the code parameter here: ");
    io::stdout().flush()?;

    let mut code = String::new();
    io::stdin()
        .lock()
        .read_line(&mut code)
        .context("Failed to read authorization code")?;
    let code = code.trim();
    if code.is_empty() {
        anyhow::bail!("No authorization code entered");
    }

    let refresh_token = YouTubePublisher::exchange_code(client_id, client_secret, code).await?;

    println!();
    println!("Refresh token: {}", refresh_token);
    println!();
    println!("Store it as YT_REFRESH_TOKEN, next to YT_CLIENT_ID and YT_CLIENT_SECRET.");
    Ok(())
}

//! Configuration for reposter.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (a `.env` file is loaded first, never overriding
//!    variables that are already set)
//! 2. Config file (.reposter/config.yaml, or the file named by REPOSTER_CONFIG)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .reposter/config.yaml
//! - Paths in the config file are relative to the directory holding .reposter/
//!
//! Secrets (passwords, client secret, refresh token) are read from the
//! environment only.
//!
//! Everything is resolved once into [`Settings`], which is then passed
//! explicitly to the orchestrator.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adapters::youtube::PublishCredentials;
use crate::adapters::ytdlp::SourceCredentials;
use crate::domain::Visibility;

/// Directory searched for in the current directory and its parents
pub const CONFIG_DIR: &str = ".reposter";
pub const CONFIG_FILE: &str = "config.yaml";

/// Configuration errors. All of them are fatal and raised before any state
/// is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Publish credentials missing. Set {}", .0.join(", "))]
    MissingCredentials(Vec<&'static str>),

    #[error("No source configured. Set TARGET_IG_USERNAME (source.profile) or REPOSTER_QUEUE_FILE (source.queue_file)")]
    MissingSource,

    #[error("items_per_run must be at least 1")]
    ZeroItems,

    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },

    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Failed to determine current directory: {0}")]
    CurrentDir(std::io::Error),
}

/// What to do with the cursor when an upload fails after a successful fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublishFailurePolicy {
    /// Leave the cursor so the next run retries the same item
    #[default]
    Retry,
    /// Advance past the item as if it had been published
    Skip,
}

impl FromStr for PublishFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retry" => Ok(Self::Retry),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown policy '{}' (expected retry or skip)", other)),
        }
    }
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub publish: PublishConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub hooks: HooksConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    /// Profile to pull posts from
    pub profile: Option<String>,
    /// Login name for restricted profiles (password comes from the environment)
    pub login_username: Option<String>,
    /// Hand-maintained list of item ids, one per line
    pub queue_file: Option<String>,
    pub ytdlp_path: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PublishConfig {
    pub client_id: Option<String>,
    pub visibility: Option<Visibility>,
    pub category_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunConfig {
    pub items_per_run: Option<u32>,
    pub delay_seconds: Option<u64>,
    pub on_publish_failure: Option<PublishFailurePolicy>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    pub state_file: Option<String>,
    pub download_dir: Option<String>,
    pub uploaded_dir: Option<String>,
    pub log_file: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HooksConfig {
    /// Commit the state file after every advance
    #[serde(default)]
    pub commit_state: bool,
    /// Push after committing
    #[serde(default)]
    pub push: bool,
}

/// Resolved file locations
#[derive(Debug, Clone)]
pub struct PathSettings {
    /// Directory relative paths were resolved against
    pub base_dir: PathBuf,
    pub state_file: PathBuf,
    pub download_dir: PathBuf,
    pub uploaded_dir: PathBuf,
    pub log_file: PathBuf,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HookSettings {
    pub commit_state: bool,
    pub push: bool,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Settings {
    /// Profile to list posts from
    pub profile: Option<String>,
    pub source_credentials: Option<SourceCredentials>,
    /// Hand-maintained item list; takes precedence over profile listing
    pub queue_file: Option<PathBuf>,
    pub ytdlp_path: String,
    pub fetch_timeout: Duration,

    pub publish_client_id: Option<String>,
    pub publish_client_secret: Option<String>,
    pub publish_refresh_token: Option<String>,
    pub visibility: Visibility,
    pub category_id: String,

    pub items_per_run: u32,
    pub delay: Duration,
    pub on_publish_failure: PublishFailurePolicy,

    pub paths: PathSettings,
    pub hooks: HookSettings,

    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Settings {
    /// Load from the process environment and the discovered config file
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let cwd = std::env::current_dir().map_err(ConfigError::CurrentDir)?;
        let config_path = match std::env::var("REPOSTER_CONFIG") {
            Ok(explicit) => Some(PathBuf::from(explicit)),
            Err(_) => find_config_file(&cwd),
        };

        let (file, base_dir) = match &config_path {
            Some(path) => (load_config_file(path)?, config_base_dir(path)),
            None => (ConfigFile::default(), cwd),
        };

        let mut settings = Self::resolve(file, base_dir, |key| std::env::var(key).ok())?;
        settings.config_file = config_path;
        Ok(settings)
    }

    /// Merge a config file with environment lookups
    pub fn resolve<F>(file: ConfigFile, base_dir: PathBuf, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let profile = env("TARGET_IG_USERNAME")
            .or(file.source.profile)
            .map(|p| p.trim().trim_start_matches('@').to_string());

        let login_username = env("INSTAGRAM_LOGIN_USERNAME").or(file.source.login_username);
        let source_credentials = match (login_username, env("INSTAGRAM_LOGIN_PASSWORD")) {
            (Some(username), Some(password)) => Some(SourceCredentials { username, password }),
            _ => None,
        };

        let queue_file = env("REPOSTER_QUEUE_FILE")
            .map(PathBuf::from)
            .or_else(|| file.source.queue_file.map(|p| resolve_path(&base_dir, &p)));

        let visibility = match env("YT_PRIVACY_STATUS") {
            Some(value) => parse_value("YT_PRIVACY_STATUS", &value)?,
            None => file.publish.visibility.unwrap_or_default(),
        };

        let items_per_run = match env("UPLOAD_COUNT") {
            Some(value) => parse_value("UPLOAD_COUNT", &value)?,
            None => file.run.items_per_run.unwrap_or(1),
        };

        let delay_seconds = match env("REPOSTER_DELAY_SECONDS") {
            Some(value) => parse_value("REPOSTER_DELAY_SECONDS", &value)?,
            None => file.run.delay_seconds.unwrap_or(5),
        };

        let on_publish_failure = match env("REPOSTER_ON_PUBLISH_FAILURE") {
            Some(value) => parse_value("REPOSTER_ON_PUBLISH_FAILURE", &value)?,
            None => file.run.on_publish_failure.unwrap_or_default(),
        };

        let commit_state = match env("REPOSTER_COMMIT_STATE") {
            Some(value) => parse_bool("REPOSTER_COMMIT_STATE", &value)?,
            None => file.hooks.commit_state,
        };

        let path_or = |env_key: &str, configured: Option<String>, default: &str| -> PathBuf {
            match env(env_key) {
                Some(value) => PathBuf::from(value),
                None => resolve_path(&base_dir, configured.as_deref().unwrap_or(default)),
            }
        };

        let paths = PathSettings {
            state_file: path_or("REPOSTER_STATE_FILE", file.paths.state_file, "state.json"),
            download_dir: path_or("REPOSTER_DOWNLOAD_DIR", file.paths.download_dir, "downloads"),
            uploaded_dir: path_or(
                "REPOSTER_UPLOADED_DIR",
                file.paths.uploaded_dir,
                "uploaded_videos",
            ),
            log_file: path_or("REPOSTER_LOG_FILE", file.paths.log_file, "upload_log.txt"),
            base_dir: base_dir.clone(),
        };

        Ok(Self {
            profile,
            source_credentials,
            queue_file,
            ytdlp_path: env("YTDLP_PATH")
                .or(file.source.ytdlp_path)
                .unwrap_or_else(|| "yt-dlp".to_string()),
            fetch_timeout: Duration::from_secs(file.source.timeout_seconds.unwrap_or(600)),
            publish_client_id: env("YT_CLIENT_ID").or(file.publish.client_id),
            publish_client_secret: env("YT_CLIENT_SECRET"),
            publish_refresh_token: env("YT_REFRESH_TOKEN"),
            visibility,
            category_id: env("YT_CATEGORY_ID")
                .or(file.publish.category_id)
                .unwrap_or_else(|| "22".to_string()),
            items_per_run,
            delay: Duration::from_secs(delay_seconds),
            on_publish_failure,
            paths,
            hooks: HookSettings {
                commit_state,
                push: file.hooks.push,
            },
            config_file: None,
        })
    }

    /// Publish credentials, or the names of the missing variables
    pub fn publish_credentials(&self) -> Result<PublishCredentials, ConfigError> {
        match (
            &self.publish_client_id,
            &self.publish_client_secret,
            &self.publish_refresh_token,
        ) {
            (Some(client_id), Some(client_secret), Some(refresh_token)) => {
                Ok(PublishCredentials {
                    client_id: client_id.clone(),
                    client_secret: client_secret.clone(),
                    refresh_token: refresh_token.clone(),
                })
            }
            (id, secret, token) => {
                let mut missing = Vec::new();
                if id.is_none() {
                    missing.push("YT_CLIENT_ID");
                }
                if secret.is_none() {
                    missing.push("YT_CLIENT_SECRET");
                }
                if token.is_none() {
                    missing.push("YT_REFRESH_TOKEN");
                }
                Err(ConfigError::MissingCredentials(missing))
            }
        }
    }

    /// Everything `run` needs; checked before any state is touched
    pub fn validate_for_run(&self) -> Result<PublishCredentials, ConfigError> {
        let credentials = self.publish_credentials()?;
        if self.profile.is_none() && self.queue_file.is_none() {
            return Err(ConfigError::MissingSource);
        }
        if self.items_per_run == 0 {
            return Err(ConfigError::ZeroItems);
        }
        Ok(credentials)
    }
}

fn parse_value<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join(CONFIG_FILE);
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Directory relative config paths resolve against
fn config_base_dir(config_path: &Path) -> PathBuf {
    let parent = config_path.parent().unwrap_or(Path::new("."));
    if parent.file_name().map(|n| n == CONFIG_DIR).unwrap_or(false) {
        parent.parent().unwrap_or(Path::new(".")).to_path_buf()
    } else {
        parent.to_path_buf()
    }
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolve a path that may be relative to the config base directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("TARGET_IG_USERNAME", "@somecreator"),
            ("YT_CLIENT_ID", "id"),
            ("YT_CLIENT_SECRET", "secret"),
            ("YT_REFRESH_TOKEN", "token"),
        ]
    }

    #[test]
    fn test_defaults() {
        let settings =
            Settings::resolve(ConfigFile::default(), PathBuf::from("/work"), env_from(&full_env()))
                .unwrap();

        assert_eq!(settings.profile.as_deref(), Some("somecreator"));
        assert_eq!(settings.items_per_run, 1);
        assert_eq!(settings.visibility, Visibility::Public);
        assert_eq!(settings.delay, Duration::from_secs(5));
        assert_eq!(settings.on_publish_failure, PublishFailurePolicy::Retry);
        assert_eq!(settings.paths.state_file, PathBuf::from("/work/state.json"));
        assert_eq!(settings.paths.uploaded_dir, PathBuf::from("/work/uploaded_videos"));
        assert_eq!(settings.paths.log_file, PathBuf::from("/work/upload_log.txt"));
        assert!(settings.source_credentials.is_none());
        assert!(settings.validate_for_run().is_ok());
    }

    #[test]
    fn test_missing_credentials_are_named() {
        let settings = Settings::resolve(
            ConfigFile::default(),
            PathBuf::from("/work"),
            env_from(&[("TARGET_IG_USERNAME", "x"), ("YT_CLIENT_ID", "id")]),
        )
        .unwrap();

        match settings.validate_for_run() {
            Err(ConfigError::MissingCredentials(missing)) => {
                assert_eq!(missing, vec!["YT_CLIENT_SECRET", "YT_REFRESH_TOKEN"]);
            }
            other => panic!("expected missing credentials, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_source() {
        let env: Vec<_> = full_env()
            .into_iter()
            .filter(|(k, _)| *k != "TARGET_IG_USERNAME")
            .collect();
        let settings =
            Settings::resolve(ConfigFile::default(), PathBuf::from("/work"), env_from(&env))
                .unwrap();
        assert!(matches!(
            settings.validate_for_run(),
            Err(ConfigError::MissingSource)
        ));
    }

    #[test]
    fn test_zero_items_rejected() {
        let mut env = full_env();
        env.push(("UPLOAD_COUNT", "0"));
        let settings =
            Settings::resolve(ConfigFile::default(), PathBuf::from("/work"), env_from(&env))
                .unwrap();
        assert!(matches!(settings.validate_for_run(), Err(ConfigError::ZeroItems)));
    }

    #[test]
    fn test_invalid_env_value() {
        let mut env = full_env();
        env.push(("UPLOAD_COUNT", "two"));
        let result =
            Settings::resolve(ConfigFile::default(), PathBuf::from("/work"), env_from(&env));
        assert!(matches!(
            result,
            Err(ConfigError::InvalidValue { key, .. }) if key == "UPLOAD_COUNT"
        ));

        let mut env = full_env();
        env.push(("YT_PRIVACY_STATUS", "friends"));
        let result =
            Settings::resolve(ConfigFile::default(), PathBuf::from("/work"), env_from(&env));
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }

    #[test]
    fn test_source_credentials_need_both_halves() {
        let mut env = full_env();
        env.push(("INSTAGRAM_LOGIN_USERNAME", "me"));
        let settings =
            Settings::resolve(ConfigFile::default(), PathBuf::from("/work"), env_from(&env))
                .unwrap();
        assert!(settings.source_credentials.is_none());

        env.push(("INSTAGRAM_LOGIN_PASSWORD", "pw"));
        let settings =
            Settings::resolve(ConfigFile::default(), PathBuf::from("/work"), env_from(&env))
                .unwrap();
        assert_eq!(settings.source_credentials.unwrap().username, "me");
    }

    #[test]
    fn test_config_file_parsing_and_env_precedence() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();

        let config_path = config_dir.join(CONFIG_FILE);
        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(
            file,
            r#"
version: "1"
source:
  profile: fromfile
  queue_file: queue.txt
publish:
  visibility: unlisted
  category_id: "24"
run:
  items_per_run: 3
  delay_seconds: 0
  on_publish_failure: skip
paths:
  state_file: data/state.json
hooks:
  commit_state: true
  push: true
"#
        )
        .unwrap();

        let parsed = load_config_file(&config_path).unwrap();
        let base = config_base_dir(&config_path);
        assert_eq!(base, temp.path());

        let mut env = full_env();
        env.push(("UPLOAD_COUNT", "2"));
        let settings = Settings::resolve(parsed, base, env_from(&env)).unwrap();

        // Env wins over file
        assert_eq!(settings.profile.as_deref(), Some("somecreator"));
        assert_eq!(settings.items_per_run, 2);

        assert_eq!(settings.visibility, Visibility::Unlisted);
        assert_eq!(settings.category_id, "24");
        assert_eq!(settings.delay, Duration::ZERO);
        assert_eq!(settings.on_publish_failure, PublishFailurePolicy::Skip);
        assert_eq!(settings.queue_file, Some(temp.path().join("queue.txt")));
        assert_eq!(settings.paths.state_file, temp.path().join("data/state.json"));
        assert!(settings.hooks.commit_state);
        assert!(settings.hooks.push);
    }

    #[test]
    fn test_find_config_file_in_parent() {
        let temp = TempDir::new().unwrap();
        let config_dir = temp.path().join(CONFIG_DIR);
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join(CONFIG_FILE), "version: \"1\"\n").unwrap();

        let nested = temp.path().join("a").join("b");
        std::fs::create_dir_all(&nested).unwrap();

        assert_eq!(
            find_config_file(&nested),
            Some(config_dir.join(CONFIG_FILE))
        );
    }

    #[test]
    fn test_resolve_relative_path() {
        let base = PathBuf::from("/home/user/project");

        assert_eq!(
            resolve_path(&base, "./subdir"),
            PathBuf::from("/home/user/project/./subdir")
        );
        assert_eq!(
            resolve_path(&base, "/absolute/path"),
            PathBuf::from("/absolute/path")
        );
    }
}

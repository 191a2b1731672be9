//! Run Setup Integration Tests
//!
//! Configuration is validated before anything is written next to the
//! state file.

use std::collections::HashMap;
use std::path::Path;

use reposter::cli::prepare_run;
use reposter::config::{ConfigError, ConfigFile, Settings};
use reposter::core::RunLock;
use tempfile::TempDir;

fn settings(base: &Path, pairs: &[(&str, &str)]) -> Settings {
    let env: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Settings::resolve(ConfigFile::default(), base.to_path_buf(), move |key| {
        env.get(key).cloned()
    })
    .unwrap()
}

#[test]
fn test_missing_credentials_touch_nothing() {
    let temp = TempDir::new().unwrap();
    let settings = settings(temp.path(), &[("TARGET_IG_USERNAME", "somecreator")]);

    let err = prepare_run(&settings).err().unwrap();

    match err.downcast_ref::<ConfigError>() {
        Some(ConfigError::MissingCredentials(missing)) => {
            assert_eq!(
                missing,
                &vec!["YT_CLIENT_ID", "YT_CLIENT_SECRET", "YT_REFRESH_TOKEN"]
            );
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(!settings.paths.state_file.exists());
    assert!(!RunLock::path_for(&settings.paths.state_file).exists());
}

#[test]
fn test_missing_source_touches_nothing() {
    let temp = TempDir::new().unwrap();
    let settings = settings(
        temp.path(),
        &[
            ("YT_CLIENT_ID", "id"),
            ("YT_CLIENT_SECRET", "secret"),
            ("YT_REFRESH_TOKEN", "token"),
        ],
    );

    let err = prepare_run(&settings).err().unwrap();

    assert!(matches!(
        err.downcast_ref::<ConfigError>(),
        Some(ConfigError::MissingSource)
    ));
    assert!(!settings.paths.state_file.exists());
    assert!(!RunLock::path_for(&settings.paths.state_file).exists());
}

#[test]
fn test_valid_settings_take_the_lock_only() {
    let temp = TempDir::new().unwrap();
    let settings = settings(
        temp.path(),
        &[
            ("TARGET_IG_USERNAME", "somecreator"),
            ("YT_CLIENT_ID", "id"),
            ("YT_CLIENT_SECRET", "secret"),
            ("YT_REFRESH_TOKEN", "token"),
        ],
    );

    let run = prepare_run(&settings).unwrap();

    assert_eq!(run.lock.path(), RunLock::path_for(&settings.paths.state_file));
    assert!(!settings.paths.state_file.exists());
    assert!(prepare_run(&settings).is_err());
}

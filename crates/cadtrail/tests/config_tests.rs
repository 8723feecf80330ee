//! Configuration integration tests.
//!
//! Tests for configuration loading, merging, and resolution.

use cadtrail_core::config::Config;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

/// Test that config loads from the project directory.
#[tokio::test]
async fn test_load_project_config() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    fs::write(
        temp.path().join("cadtrail.json"),
        r#"{ "poll_interval_ms": 500, "max_snapshots": 20 }"#,
    )
    .expect("Failed to write config");

    let (config, sources) = Config::load(Some(temp.path()))
        .await
        .expect("Failed to load config");

    assert_eq!(config.poll_interval_ms, Some(500));
    assert_eq!(config.max_snapshots, Some(20));
    assert!(sources.contains(&temp.path().join("cadtrail.json")));
}

/// Test that JSONC comments are handled.
#[tokio::test]
async fn test_load_jsonc_config() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    let config_content = r#"{
        // Poll faster on this machine
        "poll_interval_ms": 250,
        /* keep fewer snapshots */
        "max_snapshots": 5
    }"#;
    fs::write(temp.path().join("cadtrail.jsonc"), config_content)
        .expect("Failed to write config");

    let (config, _) = Config::load(Some(temp.path()))
        .await
        .expect("Failed to load config");

    assert_eq!(config.poll_interval_ms, Some(250));
    assert_eq!(config.max_snapshots, Some(5));
}

/// Test that resolution fills defaults and honors overrides.
#[tokio::test]
async fn test_resolve_settings() {
    let temp = TempDir::new().expect("Failed to create temp dir");

    fs::write(
        temp.path().join("cadtrail.json"),
        format!(
            r#"{{ "poll_interval_ms": 2000, "auto_snapshot_threshold": 25, "data_dir": {:?} }}"#,
            temp.path().join("data")
        ),
    )
    .expect("Failed to write config");

    let (config, _) = Config::load(Some(temp.path())).await.unwrap();
    let settings = config.resolve().expect("Failed to resolve config");

    assert_eq!(settings.poll_interval, Duration::from_millis(2000));
    assert_eq!(settings.auto_snapshot_threshold, 25);
    assert_eq!(settings.data_dir, temp.path().join("data"));
    assert_eq!(settings.legacy_dir, temp.path().join("data").join("legacy"));
}

/// Test that an invalid file is reported with its path.
#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let temp = TempDir::new().expect("Failed to create temp dir");
    fs::write(temp.path().join("cadtrail.json"), "{ not json").unwrap();

    let err = Config::load(Some(temp.path())).await.unwrap_err();
    assert!(err.to_string().contains("cadtrail.json"));
}

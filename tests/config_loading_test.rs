//! Config loading: file formats, environment overrides and validation

use std::fs;
use tempfile::TempDir;

use tplsync::config::Config;
use tplsync::error::SyncError;
use tplsync::strategies::ConflictStrategy;

#[test]
fn test_toml_config_overrides_defaults() {
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("config.toml");
	fs::write(
		&path,
		r#"
includeDirs = ["commands", "agents"]
excludePatterns = ["*.bak"]
conflictStrategy = "keep_local"
renameThreshold = 0.9
"#,
	)
	.unwrap();

	let config = Config::load(&path).unwrap();
	assert_eq!(config.include_dirs, vec!["commands", "agents"]);
	assert_eq!(config.exclude_patterns, vec!["*.bak"]);
	assert_eq!(config.conflict_strategy, ConflictStrategy::KeepLocal);
	assert_eq!(config.rename_threshold, 0.9);
	// Untouched keys keep their defaults
	assert_eq!(config.max_retries, Config::default().max_retries);
	config.validate().unwrap();
}

#[test]
fn test_json5_config_with_comments() {
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("config.json5");
	fs::write(
		&path,
		r#"{
	// stricter locking for shared machines
	lockTimeoutMs: 60000,
	dryRun: true,
}"#,
	)
	.unwrap();

	let config = Config::load(&path).unwrap();
	assert_eq!(config.lock_timeout_ms, 60_000);
	assert!(config.dry_run);
}

#[test]
fn test_environment_beats_file() {
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("config.json");
	fs::write(&path, r#"{"maxRetries": 5, "conflictStrategy": "skip"}"#).unwrap();

	let mut config = Config::load(&path).unwrap();
	config
		.apply_env_from(vec![
			("TPLSYNC_MAX_RETRIES".to_string(), "2".to_string()),
			("TPLSYNC_CONFLICT_STRATEGY".to_string(), "use-source".to_string()),
			("UNRELATED".to_string(), "x".to_string()),
		])
		.unwrap();
	assert_eq!(config.max_retries, 2);
	assert_eq!(config.conflict_strategy, ConflictStrategy::UseSource);
}

#[test]
fn test_invalid_values_rejected() {
	let dir = TempDir::new().unwrap();
	let path = dir.path().join("config.json");
	fs::write(&path, r#"{"renameThreshold": 1.5}"#).unwrap();

	let config = Config::load(&path).unwrap();
	assert!(matches!(config.validate(), Err(SyncError::InvalidConfig { .. })));

	let broken = dir.path().join("broken.toml");
	fs::write(&broken, "renameThreshold = [").unwrap();
	assert!(matches!(Config::load(&broken), Err(SyncError::InvalidConfig { .. })));
}

// vim: ts=4

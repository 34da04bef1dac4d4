//! Unified configuration for tplsync
//!
//! One `Config` value is built per run and passed to every component.
//!
//! The configuration follows a priority chain:
//! 1. Built-in defaults (Config::default())
//! 2. Config file (config.toml, config.json or config.json5)
//! 3. Environment variables (TPLSYNC_* prefix)
//! 4. CLI flags (highest priority, applied by the caller)

use crate::error::SyncError;
use crate::strategies::ConflictStrategy;
use crate::validation;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for overrides
pub const ENV_PREFIX: &str = "TPLSYNC_";

// ============================================================================
// MAIN CONFIGURATION STRUCT
// ============================================================================

/// Unified configuration for detection, classification, locking and execution
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	// ========================================================================
	// STATE
	// ========================================================================
	/// Home directory for tplsync state (~/.tplsync)
	pub state_dir: PathBuf,

	/// Lock directory (defaults to <state_dir>/locks)
	pub lock_dir: Option<PathBuf>,

	/// Snapshot directory (defaults to <state_dir>/backups)
	pub backup_dir: Option<PathBuf>,

	// ========================================================================
	// SCANNING
	// ========================================================================
	/// Top-level subdirectories to scan (empty = whole root)
	pub include_dirs: Vec<String>,

	/// Glob patterns to exclude from detection (e.g., "node_modules/**", "*.log")
	pub exclude_patterns: Vec<String>,

	/// Honor a .tplsyncignore file at the scan root
	pub respect_ignore_file: bool,

	/// Bounded worker count for metadata, hashing and comparisons (0 = CPU count)
	pub concurrency: usize,

	// ========================================================================
	// COMPARISON
	// ========================================================================
	/// Ignore mtime differences up to this many milliseconds
	pub mtime_tolerance_ms: u64,

	/// Compare content when mtimes differ
	pub content_compare: bool,

	/// Binary files at or above this size are sampled instead of hashed
	pub large_binary_threshold: u64,

	/// Number of windows sampled from large binaries
	pub sample_count: usize,

	/// Size of each sampled window in bytes
	pub sample_size: usize,

	// ========================================================================
	// CLASSIFICATION
	// ========================================================================
	/// Minimum similarity for a new/deleted pair to become a move
	pub rename_threshold: f64,

	/// Cap on similarity evaluations during rename inference
	pub max_rename_comparisons: usize,

	/// Window within which two modifications of one path conflict
	pub conflict_window_ms: u64,

	/// Glob patterns for files whose changes carry extra risk
	pub critical_patterns: Vec<String>,

	/// Glob patterns for configuration files (processed earlier)
	pub config_patterns: Vec<String>,

	/// Files above this size count as large for risk and hints
	pub large_file_bytes: u64,

	/// Files above this size are processed later
	pub priority_size_bytes: u64,

	/// Files above this size produce a validation warning
	pub warn_file_bytes: u64,

	// ========================================================================
	// LOCKING
	// ========================================================================
	/// Age after which a lock from a dead process may be reclaimed
	pub lock_timeout_ms: u64,

	/// Sleep between acquisition attempts
	pub lock_retry_interval_ms: u64,

	/// Give up acquiring after this long
	pub lock_max_wait_ms: u64,

	// ========================================================================
	// EXECUTION
	// ========================================================================
	/// Attempts per operation before it is recorded as failed
	pub max_retries: u32,

	/// Linear backoff unit between attempts
	pub retry_delay_ms: u64,

	/// Strategy for `conflict` operations
	pub conflict_strategy: ConflictStrategy,

	/// Plan only, do not touch the destination
	pub dry_run: bool,

	/// File names that must not be in use when a plan touches them
	pub critical_files: Vec<String>,

	/// Refuse to execute when any change is invalid
	pub block_on_invalid: bool,

	// ========================================================================
	// OUTPUT & LOGGING
	// ========================================================================
	/// Log level (trace, debug, info, warn, error)
	pub log_level: String,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			// State
			state_dir: std::env::var("HOME")
				.ok()
				.map(|h| PathBuf::from(h).join(".tplsync"))
				.unwrap_or_else(|| PathBuf::from(".tplsync")),
			lock_dir: None,
			backup_dir: None,

			// Scanning
			include_dirs: vec![],
			exclude_patterns: vec![
				"node_modules/**".to_string(),
				".git/**".to_string(),
				"*.log".to_string(),
			],
			respect_ignore_file: true,
			concurrency: 0,

			// Comparison
			mtime_tolerance_ms: 2000,
			content_compare: true,
			large_binary_threshold: 10 * 1024 * 1024,
			sample_count: 3,
			sample_size: 4096,

			// Classification
			rename_threshold: 0.8,
			max_rename_comparisons: 10_000,
			conflict_window_ms: 5000,
			critical_patterns: vec![
				"**/settings.json".to_string(),
				"**/settings.local.json".to_string(),
				"**/package.json".to_string(),
				"**/manifest.json".to_string(),
				"**/CLAUDE.md".to_string(),
				"**/.env*".to_string(),
			],
			config_patterns: vec![
				"**/*.json".to_string(),
				"**/*.toml".to_string(),
				"**/*.yaml".to_string(),
				"**/*.yml".to_string(),
				"**/*.ini".to_string(),
				"**/*.conf".to_string(),
				"**/*.cfg".to_string(),
			],
			large_file_bytes: 50 * 1024 * 1024,
			priority_size_bytes: 10 * 1024 * 1024,
			warn_file_bytes: 100 * 1024 * 1024,

			// Locking
			lock_timeout_ms: 30_000,
			lock_retry_interval_ms: 100,
			lock_max_wait_ms: 30_000,

			// Execution
			max_retries: 3,
			retry_delay_ms: 100,
			conflict_strategy: ConflictStrategy::Skip,
			dry_run: false,
			critical_files: vec![
				"settings.json".to_string(),
				"package.json".to_string(),
				"manifest.json".to_string(),
			],
			block_on_invalid: true,

			// Output
			log_level: "info".to_string(),
		}
	}
}

impl Config {
	/// Load a config file, choosing the parser by extension (.toml, .json, .json5)
	pub fn load(path: &Path) -> Result<Self, SyncError> {
		let contents = std::fs::read_to_string(path).map_err(|e| SyncError::InvalidConfig {
			message: format!("Cannot read {}: {}", path.display(), e),
		})?;

		let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
		let config: Config = match ext.as_str() {
			"toml" => toml::from_str(&contents).map_err(|e| SyncError::InvalidConfig {
				message: format!("{}: {}", path.display(), e),
			})?,
			"json" => serde_json::from_str(&contents).map_err(|e| SyncError::InvalidConfig {
				message: format!("{}: {}", path.display(), e),
			})?,
			"json5" => json5::from_str(&contents).map_err(|e| SyncError::InvalidConfig {
				message: format!("{}: {}", path.display(), e),
			})?,
			other => {
				return Err(SyncError::InvalidConfig {
					message: format!(
						"Unsupported config format '{}' for {} (use .toml, .json or .json5)",
						other,
						path.display()
					),
				})
			}
		};

		Ok(config)
	}

	/// Find and load `config.{toml,json,json5}` from the state directory, if any
	pub fn load_default() -> Result<Self, SyncError> {
		let defaults = Config::default();
		for name in ["config.toml", "config.json", "config.json5"] {
			let candidate = defaults.state_dir.join(name);
			if candidate.is_file() {
				return Config::load(&candidate);
			}
		}
		Ok(defaults)
	}

	/// Apply TPLSYNC_* environment variable overrides from the process environment
	pub fn apply_env(&mut self) -> Result<(), SyncError> {
		self.apply_env_from(std::env::vars())
	}

	/// Apply overrides from an explicit variable list
	pub fn apply_env_from<I>(&mut self, vars: I) -> Result<(), SyncError>
	where
		I: IntoIterator<Item = (String, String)>,
	{
		for (key, value) in vars {
			let Some(name) = key.strip_prefix(ENV_PREFIX) else {
				continue;
			};
			match name {
				"STATE_DIR" => self.state_dir = PathBuf::from(value),
				"LOCK_DIR" => self.lock_dir = Some(PathBuf::from(value)),
				"BACKUP_DIR" => self.backup_dir = Some(PathBuf::from(value)),
				"CONCURRENCY" => self.concurrency = parse_env(&key, &value)?,
				"MTIME_TOLERANCE_MS" => self.mtime_tolerance_ms = parse_env(&key, &value)?,
				"CONTENT_COMPARE" => self.content_compare = parse_env(&key, &value)?,
				"RENAME_THRESHOLD" => self.rename_threshold = parse_env(&key, &value)?,
				"LOCK_TIMEOUT_MS" => self.lock_timeout_ms = parse_env(&key, &value)?,
				"LOCK_MAX_WAIT_MS" => self.lock_max_wait_ms = parse_env(&key, &value)?,
				"MAX_RETRIES" => self.max_retries = parse_env(&key, &value)?,
				"CONFLICT_STRATEGY" => {
					self.conflict_strategy =
						value.parse().map_err(|e| SyncError::InvalidConfig { message: e })?
				}
				"DRY_RUN" => self.dry_run = parse_env(&key, &value)?,
				"LOG_LEVEL" => self.log_level = value,
				"EXCLUDE" => {
					self.exclude_patterns =
						value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
				}
				"INCLUDE_DIRS" => {
					self.include_dirs =
						value.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect()
				}
				_ => {}
			}
		}
		Ok(())
	}

	/// Check value ranges
	pub fn validate(&self) -> Result<(), SyncError> {
		validation::validate_threshold("renameThreshold", self.rename_threshold)?;
		validation::validate_retry_count(self.max_retries)?;
		validation::validate_timeout_ms("lockMaxWaitMs", self.lock_max_wait_ms)?;
		validation::validate_timeout_ms("lockTimeoutMs", self.lock_timeout_ms)?;
		validation::validate_sampling(self.sample_count, self.sample_size)?;
		Ok(())
	}

	/// Effective worker count for bounded fan-out
	pub fn effective_concurrency(&self) -> usize {
		if self.concurrency > 0 {
			return self.concurrency;
		}
		std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
	}

	/// Effective lock directory
	pub fn lock_dir(&self) -> PathBuf {
		self.lock_dir.clone().unwrap_or_else(|| self.state_dir.join("locks"))
	}

	/// Effective snapshot directory
	pub fn backup_dir(&self) -> PathBuf {
		self.backup_dir.clone().unwrap_or_else(|| self.state_dir.join("backups"))
	}

	/// Effective baseline directory
	pub fn baseline_dir(&self) -> PathBuf {
		self.state_dir.join("baselines")
	}

	pub fn mtime_tolerance(&self) -> Duration {
		Duration::from_millis(self.mtime_tolerance_ms)
	}

	pub fn lock_timeout(&self) -> Duration {
		Duration::from_millis(self.lock_timeout_ms)
	}

	pub fn lock_retry_interval(&self) -> Duration {
		Duration::from_millis(self.lock_retry_interval_ms)
	}

	pub fn lock_max_wait(&self) -> Duration {
		Duration::from_millis(self.lock_max_wait_ms)
	}

	pub fn retry_delay(&self) -> Duration {
		Duration::from_millis(self.retry_delay_ms)
	}
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SyncError> {
	value.trim().parse().map_err(|_| SyncError::InvalidConfig {
		message: format!("Cannot parse {}={:?}", key, value),
	})
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_config_default() {
		let config = Config::default();
		assert_eq!(config.mtime_tolerance_ms, 2000);
		assert_eq!(config.sample_count, 3);
		assert_eq!(config.sample_size, 4096);
		assert_eq!(config.max_retries, 3);
		assert_eq!(config.conflict_strategy, ConflictStrategy::Skip);
		assert!(config.content_compare);
		assert!(!config.dry_run);
		assert!(config.validate().is_ok());
	}

	#[test]
	fn test_config_serialization() {
		let config = Config::default();
		let json = serde_json::to_string(&config).expect("Failed to serialize");
		assert!(json.contains("mtimeToleranceMs"));
		let deserialized: Config = serde_json::from_str(&json).expect("Failed to deserialize");
		assert_eq!(config.rename_threshold, deserialized.rename_threshold);
		assert_eq!(config.exclude_patterns, deserialized.exclude_patterns);
	}

	#[test]
	fn test_load_toml_partial() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.toml");
		std::fs::write(&path, "renameThreshold = 0.9\nconflictStrategy = \"keep_local\"\n").unwrap();

		let config = Config::load(&path).unwrap();
		assert_eq!(config.rename_threshold, 0.9);
		assert_eq!(config.conflict_strategy, ConflictStrategy::KeepLocal);
		// Unspecified fields keep their defaults
		assert_eq!(config.max_retries, 3);
	}

	#[test]
	fn test_load_json5_with_comments() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.json5");
		std::fs::write(&path, "{\n  // scan only these\n  includeDirs: ['.claude', 'docs'],\n}\n")
			.unwrap();

		let config = Config::load(&path).unwrap();
		assert_eq!(config.include_dirs, vec![".claude".to_string(), "docs".to_string()]);
	}

	#[test]
	fn test_load_unknown_extension_fails() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("config.ini");
		std::fs::write(&path, "x=1").unwrap();
		assert!(matches!(Config::load(&path), Err(SyncError::InvalidConfig { .. })));
	}

	#[test]
	fn test_env_overrides() {
		let mut config = Config::default();
		config
			.apply_env_from(vec![
				("TPLSYNC_MAX_RETRIES".to_string(), "5".to_string()),
				("TPLSYNC_CONFLICT_STRATEGY".to_string(), "use_source".to_string()),
				("TPLSYNC_EXCLUDE".to_string(), "*.tmp, dist/**".to_string()),
				("UNRELATED".to_string(), "x".to_string()),
			])
			.unwrap();

		assert_eq!(config.max_retries, 5);
		assert_eq!(config.conflict_strategy, ConflictStrategy::UseSource);
		assert_eq!(config.exclude_patterns, vec!["*.tmp".to_string(), "dist/**".to_string()]);
	}

	#[test]
	fn test_env_override_bad_value() {
		let mut config = Config::default();
		let result = config
			.apply_env_from(vec![("TPLSYNC_CONCURRENCY".to_string(), "many".to_string())]);
		assert!(result.is_err());
	}

	#[test]
	fn test_validate_rejects_bad_threshold() {
		let config = Config { rename_threshold: 1.5, ..Config::default() };
		assert!(config.validate().is_err());
	}

	#[test]
	fn test_derived_dirs() {
		let config = Config { state_dir: PathBuf::from("/state"), ..Config::default() };
		assert_eq!(config.lock_dir(), PathBuf::from("/state/locks"));
		assert_eq!(config.backup_dir(), PathBuf::from("/state/backups"));
		assert_eq!(config.baseline_dir(), PathBuf::from("/state/baselines"));
		assert!(config.effective_concurrency() >= 1);
	}
}

// vim: ts=4

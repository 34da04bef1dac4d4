//! End-to-end tests: detect, classify and apply against real directory trees
//!
//! Covers:
//! - Change ordering for a mixed new/modified/deleted tree
//! - Idempotence after a sync
//! - Dry runs and rollback through the recorded backup id
//! - Conflict strategies on the execution side

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use tplsync::config::Config;
use tplsync::error::SyncError;
use tplsync::executor::OperationStatus;
use tplsync::sync::SyncBuilder;
use tplsync::types::ChangeType;

// ============================================================================
// Helper Functions
// ============================================================================

fn create_file(dir: &Path, name: &str, content: &[u8]) {
	let path = dir.join(name);
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).unwrap();
	}
	fs::write(&path, content).unwrap();
}

fn read(dir: &Path, name: &str) -> String {
	fs::read_to_string(dir.join(name)).unwrap()
}

struct Trees {
	state: TempDir,
	source: TempDir,
	dest: TempDir,
}

impl Trees {
	fn new() -> Self {
		Trees {
			state: TempDir::new().unwrap(),
			source: TempDir::new().unwrap(),
			dest: TempDir::new().unwrap(),
		}
	}

	fn config(&self) -> Config {
		Config {
			state_dir: self.state.path().to_path_buf(),
			exclude_patterns: vec![],
			retry_delay_ms: 1,
			..Config::default()
		}
	}

	fn builder(&self) -> SyncBuilder {
		SyncBuilder::with_config(self.config())
			.source(self.source.path())
			.destination(self.dest.path())
	}
}

// ============================================================================
// Detection and classification
// ============================================================================

#[tokio::test]
async fn test_mixed_tree_is_ordered_for_execution() {
	let t = Trees::new();
	create_file(t.source.path(), "config.json", b"{}");
	create_file(t.source.path(), "readme.md", b"# Template readme, longer now");
	create_file(t.dest.path(), "readme.md", b"# Readme");
	create_file(t.dest.path(), "old.log", b"old");

	let analysis = t.builder().analyze().await.unwrap();
	let changes = &analysis.classification.changes;

	let summary: Vec<(&str, ChangeType)> =
		changes.iter().map(|c| (c.path.as_str(), c.change_type)).collect();
	assert_eq!(
		summary,
		vec![
			("old.log", ChangeType::Deleted),
			("readme.md", ChangeType::Modified),
			("config.json", ChangeType::New),
		]
	);
	let readme = &changes[1];
	assert!(readme.source_file.is_some() && readme.dest_file.is_some());
	assert!(changes.iter().all(|c| (0.0..=1.0).contains(&c.confidence())));
}

#[tokio::test]
async fn test_equal_trees_have_no_changes() {
	let t = Trees::new();
	for root in [t.source.path(), t.dest.path()] {
		create_file(root, "agents/reviewer.md", b"review carefully");
		create_file(root, "settings.json", b"{\"a\":1}");
	}
	// Same content, different mtimes: the hash decides
	filetime::set_file_mtime(
		t.dest.path().join("settings.json"),
		filetime::FileTime::from_unix_time(1_000_000, 0),
	)
	.unwrap();

	for _ in 0..2 {
		let analysis = t.builder().analyze().await.unwrap();
		assert!(analysis.classification.changes.is_empty());
	}
}

#[tokio::test]
async fn test_missing_source_is_fatal() {
	let t = Trees::new();
	let result = SyncBuilder::with_config(t.config())
		.source(t.source.path().join("absent"))
		.destination(t.dest.path())
		.sync()
		.await;
	assert!(matches!(result, Err(SyncError::SourceMissing { .. })));
}

// ============================================================================
// Execution
// ============================================================================

#[tokio::test]
async fn test_sync_applies_and_converges() {
	let t = Trees::new();
	create_file(t.source.path(), "commands/build.md", b"build it");
	create_file(t.source.path(), "readme.md", b"new readme body");
	create_file(t.dest.path(), "readme.md", b"old");
	create_file(t.dest.path(), "obsolete.md", b"gone soon, longer");

	let result = t.builder().sync().await.unwrap();
	assert_eq!(result.execution.failed, 0);
	assert_eq!(result.execution.completed, 3);
	assert!(result.execution.backup_id.is_some());
	assert_eq!(read(t.dest.path(), "commands/build.md"), "build it");
	assert_eq!(read(t.dest.path(), "readme.md"), "new readme body");
	assert!(!t.dest.path().join("obsolete.md").exists());

	let again = t.builder().analyze().await.unwrap();
	assert!(again.classification.changes.is_empty());
}

#[tokio::test]
async fn test_dry_run_then_rollback() {
	let t = Trees::new();
	create_file(t.source.path(), "readme.md", b"template version");
	create_file(t.dest.path(), "readme.md", b"local");
	create_file(t.dest.path(), "notes.md", b"keep me around");

	let preview = t.builder().dry_run(true).sync().await.unwrap();
	assert_eq!(preview.execution.simulated, 2);
	assert!(preview.execution.backup_id.is_none());
	assert_eq!(read(t.dest.path(), "readme.md"), "local");
	assert!(t.dest.path().join("notes.md").exists());

	let applied = t.builder().sync().await.unwrap();
	let backup_id = applied.execution.backup_id.clone().unwrap();
	assert_eq!(read(t.dest.path(), "readme.md"), "template version");
	assert!(!t.dest.path().join("notes.md").exists());

	let config = t.config();
	let locks = tplsync::lock::FileLockManager::new(&config);
	let executor = tplsync::executor::SyncExecutor::new(&config, locks);
	executor.rollback(t.dest.path(), &backup_id).await.unwrap();
	assert_eq!(read(t.dest.path(), "readme.md"), "local");
	assert_eq!(read(t.dest.path(), "notes.md"), "keep me around");
}

#[tokio::test]
async fn test_every_operation_is_reported() {
	let t = Trees::new();
	create_file(t.source.path(), "a.md", b"a");
	create_file(t.source.path(), "b/c.md", b"cc");

	let result = t.builder().sync().await.unwrap();
	assert_eq!(result.execution.operations.len(), 2);
	for op in &result.execution.operations {
		assert_eq!(op.status, Some(OperationStatus::Completed));
		assert_eq!(op.attempts, 1);
		assert!(op.message.is_some());
	}
	assert_eq!(result.execution.bytes_written, 3);
}

// vim: ts=4

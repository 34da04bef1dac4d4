//! Push baseline tests against a real destination tree

use std::fs;
use tempfile::TempDir;

use tplsync::baseline::PushBaselineManager;
use tplsync::config::Config;

fn manager(state: &TempDir) -> PushBaselineManager {
	PushBaselineManager::new(&Config { state_dir: state.path().to_path_buf(), ..Config::default() })
}

#[tokio::test]
async fn test_baseline_diff_scenario() {
	let state = TempDir::new().unwrap();
	let dest = TempDir::new().unwrap();
	let mgr = manager(&state);

	fs::write(dest.path().join("a.txt"), "hash1").unwrap();
	fs::write(dest.path().join("b.txt"), "hash2").unwrap();
	let pushed = mgr.current_hashes(dest.path()).await.unwrap();
	mgr.update_baseline(dest.path(), &pushed, None).await.unwrap();

	fs::remove_file(dest.path().join("b.txt")).unwrap();
	fs::write(dest.path().join("c.txt"), "hash3").unwrap();
	let current = mgr.current_hashes(dest.path()).await.unwrap();
	let diff = mgr.detect_changes(dest.path(), &current).await.unwrap();

	assert!(diff.has_baseline);
	assert_eq!(diff.added, vec!["c.txt"]);
	assert_eq!(diff.deleted, vec!["b.txt"]);
	assert_eq!(diff.unchanged, vec!["a.txt"]);
	assert!(diff.modified.is_empty());
}

#[tokio::test]
async fn test_content_edit_is_modified() {
	let state = TempDir::new().unwrap();
	let dest = TempDir::new().unwrap();
	let mgr = manager(&state);

	fs::write(dest.path().join("a.txt"), "one").unwrap();
	let pushed = mgr.current_hashes(dest.path()).await.unwrap();
	mgr.update_baseline(dest.path(), &pushed, None).await.unwrap();

	// Same size, different bytes
	fs::write(dest.path().join("a.txt"), "two").unwrap();
	let current = mgr.current_hashes(dest.path()).await.unwrap();
	let diff = mgr.detect_changes(dest.path(), &current).await.unwrap();
	assert_eq!(diff.modified, vec!["a.txt"]);
	assert_eq!(diff.pending().count(), 1);
}

#[tokio::test]
async fn test_each_root_has_its_own_baseline() {
	let state = TempDir::new().unwrap();
	let first = TempDir::new().unwrap();
	let second = TempDir::new().unwrap();
	let mgr = manager(&state);

	assert_ne!(mgr.baseline_path(first.path()), mgr.baseline_path(second.path()));

	fs::write(first.path().join("a.txt"), "a").unwrap();
	let hashes = mgr.current_hashes(first.path()).await.unwrap();
	mgr.update_baseline(first.path(), &hashes, None).await.unwrap();

	let diff = mgr.detect_changes(second.path(), &hashes).await.unwrap();
	assert!(!diff.has_baseline);
}

// vim: ts=4

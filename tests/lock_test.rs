//! Lock manager tests with the real process probe
//!
//! Covers mutual exclusion across managers sharing a lock directory, stale
//! lock reclamation for dead owners, and the sweep command.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use tplsync::error::LockError;
use tplsync::lock::{
	write_lock_record, FileLockManager, LockOptions, LockRecord, SystemProcessProbe,
};
use tplsync::types::now_ms;

/// Far above any real pid_max
const DEAD_PID: u32 = 0x7fff_fff0;

fn manager(lock_dir: &Path, max_wait_ms: u64) -> FileLockManager {
	FileLockManager::with_probe(
		LockOptions {
			lock_dir: lock_dir.to_path_buf(),
			timeout: Duration::from_millis(500),
			retry_interval: Duration::from_millis(10),
			max_wait: Duration::from_millis(max_wait_ms),
		},
		Arc::new(SystemProcessProbe),
	)
}

fn plant_lock(mgr: &FileLockManager, target: &Path, pid: u32, age_ms: i64) {
	let record = LockRecord {
		path: target.to_string_lossy().into_owned(),
		pid,
		host: sysinfo::System::host_name().unwrap_or_else(|| "localhost".to_string()),
		operation: "update".to_string(),
		acquired_at: now_ms() - age_ms,
		lock_id: "planted".to_string(),
	};
	write_lock_record(&mgr.lock_file_for(target).unwrap(), &record).unwrap();
}

#[tokio::test]
async fn test_two_managers_are_mutually_exclusive() {
	let dir = TempDir::new().unwrap();
	let locks = dir.path().join("locks");
	let first = manager(&locks, 100);
	let second = manager(&locks, 100);
	let target = dir.path().join("settings.json");

	let guard = first.acquire_guard(&target, "update").await.unwrap();
	assert!(second.is_locked(&target));
	assert!(!first.is_locked(&target));
	assert!(matches!(second.acquire(&target, "copy").await, Err(LockError::Timeout { .. })));

	drop(guard);
	let id = second.acquire(&target, "copy").await.unwrap();
	assert!(second.release(&id));
}

#[tokio::test]
async fn test_waiter_gets_lock_when_released() {
	let dir = TempDir::new().unwrap();
	let locks = dir.path().join("locks");
	let holder = manager(&locks, 100);
	let waiter = manager(&locks, 2_000);
	let target = dir.path().join("a.md");

	let id = holder.acquire(&target, "update").await.unwrap();
	let release = {
		let holder = holder.clone();
		tokio::spawn(async move {
			tokio::time::sleep(Duration::from_millis(100)).await;
			holder.release(&id)
		})
	};
	let got = waiter.with_lock(&target, "update", async { 42 }).await.unwrap();
	assert_eq!(got, 42);
	assert!(release.await.unwrap());
}

#[tokio::test]
async fn test_dead_owner_reclaimed_after_timeout() {
	let dir = TempDir::new().unwrap();
	let mgr = manager(&dir.path().join("locks"), 100);
	let target = dir.path().join("a.md");
	plant_lock(&mgr, &target, DEAD_PID, 10_000);

	let id = mgr.acquire(&target, "copy").await.unwrap();
	assert!(mgr.release(&id));
}

#[tokio::test]
async fn test_live_owner_kept_even_when_old() {
	let dir = TempDir::new().unwrap();
	let mgr = manager(&dir.path().join("locks"), 50);
	let target = dir.path().join("a.md");
	plant_lock(&mgr, &target, std::process::id(), 10_000);

	match mgr.acquire(&target, "copy").await {
		Err(LockError::Timeout { owner_pid, .. }) => assert_eq!(owner_pid, Some(std::process::id())),
		other => panic!("expected timeout, got {:?}", other.map(|_| ())),
	}
}

#[tokio::test]
async fn test_sweep_removes_only_stale() {
	let dir = TempDir::new().unwrap();
	let mgr = manager(&dir.path().join("locks"), 50);
	let stale = dir.path().join("stale.md");
	let fresh = dir.path().join("fresh.md");
	plant_lock(&mgr, &stale, DEAD_PID, 10_000);
	plant_lock(&mgr, &fresh, DEAD_PID, 0);

	assert_eq!(mgr.sweep().unwrap(), 1);
	assert!(!mgr.lock_file_for(&stale).unwrap().exists());
	assert!(mgr.lock_file_for(&fresh).unwrap().exists());
}

// vim: ts=4

//! Snapshot store used for plan backups and rollback
//!
//! The executor only asks for "create snapshot" and "restore snapshot" by id.
//! `DirectorySnapshotStore` keeps each snapshot as plain copies plus a JSON
//! manifest under `<backup_dir>/<id>/`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::SnapshotError;
use crate::types::now_ms;
use crate::validation::validate_relative_key;

use super::fileops;

pub const MANIFEST_FILE: &str = "manifest.json";
const FILES_DIR: &str = "files";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
	pub path: String,
	/// False when the path did not exist; restoring removes it
	pub existed: bool,
	pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotManifest {
	pub id: String,
	pub root: PathBuf,
	pub created_at: i64,
	pub entries: Vec<SnapshotEntry>,
}

#[async_trait]
pub trait SnapshotStore: Send + Sync {
	/// Save the current state of `paths` (relative to `root`) under `id`
	async fn create_snapshot(
		&self,
		id: &str,
		root: &Path,
		paths: &[String],
	) -> Result<SnapshotManifest, SnapshotError>;

	/// Put every saved path back; returns the number of paths restored
	async fn restore_snapshot(&self, id: &str, root: &Path) -> Result<usize, SnapshotError>;
}

#[derive(Debug, Clone)]
pub struct DirectorySnapshotStore {
	base: PathBuf,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SnapshotError + '_ {
	move |source| SnapshotError::Io { path: path.to_path_buf(), source }
}

impl DirectorySnapshotStore {
	pub fn new(base: impl Into<PathBuf>) -> Self {
		DirectorySnapshotStore { base: base.into() }
	}

	pub fn snapshot_dir(&self, id: &str) -> PathBuf {
		self.base.join(id)
	}

	async fn read_manifest(&self, id: &str) -> Result<SnapshotManifest, SnapshotError> {
		let path = self.snapshot_dir(id).join(MANIFEST_FILE);
		let body = match tokio::fs::read(&path).await {
			Ok(b) => b,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(SnapshotError::NotFound { id: id.to_string() })
			}
			Err(e) => return Err(SnapshotError::Io { path, source: e }),
		};
		serde_json::from_slice(&body).map_err(|e| SnapshotError::Manifest {
			message: format!("{}: {}", path.display(), e),
		})
	}
}

#[async_trait]
impl SnapshotStore for DirectorySnapshotStore {
	async fn create_snapshot(
		&self,
		id: &str,
		root: &Path,
		paths: &[String],
	) -> Result<SnapshotManifest, SnapshotError> {
		validate_relative_key(id)
			.map_err(|e| SnapshotError::Manifest { message: format!("bad snapshot id: {}", e) })?;
		let dir = self.snapshot_dir(id);
		let files_dir = dir.join(FILES_DIR);
		tokio::fs::create_dir_all(&files_dir).await.map_err(io_err(&files_dir))?;

		let mut entries = Vec::with_capacity(paths.len());
		for rel in paths {
			validate_relative_key(rel)
				.map_err(|e| SnapshotError::Manifest { message: e.to_string() })?;
			let live = root.join(rel);
			let meta = match tokio::fs::metadata(&live).await {
				Ok(m) if m.is_file() => m,
				_ => {
					entries.push(SnapshotEntry { path: rel.clone(), existed: false, size: 0 });
					continue;
				}
			};
			let saved = files_dir.join(rel);
			if let Some(parent) = saved.parent() {
				tokio::fs::create_dir_all(parent).await.map_err(io_err(parent))?;
			}
			tokio::fs::copy(&live, &saved).await.map_err(io_err(&live))?;
			entries.push(SnapshotEntry { path: rel.clone(), existed: true, size: meta.len() });
		}

		let manifest = SnapshotManifest {
			id: id.to_string(),
			root: root.to_path_buf(),
			created_at: now_ms(),
			entries,
		};
		let manifest_path = dir.join(MANIFEST_FILE);
		let body = serde_json::to_vec_pretty(&manifest)
			.map_err(|e| SnapshotError::Manifest { message: e.to_string() })?;
		tokio::fs::write(&manifest_path, body).await.map_err(io_err(&manifest_path))?;

		info!(
			"Snapshot {} saved {} path(s) from {}",
			id,
			manifest.entries.iter().filter(|e| e.existed).count(),
			root.display()
		);
		Ok(manifest)
	}

	async fn restore_snapshot(&self, id: &str, root: &Path) -> Result<usize, SnapshotError> {
		let manifest = self.read_manifest(id).await?;
		if manifest.root != root {
			warn!(
				"Snapshot {} was taken from {}, restoring into {}",
				id,
				manifest.root.display(),
				root.display()
			);
		}

		let files_dir = self.snapshot_dir(id).join(FILES_DIR);
		let mut restored = 0;
		for entry in &manifest.entries {
			validate_relative_key(&entry.path)
				.map_err(|e| SnapshotError::Manifest { message: e.to_string() })?;
			let live = root.join(&entry.path);

			if entry.existed {
				let saved = files_dir.join(&entry.path);
				let target = live.clone();
				tokio::task::spawn_blocking(move || {
					fileops::atomic_replace(&saved, &target, |_| Ok(()))
				})
				.await
				.map_err(|e| SnapshotError::Manifest { message: format!("restore task: {}", e) })?
				.map_err(io_err(&live))?;
			} else {
				fileops::remove_if_present(&live).map_err(io_err(&live))?;
			}
			debug!("Restored {}", entry.path);
			restored += 1;
		}

		info!("Snapshot {} restored {} path(s) into {}", id, restored, root.display());
		Ok(restored)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_snapshot_restore_roundtrip() {
		let backups = TempDir::new().unwrap();
		let root = TempDir::new().unwrap();
		fs::create_dir_all(root.path().join("docs")).unwrap();
		fs::write(root.path().join("docs/a.md"), "original").unwrap();

		let store = DirectorySnapshotStore::new(backups.path());
		let paths = vec!["docs/a.md".to_string(), "new.md".to_string()];
		let manifest = store.create_snapshot("plan-1", root.path(), &paths).await.unwrap();
		assert!(manifest.entries[0].existed);
		assert!(!manifest.entries[1].existed);

		fs::write(root.path().join("docs/a.md"), "changed").unwrap();
		fs::write(root.path().join("new.md"), "created").unwrap();

		assert_eq!(store.restore_snapshot("plan-1", root.path()).await.unwrap(), 2);
		assert_eq!(fs::read_to_string(root.path().join("docs/a.md")).unwrap(), "original");
		assert!(!root.path().join("new.md").exists());
	}

	#[tokio::test]
	async fn test_restore_unknown_snapshot() {
		let backups = TempDir::new().unwrap();
		let store = DirectorySnapshotStore::new(backups.path());
		let err = store.restore_snapshot("nope", Path::new("/tmp")).await.unwrap_err();
		assert!(matches!(err, SnapshotError::NotFound { .. }));
	}

	#[tokio::test]
	async fn test_snapshot_rejects_traversal() {
		let backups = TempDir::new().unwrap();
		let root = TempDir::new().unwrap();
		let store = DirectorySnapshotStore::new(backups.path());
		let err = store
			.create_snapshot("plan", root.path(), &["../escape".to_string()])
			.await
			.unwrap_err();
		assert!(matches!(err, SnapshotError::Manifest { .. }));
	}
}

// vim: ts=4

//! Push baselines: content-hash snapshots of what was last pushed to a destination
//!
//! One JSON document per destination root. It is always read and written
//! whole, and writes go through a temp file and rename.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::detect::hash_file;
use crate::detect::scan::walk_tree;
use crate::error::{BaselineError, SyncError};
use crate::exclusion::{ExclusionEngine, TEMP_SUFFIX};
use crate::types::{now_ms, system_time_ms};

pub const BASELINE_VERSION: u32 = 1;
pub const HASH_ALGORITHM: &str = "blake3";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaselineEntry {
	pub hash: String,
	pub size: u64,
	pub mtime: i64,
}

/// Relative path to hash entry
pub type HashIndex = BTreeMap<String, BaselineEntry>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Baseline {
	pub version: u32,
	pub created_at: i64,
	pub updated_at: i64,
	pub root: PathBuf,
	pub algorithm: String,
	pub entries: HashIndex,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaselineDiff {
	pub added: Vec<String>,
	pub modified: Vec<String>,
	pub deleted: Vec<String>,
	pub unchanged: Vec<String>,
	pub has_baseline: bool,
}

impl BaselineDiff {
	/// Paths that need pushing again
	pub fn pending(&self) -> impl Iterator<Item = &String> {
		self.added.iter().chain(self.modified.iter())
	}

	pub fn is_clean(&self) -> bool {
		self.added.is_empty() && self.modified.is_empty() && self.deleted.is_empty()
	}
}

/// Compare a stored baseline against the current hashes
pub fn diff_entries(baseline: &HashIndex, current: &HashIndex) -> BaselineDiff {
	let mut diff = BaselineDiff { has_baseline: true, ..BaselineDiff::default() };
	for (path, entry) in current {
		match baseline.get(path) {
			None => diff.added.push(path.clone()),
			Some(old) if old.hash != entry.hash => diff.modified.push(path.clone()),
			Some(_) => diff.unchanged.push(path.clone()),
		}
	}
	diff.deleted = baseline.keys().filter(|p| !current.contains_key(*p)).cloned().collect();
	diff
}

pub struct PushBaselineManager {
	dir: PathBuf,
	exclude_patterns: Vec<String>,
	respect_ignore_file: bool,
	concurrency: usize,
}

impl PushBaselineManager {
	pub fn new(config: &Config) -> Self {
		PushBaselineManager {
			dir: config.baseline_dir(),
			exclude_patterns: config.exclude_patterns.clone(),
			respect_ignore_file: config.respect_ignore_file,
			concurrency: config.effective_concurrency(),
		}
	}

	/// Baseline file for a destination root: `<dir>/<blake3(root)[..16]>.json`
	pub fn baseline_path(&self, root: &Path) -> PathBuf {
		let root = std::fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf());
		let digest = blake3::hash(root.to_string_lossy().as_bytes());
		self.dir.join(format!("{}.json", &digest.to_hex()[..16]))
	}

	/// Load the baseline for `root`, `None` when no push has been recorded yet
	pub async fn load(&self, root: &Path) -> Result<Option<Baseline>, BaselineError> {
		let path = self.baseline_path(root);
		let contents = match tokio::fs::read(&path).await {
			Ok(c) => c,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(BaselineError::LoadFailed { path, source: e }),
		};

		let baseline: Baseline = serde_json::from_slice(&contents).map_err(|e| {
			BaselineError::Corrupted { path: path.clone(), message: e.to_string() }
		})?;
		if baseline.version > BASELINE_VERSION || baseline.algorithm != HASH_ALGORITHM {
			return Err(BaselineError::Corrupted {
				path,
				message: format!(
					"unsupported baseline version {} / algorithm {}",
					baseline.version, baseline.algorithm
				),
			});
		}
		Ok(Some(baseline))
	}

	/// Diff `current` against the stored baseline for `root`
	///
	/// Without a baseline every current path is reported as added and
	/// `has_baseline` is false.
	pub async fn detect_changes(
		&self,
		root: &Path,
		current: &HashIndex,
	) -> Result<BaselineDiff, BaselineError> {
		match self.load(root).await? {
			Some(baseline) => Ok(diff_entries(&baseline.entries, current)),
			None => {
				debug!("No baseline for {}", root.display());
				Ok(BaselineDiff {
					added: current.keys().cloned().collect(),
					has_baseline: false,
					..BaselineDiff::default()
				})
			}
		}
	}

	/// Record a successful push
	///
	/// `pushed` limits the update to those paths; the rest keep their previous
	/// entry. `None` records everything in `current`.
	pub async fn update_baseline(
		&self,
		root: &Path,
		current: &HashIndex,
		pushed: Option<&[String]>,
	) -> Result<Baseline, BaselineError> {
		let now = now_ms();
		let previous = self.load(root).await?;
		let created_at = previous.as_ref().map(|b| b.created_at).unwrap_or(now);

		let entries = match (pushed, previous) {
			(None, _) => current.clone(),
			(Some(paths), previous) => {
				let mut entries = previous.map(|b| b.entries).unwrap_or_default();
				for path in paths {
					match current.get(path) {
						Some(entry) => entries.insert(path.clone(), entry.clone()),
						None => entries.remove(path),
					};
				}
				entries
			}
		};

		let baseline = Baseline {
			version: BASELINE_VERSION,
			created_at,
			updated_at: now,
			root: root.to_path_buf(),
			algorithm: HASH_ALGORITHM.to_string(),
			entries,
		};
		self.write(root, &baseline).await?;
		info!("Baseline for {} now holds {} path(s)", root.display(), baseline.entries.len());
		Ok(baseline)
	}

	async fn write(&self, root: &Path, baseline: &Baseline) -> Result<(), BaselineError> {
		let path = self.baseline_path(root);
		let save_err = |e| BaselineError::SaveFailed { path: path.clone(), source: e };

		tokio::fs::create_dir_all(&self.dir).await.map_err(save_err)?;
		let json = serde_json::to_vec_pretty(baseline)
			.map_err(|e| save_err(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))?;

		let tmp = path.with_extension(format!("json.{}{}", uuid::Uuid::new_v4().simple(), TEMP_SUFFIX));
		if let Err(e) = tokio::fs::write(&tmp, &json).await {
			let _ = tokio::fs::remove_file(&tmp).await;
			return Err(save_err(e));
		}
		if let Err(e) = tokio::fs::rename(&tmp, &path).await {
			let _ = tokio::fs::remove_file(&tmp).await;
			return Err(save_err(e));
		}
		Ok(())
	}

	/// Hash every file under `root` that `exclusion` lets through
	pub async fn compute_current_hashes(
		&self,
		root: &Path,
		exclusion: &ExclusionEngine,
	) -> Result<HashIndex, SyncError> {
		if !root.is_dir() {
			return Ok(HashIndex::new());
		}

		let walk_root = root.to_path_buf();
		let walk_engine = exclusion.clone();
		let (files, _) = tokio::task::spawn_blocking(move || walk_tree(&walk_root, &[], &walk_engine))
			.await
			.map_err(|e| SyncError::Other { message: format!("Walk task failed: {}", e) })?;

		let semaphore = Arc::new(Semaphore::new(self.concurrency.max(1)));
		let mut handles = Vec::with_capacity(files.len());
		for (rel, path) in files {
			let permit = semaphore
				.clone()
				.acquire_owned()
				.await
				.map_err(|e| SyncError::Other { message: format!("Hash semaphore closed: {}", e) })?;
			handles.push(tokio::task::spawn_blocking(move || {
				let _permit = permit;
				let entry = std::fs::metadata(&path).and_then(|meta| {
					Ok(BaselineEntry {
						hash: hash_file(&path)?,
						size: meta.len(),
						mtime: meta.modified().map(system_time_ms)?,
					})
				});
				(rel, entry)
			}));
		}

		let mut index = HashIndex::new();
		for handle in handles {
			match handle.await {
				Ok((rel, Ok(entry))) => {
					index.insert(rel, entry);
				}
				Ok((rel, Err(e))) => warn!("Cannot hash {}: {}", rel, e),
				Err(e) => warn!("Hash task failed: {}", e),
			}
		}
		Ok(index)
	}

	/// Hash `root` with the configured exclusions
	pub async fn current_hashes(&self, root: &Path) -> Result<HashIndex, SyncError> {
		let engine = ExclusionEngine::new(&self.exclude_patterns, root, self.respect_ignore_file)?;
		self.compute_current_hashes(root, &engine).await
	}
}


// vim: ts=4

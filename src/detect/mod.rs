//! Change detection between a source tree and a destination tree
//!
//! Both roots are walked concurrently, file metadata is read with bounded
//! fan-out, and every path present on both sides goes through the comparison
//! cascade in [`compare`].

pub mod compare;
pub mod scan;

use futures::future::join;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::SyncError;
use crate::exclusion::ExclusionEngine;
use crate::progress::{ProgressEvent, ProgressReporter, Side, SyncPhase};
use crate::types::{Change, FileIndex};

pub use compare::{compare_pair, hash_file, CompareOptions};
pub use scan::ScanResult;

/// Aggregate counters for one detection pass
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionStats {
	pub source_files: usize,
	pub dest_files: usize,
	pub comparisons: usize,
	pub elapsed_ms: u64,
	pub errors: Vec<String>,
}

/// Raw changes plus the indexes they were computed from
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionReport {
	pub changes: Vec<Change>,
	pub source_index: FileIndex,
	pub dest_index: FileIndex,
	pub stats: DetectionStats,
}

pub struct ChangeDetector {
	config: Config,
	progress: ProgressReporter,
}

impl ChangeDetector {
	pub fn new(config: &Config) -> Self {
		ChangeDetector { config: config.clone(), progress: ProgressReporter::disabled() }
	}

	pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
		self.progress = progress;
		self
	}

	/// Index one root with the configured include list and exclusions
	pub async fn scan(&self, root: &Path, side: Side) -> Result<ScanResult, SyncError> {
		let exclusion = ExclusionEngine::new(
			&self.config.exclude_patterns,
			root,
			self.config.respect_ignore_file,
		)?;
		scan::scan_tree(
			root,
			&self.config.include_dirs,
			&exclusion,
			self.config.effective_concurrency(),
			side,
			&self.progress,
		)
		.await
	}

	/// Compare two trees and report every difference, sorted by path
	///
	/// A missing destination root is treated as empty. A missing source root
	/// is an error.
	pub async fn detect(
		&self,
		source_root: &Path,
		dest_root: &Path,
	) -> Result<DetectionReport, SyncError> {
		if !source_root.is_dir() {
			return Err(SyncError::SourceMissing { path: source_root.to_path_buf() });
		}

		let start = Instant::now();
		self.progress.emit(ProgressEvent::PhaseStarted { phase: SyncPhase::Detecting });

		let (source, dest) =
			join(self.scan(source_root, Side::Source), self.scan(dest_root, Side::Destination))
				.await;
		let source = source?;
		let dest = dest?;

		let mut errors = source.errors;
		errors.extend(dest.errors);

		let mut changes = Vec::new();
		for (rel, record) in &source.index {
			if !dest.index.contains_key(rel) {
				changes.push(Change::new_file(record.clone()));
			}
		}
		for (rel, record) in &dest.index {
			if !source.index.contains_key(rel) {
				changes.push(Change::deleted_file(record.clone()));
			}
		}

		let (modified, comparisons, compare_errors) =
			self.compare_common(&source.index, &dest.index).await?;
		changes.extend(modified);
		errors.extend(compare_errors);

		changes.sort_by(|a, b| a.path.cmp(&b.path));

		let stats = DetectionStats {
			source_files: source.index.len(),
			dest_files: dest.index.len(),
			comparisons,
			elapsed_ms: start.elapsed().as_millis() as u64,
			errors,
		};
		info!(
			"Detected {} change(s): {} source / {} destination file(s), {} comparison(s), {} error(s)",
			changes.len(),
			stats.source_files,
			stats.dest_files,
			stats.comparisons,
			stats.errors.len()
		);
		self.progress.emit(ProgressEvent::PhaseFinished {
			phase: SyncPhase::Detecting,
			elapsed_ms: stats.elapsed_ms,
		});

		Ok(DetectionReport { changes, source_index: source.index, dest_index: dest.index, stats })
	}

	/// Run the cascade on every path present on both sides
	async fn compare_common(
		&self,
		source: &FileIndex,
		dest: &FileIndex,
	) -> Result<(Vec<Change>, usize, Vec<String>), SyncError> {
		let opts = Arc::new(CompareOptions::from(&self.config));
		let semaphore = Arc::new(Semaphore::new(self.config.effective_concurrency().max(1)));
		let mut handles = Vec::new();

		for (rel, s) in source {
			let Some(d) = dest.get(rel) else {
				continue;
			};
			let permit = semaphore.clone().acquire_owned().await.map_err(|e| {
				SyncError::Other { message: format!("Compare semaphore closed: {}", e) }
			})?;
			let (s, d, opts) = (s.clone(), d.clone(), opts.clone());
			handles.push(tokio::task::spawn_blocking(move || {
				let _permit = permit;
				let result = compare_pair(&s, &d, &opts);
				(s.relative_path, result)
			}));
		}

		let comparisons = handles.len();
		let mut changes = Vec::new();
		let mut errors = Vec::new();
		for handle in handles {
			match handle.await {
				Ok((_, Ok(Some(change)))) => changes.push(change),
				Ok((rel, Ok(None))) => debug!("{}: unchanged", rel),
				Ok((rel, Err(e))) => {
					warn!("Skipping comparison of {}: {}", rel, e);
					errors.push(format!("{}: {}", rel, e));
				}
				Err(e) => {
					warn!("Compare task failed: {}", e);
					errors.push(format!("compare task failed: {}", e));
				}
			}
		}
		self.progress.emit(ProgressEvent::PathsCompared { count: comparisons });

		Ok((changes, comparisons, errors))
	}
}


// vim: ts=4

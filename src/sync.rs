//! High-level sync orchestration
//!
//! `SyncBuilder` wires detection, classification, execution and the optional
//! baseline update into one call:
//!
//! ```rust,ignore
//! use tplsync::sync::SyncBuilder;
//!
//! let result = SyncBuilder::new()
//!     .source("./templates")
//!     .destination("./project")
//!     .dry_run(true)
//!     .sync()
//!     .await?;
//! println!("{} operation(s) simulated", result.execution.simulated);
//! ```

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::baseline::{BaselineDiff, PushBaselineManager};
use crate::classify::{ChangeClassifier, ClassificationReport};
use crate::config::Config;
use crate::detect::{ChangeDetector, DetectionReport, DetectionStats};
use crate::error::SyncError;
use crate::executor::{
	ExecutionOptions, ExecutionReport, OperationStatus, SnapshotStore, SyncExecutor, SyncPlan,
};
use crate::lock::FileLockManager;
use crate::progress::{ProgressEvent, ProgressReporter, SyncPhase};
use crate::strategies::ConflictStrategy;
use crate::types::Change;

/// Detection and classification without touching the destination
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
	pub detection: DetectionReport,
	pub classification: ClassificationReport,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
	pub detection: DetectionStats,
	pub classification: ClassificationReport,
	pub plan_id: String,
	pub execution: ExecutionReport,
	/// Baseline diff before the push, when a baseline update was requested
	pub baseline: Option<BaselineDiff>,
	pub baseline_updated: bool,
}

/// Fluent builder for one source-to-destination propagation
pub struct SyncBuilder {
	source: Option<PathBuf>,
	destination: Option<PathBuf>,
	config: Config,
	selected: Option<BTreeSet<String>>,
	update_baseline: bool,
	progress: ProgressReporter,
	locks: Option<FileLockManager>,
	snapshots: Option<Arc<dyn SnapshotStore>>,
}

impl Default for SyncBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl SyncBuilder {
	pub fn new() -> Self {
		Self::with_config(Config::default())
	}

	pub fn with_config(config: Config) -> Self {
		SyncBuilder {
			source: None,
			destination: None,
			config,
			selected: None,
			update_baseline: false,
			progress: ProgressReporter::disabled(),
			locks: None,
			snapshots: None,
		}
	}

	pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
		self.source = Some(path.into());
		self
	}

	pub fn destination(mut self, path: impl Into<PathBuf>) -> Self {
		self.destination = Some(path.into());
		self
	}

	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn dry_run(mut self, enabled: bool) -> Self {
		self.config.dry_run = enabled;
		self
	}

	pub fn conflict_strategy(mut self, strategy: ConflictStrategy) -> Self {
		self.config.conflict_strategy = strategy;
		self
	}

	pub fn block_on_invalid(mut self, enabled: bool) -> Self {
		self.config.block_on_invalid = enabled;
		self
	}

	/// Only apply changes whose path (or previous path) is in `paths`
	pub fn select_files<I, S>(mut self, paths: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.selected = Some(paths.into_iter().map(Into::into).collect());
		self
	}

	/// Record pushed paths in the destination's baseline after a clean run
	pub fn update_baseline(mut self, enabled: bool) -> Self {
		self.update_baseline = enabled;
		self
	}

	pub fn progress(mut self, progress: ProgressReporter) -> Self {
		self.progress = progress;
		self
	}

	/// Share a lock manager (and its shutdown hook) with the caller
	pub fn lock_manager(mut self, locks: FileLockManager) -> Self {
		self.locks = Some(locks);
		self
	}

	pub fn snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
		self.snapshots = Some(store);
		self
	}

	fn roots(&self) -> Result<(&Path, &Path), SyncError> {
		let source = self.source.as_deref().ok_or_else(|| SyncError::InvalidConfig {
			message: "no source root given".to_string(),
		})?;
		let destination = self.destination.as_deref().ok_or_else(|| SyncError::InvalidConfig {
			message: "no destination root given".to_string(),
		})?;
		Ok((source, destination))
	}

	/// Detect and classify, leaving the destination alone
	pub async fn analyze(&self) -> Result<Analysis, SyncError> {
		self.config.validate()?;
		let (source, destination) = self.roots()?;

		let detector = ChangeDetector::new(&self.config).with_progress(self.progress.clone());
		let mut detection = detector.detect(source, destination).await?;

		let classifier = ChangeClassifier::new(&self.config)?.with_progress(self.progress.clone());
		let changes = std::mem::take(&mut detection.changes);
		let classification =
			classifier.classify(changes, &detection.source_index, &detection.dest_index);

		Ok(Analysis { detection, classification })
	}

	fn is_selected(&self, change: &Change) -> bool {
		match &self.selected {
			None => true,
			Some(paths) => {
				paths.contains(&change.path)
					|| change.old_path.as_ref().map(|p| paths.contains(p)).unwrap_or(false)
			}
		}
	}

	/// Run the whole pipeline
	pub async fn sync(self) -> Result<SyncResult, SyncError> {
		let Analysis { detection, mut classification } = self.analyze().await?;
		let (source, destination) = self.roots()?;

		if self.selected.is_some() {
			classification.changes.retain(|c| self.is_selected(c));
		}

		let invalid = classification.invalid_changes().count();
		if invalid > 0 {
			if self.config.block_on_invalid {
				return Err(SyncError::ValidationFailed { count: invalid });
			}
			warn!("Dropping {} invalid change(s) from the plan", invalid);
		}
		let applicable: Vec<Change> = classification
			.changes
			.iter()
			.filter(|c| !c.validation.is_invalid())
			.cloned()
			.collect();

		let plan = SyncPlan::from_changes(source, destination, &applicable);
		let locks = self.locks.clone().unwrap_or_else(|| FileLockManager::new(&self.config));
		let mut executor = SyncExecutor::new(&self.config, locks).with_progress(self.progress.clone());
		if let Some(store) = &self.snapshots {
			executor = executor.with_snapshot_store(store.clone());
		}
		let execution =
			executor.execute_sync_plan(&plan, &ExecutionOptions::from_config(&self.config)).await?;

		let (baseline, baseline_updated) = if self.update_baseline && !self.config.dry_run {
			self.record_baseline(destination, &execution).await?
		} else {
			(None, false)
		};

		Ok(SyncResult {
			detection: detection.stats,
			classification,
			plan_id: plan.id,
			execution,
			baseline,
			baseline_updated,
		})
	}

	async fn record_baseline(
		&self,
		destination: &Path,
		execution: &ExecutionReport,
	) -> Result<(Option<BaselineDiff>, bool), SyncError> {
		let start = Instant::now();
		self.progress.emit(ProgressEvent::PhaseStarted { phase: SyncPhase::Baseline });

		let manager = PushBaselineManager::new(&self.config);
		let current = manager.current_hashes(destination).await?;
		let diff = manager.detect_changes(destination, &current).await?;

		let updated = if execution.is_success() {
			// A first push records the whole tree
			let pushed: Option<Vec<String>> = diff.has_baseline.then(|| {
				execution
					.operations
					.iter()
					.filter(|op| op.status == Some(OperationStatus::Completed))
					.flat_map(|op| op.touched_paths().into_iter().map(String::from))
					.collect()
			});
			manager.update_baseline(destination, &current, pushed.as_deref()).await?;
			true
		} else {
			warn!("{} operation(s) failed, baseline left unchanged", execution.failed);
			false
		};

		info!("Baseline phase finished for {}", destination.display());
		self.progress.emit(ProgressEvent::PhaseFinished {
			phase: SyncPhase::Baseline,
			elapsed_ms: start.elapsed().as_millis() as u64,
		});
		Ok((Some(diff), updated))
	}
}


// vim: ts=4

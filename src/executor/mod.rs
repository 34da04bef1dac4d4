//! Applies a sync plan to the destination tree
//!
//! Operations run one at a time in plan order. Each one holds the file locks
//! for the paths it touches and is retried with linear backoff. Destructive
//! plans are snapshotted first so they can be rolled back.

pub mod fileops;
pub mod plan;
pub mod snapshot;

pub use plan::{Operation, OperationKind, OperationStatus, SyncPlan};
pub use snapshot::{DirectorySnapshotStore, SnapshotManifest, SnapshotStore};

use serde::Serialize;
use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::SyncError;
use crate::lock::{FileLockManager, LockGuard};
use crate::progress::{ProgressEvent, ProgressReporter, SyncPhase};
use crate::strategies::ConflictStrategy;
use crate::validation::validate_relative_key;

/// Per-run execution switches
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionOptions {
	pub dry_run: bool,
	pub conflict_strategy: ConflictStrategy,
}

impl ExecutionOptions {
	pub fn from_config(config: &Config) -> Self {
		ExecutionOptions { dry_run: config.dry_run, conflict_strategy: config.conflict_strategy }
	}
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
	pub plan_id: String,
	pub dry_run: bool,
	pub backup_id: Option<String>,
	pub operations: Vec<Operation>,
	pub completed: usize,
	pub failed: usize,
	pub skipped: usize,
	pub simulated: usize,
	pub bytes_written: u64,
	pub elapsed_ms: u64,
}

impl ExecutionReport {
	pub fn is_success(&self) -> bool {
		self.failed == 0
	}
}

/// Result of applying one operation once
#[derive(Debug)]
struct Applied {
	status: OperationStatus,
	message: String,
	bytes: u64,
}

impl Applied {
	fn completed(message: impl Into<String>, bytes: u64) -> Self {
		Applied { status: OperationStatus::Completed, message: message.into(), bytes }
	}
}

pub struct SyncExecutor {
	max_retries: u32,
	retry_delay: Duration,
	critical_files: Vec<String>,
	locks: FileLockManager,
	snapshots: Arc<dyn SnapshotStore>,
	progress: ProgressReporter,
}

fn invalid_input(message: String) -> io::Error {
	io::Error::new(io::ErrorKind::InvalidInput, message)
}

fn resolve(root: &Path, rel: &str) -> io::Result<PathBuf> {
	validate_relative_key(rel).map_err(|e| invalid_input(e.to_string()))?;
	Ok(root.join(rel))
}

/// Errors a retry cannot fix
fn is_permanent(kind: OperationKind, err: &io::Error) -> bool {
	match err.kind() {
		io::ErrorKind::InvalidInput => true,
		io::ErrorKind::AlreadyExists => kind == OperationKind::Copy,
		_ => false,
	}
}

fn apply_operation(
	source_root: &Path,
	dest_root: &Path,
	op: &Operation,
	strategy: ConflictStrategy,
) -> io::Result<Applied> {
	let src = resolve(source_root, &op.path)?;
	let dest = resolve(dest_root, &op.path)?;

	match op.kind {
		OperationKind::Copy => {
			let bytes = fileops::copy_new(&src, &dest)?;
			Ok(Applied::completed("copied new file", bytes))
		}
		OperationKind::Update => {
			let bytes = fileops::atomic_replace(&src, &dest, |_| Ok(()))?;
			Ok(Applied::completed("replaced with source version", bytes))
		}
		OperationKind::Move => {
			let old = match &op.old_path {
				Some(old) => resolve(dest_root, old)?,
				None => return Err(invalid_input(format!("move of {} has no old path", op.path))),
			};
			let bytes = fileops::atomic_replace(&src, &dest, |_| Ok(()))?;
			fileops::remove_if_present(&old)?;
			Ok(Applied::completed(
				format!("moved from {}", op.old_path.as_deref().unwrap_or("?")),
				bytes,
			))
		}
		OperationKind::Delete => {
			if fileops::remove_if_present(&dest)? {
				Ok(Applied::completed("deleted", 0))
			} else {
				Ok(Applied::completed("already absent", 0))
			}
		}
		OperationKind::Conflict => {
			if !strategy.mutates_destination() {
				return Ok(Applied {
					status: OperationStatus::Skipped,
					message: strategy.skip_message().to_string(),
					bytes: 0,
				});
			}
			if src.is_file() {
				let bytes = fileops::atomic_replace(&src, &dest, |_| Ok(()))?;
				Ok(Applied::completed(strategy.skip_message(), bytes))
			} else {
				fileops::remove_if_present(&dest)?;
				Ok(Applied::completed("conflict resolved by source removal", 0))
			}
		}
	}
}

/// What a dry run reports for one operation
fn describe(source_root: &Path, op: &Operation, strategy: ConflictStrategy) -> String {
	match op.kind {
		OperationKind::Copy => "would copy new file".to_string(),
		OperationKind::Update => "would replace with source version".to_string(),
		OperationKind::Move => {
			format!("would move from {}", op.old_path.as_deref().unwrap_or("?"))
		}
		OperationKind::Delete => "would delete".to_string(),
		OperationKind::Conflict => match strategy {
			ConflictStrategy::UseSource if source_root.join(&op.path).is_file() => {
				"would resolve conflict with source version".to_string()
			}
			ConflictStrategy::UseSource => "would resolve conflict by deleting".to_string(),
			other => format!("would leave destination unchanged ({})", other),
		},
	}
}

impl SyncExecutor {
	pub fn new(config: &Config, locks: FileLockManager) -> Self {
		SyncExecutor {
			max_retries: config.max_retries.max(1),
			retry_delay: config.retry_delay(),
			critical_files: config.critical_files.clone(),
			locks,
			snapshots: Arc::new(DirectorySnapshotStore::new(config.backup_dir())),
			progress: ProgressReporter::disabled(),
		}
	}

	pub fn with_snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
		self.snapshots = store;
		self
	}

	pub fn with_progress(mut self, progress: ProgressReporter) -> Self {
		self.progress = progress;
		self
	}

	fn is_critical(&self, rel: &str) -> bool {
		let name = rel.rsplit('/').next().unwrap_or(rel);
		self.critical_files.iter().any(|c| c == name)
	}

	/// Environment checks that abort the plan before anything is touched
	fn preflight(&self, plan: &SyncPlan, dry_run: bool) -> Result<(), SyncError> {
		if !plan.source_root.is_dir() {
			return Err(SyncError::SourceMissing { path: plan.source_root.clone() });
		}
		if dry_run {
			return Ok(());
		}

		let dest = &plan.dest_root;
		std::fs::create_dir_all(dest).map_err(|e| SyncError::DestinationNotWritable {
			path: dest.clone(),
			reason: e.to_string(),
		})?;
		let probe = dest.join(format!(".tplsync-probe-{}", uuid::Uuid::new_v4().simple()));
		OpenOptions::new()
			.write(true)
			.create_new(true)
			.open(&probe)
			.and_then(|_| std::fs::remove_file(&probe))
			.map_err(|e| SyncError::DestinationNotWritable {
				path: dest.clone(),
				reason: e.to_string(),
			})?;

		for rel in plan.touched_paths() {
			if !self.is_critical(&rel) {
				continue;
			}
			let target = dest.join(&rel);
			if self.locks.is_locked(&target) {
				return Err(SyncError::CriticalFileInUse {
					path: target,
					reason: "locked by another process".to_string(),
				});
			}
			if target.is_file() {
				if let Err(e) = OpenOptions::new().append(true).open(&target) {
					return Err(SyncError::CriticalFileInUse { path: target, reason: e.to_string() });
				}
			}
		}
		Ok(())
	}

	async fn lock_operation(
		&self,
		dest_root: &Path,
		op: &Operation,
	) -> Result<Vec<LockGuard>, SyncError> {
		let mut targets: Vec<PathBuf> =
			op.touched_paths().into_iter().map(|rel| dest_root.join(rel)).collect();
		targets.sort();
		targets.dedup();
		let mut guards = Vec::with_capacity(targets.len());
		for target in targets {
			guards.push(self.locks.acquire_guard(&target, &op.kind.to_string()).await?);
		}
		Ok(guards)
	}

	async fn run_operation(&self, plan: &SyncPlan, op: &mut Operation, strategy: ConflictStrategy) {
		let _guards = match self.lock_operation(&plan.dest_root, op).await {
			Ok(g) => g,
			Err(e) => {
				warn!("{} {}: {}", op.kind, op.path, e);
				op.status = Some(OperationStatus::Failed);
				op.message = Some(e.to_string());
				return;
			}
		};

		for attempt in 1..=self.max_retries {
			op.attempts = attempt;
			let (src_root, dst_root, snapshot) =
				(plan.source_root.clone(), plan.dest_root.clone(), op.clone());
			let result = tokio::task::spawn_blocking(move || {
				apply_operation(&src_root, &dst_root, &snapshot, strategy)
			})
			.await
			.unwrap_or_else(|e| Err(io::Error::other(format!("operation task failed: {}", e))));

			match result {
				Ok(applied) => {
					debug!("{} {}: {}", op.kind, op.path, applied.message);
					op.status = Some(applied.status);
					op.message = Some(applied.message);
					op.bytes_written = applied.bytes;
					return;
				}
				Err(e) if is_permanent(op.kind, &e) || attempt == self.max_retries => {
					error!("{} {} failed after {} attempt(s): {}", op.kind, op.path, attempt, e);
					op.status = Some(OperationStatus::Failed);
					op.message = Some(e.to_string());
					return;
				}
				Err(e) => {
					warn!("{} {} attempt {} failed: {}", op.kind, op.path, attempt, e);
					tokio::time::sleep(self.retry_delay * attempt).await;
				}
			}
		}
	}

	/// Apply `plan` to its destination root
	///
	/// Environment problems and critical files in use abort before any change.
	/// Individual operation failures are recorded and the plan continues.
	pub async fn execute_sync_plan(
		&self,
		plan: &SyncPlan,
		options: &ExecutionOptions,
	) -> Result<ExecutionReport, SyncError> {
		let start = Instant::now();
		self.progress.emit(ProgressEvent::PhaseStarted { phase: SyncPhase::Executing });
		self.preflight(plan, options.dry_run)?;

		let backup_id = if !options.dry_run && plan.is_destructive() {
			let manifest = self
				.snapshots
				.create_snapshot(&plan.id, &plan.dest_root, &plan.touched_paths())
				.await?;
			Some(manifest.id)
		} else {
			None
		};

		let total = plan.operations.len();
		let mut operations = plan.operations.clone();
		for (index, op) in operations.iter_mut().enumerate() {
			if options.dry_run {
				op.status = Some(OperationStatus::Simulated);
				op.message = Some(describe(&plan.source_root, op, options.conflict_strategy));
			} else {
				self.run_operation(plan, op, options.conflict_strategy).await;
			}
			self.progress.emit(ProgressEvent::OperationCompleted {
				index,
				total,
				path: op.path.clone(),
				status: op.status.unwrap_or(OperationStatus::Failed),
				bytes: op.bytes_written,
			});
		}

		let count = |s: OperationStatus| operations.iter().filter(|o| o.status == Some(s)).count();
		let report = ExecutionReport {
			plan_id: plan.id.clone(),
			dry_run: options.dry_run,
			backup_id,
			completed: count(OperationStatus::Completed),
			failed: count(OperationStatus::Failed),
			skipped: count(OperationStatus::Skipped),
			simulated: count(OperationStatus::Simulated),
			bytes_written: operations.iter().map(|o| o.bytes_written).sum(),
			elapsed_ms: start.elapsed().as_millis() as u64,
			operations,
		};

		info!(
			"Plan {}: {} completed, {} failed, {} skipped, {} simulated, {} byte(s) written",
			report.plan_id,
			report.completed,
			report.failed,
			report.skipped,
			report.simulated,
			report.bytes_written
		);
		self.progress.emit(ProgressEvent::PhaseFinished {
			phase: SyncPhase::Executing,
			elapsed_ms: report.elapsed_ms,
		});
		Ok(report)
	}

	/// Restore the destination from the snapshot taken for a plan
	pub async fn rollback(&self, dest_root: &Path, backup_id: &str) -> Result<usize, SyncError> {
		Ok(self.snapshots.restore_snapshot(backup_id, dest_root).await?)
	}
}

/// Remove orphaned temp files from interrupted updates under `root`
pub async fn cleanup_temp_files(root: &Path) -> Result<usize, SyncError> {
	let root = root.to_path_buf();
	tokio::task::spawn_blocking(move || fileops::cleanup_temp_files(&root))
		.await
		.map_err(|e| SyncError::Other { message: format!("cleanup task failed: {}", e) })?
		.map_err(SyncError::from)
}


// vim: ts=4
